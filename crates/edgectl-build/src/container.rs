use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bollard::container::Config;
use bollard::models::HostConfig;
use edgectl_core::graph::walk_import_paths;
use edgectl_core::paths::to_container_path;
use edgectl_core::{
    CancelToken, DeployMetadata, Function, ImportMap, ProjectLayout, expand_static_files,
};

use crate::compress::compress_file;
use crate::docker::DockerClient;
use crate::{BundleError, BundleFunction};

/// Named volume holding the toolchain's module cache across runs.
pub const CACHE_VOLUME: &str = "edgectl_deno_cache";
const CACHE_DIR: &str = "/root/.cache/deno";
const OUTPUT_FILE: &str = "output.eszip";

/// Bundles inside the edge runtime image.
pub struct ContainerBundler {
    docker: DockerClient,
    layout: ProjectLayout,
    image: String,
    cancel: CancelToken,
}

/// Inputs to one container run, computed on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerPlan {
    pub binds: Vec<String>,
    pub cmd: Vec<String>,
}

impl ContainerBundler {
    pub fn new(
        docker: DockerClient,
        layout: ProjectLayout,
        image: String,
        cancel: CancelToken,
    ) -> Self {
        Self {
            docker,
            layout,
            image,
            cancel,
        }
    }

    async fn run(&self, slug: &str, function: &Function, output: &Path) -> Result<(), BundleError> {
        let out_dir = tempfile::Builder::new()
            .prefix(&format!("edgectl-{slug}-"))
            .tempdir()
            .map_err(|e| BundleError::io(std::env::temp_dir(), e))?;
        make_world_writable(out_dir.path())?;

        let plan = {
            let layout = self.layout.clone();
            let function = function.clone();
            let out = out_dir.path().to_path_buf();
            tokio::task::spawn_blocking(move || plan_container(&layout, &function, &out))
                .await
                .map_err(|e| BundleError::io(out_dir.path(), std::io::Error::other(e)))??
        };
        tracing::debug!(function = slug, binds = ?plan.binds, cmd = ?plan.cmd, "container plan");

        self.docker.ensure_image(&self.image).await?;
        let config = Config {
            image: Some(self.image.clone()),
            cmd: Some(plan.cmd),
            host_config: Some(HostConfig {
                binds: Some(plan.binds),
                ..Default::default()
            }),
            ..Default::default()
        };
        let name = format!("edgectl_bundle_{slug}_{:08x}", rand::random::<u32>());
        let exit = self.docker.run_to_completion(&name, config).await?;
        if exit.code != 0 {
            return Err(BundleError::BundleFailed {
                slug: slug.to_owned(),
                reason: format!("error running container: exit {}", exit.code),
                stderr: exit.stderr,
            });
        }

        let src = out_dir.path().join(OUTPUT_FILE);
        let dst = output.to_path_buf();
        let size = tokio::task::spawn_blocking(move || compress_file(&src, &dst))
            .await
            .map_err(|e| BundleError::io(output, std::io::Error::other(e)))??;
        tracing::info!(function = slug, bytes = size, "bundled in container");

        let out_path = out_dir.path().to_path_buf();
        if let Err(e) = out_dir.close() {
            tracing::warn!(path = %out_path.display(), "failed to remove bundle output: {e}");
        }
        Ok(())
    }
}

#[async_trait]
impl BundleFunction for ContainerBundler {
    async fn bundle(
        &self,
        slug: &str,
        function: &Function,
        output: &Path,
    ) -> Result<DeployMetadata, BundleError> {
        tokio::select! {
            result = self.run(slug, function, output) => result?,
            () = self.cancel.cancelled() => {
                return Err(BundleError::Cancelled { slug: slug.to_owned() });
            }
        }
        Ok(DeployMetadata::for_function(slug, function, &self.layout))
    }
}

/// Bind mounts and command for bundling `function` into `out_dir`.
///
/// Host paths are mounted at the same location inside the container, so every
/// path in the command is the host path in container form.
pub fn plan_container(
    layout: &ProjectLayout,
    function: &Function,
    out_dir: &Path,
) -> Result<ContainerPlan, BundleError> {
    let statics = expand_static_files(&function.static_files)?;
    let binds = bind_mounts(layout, function, out_dir, &statics)?;

    let mut cmd = vec![
        "bundle".to_owned(),
        "--entrypoint".to_owned(),
        to_container_path(&function.entrypoint),
        "--output".to_owned(),
        to_container_path(&out_dir.join(OUTPUT_FILE)),
    ];
    if let Some(import_map) = &function.import_map {
        cmd.push("--import-map".to_owned());
        cmd.push(to_container_path(import_map));
    }
    for file in &statics {
        cmd.push("--static".to_owned());
        cmd.push(to_container_path(file));
    }

    Ok(ContainerPlan { binds, cmd })
}

/// Module cache, functions root, output directory, then every other
/// directory the function reaches that is not already covered.
pub fn bind_mounts(
    layout: &ProjectLayout,
    function: &Function,
    out_dir: &Path,
    statics: &[PathBuf],
) -> Result<Vec<String>, BundleError> {
    let mut binds = vec![
        format!("{CACHE_VOLUME}:{CACHE_DIR}:rw"),
        bind(&layout.functions_dir, "ro"),
        bind(out_dir, "rw"),
    ];
    let mut mounted = vec![layout.functions_dir.clone(), out_dir.to_path_buf()];

    let import_map = match &function.import_map {
        Some(path) => ImportMap::load(path)?,
        None => ImportMap::default(),
    };
    let mut files = walk_import_paths(&function.entrypoint, &import_map, |path, w| {
        let data = std::fs::read(path)?;
        w.write_all(&data)
    })?;
    files.extend(function.import_map.iter().cloned());
    files.extend(statics.iter().cloned());

    let mut dirs: Vec<PathBuf> = files
        .iter()
        .filter_map(|file| file.parent().map(Path::to_path_buf))
        .collect();
    // Parents sort before their children
    dirs.sort();
    dirs.dedup();
    for dir in dirs {
        if mounted.iter().any(|m| dir.starts_with(m)) {
            continue;
        }
        binds.push(bind(&dir, "ro"));
        mounted.push(dir);
    }
    Ok(binds)
}

fn bind(host: &Path, mode: &str) -> String {
    format!("{}:{}:{mode}", host.display(), to_container_path(host))
}

#[cfg(unix)]
fn make_world_writable(dir: &Path) -> Result<(), BundleError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o777))
        .map_err(|e| BundleError::io(dir, e))
}

#[cfg(not(unix))]
fn make_world_writable(_dir: &Path) -> Result<(), BundleError> {
    Ok(())
}

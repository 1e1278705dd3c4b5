use std::io::Write;
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use edgectl_core::{CancelToken, DeployMetadata, Function, ProjectLayout};
use tokio::io::AsyncReadExt;
use tokio::process::Command;

use crate::compress::BundleWriter;
use crate::{BundleError, BundleFunction};

/// Script run by the host toolchain; prints the bundle on stdout.
pub const BUILD_SCRIPT: &str = include_str!("../assets/build.ts");

const READ_CHUNK: usize = 64 * 1024;

/// Bundles with a locally installed toolchain binary.
pub struct HostBundler {
    layout: ProjectLayout,
    binary: String,
    cancel: CancelToken,
}

impl HostBundler {
    pub fn new(layout: ProjectLayout, binary: String, cancel: CancelToken) -> Self {
        Self {
            layout,
            binary,
            cancel,
        }
    }

    async fn run(&self, slug: &str, function: &Function, output: &Path) -> Result<(), BundleError> {
        let script = write_build_script()?;

        let mut cmd = Command::new(&self.binary);
        cmd.arg("run")
            .arg("-A")
            .arg(script.path())
            .arg(&function.entrypoint);
        if let Some(import_map) = &function.import_map {
            cmd.arg(import_map);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(function = slug, binary = %self.binary, "running host bundler");
        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BundleError::ToolchainNotFound {
                    binary: self.binary.clone(),
                }
            } else {
                BundleError::Spawn {
                    binary: self.binary.clone(),
                    source: e,
                }
            }
        })?;

        let (Some(mut stdout), Some(mut stderr)) = (child.stdout.take(), child.stderr.take())
        else {
            return Err(BundleError::Spawn {
                binary: self.binary.clone(),
                source: std::io::Error::other("stdio was not captured"),
            });
        };

        // Owns stdout so an early error closes the pipe instead of stalling the child
        let copy_stdout = async move {
            let mut writer = BundleWriter::create(output)?;
            let mut chunk = vec![0u8; READ_CHUNK];
            loop {
                let n = stdout
                    .read(&mut chunk)
                    .await
                    .map_err(|e| BundleError::io(output, e))?;
                if n == 0 {
                    break;
                }
                writer.write_chunk(&chunk[..n])?;
            }
            writer.finish()
        };
        let read_stderr = async {
            let mut buf = Vec::new();
            stderr.read_to_end(&mut buf).await.map(|_| buf)
        };
        let (written, captured) = tokio::join!(copy_stdout, read_stderr);

        let status = child.wait().await.map_err(|e| BundleError::Spawn {
            binary: self.binary.clone(),
            source: e,
        })?;
        let captured = captured.map_err(|e| BundleError::Spawn {
            binary: self.binary.clone(),
            source: e,
        })?;

        if !status.success() {
            // A failed write closes stdout, so the exit status is only a symptom
            written?;
            return Err(BundleError::BundleFailed {
                slug: slug.to_owned(),
                reason: format!("{} exited with {status}", self.binary),
                stderr: String::from_utf8_lossy(&captured).into_owned(),
            });
        }

        let size = written?;
        tracing::info!(function = slug, bytes = size, "bundled on host");
        Ok(())
    }
}

#[async_trait]
impl BundleFunction for HostBundler {
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

fn write_build_script() -> Result<tempfile::NamedTempFile, BundleError> {
    let mut script = tempfile::Builder::new()
        .prefix("edgectl-build-")
        .suffix(".ts")
        .tempfile()
        .map_err(|e| BundleError::io(std::env::temp_dir(), e))?;
    script
        .write_all(BUILD_SCRIPT.as_bytes())
        .map_err(|e| BundleError::io(script.path(), e))?;
    Ok(script)
}

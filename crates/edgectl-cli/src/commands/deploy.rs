use std::path::{Path, PathBuf};
use std::sync::Arc;

use edgectl_build::Bundler;
use edgectl_core::function::discover_slugs;
use edgectl_core::{CancelToken, ProjectConfig, ProjectLayout, ResolveOptions, resolve_functions};

use super::Remote;
use super::deploy_pipeline::{Deployer, PruneOutcome};

#[derive(clap::Args)]
pub struct DeployArgs {
    /// Functions to deploy; all local functions when empty
    slugs: Vec<String>,

    /// Upload sources and bundle on the server
    #[arg(long, overrides_with = "no_api", conflicts_with = "use_docker")]
    use_api: bool,

    /// Bundle locally (default)
    #[arg(long, overrides_with = "use_api")]
    no_api: bool,

    /// Bundle inside the edge runtime container
    #[arg(long)]
    use_docker: bool,

    /// Disable JWT verification; `--no-verify-jwt=false` forces it on
    #[arg(
        long,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        value_name = "BOOL"
    )]
    no_verify_jwt: Option<bool>,

    /// Import map to use instead of the per-function one
    #[arg(long, value_name = "PATH")]
    import_map: Option<PathBuf>,

    /// Maximum number of functions bundled at once
    #[arg(long, short = 'j', value_name = "N")]
    jobs: Option<usize>,

    /// Delete remote functions that do not exist locally
    #[arg(long)]
    prune: bool,

    /// Skip the prune confirmation prompt
    #[arg(long)]
    force: bool,
}

impl DeployArgs {
    fn server_side(&self) -> bool {
        self.use_api && !self.no_api
    }

    /// Flag value for `verify_jwt`, if given on the command line.
    fn verify_jwt(&self) -> Option<bool> {
        self.no_verify_jwt.map(|disabled| !disabled)
    }
}

/// Resolve, bundle, upload and optionally prune.
pub async fn deploy(
    workdir: &Path,
    remote: &Remote,
    args: DeployArgs,
    cancel: CancelToken,
) -> anyhow::Result<()> {
    let layout = ProjectLayout::discover(workdir)?;
    let config = ProjectConfig::load(&layout.project_dir)?;

    let functions = resolve_functions(
        &layout,
        &config,
        &ResolveOptions {
            slugs: args.slugs.clone(),
            import_map: args.import_map.clone(),
            verify_jwt: args.verify_jwt(),
        },
    )?;

    let project_ref = remote.project_ref(&layout)?;
    let client = remote.client(&project_ref, cancel.child())?;

    let use_docker = args.use_docker && !args.server_side();
    let bundler = Bundler::select(
        use_docker,
        layout.clone(),
        &config.edge_runtime,
        cancel.child(),
    )
    .await;
    if args.server_side() {
        tracing::info!("bundling on the server");
    } else {
        tracing::info!(bundler = bundler.name(), "bundling locally");
    }

    let jobs = args.jobs.unwrap_or(config.edge_runtime.max_jobs).max(1);
    let deployer = Deployer::new(
        Arc::new(client),
        Arc::new(bundler),
        layout.clone(),
        jobs,
        args.server_side(),
    );

    let summary = deployer.deploy(&functions).await?;
    for slug in &summary.skipped {
        println!("Skipped deploying Function: {slug}");
    }
    if !summary.deployed.is_empty() {
        let slugs: Vec<&str> = summary.deployed.iter().map(|f| f.slug.as_str()).collect();
        println!(
            "Deployed Functions on project {project_ref}: {}",
            slugs.join(", ")
        );
    }

    if !args.prune {
        return Ok(());
    }
    if summary.deployed.is_empty() {
        tracing::warn!("nothing was deployed; skipping prune");
        return Ok(());
    }

    // Functions left out of this run still exist locally
    let mut local = discover_slugs(&layout, &config)?;
    local.extend(functions.keys().cloned());

    let force = args.force;
    let outcome = deployer
        .prune(&local, |candidates| {
            println!("Functions to delete from project {project_ref}:");
            for slug in candidates {
                println!("  - {slug}");
            }
            if force {
                return Ok(true);
            }
            super::confirm("Delete these functions?")
        })
        .await?;
    match outcome {
        PruneOutcome::Pruned(slugs) if slugs.is_empty() => println!("No functions to prune."),
        PruneOutcome::Pruned(slugs) => println!("Pruned Functions: {}", slugs.join(", ")),
        PruneOutcome::Declined => println!("Prune cancelled."),
    }

    Ok(())
}

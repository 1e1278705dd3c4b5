mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use edgectl_core::CancelToken;

use commands::{DeployArgs, Remote};

#[derive(Parser)]
#[command(name = "edgectl", about = "Bundle and deploy edge functions")]
#[command(version)]
struct Cli {
    /// Directory containing the supabase/ project directory
    #[arg(long, global = true, default_value = ".")]
    workdir: PathBuf,

    /// Remote project ref (defaults to supabase/.temp/project-ref)
    #[arg(long, global = true, env = "EDGECTL_PROJECT_REF")]
    project_ref: Option<String>,

    /// Management API access token
    #[arg(long, global = true, env = "EDGECTL_ACCESS_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Management API base URL
    #[arg(
        long,
        global = true,
        env = "EDGECTL_API_URL",
        default_value = "https://api.supabase.com"
    )]
    api_url: String,

    /// Log at debug level unless RUST_LOG is set
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage edge functions
    Functions {
        #[command(subcommand)]
        action: FunctionsAction,
    },
}

#[derive(Subcommand)]
enum FunctionsAction {
    /// Bundle and deploy functions
    Deploy(DeployArgs),
    /// List functions deployed to the project
    List,
    /// Delete a deployed function
    Delete {
        /// Function slug
        slug: String,
    },
    /// Create a new function from a template
    New {
        /// Function slug
        slug: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    let cancel = CancelToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::warn!("interrupted, cancelling");
                on_interrupt.cancel();
            }
            Err(e) => tracing::warn!("failed to listen for Ctrl-C: {e}"),
        }
    });

    let remote = Remote {
        project_ref: cli.project_ref,
        token: cli.token,
        api_url: cli.api_url,
    };

    match cli.command {
        Commands::Functions { action } => match action {
            FunctionsAction::Deploy(args) => {
                commands::deploy(&cli.workdir, &remote, args, cancel).await?
            }
            FunctionsAction::List => commands::list(&cli.workdir, &remote, cancel).await?,
            FunctionsAction::Delete { slug } => {
                commands::delete(&cli.workdir, &remote, &slug, cancel).await?
            }
            FunctionsAction::New { slug } => commands::new_function(&cli.workdir, &slug)?,
        },
    }

    Ok(())
}

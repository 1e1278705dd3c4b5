use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    /// The toolchain ran and reported failure.
    #[error("failed to bundle function {slug}: {reason}\n{stderr}")]
    BundleFailed {
        slug: String,
        reason: String,
        stderr: String,
    },

    #[error("{binary} not found; install Deno or deploy with --use-docker")]
    ToolchainNotFound { binary: String },

    #[error("failed to run {binary}")]
    Spawn {
        binary: String,
        source: std::io::Error,
    },

    #[error("docker: {context}")]
    Docker {
        context: String,
        source: bollard::errors::Error,
    },

    #[error("container {id} exited without reporting a status")]
    NoExitStatus { id: String },

    #[error("failed to write bundle {path}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("bundling {slug} was cancelled")]
    Cancelled { slug: String },

    #[error(transparent)]
    Project(#[from] edgectl_core::Error),
}

impl BundleError {
    pub(crate) fn docker(context: impl Into<String>, source: bollard::errors::Error) -> Self {
        Self::Docker {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

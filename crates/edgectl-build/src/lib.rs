//! Bundlers for edgectl.
//!
//! # Variants
//!
//! ```text
//! Bundler::Host       deno run -A build.ts <entrypoint> [import_map]   stdout → gzip
//! Bundler::Container  edge-runtime bundle --entrypoint .. --output ..  file → gzip
//! ```
//!
//! Both write one gzip-compressed artefact per function to a caller-chosen
//! path and return the [`DeployMetadata`] describing it. The container
//! variant bind-mounts the functions root read-only, plus every directory
//! outside it that the import graph reaches.

pub mod compress;
pub mod container;
pub mod docker;
pub mod error;
pub mod host;

use std::path::Path;

use async_trait::async_trait;
use edgectl_core::{CancelToken, DeployMetadata, EdgeRuntimeConfig, Function, ProjectLayout};

pub use container::ContainerBundler;
pub use docker::DockerClient;
pub use error::BundleError;
pub use host::HostBundler;

/// Produces a deployable artefact for one function.
#[async_trait]
pub trait BundleFunction: Send + Sync {
    /// Bundle `function` into a gzip artefact at `output`.
    async fn bundle(
        &self,
        slug: &str,
        function: &Function,
        output: &Path,
    ) -> Result<DeployMetadata, BundleError>;
}

pub enum Bundler {
    Host(HostBundler),
    Container(ContainerBundler),
}

impl Bundler {
    /// The container variant when requested and Docker answers, else the
    /// host variant.
    pub async fn select(
        use_docker: bool,
        layout: ProjectLayout,
        runtime: &EdgeRuntimeConfig,
        cancel: CancelToken,
    ) -> Self {
        if use_docker {
            match DockerClient::connect().await {
                Ok(docker) => {
                    return Self::Container(ContainerBundler::new(
                        docker,
                        layout,
                        runtime.image.clone(),
                        cancel,
                    ));
                }
                Err(e) => {
                    tracing::warn!("Docker is not available, bundling on the host instead: {e}");
                }
            }
        }
        Self::Host(HostBundler::new(layout, runtime.deno_binary.clone(), cancel))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Host(_) => "host",
            Self::Container(_) => "container",
        }
    }
}

#[async_trait]
impl BundleFunction for Bundler {
    async fn bundle(
        &self,
        slug: &str,
        function: &Function,
        output: &Path,
    ) -> Result<DeployMetadata, BundleError> {
        match self {
            Self::Host(host) => host.bundle(slug, function, output).await,
            Self::Container(container) => container.bundle(slug, function, output).await,
        }
    }
}

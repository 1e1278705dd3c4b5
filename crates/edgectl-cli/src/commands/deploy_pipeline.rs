//! Deploy coordinator.
//!
//! A single function is deployed directly: probe the server, then create or
//! update it. Several functions are staged with `bundle_only` uploads through
//! a [`JobQueue`] and promoted together by one bulk update, so either every
//! new version goes live or none does.
//!
//! ```text
//! Pending ─▶ Bundling ─▶ Uploaded ─▶ Committed
//!               └─▶ Failed (error logged, no commit)
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;

use edgectl_build::{BundleError, BundleFunction};
use edgectl_cloud::{
    ApiError, DeleteOutcome, FunctionStatus, FunctionsApi, JobQueue, QueueError, RemoteFunction,
    UploadPayload,
};
use edgectl_core::{DeployMetadata, Function, FunctionConfig, ProjectLayout};
use tempfile::NamedTempFile;

#[derive(Debug, thiserror::Error)]
pub(crate) enum DeployError {
    #[error(transparent)]
    Bundle(#[from] BundleError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("failed to promote {count} staged functions")]
    BulkCommit { count: usize, source: ApiError },

    #[error("failed to prune {failed} of {total} functions")]
    PartialPrune {
        failed: usize,
        total: usize,
        source: ApiError,
    },

    #[error("failed to create a temporary bundle file")]
    Staging { source: std::io::Error },

    #[error("failed to read confirmation")]
    Prompt { source: std::io::Error },

    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// Result of a successful deploy.
#[derive(Debug, Default)]
pub(crate) struct DeploySummary {
    pub deployed: Vec<RemoteFunction>,
    /// Disabled functions, in slug order
    pub skipped: Vec<String>,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum PruneOutcome {
    /// Slugs that are gone from the server, including ones already deleted.
    Pruned(Vec<String>),
    Declined,
}

pub(crate) struct Deployer<A, B> {
    api: Arc<A>,
    bundler: Arc<B>,
    layout: ProjectLayout,
    jobs: usize,
    /// Upload sources and let the server bundle them.
    server_side: bool,
}

impl<A, B> Clone for Deployer<A, B> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            bundler: Arc::clone(&self.bundler),
            layout: self.layout.clone(),
            jobs: self.jobs,
            server_side: self.server_side,
        }
    }
}

/// An upload ready to send. `artifact` owns the temporary bundle, if any.
struct Staged {
    metadata: DeployMetadata,
    payload: UploadPayload,
    artifact: Option<NamedTempFile>,
}

impl<A, B> Deployer<A, B>
where
    A: FunctionsApi + 'static,
    B: BundleFunction + 'static,
{
    pub(crate) fn new(
        api: Arc<A>,
        bundler: Arc<B>,
        layout: ProjectLayout,
        jobs: usize,
        server_side: bool,
    ) -> Self {
        Self {
            api,
            bundler,
            layout,
            jobs,
            server_side,
        }
    }

    /// Deploy every enabled function in `functions`.
    pub(crate) async fn deploy(
        &self,
        functions: &FunctionConfig,
    ) -> Result<DeploySummary, DeployError> {
        let mut summary = DeploySummary::default();
        let mut enabled = Vec::new();
        for (slug, function) in functions {
            if function.enabled {
                enabled.push((slug.clone(), function.clone()));
            } else {
                tracing::debug!(function = %slug, "disabled");
                summary.skipped.push(slug.clone());
            }
        }

        match enabled.as_slice() {
            [] => tracing::warn!("every selected function is disabled; nothing to deploy"),
            [(slug, function)] => summary.deployed.push(self.deploy_one(slug, function).await?),
            several => summary.deployed = self.deploy_staged(several).await?,
        }
        Ok(summary)
    }

    async fn deploy_one(
        &self,
        slug: &str,
        function: &Function,
    ) -> Result<RemoteFunction, DeployError> {
        let Staged {
            metadata,
            payload,
            artifact,
        } = self.stage(slug, function).await?;

        let result = match self.api.get_function(slug).await {
            Ok(None) => {
                tracing::info!(function = slug, "creating");
                self.api.create_function(&metadata, payload, false).await
            }
            Ok(Some(existing)) => {
                tracing::info!(function = slug, version = existing.version, "updating");
                self.api.update_function(&metadata, payload).await
            }
            Err(e) => Err(e),
        };
        release(artifact);

        let deployed = result?;
        tracing::info!(function = slug, version = deployed.version, "deployed");
        Ok(deployed)
    }

    async fn deploy_staged(
        &self,
        functions: &[(String, Function)],
    ) -> Result<Vec<RemoteFunction>, DeployError> {
        let mut queue = JobQueue::new(self.jobs);
        for (slug, function) in functions {
            let deployer = self.clone();
            let slug = slug.clone();
            let function = function.clone();
            queue
                .submit(async move { deployer.upload_staged(&slug, &function).await })
                .await?;
        }
        let staged = queue.collect().await?;

        let count = staged.len();
        tracing::info!(count, "promoting staged functions");
        self.api
            .bulk_update(&staged)
            .await
            .map_err(|e| DeployError::BulkCommit { count, source: e })
    }

    async fn upload_staged(
        &self,
        slug: &str,
        function: &Function,
    ) -> Result<RemoteFunction, DeployError> {
        let Staged {
            metadata,
            payload,
            artifact,
        } = self.stage(slug, function).await?;
        let result = self.api.create_function(&metadata, payload, true).await;
        release(artifact);

        let record = result?;
        tracing::info!(function = slug, id = %record.id, "staged");
        Ok(record)
    }

    /// Bundle locally into a temporary file, or prepare a sources upload.
    async fn stage(&self, slug: &str, function: &Function) -> Result<Staged, DeployError> {
        if self.server_side {
            return Ok(Staged {
                metadata: DeployMetadata::for_function(slug, function, &self.layout),
                payload: UploadPayload::Sources {
                    layout: self.layout.clone(),
                    function: function.clone(),
                },
                artifact: None,
            });
        }

        let artifact = tempfile::Builder::new()
            .prefix(&format!("edgectl-{slug}-"))
            .suffix(".eszip.gz")
            .tempfile()
            .map_err(|e| DeployError::Staging { source: e })?;
        let metadata = self.bundler.bundle(slug, function, artifact.path()).await?;
        Ok(Staged {
            metadata,
            payload: UploadPayload::Bundle {
                path: artifact.path().to_path_buf(),
                layout: self.layout.clone(),
                static_files: function.static_files.clone(),
            },
            artifact: Some(artifact),
        })
    }

    /// Delete remote functions whose slug is not in `local`.
    ///
    /// `local` covers the whole workspace, not only the functions deployed in
    /// this run. `confirm` sees the candidates and decides whether to go ahead. A
    /// function that is already gone counts as pruned. A failed delete does
    /// not stop the others.
    pub(crate) async fn prune<F>(
        &self,
        local: &BTreeSet<String>,
        confirm: F,
    ) -> Result<PruneOutcome, DeployError>
    where
        F: FnOnce(&[String]) -> std::io::Result<bool>,
    {
        let mut candidates: Vec<String> = self
            .api
            .list_functions()
            .await?
            .into_iter()
            .filter(|f| f.status != FunctionStatus::Removed && !local.contains(&f.slug))
            .map(|f| f.slug)
            .collect();
        candidates.sort_unstable();

        if candidates.is_empty() {
            tracing::info!("no functions to prune");
            return Ok(PruneOutcome::Pruned(candidates));
        }
        if !confirm(&candidates).map_err(|e| DeployError::Prompt { source: e })? {
            return Ok(PruneOutcome::Declined);
        }

        let total = candidates.len();
        let mut pruned = Vec::with_capacity(total);
        let mut failed = 0;
        let mut last_error = None;
        for slug in candidates {
            match self.api.delete_function(&slug).await {
                Ok(DeleteOutcome::Deleted) => {
                    tracing::info!(function = %slug, "deleted");
                    pruned.push(slug);
                }
                Ok(DeleteOutcome::NotFound) => {
                    tracing::debug!(function = %slug, "already deleted");
                    pruned.push(slug);
                }
                Err(ApiError::Cancelled) => return Err(ApiError::Cancelled.into()),
                Err(e) => {
                    tracing::error!(function = %slug, "{e}");
                    failed += 1;
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(source) => Err(DeployError::PartialPrune {
                failed,
                total,
                source,
            }),
            None => Ok(PruneOutcome::Pruned(pruned)),
        }
    }
}

/// Remove a temporary bundle, logging if that fails.
fn release(artifact: Option<NamedTempFile>) {
    let Some(artifact) = artifact else {
        return;
    };
    let path = artifact.path().to_path_buf();
    if let Err(e) = artifact.close() {
        tracing::warn!(path = %path.display(), "failed to remove temporary bundle: {e}");
    }
}

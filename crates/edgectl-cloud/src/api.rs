use std::path::PathBuf;

use async_trait::async_trait;
use edgectl_core::{DeployMetadata, Function, ProjectLayout};
use serde::{Deserialize, Serialize};

use crate::ApiError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FunctionStatus {
    Active,
    Removed,
    Throttled,
    #[serde(other)]
    Unknown,
}

/// The server's view of a deployed function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFunction {
    pub id: String,
    pub slug: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: i64,
    pub status: FunctionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify_jwt: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entrypoint_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import_map_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ezbr_sha256: Option<String>,
}

/// Body of a successful bulk update.
#[derive(Debug, Clone, Deserialize)]
pub struct BulkUpdateResponse {
    pub functions: Vec<RemoteFunction>,
}

/// What an upload carries besides the metadata part.
#[derive(Debug, Clone)]
pub enum UploadPayload {
    /// Import map, static files and every source reachable from the
    /// entrypoint, for bundling on the server.
    Sources {
        layout: ProjectLayout,
        function: Function,
    },
    /// A compressed bundle built locally, followed by the files matched by
    /// `static_files`.
    Bundle {
        path: PathBuf,
        layout: ProjectLayout,
        static_files: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

/// Remote functions API of one project.
#[async_trait]
pub trait FunctionsApi: Send + Sync {
    /// `None` when the server answers 404.
    async fn get_function(&self, slug: &str) -> Result<Option<RemoteFunction>, ApiError>;

    /// `POST /functions`. With `bundle_only` the version is staged but not
    /// promoted until a bulk update.
    async fn create_function(
        &self,
        metadata: &DeployMetadata,
        payload: UploadPayload,
        bundle_only: bool,
    ) -> Result<RemoteFunction, ApiError>;

    /// `PATCH /functions/{slug}`
    async fn update_function(
        &self,
        metadata: &DeployMetadata,
        payload: UploadPayload,
    ) -> Result<RemoteFunction, ApiError>;

    /// `PUT /functions`: promote previously staged versions together.
    async fn bulk_update(
        &self,
        functions: &[RemoteFunction],
    ) -> Result<Vec<RemoteFunction>, ApiError>;

    async fn list_functions(&self) -> Result<Vec<RemoteFunction>, ApiError>;

    async fn delete_function(&self, slug: &str) -> Result<DeleteOutcome, ApiError>;
}

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// `config.toml` under the project directory.
///
/// Only the sections the functions tooling reads are modelled; other tables
/// in the file are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Local project identifier (not the remote project ref)
    pub project_id: Option<String>,
    /// Per-function settings keyed by slug
    #[serde(default)]
    pub functions: BTreeMap<String, FunctionEntry>,
    #[serde(default)]
    pub edge_runtime: EdgeRuntimeConfig,
}

/// `[functions.<slug>]` table. Unset fields fall back to on-disk heuristics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionEntry {
    pub enabled: Option<bool>,
    pub verify_jwt: Option<bool>,
    /// Import map path, relative to the project directory
    pub import_map: Option<String>,
    /// Entrypoint path, relative to the project directory
    pub entrypoint: Option<String>,
    /// Glob patterns of files shipped alongside the function
    #[serde(default)]
    pub static_files: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeRuntimeConfig {
    /// Image used by the container bundler
    #[serde(default = "default_image")]
    pub image: String,
    /// Toolchain binary used by the host bundler
    #[serde(default = "default_deno_binary")]
    pub deno_binary: String,
    /// Default number of functions bundled concurrently
    #[serde(default = "default_max_jobs")]
    pub max_jobs: usize,
}

impl Default for EdgeRuntimeConfig {
    fn default() -> Self {
        Self {
            image: default_image(),
            deno_binary: default_deno_binary(),
            max_jobs: default_max_jobs(),
        }
    }
}

impl ProjectConfig {
    /// Load from config.toml in the given project directory, or return
    /// defaults if not found.
    pub fn load(project_dir: &Path) -> crate::Result<Self> {
        let config_path = project_dir.join(crate::paths::CONFIG_FILE);
        if config_path.exists() {
            let content =
                std::fs::read_to_string(&config_path).map_err(|e| crate::Error::ConfigLoad {
                    path: config_path.clone(),
                    source: e,
                })?;
            toml::from_str(&content).map_err(|e| crate::Error::ConfigParse {
                path: config_path,
                source: e,
            })
        } else {
            tracing::debug!(path = %config_path.display(), "no config.toml, using defaults");
            Ok(Self::default())
        }
    }
}

fn default_image() -> String {
    "public.ecr.aws/supabase/edge-runtime:v1.69.6".to_owned()
}

fn default_deno_binary() -> String {
    "deno".to_owned()
}

fn default_max_jobs() -> usize {
    4
}

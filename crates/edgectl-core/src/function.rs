//! Slug discovery and per-function configuration.
//!
//! # Import map precedence
//!
//! ```text
//! --import-map flag
//!   > [functions.<slug>].import_map
//!   > <functions>/<slug>/deno.json
//!   > <functions>/<slug>/deno.jsonc
//!   > <functions>/<slug>/import_map.json   (deprecated)
//!   > <project>/import_map.json            (deprecated fallback)
//!   > none
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::config::ProjectConfig;
use crate::paths::{DEFAULT_ENTRYPOINT, ProjectLayout};
use crate::slug::{is_valid_slug, validate_slug};

/// Effective configuration of one function for a single deploy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub enabled: bool,
    /// Absolute entrypoint path
    pub entrypoint: PathBuf,
    /// Absolute import map path
    pub import_map: Option<PathBuf>,
    pub verify_jwt: bool,
    /// Absolute glob patterns
    pub static_files: Vec<String>,
}

/// Functions to deploy, keyed by slug.
pub type FunctionConfig = BTreeMap<String, Function>;

/// CLI inputs to function resolution.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Explicit slugs; empty means every function found locally or in config.
    pub slugs: Vec<String>,
    /// `--import-map`, relative to the working directory
    pub import_map: Option<PathBuf>,
    /// `Some(false)` when `--no-verify-jwt` is set, `Some(true)` when it is
    /// explicitly negated, `None` to keep config values.
    pub verify_jwt: Option<bool>,
}

/// Merge CLI flags, `config.toml` and on-disk heuristics into a
/// [`FunctionConfig`].
pub fn resolve_functions(
    layout: &ProjectLayout,
    config: &ProjectConfig,
    options: &ResolveOptions,
) -> crate::Result<FunctionConfig> {
    let slugs = if options.slugs.is_empty() {
        discover_slugs(layout, config)?
    } else {
        for slug in &options.slugs {
            validate_slug(slug)?;
        }
        options.slugs.iter().cloned().collect()
    };

    if slugs.is_empty() {
        return Err(crate::Error::NothingToDeploy {
            functions_dir: layout.functions_dir.clone(),
        });
    }

    let fallback = layout.fallback_import_map();
    let fallback_exists = exists(&fallback)?;
    let flag_import_map = options.import_map.as_deref().map(|p| layout.absolute(p));

    let mut functions = FunctionConfig::new();
    for slug in slugs {
        let entry = config.functions.get(&slug);
        let function_dir = layout.function_dir(&slug);

        let entrypoint = match entry.and_then(|e| e.entrypoint.as_deref()) {
            Some(path) => layout.from_config(path),
            None => layout.default_entrypoint(&slug),
        };

        let import_map = match (&flag_import_map, entry.and_then(|e| e.import_map.as_deref())) {
            (Some(flag), _) => Some(flag.clone()),
            (None, Some(path)) => Some(layout.from_config(path)),
            (None, None) => sibling_import_map(&slug, &function_dir)?.or_else(|| {
                fallback_exists.then(|| {
                    tracing::warn!(
                        function = %slug,
                        path = %fallback.display(),
                        "using the project-wide fallback import map is deprecated; add a deno.json to the function directory"
                    );
                    fallback.clone()
                })
            }),
        };

        let verify_jwt = options
            .verify_jwt
            .or_else(|| entry.and_then(|e| e.verify_jwt))
            .unwrap_or(true);

        let static_files = entry
            .map(|e| {
                e.static_files
                    .iter()
                    .map(|pattern| crate::paths::to_posix(&layout.from_config(pattern)))
                    .collect()
            })
            .unwrap_or_default();

        functions.insert(
            slug,
            Function {
                enabled: entry.and_then(|e| e.enabled).unwrap_or(true),
                entrypoint,
                import_map,
                verify_jwt,
                static_files,
            },
        );
    }

    Ok(functions)
}

/// Slugs of function directories containing an entrypoint, unioned with the
/// slugs named in `config.toml`.
pub fn discover_slugs(
    layout: &ProjectLayout,
    config: &ProjectConfig,
) -> crate::Result<BTreeSet<String>> {
    let mut slugs = BTreeSet::new();

    match std::fs::read_dir(&layout.functions_dir) {
        Ok(entries) => {
            for entry in entries {
                let entry = entry.map_err(|e| crate::Error::FunctionsDirRead {
                    path: layout.functions_dir.clone(),
                    source: e,
                })?;
                let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                    continue;
                };
                if !exists(&entry.path().join(DEFAULT_ENTRYPOINT))? {
                    continue;
                }
                if is_valid_slug(&name) {
                    slugs.insert(name);
                } else {
                    tracing::debug!(dir = %name, "skipping directory with invalid function name");
                }
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(crate::Error::FunctionsDirRead {
                path: layout.functions_dir.clone(),
                source: e,
            });
        }
    }

    for slug in config.functions.keys() {
        validate_slug(slug)?;
        slugs.insert(slug.clone());
    }

    Ok(slugs)
}

fn sibling_import_map(slug: &str, function_dir: &Path) -> crate::Result<Option<PathBuf>> {
    for name in ["deno.json", "deno.jsonc"] {
        let candidate = function_dir.join(name);
        if exists(&candidate)? {
            return Ok(Some(candidate));
        }
    }
    let legacy = function_dir.join("import_map.json");
    if exists(&legacy)? {
        tracing::warn!(
            function = %slug,
            path = %legacy.display(),
            "import_map.json is deprecated; rename it to deno.json"
        );
        return Ok(Some(legacy));
    }
    Ok(None)
}

fn exists(path: &Path) -> crate::Result<bool> {
    std::fs::exists(path).map_err(|e| crate::Error::Stat {
        path: path.to_path_buf(),
        source: e,
    })
}

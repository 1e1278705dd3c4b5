use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to load config from {path}")]
    ConfigLoad {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    // ── Function resolution ──
    #[error("invalid function slug '{slug}': must only contain alphanumeric characters, '-' or '_'")]
    InvalidSlug { slug: String },

    #[error("no functions specified or found in {}", functions_dir.display())]
    NothingToDeploy { functions_dir: PathBuf },

    #[error("failed to scan functions directory {path}")]
    FunctionsDirRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to stat {path}")]
    Stat {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Import maps ──
    #[error("failed to read import map {path}")]
    ImportMapRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse import map {path}")]
    ImportMapParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    // ── Import graph ──
    #[error("failed to read source file {path}")]
    SourceRead {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Static files ──
    #[error("invalid static file pattern '{pattern}'")]
    StaticPattern {
        pattern: String,
        source: glob::PatternError,
    },

    #[error("failed to read static file")]
    StaticRead {
        #[from]
        source: glob::GlobError,
    },

    #[error("static file {path} is a directory; use a glob such as {path}/* instead")]
    StaticIsDirectory { path: PathBuf },

    #[error("failed to compile import pattern")]
    ImportPattern { source: regex::Error },
}

impl Error {
    /// Whether this error represents a missing file rather than a failed read.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::ConfigLoad { source, .. }
            | Self::FunctionsDirRead { source, .. }
            | Self::Stat { source, .. }
            | Self::ImportMapRead { source, .. }
            | Self::SourceRead { source, .. } => source.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

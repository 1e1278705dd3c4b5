//! Core types for edgectl.
//!
//! This crate resolves which functions to deploy and how
//! ([`resolve_functions`]), walks their import graphs ([`graph`]), and defines
//! the metadata record uploaded with each function ([`DeployMetadata`]).

pub mod cancel;
pub mod config;
pub mod error;
pub mod function;
pub mod graph;
pub mod import_map;
pub mod metadata;
pub mod paths;
pub mod slug;
pub mod statics;

pub use cancel::{Cause, CancelToken};
pub use config::{EdgeRuntimeConfig, FunctionEntry, ProjectConfig};
pub use error::{Error, Result};
pub use function::{Function, FunctionConfig, ResolveOptions, resolve_functions};
pub use import_map::ImportMap;
pub use metadata::DeployMetadata;
pub use paths::ProjectLayout;
pub use slug::validate_slug;
pub use statics::expand_static_files;

//! Shared types, error model, and configuration for docsync.
//!
//! This crate is the foundation depended on by all other docsync crates.
//! It provides:
//! - [`DocsyncError`], the unified error type
//! - Domain types ([`LocalDoc`], [`RemoteDoc`], [`MetadataValue`], [`Issue`])
//! - Configuration ([`AppConfig`] and its sections, config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CONFIG_FILE_NAME, ChecksConfig, RemoteConfig, SchemaDataset, SiteConfig,
    config_file_path, init_config, load_config, load_config_from, load_env_file,
    resolve_api_key,
};
pub use error::{DocsyncError, Result};
pub use types::{Issue, LocalDoc, Metadata, MetadataValue, RemoteDoc};

//! Application configuration for docsync.
//!
//! Config lives at `<docs root>/docsync.toml` (or the path passed with `--config`).
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DocsyncError, Result};

/// Default configuration file name, looked up in the docs root.
pub const CONFIG_FILE_NAME: &str = "docsync.toml";

/// Env file loaded from the docs root for local runs.
const ENV_FILE_NAME: &str = ".env";

// ---------------------------------------------------------------------------
// Config structs (matching docsync.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Docs site settings.
    #[serde(default)]
    pub site: SiteConfig,

    /// Retrieval service settings.
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Local validation settings.
    #[serde(default)]
    pub checks: ChecksConfig,
}

/// `[site]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Navigation config file, relative to the docs root.
    #[serde(default = "default_nav_file")]
    pub nav_file: String,

    /// Public base URL of the docs site (used for `url_full` metadata).
    #[serde(default = "default_site_base_url")]
    pub base_url: String,

    /// Repository name stamped into metadata and external ids.
    #[serde(default = "default_repo_name")]
    pub repo_name: String,

    /// Source marker identifying documents managed by this tool.
    #[serde(default = "default_source")]
    pub source: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            nav_file: default_nav_file(),
            base_url: default_site_base_url(),
            repo_name: default_repo_name(),
            source: default_source(),
        }
    }
}

fn default_nav_file() -> String {
    "docs.json".into()
}
fn default_site_base_url() -> String {
    "https://docs.sourcemedium.com".into()
}
fn default_repo_name() -> String {
    "sourcemedium-docs".into()
}
fn default_source() -> String {
    "sourcemedium-docs".into()
}

/// `[remote]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Retrieval API base URL.
    #[serde(default = "default_api_base_url")]
    pub base_url: String,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retry attempts for retryable errors (429/5xx, transport failures).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay for exponential backoff.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// How long to wait for changed documents to finish indexing.
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,

    /// Delay between polling rounds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Name of the shared (non-tenant) partition.
    #[serde(default = "default_shared_partition")]
    pub shared_partition: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            poll_timeout_secs: default_poll_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            shared_partition: default_shared_partition(),
        }
    }
}

fn default_api_base_url() -> String {
    "https://api.ragie.ai".into()
}
fn default_api_key_env() -> String {
    "RAGIE_API_KEY".into()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    4
}
fn default_retry_base_delay_ms() -> u64 {
    500
}
fn default_poll_timeout_secs() -> u64 {
    600
}
fn default_poll_interval_ms() -> u64 {
    2000
}
fn default_shared_partition() -> String {
    "shared_docs".into()
}

/// `[checks]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecksConfig {
    /// Datasets whose table pages embed the canonical schema.
    #[serde(default = "default_schema_datasets")]
    pub schema_datasets: Vec<SchemaDataset>,

    /// Top-level directories that never hold published pages.
    #[serde(default = "default_excluded_dirs")]
    pub excluded_dirs: Vec<String>,

    /// Regexes (case-insensitive) for refs allowed to live outside the nav.
    #[serde(default = "default_orphan_allow_patterns")]
    pub orphan_allow_patterns: Vec<String>,

    /// Regexes for `- name:` entries that must never be documented.
    #[serde(default = "default_excluded_column_patterns")]
    pub excluded_column_patterns: Vec<String>,

    /// Retired dataset names that table docs must not mention.
    #[serde(default = "default_legacy_dataset_names")]
    pub legacy_dataset_names: Vec<String>,

    /// Placeholder identifier used for the GCP project in SQL examples.
    #[serde(default = "default_project_placeholder")]
    pub project_placeholder: String,
}

impl Default for ChecksConfig {
    fn default() -> Self {
        Self {
            schema_datasets: default_schema_datasets(),
            excluded_dirs: default_excluded_dirs(),
            orphan_allow_patterns: default_orphan_allow_patterns(),
            excluded_column_patterns: default_excluded_column_patterns(),
            legacy_dataset_names: default_legacy_dataset_names(),
            project_placeholder: default_project_placeholder(),
        }
    }
}

/// A dataset and the directory (relative to the docs root) holding its table pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDataset {
    pub name: String,
    pub dir: String,
}

fn default_schema_datasets() -> Vec<SchemaDataset> {
    vec![
        SchemaDataset {
            name: "sm_transformed_v2".into(),
            dir: "data-activation/data-tables/sm_transformed_v2".into(),
        },
        SchemaDataset {
            name: "sm_metadata".into(),
            dir: "data-activation/data-tables/sm_metadata".into(),
        },
    ]
}
fn default_excluded_dirs() -> Vec<String> {
    vec!["snippets".into(), "yaml-files".into(), "internal".into()]
}
fn default_orphan_allow_patterns() -> Vec<String> {
    vec!["^internal/".into(), "/hidden-".into(), "template".into()]
}
fn default_excluded_column_patterns() -> Vec<String> {
    vec![
        r"name:\s*\w+_array\b".into(),
        r"name:\s*_synced_at\b".into(),
        r"name:\s*sm_order_referrer_source\b".into(),
    ]
}
fn default_legacy_dataset_names() -> Vec<String> {
    vec!["masterset".into()]
}
fn default_project_placeholder() -> String {
    "your_project".into()
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Path to the config file inside a docs root.
pub fn config_file_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE_NAME)
}

/// Load config for a docs root. Returns defaults if no config file exists.
///
/// An explicit path must exist.
pub fn load_config(root: &Path, explicit: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = explicit {
        return load_config_from(path);
    }

    let path = config_file_path(root);
    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| DocsyncError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| DocsyncError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Write a default config file into the docs root. Refuses to overwrite.
pub fn init_config(root: &Path) -> Result<PathBuf> {
    let path = config_file_path(root);
    if path.exists() {
        return Err(DocsyncError::config(format!(
            "{} already exists",
            path.display()
        )));
    }

    let content = toml::to_string_pretty(&AppConfig::default())
        .map_err(|e| DocsyncError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| DocsyncError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Load `<root>/.env` into the process env without overriding existing vars.
pub fn load_env_file(root: &Path) {
    let path = root.join(ENV_FILE_NAME);
    if !path.exists() {
        return;
    }
    match dotenvy::from_path(&path) {
        Ok(()) => tracing::debug!(?path, "loaded env file"),
        Err(e) => tracing::warn!(?path, error = %e, "failed to load env file"),
    }
}

/// Read the retrieval API key from the configured env var.
pub fn resolve_api_key(config: &RemoteConfig) -> Result<String> {
    let var_name = &config.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val.trim().to_string()),
        _ => Err(DocsyncError::config(format!(
            "{var_name} is not set (env or .env)"
        ))),
    }
}

//! Local content-integrity checks for a docs tree.
//!
//! Every check walks the tree once, collects [`Issue`]s, and never stops at
//! the first finding. A report with any issue is a failure.

pub mod columns;
pub mod inventory;
pub mod links;
pub mod placeholders;
pub mod schema;
pub mod tables;

use std::fmt;
use std::path::{Path, PathBuf};

use docsync_shared::{AppConfig, DocsyncError, Issue, Result};
use tracing::{info, instrument};

pub use schema::{SchemaIndex, build_schema_index, table_pages};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// The available checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckKind {
    Columns,
    Inventory,
    Placeholders,
    Links,
    Tables,
}

impl CheckKind {
    pub const ALL: [CheckKind; 5] = [
        CheckKind::Columns,
        CheckKind::Inventory,
        CheckKind::Placeholders,
        CheckKind::Links,
        CheckKind::Tables,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Columns => "columns",
            Self::Inventory => "inventory",
            Self::Placeholders => "placeholders",
            Self::Links => "links",
            Self::Tables => "tables",
        }
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one check.
#[derive(Debug, Clone)]
pub struct CheckReport {
    pub kind: CheckKind,
    /// Findings that fail the check.
    pub issues: Vec<Issue>,
    /// Informational lines (allowed orphans, skipped reasons).
    pub notes: Vec<String>,
}

impl CheckReport {
    pub fn new(kind: CheckKind) -> Self {
        Self {
            kind,
            issues: Vec::new(),
            notes: Vec::new(),
        }
    }

    pub fn passed(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Inputs shared by all checks.
#[derive(Debug, Clone, Copy)]
pub struct CheckContext<'a> {
    /// Docs root.
    pub root: &'a Path,
    pub config: &'a AppConfig,
}

impl CheckContext<'_> {
    /// Absolute path of the navigation config.
    pub fn nav_path(&self) -> PathBuf {
        self.root.join(&self.config.site.nav_file)
    }

    /// Path relative to the docs root, for issue reporting.
    pub fn relative(&self, path: &Path) -> PathBuf {
        path.strip_prefix(self.root).unwrap_or(path).to_path_buf()
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Run one check.
#[instrument(skip_all, fields(check = %kind))]
pub fn run_check(kind: CheckKind, ctx: &CheckContext<'_>) -> Result<CheckReport> {
    let report = match kind {
        CheckKind::Columns => columns::run(ctx)?,
        CheckKind::Inventory => inventory::run(ctx)?,
        CheckKind::Placeholders => placeholders::run(ctx)?,
        CheckKind::Links => links::run(ctx)?,
        CheckKind::Tables => tables::run(ctx)?,
    };
    info!(issues = report.issues.len(), "check finished");
    Ok(report)
}

/// Run every check in order, returning all reports.
pub fn run_all(ctx: &CheckContext<'_>) -> Result<Vec<CheckReport>> {
    CheckKind::ALL
        .iter()
        .map(|kind| run_check(*kind, ctx))
        .collect()
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Read a page, replacing invalid UTF-8 rather than failing.
pub(crate) fn read_page(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).map_err(|e| DocsyncError::io(path, e))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Compile a configured regex, naming the offending config key on failure.
pub(crate) fn compile_pattern(key: &str, pattern: &str, case_insensitive: bool) -> Result<regex::Regex> {
    regex::RegexBuilder::new(pattern)
        .case_insensitive(case_insensitive)
        .build()
        .map_err(|e| DocsyncError::config(format!("invalid pattern in checks.{key} '{pattern}': {e}")))
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::fs;
    use std::path::Path;

    pub fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    /// The checked-in sample docs tree.
    pub fn fixtures_root() -> std::path::PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../../../fixtures/docs")
    }
}

//! Docs tree discovery: navigation loading, ref resolution, and page walks.
//!
//! The navigation config (`docs.json`) is the source of truth for which pages
//! are published. Every published ref resolves to exactly one file on disk,
//! probed in a fixed order (see [`resolve_ref_path`]).

mod parser;
pub mod partition;

use std::path::{Path, PathBuf};

use docsync_shared::{DocsyncError, Result};
use tracing::{debug, instrument};

pub use parser::{NavDocument, nav_from_value};
pub use partition::{
    TENANT_PARTITION_PREFIX, discover_tenant_refs, sanitize_partition, scope_refs_for_partition,
    tenant_slug_from_partition, tenant_slug_from_ref,
};

/// Page file extensions, in resolution preference order.
pub const PAGE_EXTENSIONS: [&str; 2] = ["mdx", "md"];

// ---------------------------------------------------------------------------
// Navigation
// ---------------------------------------------------------------------------

/// Load and parse the navigation config at `path`.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_nav(path: &Path) -> Result<NavDocument> {
    let content = std::fs::read_to_string(path).map_err(|e| DocsyncError::io(path, e))?;
    let nav = parser::parse_nav(&content)?;
    debug!(
        refs = nav.refs.len(),
        redirects = nav.redirect_sources.len(),
        "loaded navigation"
    );
    Ok(nav)
}

// ---------------------------------------------------------------------------
// Ref <-> path
// ---------------------------------------------------------------------------

/// Resolve a docs ref to its file, trying `.mdx`, `.md`, `/index.mdx`, `/index.md`.
pub fn resolve_ref_path(root: &Path, doc_ref: &str) -> Option<PathBuf> {
    let doc_ref = doc_ref.trim_start_matches('/');
    let base = root.join(doc_ref);
    let candidates = PAGE_EXTENSIONS
        .iter()
        .map(|ext| root.join(format!("{doc_ref}.{ext}")))
        .chain(PAGE_EXTENSIONS.iter().map(|ext| base.join(format!("index.{ext}"))));

    candidates.into_iter().find(|p| p.is_file())
}

/// Ref for a page file: path relative to `root`, forward slashes, no extension.
pub fn ref_from_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let rel = rel.with_extension("");
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

/// Path relative to `root` as a forward-slash string (for messages and matching).
pub fn relative_display(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// Normalize an internal route: drop query and fragment, ensure a leading
/// slash, and drop a trailing slash except on the root route.
pub fn normalize_route(route: &str) -> String {
    let route = route.split(['#', '?']).next().unwrap_or("").trim();
    if route.is_empty() {
        return String::new();
    }
    let mut normalized = if route.starts_with('/') {
        route.to_string()
    } else {
        format!("/{route}")
    };
    while normalized.len() > 1 && normalized.ends_with('/') {
        normalized.pop();
    }
    normalized
}

// ---------------------------------------------------------------------------
// Page walk
// ---------------------------------------------------------------------------

/// Filters for [`walk_pages`].
#[derive(Debug, Clone)]
pub struct PageWalkOptions {
    /// Lowercase extensions to include (without the dot).
    pub extensions: Vec<String>,
    /// Top-level directory names to skip entirely.
    pub excluded_dirs: Vec<String>,
}

impl Default for PageWalkOptions {
    fn default() -> Self {
        Self {
            extensions: PAGE_EXTENSIONS.iter().map(|e| (*e).to_string()).collect(),
            excluded_dirs: Vec::new(),
        }
    }
}

/// Every page file under `root`, sorted.
///
/// Hidden files and directories (any component starting with `.`) are skipped,
/// as are the configured top-level directories.
pub fn walk_pages(root: &Path, opts: &PageWalkOptions) -> Vec<PathBuf> {
    let mut pages: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| {
            if entry.depth() == 0 {
                return true;
            }
            let name = entry.file_name().to_string_lossy();
            if name.starts_with('.') {
                return false;
            }
            !(entry.depth() == 1
                && entry.file_type().is_dir()
                && opts.excluded_dirs.iter().any(|d| d == name.as_ref()))
        })
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| opts.extensions.iter().any(|x| x.eq_ignore_ascii_case(ext)))
        })
        .map(walkdir::DirEntry::into_path)
        .collect();
    pages.sort();
    pages
}

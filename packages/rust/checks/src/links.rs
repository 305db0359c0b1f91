//! Internal link targets must exist on disk or be redirected.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use docsync_discovery::{PageWalkOptions, load_nav, normalize_route, walk_pages};
use docsync_markdown::strip_fenced_code;
use docsync_shared::{Issue, Result};

use crate::{CheckContext, CheckKind, CheckReport, read_page};

static MD_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\]]*\]\((/[^)#]+)").expect("valid regex"));
static HREF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"href=["'](/[^"'#]+)"#).expect("valid regex"));
static FILE_LIKE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/[^/]+\.[a-zA-Z0-9]{2,5}$").expect("valid regex"));

const ASSET_PREFIXES: [&str; 4] = ["/images/", "/logo/", "/favicon.", "/snippets/"];

/// Static assets and direct file links are not page routes.
pub fn is_asset_path(route: &str) -> bool {
    ASSET_PREFIXES.iter().any(|p| route.starts_with(p)) || FILE_LIKE_RE.is_match(route)
}

/// Normalized internal page routes linked from `text`, outside fenced code.
pub fn extract_internal_links(text: &str) -> BTreeSet<String> {
    let text = strip_fenced_code(text);
    MD_LINK_RE
        .captures_iter(&text)
        .chain(HREF_RE.captures_iter(&text))
        .map(|c| normalize_route(&c[1]))
        .filter(|link| !link.is_empty() && !is_asset_path(link))
        .collect()
}

/// Whether `route` resolves to `{p}.mdx`, `{p}/index.mdx`, or a directory.
fn route_exists(root: &Path, route: &str) -> bool {
    let clean = route.trim_start_matches('/');
    if clean.is_empty() {
        return true;
    }
    root.join(format!("{clean}.mdx")).is_file()
        || root.join(clean).join("index.mdx").is_file()
        || root.join(clean).is_dir()
}

pub(crate) fn run(ctx: &CheckContext<'_>) -> Result<CheckReport> {
    let mut report = CheckReport::new(CheckKind::Links);

    let nav_path = ctx.nav_path();
    let redirects = if nav_path.exists() {
        load_nav(&nav_path)?.redirect_sources
    } else {
        BTreeSet::new()
    };

    let opts = PageWalkOptions {
        extensions: vec!["mdx".into()],
        excluded_dirs: Vec::new(),
    };
    for path in walk_pages(ctx.root, &opts) {
        let text = read_page(&path)?;
        let rel = ctx.relative(&path);
        for link in extract_internal_links(&text) {
            if redirects.contains(&link) || route_exists(ctx.root, &link) {
                continue;
            }
            report
                .issues
                .push(Issue::new(&rel, format!("broken internal link {link}")));
        }
    }

    Ok(report)
}

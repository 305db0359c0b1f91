//! Navigation inventory: page metadata, orphan pages, nav refs without files.

use std::collections::BTreeSet;

use regex::Regex;

use docsync_discovery::{PageWalkOptions, load_nav, ref_from_path, resolve_ref_path, walk_pages};
use docsync_markdown::parse_frontmatter;
use docsync_shared::{Issue, Result};

use crate::{CheckContext, CheckKind, CheckReport, compile_pattern, read_page};

/// Frontmatter fields every published page must carry.
const REQUIRED_FIELDS: [&str; 3] = ["title", "description", "icon"];

pub(crate) fn run(ctx: &CheckContext<'_>) -> Result<CheckReport> {
    let mut report = CheckReport::new(CheckKind::Inventory);
    let nav_path = ctx.nav_path();
    if !nav_path.exists() {
        report.issues.push(Issue::new(
            ctx.relative(&nav_path),
            "navigation config not found",
        ));
        return Ok(report);
    }
    let nav = load_nav(&nav_path)?;
    if !nav.has_navigation {
        report.issues.push(Issue::new(
            ctx.relative(&nav_path),
            "missing navigation structure",
        ));
    }

    let allow = ctx
        .config
        .checks
        .orphan_allow_patterns
        .iter()
        .map(|p| compile_pattern("orphan_allow_patterns", p, true))
        .collect::<Result<Vec<Regex>>>()?;

    let opts = PageWalkOptions {
        extensions: vec!["mdx".into()],
        excluded_dirs: ctx.config.checks.excluded_dirs.clone(),
    };
    let pages = walk_pages(ctx.root, &opts);

    // Metadata
    for path in &pages {
        let text = read_page(path)?;
        let rel = ctx.relative(path);
        let Some((fm, _)) = parse_frontmatter(&text) else {
            report
                .issues
                .push(Issue::new(rel, "missing/invalid frontmatter"));
            continue;
        };
        for field in REQUIRED_FIELDS {
            if fm.get(field).is_none() {
                report
                    .issues
                    .push(Issue::new(&rel, format!("missing {field}")));
            }
        }
    }

    // Orphans
    let page_refs: BTreeSet<String> = pages
        .iter()
        .filter_map(|p| ref_from_path(ctx.root, p))
        .collect();
    for orphan in page_refs.iter().filter(|r| !nav.contains(r)) {
        if allow.iter().any(|re| re.is_match(orphan)) {
            report.notes.push(format!("allowed orphan: {orphan}"));
        } else {
            report
                .issues
                .push(Issue::new(format!("{orphan}.mdx"), "orphan page (not in navigation)"));
        }
    }

    // Nav refs without a file
    for nav_ref in &nav.refs {
        if resolve_ref_path(ctx.root, nav_ref).is_none() {
            report.issues.push(Issue::new(
                ctx.relative(&nav_path),
                format!("nav ref `{nav_ref}` has no page file"),
            ));
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::write;
    use docsync_shared::AppConfig;

    const GOOD: &str = "---\ntitle: Page\ndescription: A page\nicon: book\n---\nBody\n";

    fn run_in(root: &std::path::Path) -> CheckReport {
        let config = AppConfig::default();
        run(&CheckContext { root, config: &config }).unwrap()
    }

    fn messages(report: &CheckReport) -> Vec<String> {
        report.issues.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn clean_tree_passes() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "docs.json", r#"{"navigation": {"pages": ["intro", "guides/setup"]}}"#);
        write(root, "intro.mdx", GOOD);
        write(root, "guides/setup.mdx", GOOD);
        write(root, "snippets/card.mdx", "no frontmatter");
        let report = run_in(root);
        assert!(report.passed(), "{:?}", report.issues);
    }

    #[test]
    fn reports_metadata_orphans_and_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "docs.json", r#"{"navigation": {"pages": ["intro", "gone"]}}"#);
        write(root, "intro.mdx", "---\ntitle: Intro\ndescription: ''\n---\n");
        write(root, "stray.mdx", GOOD);
        write(root, "raw.mdx", "no frontmatter here");
        write(root, "guides/hidden-tools.mdx", GOOD);

        let report = run_in(root);
        let messages = messages(&report);
        assert!(messages.contains(&"intro.mdx: missing description".to_string()));
        assert!(messages.contains(&"intro.mdx: missing icon".to_string()));
        assert!(messages.contains(&"raw.mdx: missing/invalid frontmatter".to_string()));
        assert!(messages.contains(&"stray.mdx: orphan page (not in navigation)".to_string()));
        assert!(messages.contains(&"docs.json: nav ref `gone` has no page file".to_string()));
        assert!(!messages.iter().any(|m| m.contains("hidden-tools")));
        assert_eq!(report.notes, vec!["allowed orphan: guides/hidden-tools".to_string()]);
    }

    #[test]
    fn missing_nav_is_an_issue() {
        let dir = tempfile::tempdir().unwrap();
        let report = run_in(dir.path());
        assert_eq!(messages(&report), vec!["docs.json: navigation config not found"]);
    }
}

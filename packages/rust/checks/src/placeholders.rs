//! Placeholder-language lint.

use std::sync::LazyLock;

use regex::Regex;

use docsync_discovery::{PageWalkOptions, walk_pages};
use docsync_shared::{Issue, Result};

use crate::{CheckContext, CheckKind, CheckReport, read_page};

/// `(name, pattern)`; `TODO`/`TBD` are case-sensitive, the rest are not.
static PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("coming_soon", r"(?i)\bcoming soon\b"),
        ("under_construction", r"(?i)\bunder construction\b"),
        ("todo", r"\bTODO\b"),
        ("tbd", r"\bTBD\b"),
        ("lorem_ipsum", r"(?i)\blorem\b|\bipsum\b"),
        ("tablestakes_typo", r"(?i)\btablestakes\b"),
    ]
    .into_iter()
    .map(|(name, pattern)| (name, Regex::new(pattern).expect("valid regex")))
    .collect()
});

/// Placeholder pattern names matching `line`, in pattern order.
pub fn placeholder_hits(line: &str) -> impl Iterator<Item = &'static str> + '_ {
    PATTERNS
        .iter()
        .filter(move |(_, re)| re.is_match(line))
        .map(|(name, _)| *name)
}

pub(crate) fn run(ctx: &CheckContext<'_>) -> Result<CheckReport> {
    let mut report = CheckReport::new(CheckKind::Placeholders);
    let opts = PageWalkOptions {
        extensions: vec!["mdx".into(), "md".into()],
        excluded_dirs: ctx.config.checks.excluded_dirs.clone(),
    };

    for path in walk_pages(ctx.root, &opts) {
        let text = read_page(&path)?;
        let rel = ctx.relative(&path);
        for (idx, line) in text.lines().enumerate() {
            for name in placeholder_hits(line) {
                report.issues.push(Issue::at_line(&rel, idx + 1, name));
            }
        }
    }

    Ok(report)
}

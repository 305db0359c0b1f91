//! Table reference page hygiene.

use regex::Regex;

use docsync_markdown::{parse_frontmatter, yaml_blocks};
use docsync_shared::{Issue, Result};

use crate::schema::table_pages;
use crate::{CheckContext, CheckKind, CheckReport, compile_pattern, read_page};

pub(crate) fn run(ctx: &CheckContext<'_>) -> Result<CheckReport> {
    let mut report = CheckReport::new(CheckKind::Tables);
    let checks = &ctx.config.checks;

    let excluded = checks
        .excluded_column_patterns
        .iter()
        .map(|p| compile_pattern("excluded_column_patterns", p, false))
        .collect::<Result<Vec<Regex>>>()?;
    let legacy: Vec<String> = checks
        .legacy_dataset_names
        .iter()
        .map(|n| n.to_lowercase())
        .collect();

    for dataset in &checks.schema_datasets {
        let pages = table_pages(ctx.root, dataset);
        if pages.is_empty() {
            report
                .notes
                .push(format!("no table pages under {}", dataset.dir));
        }
        for path in pages {
            let text = read_page(&path)?;
            let rel = ctx.relative(&path);
            check_page(&rel, &text, &excluded, &legacy, &mut report.issues);
        }
    }

    Ok(report)
}

fn check_page(
    rel: &std::path::Path,
    text: &str,
    excluded: &[Regex],
    legacy: &[String],
    issues: &mut Vec<Issue>,
) {
    match parse_frontmatter(text) {
        None => issues.push(Issue::new(rel, "missing/invalid frontmatter")),
        Some((fm, _)) => {
            for field in ["title", "description"] {
                if !fm.fields.contains_key(field) {
                    issues.push(Issue::new(rel, format!("missing {field}")));
                }
            }
        }
    }

    // Only YAML snapshots are scanned so prose and examples can name anything.
    let blocks = yaml_blocks(text);
    let haystack = if blocks.is_empty() {
        text.to_string()
    } else {
        blocks.join("\n")
    };
    for re in excluded {
        let found: Vec<&str> = re.find_iter(&haystack).map(|m| m.as_str()).collect();
        if !found.is_empty() {
            issues.push(Issue::new(
                rel,
                format!("documents excluded column(s): {}", found.join(", ")),
            ));
        }
    }

    let lower = text.to_lowercase();
    for name in legacy {
        if lower.contains(name.as_str()) {
            issues.push(Issue::new(rel, format!("references legacy dataset `{name}`")));
        }
    }
}

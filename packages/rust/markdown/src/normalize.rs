//! Retrieval-text normalization passes.
//!
//! Each pass is a function `&str -> String`. Prose passes only run outside
//! fenced code blocks; whitespace passes run over the joined body.

use std::sync::LazyLock;

use regex::Regex;

use crate::blocks::split_fenced;

/// Callout components flattened to `Label: text`.
const CALLOUTS: [&str; 4] = ["Info", "Tip", "Note", "Warning"];

static CALLOUT_RES: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    CALLOUTS
        .iter()
        .map(|tag| {
            let re = Regex::new(&format!(r"(?is)<{tag}\b[^>]*>(.*?)</{tag}>"))
                .expect("valid regex");
            (*tag, re)
        })
        .collect()
});

/// Run the prose passes on every non-code segment, then collapse whitespace.
pub(crate) fn normalize_body(body: &str) -> String {
    let body = normalize_line_endings(body);

    let processed: String = split_fenced(&body)
        .into_iter()
        .map(|(is_code, segment)| {
            if is_code {
                segment.to_string()
            } else {
                clean_prose(segment)
            }
        })
        .collect();

    collapse_whitespace(&processed)
}

/// Prose passes for one non-code segment, repeated until the text is stable.
///
/// Removing a tag can expose a new `import` line or tag (`<span>import</span> x`,
/// `<<b>x>`). Every pass only shortens the text, so the loop terminates.
pub(crate) fn clean_prose(segment: &str) -> String {
    let mut current = segment.to_string();
    loop {
        let next = clean_prose_once(&current);
        if next == current {
            return next;
        }
        current = next;
    }
}

fn clean_prose_once(segment: &str) -> String {
    let mut result = strip_module_lines(segment);
    result = flatten_callouts(&result);
    result = strip_inline_markup(&result);
    result
}

// ---------------------------------------------------------------------------
// Pass 1: Line endings
// ---------------------------------------------------------------------------

fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

// ---------------------------------------------------------------------------
// Pass 2: MDX import/export lines
// ---------------------------------------------------------------------------

fn strip_module_lines(text: &str) -> String {
    static MODULE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?m)^\s*(?:import|export)\s+.+$").expect("valid regex")
    });

    MODULE_RE.replace_all(text, "").into_owned()
}

// ---------------------------------------------------------------------------
// Pass 3: Callouts
// ---------------------------------------------------------------------------

/// `<Note ...>inner</Note>` becomes `Note: inner` (or `Note` when inner is empty).
fn flatten_callouts(text: &str) -> String {
    let mut result = text.to_string();
    for (label, re) in CALLOUT_RES.iter() {
        result = re
            .replace_all(&result, |caps: &regex::Captures| {
                let inner = collapse_whitespace(&strip_inline_markup(&caps[1]));
                if inner.is_empty() {
                    (*label).to_string()
                } else {
                    format!("{label}: {inner}")
                }
            })
            .into_owned();
    }
    result
}

// ---------------------------------------------------------------------------
// Pass 4: JSX comments, tags, inline expressions
// ---------------------------------------------------------------------------

pub(crate) fn strip_inline_markup(text: &str) -> String {
    static JSX_COMMENT_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?s)\{\s*/\*.*?\*/\s*\}").expect("valid regex"));
    static TAG_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"</?[A-Za-z][^>]*>").expect("valid regex"));
    static EXPR_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\{\s*[A-Za-z_][^{}\n]*\}").expect("valid regex"));

    let result = JSX_COMMENT_RE.replace_all(text, "");
    let result = TAG_RE.replace_all(&result, "");
    EXPR_RE.replace_all(&result, "").into_owned()
}

// ---------------------------------------------------------------------------
// Pass 5: Whitespace
// ---------------------------------------------------------------------------

/// Collapse space/tab runs to one space and 3+ newlines to a blank line, then trim.
pub(crate) fn collapse_whitespace(text: &str) -> String {
    static SPACES_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[ \t]+").expect("valid regex"));
    static BLANK_LINES_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

    let result = SPACES_RE.replace_all(text, " ");
    let result = BLANK_LINES_RE.replace_all(&result, "\n\n");
    result.trim().to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

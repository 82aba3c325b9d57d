//! Datasheet text cleanup applied before parsing.

use std::sync::LazyLock;

use regex::Regex;

static BR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").expect("valid regex"));

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Turns `<br>` tags and non-breaking spaces into plain spaces and
/// collapses runs of whitespace, so labels split across lines
/// (`Population<br>Served`) read as one phrase.
#[must_use]
pub fn normalize_html(raw: &str) -> String {
    let text = BR_RE.replace_all(raw, " ");
    let text = text.replace("&nbsp;", " ").replace('\u{a0}', " ");
    WHITESPACE_RE.replace_all(&text, " ").trim().to_string()
}

/// Collapses whitespace in a single value.
#[must_use]
pub fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

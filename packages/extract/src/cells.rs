//! Cell text parsing.

use std::sync::LazyLock;

use regex::Regex;

/// Matches `low - high` at the start of a cell.
static RANGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([\d.,]+)\s*-\s*([\d.,]+)").expect("valid regex"));

/// Collapses runs of whitespace (including non-breaking spaces) into single
/// spaces and trims the ends.
#[must_use]
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parses a numeric cell. Blank, `na`, `n/a` and `-` are missing values;
/// thousands separators are ignored; anything unparseable is missing.
#[must_use]
pub fn parse_numeric(cell: &str) -> Option<f64> {
    let trimmed = cell.trim();
    if matches!(
        trimmed.to_ascii_lowercase().as_str(),
        "" | "na" | "n/a" | "-"
    ) {
        return None;
    }
    trimmed
        .replace(',', "")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Parses a range cell such as `0.012 - 0.049` into `(low, high)`.
#[must_use]
pub fn parse_range(cell: &str) -> (Option<f64>, Option<f64>) {
    RANGE_RE.captures(cell.trim()).map_or((None, None), |caps| {
        (parse_numeric(&caps[1]), parse_numeric(&caps[2]))
    })
}

/// Parses a Y/N violation cell.
#[must_use]
pub fn parse_flag(cell: &str) -> Option<bool> {
    match cell.trim().to_ascii_uppercase().as_str() {
        "Y" => Some(true),
        "N" => Some(false),
        _ => None,
    }
}

/// Keeps a likely-source description only when it is long enough to be
/// more than a stray mark.
#[must_use]
pub fn parse_source(cell: &str) -> Option<String> {
    let source = collapse_whitespace(cell);
    (source.chars().count() > 10).then_some(source)
}

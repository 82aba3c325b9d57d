//! Report header parsing.
//!
//! Every report opens with `<year> Consumer Confidence Report for Public
//! Water System <NAME>` and later states that the system `provides Ground
//! Water from` (or Surface Water) some source.

use std::sync::LazyLock;

use regex::Regex;

use crate::cells::collapse_whitespace;

static TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)(\d{4})\s+Consumer\s+Confidence\s+Report\s+for\s+Public\s+Water\s+System\s+(.+?)(?:\s+This|\s+provides|\n)",
    )
    .expect("valid regex")
});

static SOURCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)provides\s+(Ground\s+Water|Surface\s+Water)\s+from").expect("valid regex")
});

/// What the header says about the report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportHeader {
    /// Year in the title.
    pub year: Option<u16>,
    /// System name in the title.
    pub system_name: Option<String>,
    /// `Ground Water` or `Surface Water`.
    pub water_source: Option<String>,
}

/// Parses the header out of the report's plain text.
#[must_use]
pub fn parse_header(text: &str) -> ReportHeader {
    let mut header = ReportHeader::default();

    if let Some(caps) = TITLE_RE.captures(text) {
        header.year = caps[1].parse().ok();
        let name = collapse_whitespace(&caps[2]);
        if !name.is_empty() && !name.eq_ignore_ascii_case("null") {
            header.system_name = Some(name);
        }
    }

    if let Some(caps) = SOURCE_RE.captures(text) {
        let source = caps[1].to_lowercase();
        header.water_source = Some(if source.starts_with("ground") {
            "Ground Water".to_string()
        } else {
            "Surface Water".to_string()
        });
    }

    header
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_title_and_source() {
        let text = "2023 Consumer Confidence Report for Public Water System CITY OF ALPHA\n\
                    Our drinking water ... CITY OF ALPHA provides ground  water from the \
                    Carrizo aquifer.";
        let header = parse_header(text);
        assert_eq!(header.year, Some(2023));
        assert_eq!(header.system_name.as_deref(), Some("CITY OF ALPHA"));
        assert_eq!(header.water_source.as_deref(), Some("Ground Water"));
    }

    #[test]
    fn name_stops_before_this() {
        let header = parse_header(
            "2021 Consumer Confidence Report for Public Water System BETA   WSC This is your report",
        );
        assert_eq!(header.system_name.as_deref(), Some("BETA WSC"));
        assert_eq!(header.water_source, None);
    }

    #[test]
    fn null_name_is_dropped() {
        let header =
            parse_header("2020 Consumer Confidence Report for Public Water System null\nrest");
        assert_eq!(header.year, Some(2020));
        assert_eq!(header.system_name, None);
    }

    #[test]
    fn missing_header() {
        assert_eq!(parse_header("nothing here"), ReportHeader::default());
    }
}

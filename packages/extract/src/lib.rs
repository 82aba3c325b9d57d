#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Contaminant table extraction from converted CCR markup.
//!
//! Extraction is a pure function of the markup: tables are classified by
//! their header row ([`layout::detect_layout`]), rows are parsed according
//! to the table's layout, and every record's violation is derived from its
//! normalized level and limit. Tables that do not look like contaminant
//! tables are skipped; a report with none at all is an
//! [`ExtractionError::NoContaminantTable`].

pub mod cells;
pub mod header;
pub mod layout;
pub mod run;

use std::path::Path;

use ccr_map_water_models::{ContaminantRecord, ReportExtraction, parse_report_key};
use scraper::{ElementRef, Html, Selector};

use crate::header::{ReportHeader, parse_header};
use crate::layout::{Section, TableLayout, detect_layout, names_known_contaminant, parse_row};

/// Errors from extracting one report.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// No table in the markup looked like a contaminant table.
    #[error("no recognizable contaminant table")]
    NoContaminantTable,

    /// The file name is not `<WSNO>_<year>.html`.
    #[error("file name {0} is not <WSNO>_<year>.html")]
    FileName(String),

    /// The markup could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A CSS selector failed to parse.
    #[error("Parse error: {0}")]
    Selector(String),

    /// The extraction could not be saved.
    #[error(transparent)]
    Stage(#[from] ccr_map_stage::StageError),
}

/// Extracts every contaminant record from the markup of one report.
///
/// Records are de-duplicated by name and collection date; the first
/// occurrence wins.
///
/// # Errors
///
/// Returns [`ExtractionError::NoContaminantTable`] if no table matches a
/// known layout.
pub fn extract_records(html: &str) -> Result<Vec<ContaminantRecord>, ExtractionError> {
    let document = Html::parse_document(html);
    extract_from_document(&document)
}

/// Extracts records and the report header from one report's markup.
///
/// A report with no recognizable table still yields an extraction, with
/// `no_data` set and no records.
///
/// # Errors
///
/// Returns [`ExtractionError`] only if a selector cannot be built.
pub fn extract_report(
    html: &str,
    wsno: &str,
    year: u16,
) -> Result<ReportExtraction, ExtractionError> {
    let document = Html::parse_document(html);
    let text: String = document.root_element().text().collect();
    let ReportHeader {
        year: title_year,
        system_name,
        water_source,
    } = parse_header(&text);
    if let Some(title_year) = title_year.filter(|y| *y != year) {
        log::warn!("{wsno}_{year}: report title says {title_year}");
    }

    let (no_data, contaminants) = match extract_from_document(&document) {
        Ok(records) => (false, records),
        Err(ExtractionError::NoContaminantTable) => (true, Vec::new()),
        Err(e) => return Err(e),
    };

    Ok(ReportExtraction {
        wsno: wsno.to_string(),
        year,
        system_name,
        water_source,
        no_data,
        contaminants,
    })
}

/// Reads an HTML file named `<WSNO>_<year>.html` and extracts it.
///
/// Markup is decoded lossily, since converters emit a mix of encodings.
///
/// # Errors
///
/// Returns [`ExtractionError`] if the name does not parse or the file
/// cannot be read.
pub fn extract_file(path: &Path) -> Result<ReportExtraction, ExtractionError> {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (wsno, year) =
        parse_report_key(&stem).ok_or_else(|| ExtractionError::FileName(stem.clone()))?;
    let bytes = std::fs::read(path)?;
    extract_report(&String::from_utf8_lossy(&bytes), &wsno, year)
}

fn extract_from_document(document: &Html) -> Result<Vec<ContaminantRecord>, ExtractionError> {
    let table_sel = parse_selector("table")?;
    let row_sel = parse_selector("tr")?;
    let cell_sel = parse_selector("td, th")?;

    let mut records: Vec<ContaminantRecord> = Vec::new();
    let mut matched_table = false;

    for table in document.select(&table_sel) {
        let rows: Vec<Vec<String>> = table
            .select(&row_sel)
            .map(|row| row_cells(row, &cell_sel))
            .collect();
        let Some(first) = rows.first().filter(|cells| !cells.is_empty()) else {
            continue;
        };

        let (layout, start) = match detect_layout(first) {
            Some(layout) => (layout, 1),
            None if names_known_contaminant(first) => (TableLayout::Standard, 0),
            None => continue,
        };
        matched_table = true;
        // Continuation tables start with a data row, not a section label.
        let section = if start == 1 {
            Section::from_label(&first[0])
        } else {
            None
        };
        log::trace!("{layout} table, section {section:?}, {} rows", rows.len());

        for cells in &rows[start..] {
            if cells.iter().all(String::is_empty) {
                continue;
            }
            let Some(record) = parse_row(layout, cells, section) else {
                continue;
            };
            let duplicate = records
                .iter()
                .any(|r| r.name == record.name && r.collection_date == record.collection_date);
            if !duplicate {
                records.push(record);
            }
        }
    }

    if matched_table {
        Ok(records)
    } else {
        Err(ExtractionError::NoContaminantTable)
    }
}

fn row_cells(row: ElementRef<'_>, cell_sel: &Selector) -> Vec<String> {
    row.select(cell_sel)
        .map(|cell| cells::collapse_whitespace(&cell.text().collect::<Vec<_>>().join(" ")))
        .collect()
}

fn parse_selector(selector: &str) -> Result<Selector, ExtractionError> {
    Selector::parse(selector)
        .map_err(|e| ExtractionError::Selector(format!("invalid CSS selector '{selector}': {e}")))
}

#[cfg(test)]
mod tests {
    use ccr_map_water_models::{Unit, Violation};

    use super::*;

    const HEADER: &str = "<tr><td>Inorganic Contaminants</td><td>Collection Date</td>\
        <td>Highest Level Detected</td><td>Range of Individual Samples</td><td>MCLG</td>\
        <td>MCL</td><td>Units</td><td>Violation</td><td>Likely Source of Contamination</td></tr>";

    fn data_row(cells: &[&str]) -> String {
        let cells: String = cells.iter().map(|c| format!("<td><p>{c}</p></td>")).collect();
        format!("<tr>{cells}</tr>")
    }

    fn report(tables: &[String]) -> String {
        format!(
            "<html><body><p>2023 Consumer Confidence Report for Public Water System CITY OF ALPHA</p>\n\
             <p>CITY OF ALPHA provides Surface Water from Lake Alpha.</p>\n{}</body></html>",
            tables.concat()
        )
    }

    #[test]
    fn mixed_units_missing_limit_and_exceedance() {
        let table = format!(
            "<table>{HEADER}{}{}{}{}{}</table>",
            data_row(&["Nitrate", "2023", "0.5", "0.2 - 0.5", "10", "10", "ppm", "N", "Runoff from fertilizer use"]),
            data_row(&["Arsenic", "2023", "12", "0 - 12", "0", "10", "ppb", "Y", "Erosion of natural deposits"]),
            data_row(&["Barium", "2023", "0.05", "0.05 - 0.05", "2", "2", "ppm", "N", "Discharge of drilling wastes"]),
            data_row(&["Fluoride", "2023", "0.7", "0.7 - 0.7", "4", "", "ppm", "N", "Erosion of natural deposits"]),
            data_row(&["Selenium", "2023", "3", "3 - 3", "50", "50", "ppb", "N", "Discharge from mines"]),
        );

        let records = extract_records(&report(&[table])).unwrap();
        assert_eq!(records.len(), 5);

        let violation = |name: &str| {
            records
                .iter()
                .find(|r| r.name == name)
                .map(|r| r.violation)
                .unwrap()
        };
        assert_eq!(violation("Arsenic"), Violation::Yes);
        assert_eq!(violation("Fluoride"), Violation::Unknown);
        for name in ["Nitrate", "Barium", "Selenium"] {
            assert_eq!(violation(name), Violation::No, "{name}");
        }
        assert_eq!(
            records.iter().filter(|r| r.violation == Violation::Unknown).count(),
            1
        );
        assert_eq!(
            records.iter().filter(|r| r.violation == Violation::Yes).count(),
            1
        );
    }

    #[test]
    fn continuation_tables_and_duplicates() {
        let first = format!(
            "<table>{HEADER}{}</table>",
            data_row(&["Barium", "2023", "0.05", "0.05 - 0.05", "2", "2", "ppm", "N", "Discharge of drilling wastes"])
        );
        let continuation = format!(
            "<table>{}{}</table>",
            data_row(&["Barium", "2023", "0.05", "0.05 - 0.05", "2", "2", "ppm", "N", "Discharge of drilling wastes"]),
            data_row(&["Fluoride", "2022", "0.3", "0.3 - 0.3", "4", "4.0", "ppm", "N", "Erosion of natural deposits"]),
        );
        let unrelated = "<table><tr><td>Name</td><td>Phone</td></tr></table>".to_string();

        let records = extract_records(&report(&[first, unrelated, continuation])).unwrap();
        let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["Barium", "Fluoride"]);
        assert_eq!(records[0].section.as_deref(), Some("Inorganic Contaminants"));
        assert_eq!(records[1].section, None);
    }

    #[test]
    fn continuation_table_does_not_take_a_section_from_its_first_row() {
        let continuation = format!(
            "<table>{}</table>",
            data_row(&["Lead", "2023", "2.1", "0 - 2.1", "0", "15", "ppb", "N", "Corrosion of household plumbing"])
        );
        let records = extract_records(&report(&[continuation])).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Lead");
        assert_eq!(records[0].section, None);
        assert_eq!(records[0].level, Some(2.1));
        assert_eq!(records[0].limit, Some(15.0));
    }

    #[test]
    fn lead_copper_table() {
        let table = format!(
            "<table><tr><td>Lead and Copper</td><td>Date Sampled</td><td>MCLG</td>\
             <td>Action Level (AL)</td><td>90th Percentile</td><td># Sites Over AL</td>\
             <td>Units</td><td>Violation</td><td>Likely Source of Contamination</td></tr>{}</table>",
            data_row(&["Copper", "2022", "1.3", "1.3", "0.21", "0", "ppm", "N", "Erosion of natural deposits"])
        );
        let records = extract_records(&report(&[table])).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].level, Some(0.21));
        assert_eq!(records[0].limit, Some(1.3));
        assert_eq!(records[0].unit, Some(Unit::Ppm));
        assert_eq!(records[0].violation, Violation::No);
    }

    #[test]
    fn no_table_is_an_error_and_marks_no_data() {
        let html = report(&["<table><tr><td>Name</td><td>Phone</td></tr></table>".to_string()]);
        assert!(matches!(
            extract_records(&html),
            Err(ExtractionError::NoContaminantTable)
        ));

        let extraction = extract_report(&html, "TX1", 2023).unwrap();
        assert!(extraction.no_data);
        assert!(extraction.contaminants.is_empty());
        assert_eq!(extraction.system_name.as_deref(), Some("CITY OF ALPHA"));
        assert_eq!(extraction.water_source.as_deref(), Some("Surface Water"));
    }

    #[test]
    fn extract_file_uses_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("TX0010001_2022.html");
        std::fs::write(&path, report(&[])).unwrap();
        let extraction = extract_file(&path).unwrap();
        assert_eq!(extraction.wsno, "TX0010001");
        assert_eq!(extraction.year, 2022);
        assert!(extraction.no_data);

        let bad = dir.path().join("notes.html");
        std::fs::write(&bad, "").unwrap();
        assert!(matches!(extract_file(&bad), Err(ExtractionError::FileName(_))));
    }
}

//! Contaminant table layouts.
//!
//! Reports carry two kinds of contaminant tables. The standard layout
//! (inorganic, disinfection by-products, volatile organics, radioactive)
//! has columns name, collection date, highest level, range, MCLG, MCL,
//! units, violation, likely source. The lead and copper layout has name,
//! date sampled, MCLG, action level, 90th percentile, sites over action
//! level, units, violation, likely source.

use ccr_map_water_models::{ContaminantRecord, Unit, Violation};
use strum_macros::{AsRefStr, Display};

use crate::cells::{collapse_whitespace, parse_flag, parse_numeric, parse_range, parse_source};

/// Rows with fewer cells than this are not data rows.
const MIN_ROW_CELLS: usize = 7;

/// Substrings identifying a row's first cell as a known contaminant. Used
/// to recognise headerless continuation tables.
const KNOWN_CONTAMINANTS: &[&str] = &[
    "barium",
    "fluoride",
    "nitrate",
    "nitrite",
    "arsenic",
    "selenium",
    "cadmium",
    "chromium",
    "mercury",
    "antimony",
    "beryllium",
    "thallium",
    "cyanide",
    "copper",
    "lead",
    "haa5",
    "haloacetic",
    "tthm",
    "trihalomethane",
    "chlorite",
    "bromate",
    "benzene",
    "toluene",
    "xylene",
    "ethylbenzene",
    "styrene",
    "tetrachloroethylene",
    "trichloroethylene",
    "vinyl chloride",
    "radium",
    "uranium",
    "alpha",
    "beta",
    "gross",
    "coliform",
    "e. coli",
    "turbidity",
    "carbon tetrachloride",
    "dichloromethane",
    "chlorobenzene",
];

/// First-cell fragments marking a section label row rather than data.
const SECTION_LABELS: &[&str] = &[
    "inorganic contaminants",
    "disinfection by-products",
    "volatile organic",
    "radioactive",
    "coliform",
];

/// The column layout of a contaminant table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum TableLayout {
    /// Collection date, highest level, range, MCLG, MCL.
    Standard,
    /// Date sampled, MCLG, action level, 90th percentile.
    LeadCopper,
}

/// Document section a table belongs to, taken from its first cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
pub enum Section {
    /// Inorganic contaminants.
    #[strum(serialize = "Inorganic Contaminants")]
    Inorganic,
    /// Disinfection by-products.
    #[strum(serialize = "Disinfection By-Products")]
    DisinfectionByProducts,
    /// Volatile organic contaminants.
    #[strum(serialize = "Volatile Organic Contaminants")]
    VolatileOrganic,
    /// Radioactive contaminants.
    #[strum(serialize = "Radioactive Contaminants")]
    Radioactive,
    /// Lead and copper.
    #[strum(serialize = "Lead and Copper")]
    LeadCopper,
}

impl Section {
    /// Recognises a section from a table's first cell.
    #[must_use]
    pub fn from_label(cell: &str) -> Option<Self> {
        let cell = cell.to_lowercase();
        if cell.contains("inorganic") {
            Some(Self::Inorganic)
        } else if cell.contains("disinfection") {
            Some(Self::DisinfectionByProducts)
        } else if cell.contains("volatile") {
            Some(Self::VolatileOrganic)
        } else if cell.contains("radioactive") {
            Some(Self::Radioactive)
        } else if cell.contains("lead") || cell.contains("copper") {
            Some(Self::LeadCopper)
        } else {
            None
        }
    }
}

/// Recognises a table from its header row.
#[must_use]
pub fn detect_layout(header: &[String]) -> Option<TableLayout> {
    let text = header.join(" ").to_lowercase();
    if text.contains("lead and copper") {
        return Some(TableLayout::LeadCopper);
    }
    if text.contains("collection date") && (text.contains("highest level") || text.contains("range"))
    {
        return Some(TableLayout::Standard);
    }
    if text.contains("date sampled") && text.contains("90th percentile") {
        return Some(TableLayout::LeadCopper);
    }
    None
}

/// Whether a row's first cell names a known contaminant.
#[must_use]
pub fn names_known_contaminant(cells: &[String]) -> bool {
    if cells.len() < 5 {
        return false;
    }
    let first = cells[0].to_lowercase();
    KNOWN_CONTAMINANTS.iter().any(|name| first.contains(name))
}

/// Parses one data row. Returns `None` for short rows, blank names, header
/// repeats and section labels.
#[must_use]
pub fn parse_row(
    layout: TableLayout,
    cells: &[String],
    section: Option<Section>,
) -> Option<ContaminantRecord> {
    if cells.len() < MIN_ROW_CELLS || detect_layout(cells).is_some() {
        return None;
    }

    let name = collapse_whitespace(&cells[0]);
    let lower = name.to_lowercase();
    if name.is_empty() || matches!(lower.as_str(), "contaminant" | "contamination") {
        return None;
    }

    let mut record = match layout {
        TableLayout::Standard => {
            if SECTION_LABELS.iter().any(|label| lower.contains(label)) {
                return None;
            }
            let (range_low, range_high) = parse_range(&cells[3]);
            let goal = if cells[4].to_lowercase().contains("no goal") {
                None
            } else {
                parse_numeric(&cells[4])
            };
            ContaminantRecord {
                name,
                section: section.map(|s| s.to_string()),
                collection_date: date_cell(&cells[1]),
                level: parse_numeric(&cells[2]),
                range_low,
                range_high,
                goal,
                limit: parse_numeric(&cells[5]),
                unit: unit_cell(&cells[6]),
                reported_violation: cells.get(7).and_then(|c| parse_flag(c)),
                violation: Violation::Unknown,
                likely_source: cells.get(8).and_then(|c| parse_source(c)),
            }
        }
        TableLayout::LeadCopper => {
            if lower == "lead and copper" {
                return None;
            }
            ContaminantRecord {
                name,
                section: Some(Section::LeadCopper.to_string()),
                collection_date: date_cell(&cells[1]),
                level: parse_numeric(&cells[4]),
                range_low: None,
                range_high: None,
                goal: parse_numeric(&cells[2]),
                limit: parse_numeric(&cells[3]),
                unit: unit_cell(&cells[6]),
                reported_violation: cells.get(7).and_then(|c| parse_flag(c)),
                violation: Violation::Unknown,
                likely_source: cells.get(8).and_then(|c| parse_source(c)),
            }
        }
    };

    record.violation = record.derive_violation();
    Some(record)
}

fn date_cell(cell: &str) -> Option<String> {
    let date = collapse_whitespace(cell);
    (!date.is_empty()).then_some(date)
}

fn unit_cell(cell: &str) -> Option<Unit> {
    let unit = collapse_whitespace(cell);
    (!unit.is_empty()).then(|| Unit::parse(&unit))
}

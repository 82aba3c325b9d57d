#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Water system, report and contaminant record types.
//!
//! Every pipeline stage reads and writes these types. The scraper creates
//! [`CatalogEntry`] values, the converter tracks [`Report`] lifecycles, the
//! extractor produces [`ReportExtraction`]s full of [`ContaminantRecord`]s,
//! the enricher fills in [`SystemMetadata`], and the compiler joins them
//! all into [`WaterSystem`]s.

pub mod units;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

pub use units::{CanonicalUnit, NormalizedQuantity, Quantity, Unit, Violation};

/// Builds the key identifying one system's report for one year
/// (e.g. `"TX0010001_2023"`). Used for file stems, checkpoint entries and
/// the report index.
#[must_use]
pub fn report_key(wsno: &str, year: u16) -> String {
    format!("{wsno}_{year}")
}

/// Splits a report key or file stem (`"TX0010001_2023"`) back into the
/// system number and year.
#[must_use]
pub fn parse_report_key(key: &str) -> Option<(String, u16)> {
    let (wsno, year) = key.rsplit_once('_')?;
    if wsno.is_empty() || year.len() != 4 {
        return None;
    }
    let year = year.parse().ok()?;
    Some((wsno.to_string(), year))
}

/// One water system as listed in the portal's report dropdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Water System Number (e.g. `"TX0010001"`).
    pub wsno: String,
    /// System name as listed in the dropdown.
    pub name: String,
    /// Source water type (`"Ground Water"`, `"Surface Water"`), possibly
    /// empty.
    #[serde(default)]
    pub water_source: String,
    /// The verbatim option value. The portal requires it, trailing
    /// whitespace included, as the `wsno` parameter on report URLs.
    pub raw_value: String,
}

/// The scraped catalog: every system and every report year offered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    /// Systems in dropdown order.
    pub systems: Vec<CatalogEntry>,
    /// Report years, newest first.
    pub years: Vec<u16>,
}

/// A contact address from the system datasheet, de-duplicated across
/// contact roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactAddress {
    /// Normalized single-line address.
    pub address: String,
    /// How many contact rows listed this address.
    pub seen_count: u32,
    /// Role codes (e.g. `"AC"`, `"OW"`) that listed this address.
    pub roles: Vec<String>,
}

/// A water source (well or intake) listed on the system datasheet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFacility {
    /// Source identifier (e.g. `"G0010001A"`).
    pub id: String,
    /// Source name.
    pub name: String,
    /// Type code (`G`, `S`, `GU`).
    pub type_code: String,
    /// Human-readable type.
    pub type_desc: String,
    /// Activity status.
    pub status: String,
    /// Drill date, when listed.
    pub drill_date: Option<String>,
    /// Aquifer or river name, when listed.
    pub aquifer_or_river: Option<String>,
    /// GPS latitude as written on the datasheet.
    pub latitude: Option<String>,
    /// GPS longitude as written on the datasheet.
    pub longitude: Option<String>,
    /// Elevation as written on the datasheet.
    pub elevation: Option<String>,
}

/// Metadata gathered for a system by the enricher.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemMetadata {
    /// Download folder name the system was discovered under, if any.
    #[serde(default)]
    pub folder_name: Option<String>,
    /// Population served, when the datasheet lists one.
    #[serde(default)]
    pub population: Option<u64>,
    /// Service connections, when listed.
    #[serde(default)]
    pub connections: Option<u64>,
    /// County name.
    #[serde(default)]
    pub county: Option<String>,
    /// System type (community, non-transient, ...).
    #[serde(default)]
    pub system_type: Option<String>,
    /// Contact addresses.
    #[serde(default)]
    pub addresses: Vec<ContactAddress>,
    /// Active sources with optional GPS coordinates.
    #[serde(default)]
    pub sources: Vec<SourceFacility>,
    /// Set when the portal had no datasheet for this system.
    #[serde(default)]
    pub error: Option<String>,
}

/// A latitude/longitude pair (WGS84).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude.
    pub latitude: f64,
    /// Longitude.
    pub longitude: f64,
}

/// A water system with all metadata joined in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterSystem {
    /// Water System Number, the unique key.
    pub wsno: String,
    /// System name.
    pub name: String,
    /// Primary address, if known.
    pub address: Option<String>,
    /// Coordinates, if any source had valid GPS data.
    pub coordinates: Option<Coordinates>,
    /// Population served, if known.
    pub population: Option<u64>,
    /// Source water type, if known.
    pub water_source: Option<String>,
    /// County, if known.
    pub county: Option<String>,
    /// System type, if known.
    pub system_type: Option<String>,
}

/// Where a report's document is in the conversion lifecycle.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConversionStatus {
    /// Discovered, not yet converted.
    #[default]
    Pending,
    /// Converted to markup.
    Converted,
    /// Conversion failed.
    Failed,
}

/// One annual report for one system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    /// Owning system.
    pub wsno: String,
    /// Report year.
    pub year: u16,
    /// Path to the source document.
    pub document: String,
    /// Conversion status.
    #[serde(default)]
    pub status: ConversionStatus,
}

impl Report {
    /// Returns this report's key (see [`report_key`]).
    #[must_use]
    pub fn key(&self) -> String {
        report_key(&self.wsno, self.year)
    }
}

/// One contaminant row extracted from a report table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContaminantRecord {
    /// Contaminant name as written, whitespace collapsed.
    pub name: String,
    /// Document section the table belonged to, when labelled.
    #[serde(default)]
    pub section: Option<String>,
    /// Collection or sample date as written.
    #[serde(default)]
    pub collection_date: Option<String>,
    /// Measured level (highest level, or 90th percentile for lead/copper).
    #[serde(default)]
    pub level: Option<f64>,
    /// Low end of the detected range.
    #[serde(default)]
    pub range_low: Option<f64>,
    /// High end of the detected range.
    #[serde(default)]
    pub range_high: Option<f64>,
    /// Health goal (MCLG).
    #[serde(default)]
    pub goal: Option<f64>,
    /// Regulatory limit (MCL, or action level for lead/copper).
    #[serde(default)]
    pub limit: Option<f64>,
    /// Unit the level and limit are expressed in.
    #[serde(default)]
    pub unit: Option<Unit>,
    /// The violation letter printed in the report, if any.
    #[serde(default)]
    pub reported_violation: Option<bool>,
    /// Violation derived from the normalized level and limit.
    #[serde(default)]
    pub violation: Violation,
    /// Likely source of contamination.
    #[serde(default)]
    pub likely_source: Option<String>,
}

impl ContaminantRecord {
    /// The level paired with its unit, when both are present.
    #[must_use]
    pub fn level_quantity(&self) -> Option<Quantity> {
        Some(Quantity::new(self.level?, self.unit.clone()?))
    }

    /// The limit paired with its unit, when both are present.
    #[must_use]
    pub fn limit_quantity(&self) -> Option<Quantity> {
        Some(Quantity::new(self.limit?, self.unit.clone()?))
    }

    /// Whether the record's unit could be normalized.
    #[must_use]
    pub fn is_normalized(&self) -> bool {
        self.unit.as_ref().is_some_and(Unit::is_normalized)
    }

    /// The level in its canonical unit.
    #[must_use]
    pub fn normalized_level(&self) -> Option<NormalizedQuantity> {
        self.level_quantity()?.normalized()
    }

    /// The limit in its canonical unit.
    #[must_use]
    pub fn normalized_limit(&self) -> Option<NormalizedQuantity> {
        self.limit_quantity()?.normalized()
    }

    /// The health goal in its canonical unit.
    #[must_use]
    pub fn normalized_goal(&self) -> Option<NormalizedQuantity> {
        Quantity::new(self.goal?, self.unit.clone()?).normalized()
    }

    /// The unit values are normalized into, when the record's unit is
    /// recognised.
    #[must_use]
    pub fn canonical_unit(&self) -> Option<CanonicalUnit> {
        self.unit.as_ref()?.normalization().map(|(unit, _)| unit)
    }

    /// Derives the violation flag from the level and limit.
    #[must_use]
    pub fn derive_violation(&self) -> Violation {
        Violation::determine(
            self.level_quantity().as_ref(),
            self.limit_quantity().as_ref(),
        )
    }
}

/// The extractor's output for one report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportExtraction {
    /// Owning system.
    pub wsno: String,
    /// Report year.
    pub year: u16,
    /// System name from the report header.
    #[serde(default)]
    pub system_name: Option<String>,
    /// Water source from the report header.
    #[serde(default)]
    pub water_source: Option<String>,
    /// Set when no contaminant table could be recognised.
    #[serde(default)]
    pub no_data: bool,
    /// Extracted records.
    #[serde(default)]
    pub contaminants: Vec<ContaminantRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_key_round_trips_through_parse() {
        assert_eq!(report_key("TX0010001", 2023), "TX0010001_2023");
        assert_eq!(
            parse_report_key("TX0010001_2023"),
            Some(("TX0010001".to_string(), 2023))
        );
    }

    #[test]
    fn rejects_malformed_report_keys() {
        assert_eq!(parse_report_key("TX0010001"), None);
        assert_eq!(parse_report_key("_2023"), None);
        assert_eq!(parse_report_key("TX0010001_23"), None);
        assert_eq!(parse_report_key("TX0010001_abcd"), None);
    }

    #[test]
    fn record_without_unit_has_unknown_violation() {
        let record = ContaminantRecord {
            name: "Barium".to_string(),
            section: None,
            collection_date: None,
            level: Some(3.0),
            range_low: None,
            range_high: None,
            goal: None,
            limit: Some(2.0),
            unit: None,
            reported_violation: None,
            violation: Violation::Unknown,
            likely_source: None,
        };
        assert!(!record.is_normalized());
        assert_eq!(record.derive_violation(), Violation::Unknown);
    }

    #[test]
    fn ppm_record_normalizes_every_value_to_ppb() {
        let record = ContaminantRecord {
            name: "Nitrate".to_string(),
            section: None,
            collection_date: None,
            level: Some(0.5),
            range_low: None,
            range_high: None,
            goal: Some(10.0),
            limit: Some(10.0),
            unit: Some(Unit::parse("mg/L")),
            reported_violation: None,
            violation: Violation::No,
            likely_source: None,
        };
        assert_eq!(record.canonical_unit(), Some(CanonicalUnit::Ppb));
        assert_eq!(record.normalized_level().map(|q| q.value), Some(500.0));
        assert_eq!(record.normalized_limit().map(|q| q.value), Some(10_000.0));
        assert_eq!(record.normalized_goal().map(|q| q.value), Some(10_000.0));
    }

    #[test]
    fn conversion_status_uses_snake_case() {
        assert_eq!(ConversionStatus::Converted.to_string(), "converted");
        assert_eq!(
            serde_json::to_string(&ConversionStatus::Failed).unwrap(),
            "\"failed\""
        );
    }
}

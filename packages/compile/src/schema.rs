//! The compiled artifact schema.
//!
//! Both artifacts use short keys to keep them small. [`KEY_TABLE`] is the
//! single fixed mapping from each short key back to its meaning; the
//! viewer decodes with the same table. Keys are listed per object scope
//! because the same short key can mean different things in different
//! objects (`c` is the county on a system but the level table on a year).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// `(scope, short key, meaning)` for every key the artifacts can contain.
///
/// Scopes:
///
/// * `map` – top level of `<output>_map.json`
/// * `map.s[]` – one system marker
/// * `map.st` – run statistics
/// * `details` – top level of `<output>_details.json`
/// * `details.d{}` – one system's details, keyed by system number
/// * `details.d{}.y{}` – one report year, keyed by year
/// * `details.m{}` – one contaminant's metadata, keyed by name
pub const KEY_TABLE: &[(&str, &str, &str)] = &[
    ("map", "s", "systems"),
    ("map", "st", "stats"),
    ("map", "cat", "category_labels"),
    ("map.s[]", "i", "system_id"),
    ("map.s[]", "la", "latitude"),
    ("map.s[]", "lo", "longitude"),
    ("map.s[]", "p", "population"),
    ("map.s[]", "v", "violation_status (0 none, 1 past only, 2 recent)"),
    ("map.s[]", "nd", "no_data"),
    ("map.st", "ts", "total_systems"),
    ("map.st", "sd", "systems_with_data"),
    ("map.st", "sv", "systems_with_violations"),
    ("map.st", "sc", "systems_with_coordinates"),
    ("map.st", "pa", "population_affected"),
    ("map.st", "tv", "total_violations"),
    ("map.st", "y0", "first_year"),
    ("map.st", "y1", "last_year"),
    ("map.st", "rw", "recent_window_start"),
    ("details", "d", "systems"),
    ("details", "m", "contaminant_meta"),
    ("details", "cl", "contaminant_list"),
    ("details.d{}", "n", "name"),
    ("details.d{}", "c", "county"),
    ("details.d{}", "t", "system_type"),
    ("details.d{}", "ws", "water_source"),
    ("details.d{}", "a", "address"),
    ("details.d{}", "y", "years"),
    ("details.d{}.y{}", "v", "violations"),
    ("details.d{}.y{}", "u", "unknown_violations"),
    ("details.d{}.y{}", "c", "contaminant_levels"),
    ("details.m{}", "m", "limit"),
    ("details.m{}", "g", "goal"),
    ("details.m{}", "u", "unit"),
    ("details.m{}", "ca", "category"),
];

/// Looks up the meaning of `key` in `scope`.
#[must_use]
pub fn describe(scope: &str, key: &str) -> Option<&'static str> {
    KEY_TABLE
        .iter()
        .find(|(s, k, _)| *s == scope && *k == key)
        .map(|(_, _, meaning)| *meaning)
}

/// `<output>_map.json`: everything the map needs for its first render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapView {
    /// One marker per system, sorted by system number.
    #[serde(rename = "s")]
    pub systems: Vec<MapSystem>,
    /// Run statistics.
    #[serde(rename = "st")]
    pub stats: Stats,
    /// Category labels for filtering, sorted.
    #[serde(rename = "cat")]
    pub categories: Vec<String>,
}

/// One system on the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapSystem {
    /// System number.
    #[serde(rename = "i")]
    pub id: String,
    /// Latitude, 4 decimals.
    #[serde(rename = "la", default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    /// Longitude, 4 decimals.
    #[serde(rename = "lo", default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    /// Population served; null when unknown.
    #[serde(rename = "p", default)]
    pub population: Option<u64>,
    /// Violation rollup; absent when the system has no data.
    #[serde(rename = "v", default, skip_serializing_if = "Option::is_none")]
    pub violation_status: Option<u8>,
    /// `1` when the system has no converted reports.
    #[serde(rename = "nd", default, skip_serializing_if = "Option::is_none")]
    pub no_data: Option<u8>,
}

/// Run statistics shown before details load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    /// Systems on the map.
    #[serde(rename = "ts")]
    pub total_systems: u64,
    /// Systems with at least one report with data.
    #[serde(rename = "sd")]
    pub systems_with_data: u64,
    /// Systems with at least one violation in any year.
    #[serde(rename = "sv")]
    pub systems_with_violations: u64,
    /// Systems with coordinates.
    #[serde(rename = "sc")]
    pub systems_with_coordinates: u64,
    /// Total population of systems with violations.
    #[serde(rename = "pa")]
    pub population_affected: u64,
    /// Violations summed over every system and year.
    #[serde(rename = "tv")]
    pub total_violations: u64,
    /// First report year with data.
    #[serde(rename = "y0", default, skip_serializing_if = "Option::is_none")]
    pub first_year: Option<u16>,
    /// Last report year with data.
    #[serde(rename = "y1", default, skip_serializing_if = "Option::is_none")]
    pub last_year: Option<u16>,
    /// First year counted as recent by the rollup.
    #[serde(rename = "rw", default, skip_serializing_if = "Option::is_none")]
    pub recent_window_start: Option<u16>,
}

/// `<output>_details.json`: loaded in the background.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetailView {
    /// Per-system details keyed by system number.
    #[serde(rename = "d")]
    pub systems: BTreeMap<String, SystemDetail>,
    /// Contaminant metadata keyed by name, stored once per name.
    #[serde(rename = "m")]
    pub contaminants: BTreeMap<String, ContaminantMeta>,
    /// Every contaminant name observed, sorted.
    #[serde(rename = "cl")]
    pub contaminant_list: Vec<String>,
}

/// One system's details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemDetail {
    /// System name.
    #[serde(rename = "n")]
    pub name: String,
    /// County.
    #[serde(rename = "c", default)]
    pub county: Option<String>,
    /// System type.
    #[serde(rename = "t", default)]
    pub system_type: Option<String>,
    /// Source water type.
    #[serde(rename = "ws", default)]
    pub water_source: Option<String>,
    /// Primary address.
    #[serde(rename = "a", default)]
    pub address: Option<String>,
    /// Report years with data.
    #[serde(rename = "y", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub years: BTreeMap<u16, YearDetail>,
}

/// One report year for one system.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct YearDetail {
    /// Contaminants in violation, sorted.
    #[serde(rename = "v")]
    pub violations: Vec<String>,
    /// Contaminants whose violation status could not be determined, sorted.
    #[serde(rename = "u", default, skip_serializing_if = "Vec::is_empty")]
    pub unknown: Vec<String>,
    /// Contaminant name to measured level, in the contaminant's canonical
    /// unit (`ppb` for mass concentrations).
    #[serde(rename = "c")]
    pub levels: BTreeMap<String, Option<f64>>,
}

/// Metadata stored once per contaminant name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContaminantMeta {
    /// Regulatory limit.
    #[serde(rename = "m", default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<f64>,
    /// Health goal.
    #[serde(rename = "g", default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<f64>,
    /// Canonical unit of the levels, limit and goal. A unit that cannot be
    /// normalized is kept as written.
    #[serde(rename = "u", default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// Category label.
    #[serde(rename = "ca")]
    pub category: String,
}

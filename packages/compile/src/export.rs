//! Long-format CSV export: one row per system, year and contaminant.

use std::collections::BTreeMap;
use std::io::Write;

use serde::Serialize;

use crate::CompileError;
use crate::schema::{DetailView, MapSystem, MapView};

#[derive(Serialize)]
struct Row<'a> {
    system_id: &'a str,
    system_name: &'a str,
    county: Option<&'a str>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    population: Option<u64>,
    year: u16,
    water_source: Option<&'a str>,
    contaminant: &'a str,
    category: Option<&'a str>,
    level: Option<f64>,
    limit: Option<f64>,
    goal: Option<f64>,
    units: Option<&'a str>,
    violation: &'static str,
}

/// Joins both artifacts and writes one CSV row per measured contaminant.
/// Returns the number of rows written.
///
/// # Errors
///
/// Returns [`CompileError::Csv`] if writing fails.
pub fn write_csv<W: Write>(
    map: &MapView,
    details: &DetailView,
    writer: W,
) -> Result<u64, CompileError> {
    let markers: BTreeMap<&str, &MapSystem> =
        map.systems.iter().map(|s| (s.id.as_str(), s)).collect();

    let mut csv = csv::Writer::from_writer(writer);
    let mut rows = 0;

    for (id, system) in &details.systems {
        let marker = markers.get(id.as_str());
        for (year, detail) in &system.years {
            for (contaminant, level) in &detail.levels {
                let meta = details.contaminants.get(contaminant);
                let violation = if detail.violations.contains(contaminant) {
                    "yes"
                } else if detail.unknown.contains(contaminant) {
                    "unknown"
                } else {
                    "no"
                };

                csv.serialize(Row {
                    system_id: id,
                    system_name: &system.name,
                    county: system.county.as_deref(),
                    latitude: marker.and_then(|m| m.latitude),
                    longitude: marker.and_then(|m| m.longitude),
                    population: marker.and_then(|m| m.population),
                    year: *year,
                    water_source: system.water_source.as_deref(),
                    contaminant,
                    category: meta.map(|m| m.category.as_str()),
                    level: *level,
                    limit: meta.and_then(|m| m.limit),
                    goal: meta.and_then(|m| m.goal),
                    units: meta.and_then(|m| m.unit.as_deref()),
                    violation,
                })?;
                rows += 1;
            }
        }
    }

    csv.flush()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use crate::schema::{ContaminantMeta, Stats, SystemDetail, YearDetail};

    use super::*;

    #[test]
    fn writes_one_row_per_measurement() {
        let map = MapView {
            systems: vec![MapSystem {
                id: "TX1".to_string(),
                latitude: Some(30.5),
                longitude: Some(-97.25),
                population: Some(1200),
                violation_status: Some(2),
                no_data: None,
            }],
            stats: Stats::default(),
            categories: Vec::new(),
        };
        let details = DetailView {
            systems: BTreeMap::from([(
                "TX1".to_string(),
                SystemDetail {
                    name: "SMALL TOWN".to_string(),
                    county: Some("BELL".to_string()),
                    system_type: None,
                    water_source: Some("Ground Water".to_string()),
                    address: None,
                    years: BTreeMap::from([(
                        2023,
                        YearDetail {
                            violations: vec!["Nitrate".to_string()],
                            unknown: vec!["Gizmo".to_string()],
                            levels: BTreeMap::from([
                                ("Gizmo".to_string(), None),
                                ("Nitrate".to_string(), Some(12_000.0)),
                            ]),
                        },
                    )]),
                },
            )]),
            contaminants: BTreeMap::from([(
                "Nitrate".to_string(),
                ContaminantMeta {
                    limit: Some(10_000.0),
                    goal: Some(10_000.0),
                    unit: Some("ppb".to_string()),
                    category: "Inorganic Contaminants".to_string(),
                },
            )]),
            contaminant_list: vec!["Gizmo".to_string(), "Nitrate".to_string()],
        };

        let mut out = Vec::new();
        let rows = write_csv(&map, &details, &mut out).unwrap();
        assert_eq!(rows, 2);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(
            lines[0],
            "system_id,system_name,county,latitude,longitude,population,year,water_source,\
             contaminant,category,level,limit,goal,units,violation"
        );
        assert_eq!(
            lines[1],
            "TX1,SMALL TOWN,BELL,30.5,-97.25,1200,2023,Ground Water,Gizmo,,,,,,unknown"
        );
        assert_eq!(
            lines[2],
            "TX1,SMALL TOWN,BELL,30.5,-97.25,1200,2023,Ground Water,Nitrate,\
             Inorganic Contaminants,12000.0,10000.0,10000.0,ppb,yes"
        );
    }
}

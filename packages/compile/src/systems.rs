//! Joining the catalog, the metadata store and report headers into one
//! [`WaterSystem`] per system number.

use std::collections::BTreeMap;

use ccr_map_water_models::{Coordinates, SystemMetadata, WaterSystem};

use crate::CompilationError;
use crate::inputs::{CompileInputs, by_system_and_year};

/// Coordinates outside this box are treated as bad GPS data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// Southern edge (exclusive).
    pub min_lat: f64,
    /// Northern edge (exclusive).
    pub max_lat: f64,
    /// Western edge (exclusive).
    pub min_lon: f64,
    /// Eastern edge (exclusive).
    pub max_lon: f64,
}

impl BoundingBox {
    /// Texas.
    pub const TEXAS: Self = Self {
        min_lat: 25.0,
        max_lat: 37.0,
        min_lon: -107.0,
        max_lon: -93.0,
    };

    /// Whether the point is strictly inside the box.
    #[must_use]
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        self.min_lat < latitude
            && latitude < self.max_lat
            && self.min_lon < longitude
            && longitude < self.max_lon
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::TEXAS
    }
}

/// Rounds to 4 decimal places (about 11 m).
#[must_use]
pub fn round_coordinate(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Coordinates of the first source with parseable GPS data inside
/// `bounds`.
#[must_use]
pub fn coordinates(metadata: &SystemMetadata, bounds: &BoundingBox) -> Option<Coordinates> {
    metadata.sources.iter().find_map(|source| {
        let latitude: f64 = source.latitude.as_deref()?.trim().parse().ok()?;
        let longitude: f64 = source.longitude.as_deref()?.trim().parse().ok()?;
        bounds.contains(latitude, longitude).then(|| Coordinates {
            latitude: round_coordinate(latitude),
            longitude: round_coordinate(longitude),
        })
    })
}

/// The system name encoded in a download folder (`<WSNO>_<NAME>`).
#[must_use]
pub fn name_from_folder(wsno: &str, folder: &str) -> Option<String> {
    let name = folder
        .strip_prefix(wsno)
        .map_or(folder, |rest| rest.trim_start_matches('_'))
        .replace('_', " ");
    let name = name.trim();
    (!name.is_empty()).then(|| name.to_string())
}

/// The joined systems plus the records that had to be skipped.
#[derive(Debug, Clone, Default)]
pub struct JoinedSystems {
    /// One system per system number, sorted.
    pub systems: Vec<WaterSystem>,
    /// Records with no system number.
    pub errors: Vec<CompilationError>,
}

#[derive(Default)]
struct Header {
    name: Option<String>,
    water_source: Option<String>,
}

#[derive(Default)]
struct Sources<'a> {
    catalog_name: Option<&'a str>,
    catalog_water_source: Option<&'a str>,
}

/// Builds one [`WaterSystem`] for every catalog entry, then appends the
/// metadata entries and report owners missing from the catalog.
///
/// The name prefers the newest report header, then the catalog, then the
/// download folder, then the system number itself.
#[must_use]
pub fn join_systems(inputs: &CompileInputs, bounds: &BoundingBox) -> JoinedSystems {
    let mut errors = Vec::new();
    let mut known: BTreeMap<&str, Sources<'_>> = BTreeMap::new();

    for entry in &inputs.catalog.systems {
        let wsno = entry.wsno.trim();
        if wsno.is_empty() {
            errors.push(CompilationError::MissingIdentifier {
                origin: "catalog",
                label: entry.name.clone(),
            });
            continue;
        }
        known.entry(wsno).or_insert_with(|| Sources {
            catalog_name: non_blank(&entry.name),
            catalog_water_source: non_blank(&entry.water_source),
        });
    }

    for (wsno, metadata) in &inputs.metadata {
        let wsno = wsno.trim();
        if wsno.is_empty() {
            errors.push(CompilationError::MissingIdentifier {
                origin: "metadata",
                label: metadata.folder_name.clone().unwrap_or_default(),
            });
            continue;
        }
        known.entry(wsno).or_default();
    }

    // Sorted by year, so the newest header wins.
    let mut headers: BTreeMap<&str, Header> = BTreeMap::new();
    for extraction in by_system_and_year(&inputs.extractions) {
        let wsno = extraction.wsno.trim();
        if wsno.is_empty() {
            errors.push(CompilationError::MissingIdentifier {
                origin: "report",
                label: extraction.year.to_string(),
            });
            continue;
        }
        known.entry(wsno).or_default();
        let header = headers.entry(wsno).or_default();
        if let Some(name) = extraction.system_name.as_deref().and_then(non_blank) {
            header.name = Some(name.to_string());
        }
        if let Some(source) = extraction.water_source.as_deref().and_then(non_blank) {
            header.water_source = Some(source.to_string());
        }
    }

    let systems = known
        .into_iter()
        .map(|(wsno, sources)| {
            let metadata = inputs.metadata.get(wsno);
            let header = headers.get(wsno);

            let name = header
                .and_then(|h| h.name.clone())
                .or_else(|| sources.catalog_name.map(ToString::to_string))
                .or_else(|| {
                    metadata
                        .and_then(|m| m.folder_name.as_deref())
                        .and_then(|folder| name_from_folder(wsno, folder))
                })
                .unwrap_or_else(|| wsno.to_string());

            let water_source = header
                .and_then(|h| h.water_source.clone())
                .or_else(|| sources.catalog_water_source.map(ToString::to_string));

            WaterSystem {
                wsno: wsno.to_string(),
                name,
                address: metadata
                    .and_then(|m| m.addresses.first())
                    .map(|a| a.address.clone()),
                coordinates: metadata.and_then(|m| coordinates(m, bounds)),
                population: metadata.and_then(|m| m.population),
                water_source,
                county: metadata.and_then(|m| m.county.clone()),
                system_type: metadata.and_then(|m| m.system_type.clone()),
            }
        })
        .collect();

    JoinedSystems { systems, errors }
}

fn non_blank(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}

#[cfg(test)]
mod tests {
    use ccr_map_water_models::{Catalog, CatalogEntry, ReportExtraction, SourceFacility};

    use super::*;

    fn entry(wsno: &str, name: &str) -> CatalogEntry {
        CatalogEntry {
            wsno: wsno.to_string(),
            name: name.to_string(),
            water_source: "Ground Water".to_string(),
            raw_value: format!("{wsno}   "),
        }
    }

    fn source(lat: &str, lon: &str) -> SourceFacility {
        SourceFacility {
            latitude: Some(lat.to_string()),
            longitude: Some(lon.to_string()),
            ..SourceFacility::default()
        }
    }

    #[test]
    fn picks_first_source_inside_bounds_and_rounds() {
        let metadata = SystemMetadata {
            sources: vec![
                source("n/a", "-97.0"),
                source("45.1", "-97.0"),
                source("0.0", "0.0"),
                source("31.0", "-98.0"),
            ],
            ..SystemMetadata::default()
        };
        assert_eq!(
            coordinates(&metadata, &BoundingBox::TEXAS),
            Some(Coordinates {
                latitude: 31.0,
                longitude: -98.0
            })
        );

        let metadata = SystemMetadata {
            sources: vec![source("30.2666666", "-97.7333333")],
            ..SystemMetadata::default()
        };
        assert_eq!(
            coordinates(&metadata, &BoundingBox::TEXAS),
            Some(Coordinates {
                latitude: 30.2667,
                longitude: -97.7333
            })
        );
    }

    #[test]
    fn derives_name_from_folder() {
        assert_eq!(
            name_from_folder("TX0010001", "TX0010001_CITY_OF_PALESTINE"),
            Some("CITY OF PALESTINE".to_string())
        );
        assert_eq!(name_from_folder("TX0010001", "TX0010001"), None);
    }

    #[test]
    fn one_system_per_number_with_name_precedence() {
        let inputs = CompileInputs {
            catalog: Catalog {
                systems: vec![
                    entry("TX2", "CATALOG TWO"),
                    entry("TX1", "CATALOG ONE"),
                    entry("TX1", "CATALOG ONE AGAIN"),
                    entry("  ", "NAMELESS"),
                ],
                years: vec![2023],
            },
            metadata: BTreeMap::from([(
                "TX3".to_string(),
                SystemMetadata {
                    folder_name: Some("TX3_FOLDER_NAME".to_string()),
                    population: Some(900),
                    county: Some("TRAVIS".to_string()),
                    ..SystemMetadata::default()
                },
            )]),
            extractions: vec![
                ReportExtraction {
                    wsno: "TX1".to_string(),
                    year: 2021,
                    system_name: Some("OLD HEADER".to_string()),
                    water_source: None,
                    no_data: false,
                    contaminants: Vec::new(),
                },
                ReportExtraction {
                    wsno: "TX1".to_string(),
                    year: 2023,
                    system_name: Some("NEW HEADER".to_string()),
                    water_source: Some("Surface Water".to_string()),
                    no_data: false,
                    contaminants: Vec::new(),
                },
            ],
        };

        let joined = join_systems(&inputs, &BoundingBox::TEXAS);
        let ids: Vec<_> = joined.systems.iter().map(|s| s.wsno.as_str()).collect();
        assert_eq!(ids, vec!["TX1", "TX2", "TX3"]);

        assert_eq!(joined.systems[0].name, "NEW HEADER");
        assert_eq!(
            joined.systems[0].water_source.as_deref(),
            Some("Surface Water")
        );
        assert_eq!(joined.systems[1].name, "CATALOG TWO");
        assert_eq!(
            joined.systems[1].water_source.as_deref(),
            Some("Ground Water")
        );
        assert_eq!(joined.systems[2].name, "FOLDER NAME");
        assert_eq!(joined.systems[2].population, Some(900));
        assert_eq!(joined.systems[2].county.as_deref(), Some("TRAVIS"));

        assert_eq!(
            joined.errors,
            vec![CompilationError::MissingIdentifier {
                origin: "catalog",
                label: "NAMELESS".to_string(),
            }]
        );
    }
}

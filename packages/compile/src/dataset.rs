//! Building the map and detail views.

use std::collections::{BTreeMap, BTreeSet};

use ccr_map_category::{CategoryMapper, UNCATEGORIZED};
use ccr_map_water_models::{ContaminantRecord, NormalizedQuantity, ReportExtraction, Violation};
use serde::Serialize;

use crate::CompilationError;
use crate::inputs::{CompileInputs, by_system_and_year};
use crate::schema::{
    ContaminantMeta, DetailView, MapSystem, MapView, Stats, SystemDetail, YearDetail,
};
use crate::systems::{BoundingBox, join_systems};

/// How many years before the latest data year still count as recent.
pub const RECENT_YEARS: u16 = 2;

/// Rollup value: no violation in any year.
pub const STATUS_NONE: u8 = 0;
/// Rollup value: violations, but none in the recent window.
pub const STATUS_PAST: u8 = 1;
/// Rollup value: a violation in the recent window.
pub const STATUS_RECENT: u8 = 2;

/// Compiler settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompileOptions {
    /// Coordinates outside this box are dropped.
    pub bounds: BoundingBox,
}

/// Both views plus what went wrong building them.
#[derive(Debug, Clone)]
pub struct CompiledDataset {
    /// `<output>_map.json`.
    pub map: MapView,
    /// `<output>_details.json`.
    pub details: DetailView,
    /// Records skipped for lack of an identifier.
    pub errors: Vec<CompilationError>,
    /// Observed contaminant names with no category, sorted.
    pub unmapped: Vec<String>,
    /// Extractions that contributed data.
    pub reports_with_data: u64,
    /// Extractions without a contaminant table.
    pub reports_without_data: u64,
}

/// Long-form run statistics for `<output>_debug.json`.
#[derive(Debug, Clone, Serialize)]
pub struct DebugReport {
    /// Systems on the map.
    pub total_systems: u64,
    /// Systems with at least one report with data.
    pub systems_with_data: u64,
    /// Systems with a violation in any year.
    pub systems_with_violations: u64,
    /// Systems with coordinates.
    pub systems_with_coordinates: u64,
    /// Total population of systems with violations.
    pub population_affected: u64,
    /// Violations over every system and year.
    pub total_violations: u64,
    /// First and last data years.
    pub year_range: Option<(u16, u16)>,
    /// First year counted as recent.
    pub recent_window_start: Option<u16>,
    /// Extractions that contributed data.
    pub reports_with_data: u64,
    /// Extractions without a contaminant table.
    pub reports_without_data: u64,
    /// Distinct contaminant names.
    pub contaminants: usize,
    /// Names with no category.
    pub unmapped_contaminants: Vec<String>,
    /// Skipped records.
    pub compilation_errors: Vec<String>,
}

impl CompiledDataset {
    /// The long-form statistics written next to the artifacts.
    #[must_use]
    pub fn debug_report(&self) -> DebugReport {
        let stats = &self.map.stats;
        DebugReport {
            total_systems: stats.total_systems,
            systems_with_data: stats.systems_with_data,
            systems_with_violations: stats.systems_with_violations,
            systems_with_coordinates: stats.systems_with_coordinates,
            population_affected: stats.population_affected,
            total_violations: stats.total_violations,
            year_range: stats.first_year.zip(stats.last_year),
            recent_window_start: stats.recent_window_start,
            reports_with_data: self.reports_with_data,
            reports_without_data: self.reports_without_data,
            contaminants: self.details.contaminant_list.len(),
            unmapped_contaminants: self.unmapped.clone(),
            compilation_errors: self.errors.iter().map(ToString::to_string).collect(),
        }
    }
}

/// First year of the recent window for data ending in `last_year`.
#[must_use]
pub const fn recent_window_start(last_year: u16) -> u16 {
    last_year.saturating_sub(RECENT_YEARS)
}

/// Rolls a system's years up into [`STATUS_NONE`], [`STATUS_PAST`] or
/// [`STATUS_RECENT`].
#[must_use]
pub fn violation_status(years: &BTreeMap<u16, YearDetail>, recent_start: u16) -> u8 {
    let mut status = STATUS_NONE;
    for (year, detail) in years {
        if detail.violations.is_empty() {
            continue;
        }
        if *year >= recent_start {
            return STATUS_RECENT;
        }
        status = STATUS_PAST;
    }
    status
}

/// Compiles both views.
///
/// Output depends only on the inputs' contents, not their order: systems
/// and years are keyed in ordered maps, every list is sorted, and
/// contaminant metadata is taken from reports in system/year order.
#[must_use]
pub fn compile(
    inputs: &CompileInputs,
    mapper: &CategoryMapper,
    options: &CompileOptions,
) -> CompiledDataset {
    let joined = join_systems(inputs, &options.bounds);

    let mut years_by_system: BTreeMap<&str, BTreeMap<u16, YearDetail>> = BTreeMap::new();
    let mut contaminants: BTreeMap<String, ContaminantMeta> = BTreeMap::new();
    let mut reports_with_data = 0;
    let mut reports_without_data = 0;

    for extraction in by_system_and_year(&inputs.extractions) {
        let wsno = extraction.wsno.trim();
        if wsno.is_empty() {
            continue;
        }
        if extraction.no_data || extraction.contaminants.is_empty() {
            reports_without_data += 1;
            continue;
        }
        reports_with_data += 1;

        let year = years_by_system
            .entry(wsno)
            .or_default()
            .entry(extraction.year)
            .or_default();
        add_report(year, extraction, mapper, &mut contaminants);
    }

    let last_year = years_by_system
        .values()
        .flat_map(BTreeMap::keys)
        .max()
        .copied();
    let first_year = years_by_system
        .values()
        .flat_map(BTreeMap::keys)
        .min()
        .copied();
    let recent_start = last_year.map(recent_window_start);

    let mut stats = Stats {
        first_year,
        last_year,
        recent_window_start: recent_start,
        ..Stats::default()
    };
    let mut map_systems = Vec::with_capacity(joined.systems.len());
    let mut details = BTreeMap::new();

    for system in joined.systems {
        let years = years_by_system.remove(system.wsno.as_str()).unwrap_or_default();
        let has_data = !years.is_empty();

        stats.total_systems += 1;
        if system.coordinates.is_some() {
            stats.systems_with_coordinates += 1;
        }

        let violation_status = if has_data {
            stats.systems_with_data += 1;
            let violations: usize = years.values().map(|y| y.violations.len()).sum();
            if violations > 0 {
                stats.systems_with_violations += 1;
                stats.population_affected += system.population.unwrap_or(0);
                stats.total_violations += violations as u64;
            }
            Some(violation_status(&years, recent_start.unwrap_or(0)))
        } else {
            None
        };

        map_systems.push(MapSystem {
            id: system.wsno.clone(),
            latitude: system.coordinates.map(|c| c.latitude),
            longitude: system.coordinates.map(|c| c.longitude),
            population: system.population,
            violation_status,
            no_data: (!has_data).then_some(1),
        });

        details.insert(
            system.wsno,
            SystemDetail {
                name: system.name,
                county: system.county,
                system_type: system.system_type,
                water_source: system.water_source,
                address: system.address,
                years,
            },
        );
    }

    let contaminant_list: Vec<String> = contaminants.keys().cloned().collect();
    let unmapped = mapper
        .audit(&contaminant_list)
        .into_iter()
        .map(|gap| gap.name)
        .collect::<Vec<_>>();

    let mut categories: BTreeSet<String> = mapper.labels().into_iter().collect();
    if !unmapped.is_empty() {
        categories.insert(UNCATEGORIZED.to_string());
    }

    log::info!(
        "Compiled {} systems ({} with data, {} with violations)",
        stats.total_systems,
        stats.systems_with_data,
        stats.systems_with_violations
    );

    CompiledDataset {
        map: MapView {
            systems: map_systems,
            stats,
            categories: categories.into_iter().collect(),
        },
        details: DetailView {
            systems: details,
            contaminants,
            contaminant_list,
        },
        errors: joined.errors,
        unmapped,
        reports_with_data,
        reports_without_data,
    }
}

/// Folds one report's records into its year. The same contaminant listed
/// twice (several sample dates) keeps its highest level. Levels are stored
/// in the record's canonical unit so one contaminant's series is
/// comparable across reports.
fn add_report(
    year: &mut YearDetail,
    extraction: &ReportExtraction,
    mapper: &CategoryMapper,
    contaminants: &mut BTreeMap<String, ContaminantMeta>,
) {
    let mut violations: BTreeSet<String> = year.violations.drain(..).collect();
    let mut unknown: BTreeSet<String> = year.unknown.drain(..).collect();

    for record in &extraction.contaminants {
        let name = record.name.split_whitespace().collect::<Vec<_>>().join(" ");
        if name.is_empty() {
            continue;
        }

        let value = canonical_value(record, record.level, record.normalized_level());
        let level = year.levels.entry(name.clone()).or_insert(None);
        *level = match (*level, value) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };

        match record.violation {
            Violation::Yes => {
                violations.insert(name.clone());
            }
            Violation::Unknown => {
                unknown.insert(name.clone());
            }
            Violation::No => {}
        }

        merge_meta(contaminants, &name, record, mapper);
    }

    unknown.retain(|name| !violations.contains(name));
    year.violations = violations.into_iter().collect();
    year.unknown = unknown.into_iter().collect();
}

/// `value` in the record's canonical unit, or as written when the unit is
/// missing or unrecognised.
fn canonical_value(
    record: &ContaminantRecord,
    value: Option<f64>,
    normalized: Option<NormalizedQuantity>,
) -> Option<f64> {
    if record.is_normalized() {
        normalized.map(|q| q.value)
    } else {
        value
    }
}

/// Records a contaminant's limit, goal and unit. All three come from the
/// same record: the first with a limit, or until one is seen, the first
/// with a unit.
fn merge_meta(
    contaminants: &mut BTreeMap<String, ContaminantMeta>,
    name: &str,
    record: &ContaminantRecord,
    mapper: &CategoryMapper,
) {
    let meta = contaminants
        .entry(name.to_string())
        .or_insert_with(|| ContaminantMeta {
            limit: None,
            goal: None,
            unit: None,
            category: mapper.category(name).to_string(),
        });
    if meta.limit.is_some() {
        return;
    }
    if record.limit.is_none() && (meta.unit.is_some() || record.unit.is_none()) {
        return;
    }

    meta.limit = canonical_value(record, record.limit, record.normalized_limit());
    meta.goal = canonical_value(record, record.goal, record.normalized_goal());
    meta.unit = record.canonical_unit().map_or_else(
        || record.unit.as_ref().map(|u| u.as_str().to_string()),
        |unit| Some(unit.to_string()),
    );
}

//! Download queue construction.

use ccr_map_stage::checkpoint::CheckpointStore;
use ccr_map_water_models::{Catalog, CatalogEntry, report_key};

/// One report to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueItem {
    /// The system.
    pub entry: CatalogEntry,
    /// The report year.
    pub year: u16,
}

impl QueueItem {
    /// The checkpoint key for this item.
    #[must_use]
    pub fn key(&self) -> String {
        report_key(&self.entry.wsno, self.year)
    }
}

/// Builds the queue of every (system, year) pair the checkpoint does not
/// mark complete, newest year first and then by wsno. `limit` caps the
/// queue length.
#[must_use]
pub fn build_queue(
    catalog: &Catalog,
    checkpoint: &impl CheckpointStore,
    limit: Option<usize>,
) -> Vec<QueueItem> {
    let mut years = catalog.years.clone();
    years.sort_unstable_by(|a, b| b.cmp(a));

    let mut systems: Vec<&CatalogEntry> = catalog.systems.iter().collect();
    systems.sort_by(|a, b| a.wsno.cmp(&b.wsno));

    years
        .iter()
        .flat_map(|&year| systems.iter().map(move |entry| (year, *entry)))
        .filter(|(year, entry)| !checkpoint.is_complete(&report_key(&entry.wsno, *year)))
        .take(limit.unwrap_or(usize::MAX))
        .map(|(year, entry)| QueueItem {
            entry: entry.clone(),
            year,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use ccr_map_stage::checkpoint::{CheckpointStatus, MemoryCheckpoint};

    use super::*;

    fn catalog() -> Catalog {
        let entry = |wsno: &str| CatalogEntry {
            wsno: wsno.to_string(),
            name: format!("SYSTEM {wsno}"),
            water_source: "Ground Water".to_string(),
            raw_value: format!("{wsno}:SYSTEM {wsno}:Ground Water"),
        };
        Catalog {
            systems: vec![entry("TX2"), entry("TX1")],
            years: vec![2022, 2023],
        }
    }

    #[test]
    fn orders_newest_year_then_wsno() {
        let queue = build_queue(&catalog(), &MemoryCheckpoint::default(), None);
        let keys: Vec<String> = queue.iter().map(QueueItem::key).collect();
        assert_eq!(keys, ["TX1_2023", "TX2_2023", "TX1_2022", "TX2_2022"]);
    }

    #[test]
    fn skips_terminal_entries_but_requeues_failures() {
        let checkpoint = MemoryCheckpoint::with_entries([
            ("TX1_2023".to_string(), CheckpointStatus::Downloaded),
            ("TX2_2023".to_string(), CheckpointStatus::NotAvailable),
            ("TX1_2022".to_string(), CheckpointStatus::Failed),
        ]);
        let keys: Vec<String> = build_queue(&catalog(), &checkpoint, None)
            .iter()
            .map(QueueItem::key)
            .collect();
        assert_eq!(keys, ["TX1_2022", "TX2_2022"]);
    }

    #[test]
    fn limit_caps_queue() {
        assert_eq!(
            build_queue(&catalog(), &MemoryCheckpoint::default(), Some(3)).len(),
            3
        );
    }
}

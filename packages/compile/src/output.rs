//! Writing the compiled artifacts.

use std::path::{Path, PathBuf};

use ccr_map_stage::StageError;
use ccr_map_stage::persist::{save_json_atomic, write_atomic};

use crate::CompileError;
use crate::dataset::CompiledDataset;

/// Where the artifacts for one output base go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    /// `<base>_map.json`.
    pub map: PathBuf,
    /// `<base>_details.json`.
    pub details: PathBuf,
    /// `<base>_debug.json`.
    pub debug: PathBuf,
}

impl ArtifactPaths {
    /// Derives the paths from `output`. A trailing `.json` is dropped, so
    /// `dashboard_data` and `dashboard_data.json` are equivalent.
    #[must_use]
    pub fn for_output(output: &Path) -> Self {
        let base = if output
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
        {
            output.with_extension("")
        } else {
            output.to_path_buf()
        };
        let with_suffix = |suffix: &str| {
            let mut name = base.file_name().unwrap_or_default().to_os_string();
            name.push(suffix);
            base.with_file_name(name)
        };
        Self {
            map: with_suffix("_map.json"),
            details: with_suffix("_details.json"),
            debug: with_suffix("_debug.json"),
        }
    }
}

/// Byte sizes of the written artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArtifactSizes {
    /// Map artifact size.
    pub map: u64,
    /// Detail artifact size.
    pub details: u64,
}

/// Writes the map and detail artifacts as compact JSON and the debug
/// report as pretty JSON.
///
/// # Errors
///
/// Returns [`CompileError`] if serialization or writing fails.
pub fn write_artifacts(
    paths: &ArtifactPaths,
    dataset: &CompiledDataset,
) -> Result<ArtifactSizes, CompileError> {
    let map = serde_json::to_vec(&dataset.map)?;
    write_atomic(&paths.map, &map)?;
    log::info!("Wrote {}", paths.map.display());

    let details = serde_json::to_vec(&dataset.details)?;
    write_atomic(&paths.details, &details)?;
    log::info!("Wrote {}", paths.details.display());

    save_json_atomic(&paths.debug, &dataset.debug_report(), true)?;

    Ok(ArtifactSizes {
        map: file_size(&paths.map)?,
        details: file_size(&paths.details)?,
    })
}

fn file_size(path: &Path) -> Result<u64, StageError> {
    std::fs::metadata(path)
        .map(|m| m.len())
        .map_err(|e| StageError::io(path, e))
}

//! Download folder naming.

use std::path::{Path, PathBuf};

use ccr_map_water_models::CatalogEntry;

const MAX_NAME_LEN: usize = 50;

/// Makes a system name safe for use in a folder name.
///
/// Characters illegal on common filesystems become `_`, runs of whitespace
/// and underscores collapse to a single `_`, leading and trailing `_` or
/// spaces are trimmed, and the result is truncated to 50 characters.
#[must_use]
pub fn sanitize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_run = false;

    for c in name.chars() {
        let c = if matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*') {
            '_'
        } else {
            c
        };
        if c == '_' || c.is_whitespace() {
            if !in_run {
                out.push('_');
            }
            in_run = true;
        } else {
            out.push(c);
            in_run = false;
        }
    }

    out.trim_matches(|c| c == '_' || c == ' ')
        .chars()
        .take(MAX_NAME_LEN)
        .collect()
}

/// Folder a system's reports are saved under: `<WSNO>_<sanitized name>`,
/// or just the wsno when the name is empty.
#[must_use]
pub fn system_folder_name(entry: &CatalogEntry) -> String {
    let name = sanitize_name(&entry.name);
    if name.is_empty() {
        entry.wsno.clone()
    } else {
        format!("{}_{name}", entry.wsno)
    }
}

/// Where a system's report for `year` is saved.
#[must_use]
pub fn report_path(downloads_dir: &Path, entry: &CatalogEntry, year: u16) -> PathBuf {
    downloads_dir
        .join(system_folder_name(entry))
        .join(format!("{}.doc", ccr_map_water_models::report_key(&entry.wsno, year)))
}

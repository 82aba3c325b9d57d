//! JSON file persistence.
//!
//! Stage outputs are plain JSON files. Writes go through
//! [`save_json_atomic`] (write to `.tmp`, then rename) so an interrupted run
//! never leaves a half-written checkpoint or index behind.

use std::io::Write as _;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::StageError;

/// Reads and parses a JSON file. Returns `Ok(None)` if the file does not
/// exist.
///
/// # Errors
///
/// Returns [`StageError`] if the file exists but cannot be read or parsed.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StageError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StageError::io(path, e)),
    };
    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|source| StageError::Json {
            path: path.to_path_buf(),
            source,
        })
}

/// Serializes `value` and atomically replaces `path` with it.
///
/// Parent directories are created as needed.
///
/// # Errors
///
/// Returns [`StageError`] if serialization or any file operation fails.
pub fn save_json_atomic<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
    pretty: bool,
) -> Result<(), StageError> {
    let contents = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|source| StageError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    write_atomic(path, contents.as_bytes())
}

/// Atomically replaces `path` with `bytes`.
///
/// # Errors
///
/// Returns [`StageError`] if any file operation fails.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StageError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| StageError::io(parent, e))?;
    }

    let tmp_path = tmp_path_for(path);
    std::fs::write(&tmp_path, bytes).map_err(|e| StageError::io(&tmp_path, e))?;
    std::fs::rename(&tmp_path, path).map_err(|e| StageError::io(path, e))?;
    Ok(())
}

/// Appends a timestamped ` | `-separated line to a plain-text failure log.
///
/// # Errors
///
/// Returns [`StageError`] if the log cannot be opened or written.
pub fn append_failure_line(path: &Path, fields: &[&str]) -> Result<(), StageError> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| StageError::io(path, e))?;

    let timestamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S");
    writeln!(file, "{timestamp} | {}", fields.join(" | ")).map_err(|e| StageError::io(path, e))
}

/// Reads the second column of every line in a failure log written by
/// [`append_failure_line`]. Missing logs yield an empty list.
///
/// # Errors
///
/// Returns [`StageError`] if the log exists but cannot be read.
pub fn read_failure_items(path: &Path) -> Result<Vec<String>, StageError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StageError::io(path, e)),
    };

    Ok(contents
        .lines()
        .filter_map(|line| line.split('|').nth(1))
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect())
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let loaded: Option<BTreeMap<String, u32>> =
            load_json(&dir.path().join("absent.json")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn atomic_save_leaves_no_tmp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/state.json");
        let value = BTreeMap::from([("a".to_string(), 1_u32)]);

        save_json_atomic(&path, &value, false).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), r#"{"a":1}"#);
        assert!(!dir.path().join("nested/state.json.tmp").exists());
        let loaded: Option<BTreeMap<String, u32>> = load_json(&path).unwrap();
        assert_eq!(loaded, Some(value));
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        let loaded: Result<Option<BTreeMap<String, u32>>, _> = load_json(&path);
        assert!(matches!(loaded, Err(StageError::Json { .. })));
    }

    #[test]
    fn failure_log_round_trips_items() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("failed.log");
        append_failure_line(&path, &["TX1_2023.doc", "Timeout"]).unwrap();
        append_failure_line(&path, &["TX2_2022.doc", "exit status 1"]).unwrap();

        assert_eq!(
            read_failure_items(&path).unwrap(),
            vec!["TX1_2023.doc".to_string(), "TX2_2022.doc".to_string()]
        );
    }
}

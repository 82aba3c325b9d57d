//! Report file discovery under the downloads directory.

use std::path::{Path, PathBuf};

use ccr_map_water_models::parse_report_key;

/// A file named `<WSNO>_<year>.<extension>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportFile {
    /// Owning system.
    pub wsno: String,
    /// Report year.
    pub year: u16,
    /// Path to the file.
    pub path: PathBuf,
}

/// Walks `root` for report files with the given extension (compared
/// case-insensitively), newest year first and then by path.
///
/// Directories ending in `_files` (converter artefacts) and hidden
/// directories are not descended into. Files whose stems do not parse as
/// report keys are ignored.
///
/// # Errors
///
/// Returns an I/O error if `root` or a subdirectory cannot be read.
pub fn find_report_files(root: &Path, extension: &str) -> std::io::Result<Vec<ReportFile>> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();

            if entry.file_type()?.is_dir() {
                if !name.starts_with('.') && !name.ends_with("_files") {
                    pending.push(path);
                }
                continue;
            }

            let matches_extension = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
            if !matches_extension {
                continue;
            }
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            if let Some((wsno, year)) = parse_report_key(&stem) {
                files.push(ReportFile { wsno, year, path });
            }
        }
    }

    files.sort_by(|a, b| b.year.cmp(&a.year).then_with(|| a.path.cmp(&b.path)));
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_documents_and_skips_artifact_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        for rel in [
            "TX1_ALPHA/TX1_2022.doc",
            "TX1_ALPHA/TX1_2023.DOC",
            "TX2_BETA/TX2_2023.doc",
            "TX2_BETA/TX2_2023_files/TX9_2023.doc",
            ".hidden/TX3_2023.doc",
            "TX2_BETA/notes.doc",
            "TX2_BETA/TX2_2023.html",
        ] {
            let path = root.join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, b"x").unwrap();
        }

        let found: Vec<(String, u16)> = find_report_files(root, "doc")
            .unwrap()
            .into_iter()
            .map(|f| (f.wsno, f.year))
            .collect();
        assert_eq!(
            found,
            [
                ("TX1".to_string(), 2023),
                ("TX2".to_string(), 2023),
                ("TX1".to_string(), 2022),
            ]
        );

        let html = find_report_files(root, "html").unwrap();
        assert_eq!(html.len(), 1);
        assert_eq!(html[0].wsno, "TX2");
    }
}

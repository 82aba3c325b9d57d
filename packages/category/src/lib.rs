#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Contaminant name to category mapping.
//!
//! The mapping is loaded once from TOML (`[[contaminant]]` entries with a
//! `name`, a `category` and optional `aliases`) and never mutated. The
//! default configuration is baked into the binary at compile time via
//! [`include_str!`].
//!
//! Lookups are exact after case folding and whitespace collapsing. There is
//! no fuzzy or partial matching: a name that is not listed (as a name or an
//! alias) maps to [`UNCATEGORIZED`] and shows up in [`CategoryMapper::audit`].

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Category label for names with no mapping entry.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// The configuration embedded at compile time.
const DEFAULT_CONFIG: &str = include_str!("../config/categories.toml");

/// Errors loading a category configuration. All are fatal at load.
#[derive(Debug, thiserror::Error)]
pub enum CategoryConfigError {
    /// The configuration file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// The file involved.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },

    /// The configuration is not valid TOML for the expected shape.
    #[error("invalid category config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A name or alias was declared more than once.
    #[error("'{key}' is declared by both '{first}' and '{second}'")]
    Duplicate {
        /// The normalized key.
        key: String,
        /// The entry that declared it first.
        first: String,
        /// The entry that declared it again.
        second: String,
    },

    /// An entry has a blank name or category.
    #[error("entry {index} has an empty {field}")]
    Empty {
        /// Position of the entry in the file.
        index: usize,
        /// Which field was blank.
        field: &'static str,
    },
}

/// One `[[contaminant]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ContaminantEntry {
    /// Canonical contaminant name.
    pub name: String,
    /// Category label.
    pub category: String,
    /// Other spellings that map to the same entry.
    #[serde(default)]
    pub aliases: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct CategoryFile {
    #[serde(default)]
    contaminant: Vec<ContaminantEntry>,
}

/// An observed contaminant name with no mapping entry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct MappingGap {
    /// The name as observed.
    pub name: String,
}

impl std::fmt::Display for MappingGap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unmapped contaminant '{}'", self.name)
    }
}

/// Folds case and collapses whitespace so lookups ignore both.
#[must_use]
pub fn normalize_key(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Immutable name/alias to category lookup.
#[derive(Debug, Clone)]
pub struct CategoryMapper {
    entries: Vec<ContaminantEntry>,
    /// Normalized name or alias to index into `entries`.
    lookup: BTreeMap<String, usize>,
}

impl CategoryMapper {
    /// Loads the configuration embedded in the binary.
    ///
    /// # Errors
    ///
    /// Returns [`CategoryConfigError`] if the embedded TOML is invalid.
    pub fn embedded() -> Result<Self, CategoryConfigError> {
        Self::from_toml_str(DEFAULT_CONFIG)
    }

    /// Loads a configuration file from disk.
    ///
    /// # Errors
    ///
    /// Returns [`CategoryConfigError`] if the file cannot be read, is not
    /// valid TOML, or declares a key twice.
    pub fn from_path(path: &Path) -> Result<Self, CategoryConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| CategoryConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Loads `--categories <path>` when given, otherwise the embedded
    /// configuration.
    ///
    /// # Errors
    ///
    /// See [`Self::from_path`].
    pub fn load(path: Option<&Path>) -> Result<Self, CategoryConfigError> {
        path.map_or_else(Self::embedded, Self::from_path)
    }

    /// Parses a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`CategoryConfigError`] if the TOML is invalid, an entry is
    /// blank, or a name or alias is declared more than once.
    pub fn from_toml_str(text: &str) -> Result<Self, CategoryConfigError> {
        let file: CategoryFile = toml::from_str(text)?;
        Self::from_entries(file.contaminant)
    }

    /// Builds the lookup from entries.
    ///
    /// # Errors
    ///
    /// Returns [`CategoryConfigError::Duplicate`] if two keys normalize to
    /// the same string, or [`CategoryConfigError::Empty`] for blank fields.
    pub fn from_entries(entries: Vec<ContaminantEntry>) -> Result<Self, CategoryConfigError> {
        let mut lookup = BTreeMap::new();

        for (index, entry) in entries.iter().enumerate() {
            if entry.name.trim().is_empty() {
                return Err(CategoryConfigError::Empty {
                    index,
                    field: "name",
                });
            }
            if entry.category.trim().is_empty() {
                return Err(CategoryConfigError::Empty {
                    index,
                    field: "category",
                });
            }

            for key in std::iter::once(&entry.name).chain(&entry.aliases) {
                let key = normalize_key(key);
                if let Some(&first) = lookup.get(&key) {
                    let first: &ContaminantEntry = &entries[first];
                    return Err(CategoryConfigError::Duplicate {
                        key,
                        first: first.name.clone(),
                        second: entry.name.clone(),
                    });
                }
                lookup.insert(key, index);
            }
        }

        log::debug!(
            "Loaded {} contaminant entries ({} keys)",
            entries.len(),
            lookup.len()
        );

        Ok(Self { entries, lookup })
    }

    fn entry(&self, name: &str) -> Option<&ContaminantEntry> {
        self.lookup
            .get(&normalize_key(name))
            .map(|&index| &self.entries[index])
    }

    /// The category for `name`, or [`UNCATEGORIZED`].
    #[must_use]
    pub fn category(&self, name: &str) -> &str {
        self.entry(name)
            .map_or(UNCATEGORIZED, |entry| entry.category.as_str())
    }

    /// Whether `name` matches an entry.
    #[must_use]
    pub fn is_mapped(&self, name: &str) -> bool {
        self.entry(name).is_some()
    }

    /// Every category label, sorted.
    #[must_use]
    pub fn labels(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|entry| entry.category.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// The configured entries in file order.
    #[must_use]
    pub fn entries(&self) -> &[ContaminantEntry] {
        &self.entries
    }

    /// Returns the observed names with no mapping, sorted and
    /// de-duplicated.
    pub fn audit<I, S>(&self, observed: I) -> Vec<MappingGap>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        observed
            .into_iter()
            .filter(|name| !self.is_mapped(name.as_ref()))
            .map(|name| name.as_ref().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(|name| MappingGap { name })
            .collect()
    }

    /// Groups the mapped observed names by category.
    pub fn group_by_category<I, S>(&self, observed: I) -> BTreeMap<String, BTreeSet<String>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut groups: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for name in observed {
            let name = name.as_ref();
            if let Some(entry) = self.entry(name) {
                groups
                    .entry(entry.category.clone())
                    .or_default()
                    .insert(name.to_string());
            }
        }
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[[contaminant]]
name = "Barium"
category = "Inorganic Contaminants"

[[contaminant]]
name = "Nitrate"
category = "Inorganic Contaminants"
aliases = ["Nitrate [measured as Nitrogen]"]

[[contaminant]]
name = "Lead"
category = "Lead and Copper"
"#;

    #[test]
    fn embedded_config_loads() {
        let mapper = CategoryMapper::embedded().unwrap();
        assert!(!mapper.entries().is_empty());
        assert_eq!(mapper.category("Barium"), "Inorganic Contaminants");
        assert_eq!(mapper.category("Copper"), "Lead and Copper");
    }

    #[test]
    fn embedded_entries_have_categories() {
        let mapper = CategoryMapper::embedded().unwrap();
        for entry in mapper.entries() {
            assert!(!entry.category.is_empty(), "{} has no category", entry.name);
        }
    }

    #[test]
    fn matches_ignoring_case_and_whitespace() {
        let mapper = CategoryMapper::from_toml_str(SAMPLE).unwrap();
        assert_eq!(mapper.category("  BARIUM "), "Inorganic Contaminants");
        assert_eq!(
            mapper.category("Nitrate   [measured\nas Nitrogen]"),
            "Inorganic Contaminants"
        );
        assert!(mapper.is_mapped("nitrate [measured as nitrogen]"));
    }

    #[test]
    fn does_not_match_partially() {
        let mapper = CategoryMapper::from_toml_str(SAMPLE).unwrap();
        assert_eq!(mapper.category("Barium Sulfate"), UNCATEGORIZED);
        assert_eq!(mapper.category("Lea"), UNCATEGORIZED);
    }

    #[test]
    fn rejects_duplicate_keys_across_names_and_aliases() {
        let toml = r#"
[[contaminant]]
name = "Nitrate"
category = "Inorganic Contaminants"

[[contaminant]]
name = "Nitrate-Nitrogen"
category = "Other"
aliases = ["NITRATE"]
"#;
        let err = CategoryMapper::from_toml_str(toml).unwrap_err();
        match err {
            CategoryConfigError::Duplicate { key, first, second } => {
                assert_eq!(key, "nitrate");
                assert_eq!(first, "Nitrate");
                assert_eq!(second, "Nitrate-Nitrogen");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_blank_category() {
        let toml = r#"
[[contaminant]]
name = "Barium"
category = " "
"#;
        assert!(matches!(
            CategoryMapper::from_toml_str(toml),
            Err(CategoryConfigError::Empty {
                index: 0,
                field: "category"
            })
        ));
    }

    #[test]
    fn audit_returns_exactly_the_unmapped_names() {
        let mapper = CategoryMapper::from_toml_str(SAMPLE).unwrap();
        let observed = ["Barium", "Unobtainium", "lead", "Unobtainium", "Kryptonite"];
        let gaps = mapper.audit(observed);
        assert_eq!(
            gaps,
            vec![
                MappingGap {
                    name: "Kryptonite".to_string()
                },
                MappingGap {
                    name: "Unobtainium".to_string()
                },
            ]
        );
        assert_eq!(mapper.category("Unobtainium"), UNCATEGORIZED);
    }

    #[test]
    fn labels_are_sorted_and_unique() {
        let mapper = CategoryMapper::from_toml_str(SAMPLE).unwrap();
        assert_eq!(
            mapper.labels(),
            vec!["Inorganic Contaminants", "Lead and Copper"]
        );
    }

    #[test]
    fn groups_mapped_names_by_category() {
        let mapper = CategoryMapper::from_toml_str(SAMPLE).unwrap();
        let groups = mapper.group_by_category(["Barium", "Lead", "Mystery"]);
        assert_eq!(groups.len(), 2);
        assert!(groups["Inorganic Contaminants"].contains("Barium"));
        assert!(groups["Lead and Copper"].contains("Lead"));
    }

    #[test]
    fn load_reads_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("categories.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        let mapper = CategoryMapper::load(Some(&path)).unwrap();
        assert_eq!(mapper.entries().len(), 3);
        assert!(matches!(
            CategoryMapper::load(Some(&dir.path().join("missing.toml"))),
            Err(CategoryConfigError::Io { .. })
        ));
    }
}

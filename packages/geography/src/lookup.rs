//! Bidirectional code ↔ name lookup tables, one per geography level.
//!
//! Each table is stored on disk as a flat JSON object mapping codes to
//! lowercase names (`{"0655254": "palm springs, ca"}`), as written by
//! [`crate::generate::GeneratedTables::write`].

use std::collections::BTreeMap;
use std::path::Path;

use lowe_geography_models::GeoLevel;

use crate::GeographyError;

/// File name of a level's table inside a lookup-table directory.
#[must_use]
pub const fn file_name(level: GeoLevel) -> &'static str {
    match level {
        GeoLevel::State => "states.json",
        GeoLevel::Msa => "msas.json",
        GeoLevel::County => "counties.json",
        GeoLevel::City => "cities.json",
    }
}

/// Immutable one-to-one mapping between codes and names for one level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupTable {
    level: GeoLevel,
    by_code: BTreeMap<String, String>,
    by_name: BTreeMap<String, String>,
}

impl LookupTable {
    /// Builds a table from `(code, name)` pairs. Names are lowercased.
    ///
    /// # Errors
    ///
    /// Returns [`GeographyError::DuplicateCode`] or
    /// [`GeographyError::DuplicateName`] if the pairs are not one-to-one.
    pub fn from_pairs<I, C, N>(level: GeoLevel, pairs: I) -> Result<Self, GeographyError>
    where
        I: IntoIterator<Item = (C, N)>,
        C: Into<String>,
        N: AsRef<str>,
    {
        let mut by_code = BTreeMap::new();
        let mut by_name = BTreeMap::new();

        for (code, name) in pairs {
            let code: String = code.into();
            let name = name.as_ref().trim().to_lowercase();

            if by_name.insert(name.clone(), code.clone()).is_some() {
                return Err(GeographyError::DuplicateName { level, name });
            }
            if by_code.insert(code.clone(), name).is_some() {
                return Err(GeographyError::DuplicateCode { level, code });
            }
        }

        Ok(Self {
            level,
            by_code,
            by_name,
        })
    }

    /// Parses a table from its JSON representation.
    ///
    /// # Errors
    ///
    /// Returns [`GeographyError`] if the JSON is not a flat string map or
    /// the mapping is not one-to-one.
    pub fn from_json_str(level: GeoLevel, json: &str) -> Result<Self, GeographyError> {
        let raw: BTreeMap<String, String> = serde_json::from_str(json)?;
        Self::from_pairs(level, raw)
    }

    /// Loads `level`'s table from `dir` (see [`file_name`]).
    ///
    /// # Errors
    ///
    /// Returns [`GeographyError`] if the file cannot be read or parsed.
    pub fn load(dir: &Path, level: GeoLevel) -> Result<Self, GeographyError> {
        let path = dir.join(file_name(level));
        log::debug!("Loading {level} lookup table from {}", path.display());
        let json = std::fs::read_to_string(&path)?;
        Self::from_json_str(level, &json)
    }

    /// Writes the table as pretty-printed JSON into `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`GeographyError`] if serialization or the write fails.
    pub fn save(&self, dir: &Path) -> Result<(), GeographyError> {
        let path = dir.join(file_name(self.level));
        let json = serde_json::to_string_pretty(&self.by_code)?;
        std::fs::write(&path, json + "\n")?;
        log::info!(
            "Wrote {} {} entries to {}",
            self.by_code.len(),
            self.level,
            path.display()
        );
        Ok(())
    }

    /// Level this table belongs to.
    #[must_use]
    pub const fn level(&self) -> GeoLevel {
        self.level
    }

    /// Name for `code`, if present.
    #[must_use]
    pub fn name(&self, code: &str) -> Option<&str> {
        self.by_code.get(code).map(String::as_str)
    }

    /// Code for the exact lowercase `name`, if present.
    #[must_use]
    pub fn code(&self, name: &str) -> Option<&str> {
        self.by_name.get(name).map(String::as_str)
    }

    /// Iterates `(code, name)` pairs in code order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.by_code
            .iter()
            .map(|(code, name)| (code.as_str(), name.as_str()))
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    /// Whether the table has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn testdata() -> &'static Path {
        Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/testdata"))
    }

    #[test]
    fn sample_tables_parse() {
        for level in GeoLevel::ALL {
            let table = LookupTable::load(testdata(), level).unwrap();
            assert!(!table.is_empty(), "empty sample {level} table");
            assert_eq!(table.level(), level);
        }
    }

    #[test]
    fn missing_table_file_is_an_io_error() {
        let err = LookupTable::load(Path::new("/nonexistent/lowe-geo"), GeoLevel::Msa).unwrap_err();
        assert!(matches!(err, GeographyError::Io(_)));
    }

    #[test]
    fn lookups_work_both_ways() {
        let table = LookupTable::load(testdata(), GeoLevel::City).unwrap();
        assert_eq!(table.name("0655254"), Some("palm springs, ca"));
        assert_eq!(table.code("palm springs, ca"), Some("0655254"));
        assert_eq!(table.code("Palm Springs, CA"), None);
    }

    #[test]
    fn rejects_duplicate_names() {
        let err = LookupTable::from_pairs(GeoLevel::Msa, [("1", "a"), ("2", "A")]).unwrap_err();
        assert!(matches!(err, GeographyError::DuplicateName { .. }));
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = std::env::temp_dir().join("lowe_lookup_table_roundtrip");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();

        let table =
            LookupTable::from_pairs(GeoLevel::County, [("06_065", "Riverside County, CA")])
                .unwrap();
        table.save(&dir).unwrap();

        let loaded = LookupTable::load(&dir, GeoLevel::County).unwrap();
        assert_eq!(loaded, table);
        assert_eq!(loaded.name("06_065"), Some("riverside county, ca"));

        let _ = std::fs::remove_dir_all(&dir);
    }
}

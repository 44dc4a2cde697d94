//! One-time generation of the lookup tables from Census reference files.
//!
//! Inputs are the CBSA delineation file (one row per county, with its
//! metropolitan area) and the place gazetteer (one row per place). The
//! output satisfies the resolver's invariant that every code maps to
//! exactly one name and vice versa within a level:
//!
//! * state codes are padded to 2 digits and named by their lowercase
//!   postal abbreviation;
//! * county keys are `SS_CCC` and names get a `", xx"` state suffix;
//! * place names lose their trailing place type (`"city"`, `"CDP"`),
//!   get a `", xx"` suffix, and GEOIDs are padded to 7 digits;
//! * duplicate codes or names are dropped, first occurrence wins.

use std::collections::BTreeSet;
use std::io::Read;
use std::path::Path;

use lowe_geography_models::fips::{pad_state_code, state_abbr, state_codes};
use lowe_geography_models::{CITY_CODE_WIDTH, COUNTY_SEPARATOR, GeoLevel};
use serde::Deserialize;

use crate::{GeographyError, LookupTable, Resolver};

/// One county row of the CBSA delineation file.
#[derive(Debug, Deserialize)]
struct CbsaRow {
    #[serde(rename = "CBSA Code")]
    cbsa_code: String,
    #[serde(rename = "CBSA Title")]
    cbsa_title: String,
    #[serde(rename = "County/County Equivalent")]
    county_name: String,
    #[serde(rename = "FIPS State Code")]
    state_code: String,
    #[serde(rename = "FIPS County Code")]
    county_code: String,
}

/// One row of the place gazetteer.
#[derive(Debug, Deserialize)]
struct PlaceRow {
    #[serde(rename = "GEOID")]
    geoid: String,
    #[serde(rename = "USPS")]
    usps: String,
    #[serde(rename = "NAME")]
    name: String,
}

/// The four generated tables.
#[derive(Debug, Clone)]
pub struct GeneratedTables {
    /// State code → lowercase abbreviation.
    pub states: LookupTable,
    /// CBSA code → lowercase title.
    pub msas: LookupTable,
    /// `SS_CCC` → `"name county, xx"`.
    pub counties: LookupTable,
    /// 7-digit GEOID → `"name, xx"`.
    pub cities: LookupTable,
}

impl GeneratedTables {
    /// Generates the tables from the two reference files on disk.
    ///
    /// Tab-separated gazetteer files (`.txt`) are detected by extension.
    ///
    /// # Errors
    ///
    /// Returns [`GeographyError`] if a file cannot be read or has no
    /// usable header.
    pub fn from_files(cbsa_csv: &Path, places: &Path) -> Result<Self, GeographyError> {
        let places_delimiter = if places.extension().is_some_and(|ext| ext == "txt") {
            b'\t'
        } else {
            b','
        };
        Self::from_readers(
            std::fs::File::open(cbsa_csv)?,
            std::fs::File::open(places)?,
            places_delimiter,
        )
    }

    /// Generates the tables from CSV readers.
    ///
    /// Rows that fail to deserialize (such as the notes footer of the
    /// delineation file) are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`GeographyError`] if a reader's header cannot be read.
    pub fn from_readers(
        cbsa_csv: impl Read,
        places: impl Read,
        places_delimiter: u8,
    ) -> Result<Self, GeographyError> {
        let mut msas = Dedup::default();
        let mut counties = Dedup::default();

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(cbsa_csv);
        reader.headers()?;
        for row in reader.deserialize::<CbsaRow>() {
            let row = match row {
                Ok(row) => row,
                Err(e) => {
                    log::debug!("Skipping CBSA row: {e}");
                    continue;
                }
            };

            msas.push(GeoLevel::Msa, row.cbsa_code.clone(), &row.cbsa_title);

            let state = pad_state_code(&row.state_code);
            let Some(abbr) = state_abbr(&state) else {
                log::warn!(
                    "Skipping county '{}': unknown state code '{}'",
                    row.county_name,
                    row.state_code
                );
                continue;
            };
            let county = format!(
                "{state}{COUNTY_SEPARATOR}{:0>3}",
                row.county_code.trim()
            );
            counties.push(
                GeoLevel::County,
                county,
                &format!("{}, {}", row.county_name, abbr.to_lowercase()),
            );
        }

        let mut cities = Dedup::default();
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .delimiter(places_delimiter)
            .from_reader(places);
        reader.headers()?;
        for row in reader.deserialize::<PlaceRow>() {
            let row = match row {
                Ok(row) => row,
                Err(e) => {
                    log::debug!("Skipping place row: {e}");
                    continue;
                }
            };
            let name = strip_place_type(&row.name);
            cities.push(
                GeoLevel::City,
                format!("{:0>CITY_CODE_WIDTH$}", row.geoid),
                &format!("{name}, {}", row.usps.to_lowercase()),
            );
        }

        let states = LookupTable::from_pairs(
            GeoLevel::State,
            state_codes().filter_map(|code| state_abbr(code).map(|abbr| (code, abbr))),
        )?;

        let tables = Self {
            states,
            msas: msas.into_table(GeoLevel::Msa)?,
            counties: counties.into_table(GeoLevel::County)?,
            cities: cities.into_table(GeoLevel::City)?,
        };

        log::info!(
            "Generated lookup tables: {} states, {} msas, {} counties, {} cities",
            tables.states.len(),
            tables.msas.len(),
            tables.counties.len(),
            tables.cities.len()
        );

        Ok(tables)
    }

    /// Writes all four tables into `dir`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`GeographyError`] if a write fails.
    pub fn write(&self, dir: &Path) -> Result<(), GeographyError> {
        std::fs::create_dir_all(dir)?;
        for table in [&self.states, &self.msas, &self.counties, &self.cities] {
            table.save(dir)?;
        }
        Ok(())
    }

    /// Builds a resolver over the generated tables.
    #[must_use]
    pub fn into_resolver(self) -> Resolver {
        Resolver::from_tables(self.states, self.msas, self.counties, self.cities)
    }
}

/// Drops the trailing place-type word (`"Palm Springs city"` →
/// `"Palm Springs"`). Single-word names are kept as they are.
fn strip_place_type(name: &str) -> &str {
    name.trim()
        .rsplit_once(' ')
        .map_or_else(|| name.trim(), |(base, _)| base.trim_end())
}

/// Accumulates `(code, name)` pairs, keeping the first occurrence of each
/// code and each name.
#[derive(Default)]
struct Dedup {
    pairs: Vec<(String, String)>,
    codes: BTreeSet<String>,
    names: BTreeSet<String>,
}

impl Dedup {
    fn push(&mut self, level: GeoLevel, code: String, name: &str) {
        let name = name.trim().to_lowercase();
        if self.codes.contains(&code) {
            return;
        }
        if self.names.contains(&name) {
            log::debug!("Dropping duplicate {level} name '{name}' (code {code})");
            return;
        }
        self.codes.insert(code.clone());
        self.names.insert(name.clone());
        self.pairs.push((code, name));
    }

    fn into_table(self, level: GeoLevel) -> Result<LookupTable, GeographyError> {
        LookupTable::from_pairs(level, self.pairs)
    }
}

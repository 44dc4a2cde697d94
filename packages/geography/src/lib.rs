#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geographic name ↔ code resolution.
//!
//! Translates location descriptors between lowercase place names and
//! Census codes at four nested levels (state, MSA, county, place). The
//! lookup tables are JSON documents built by [`generate`] from the Census
//! reference files and loaded once from a directory
//! ([`Resolver::from_dir`], or `LOWE_GEO_DIR` via [`Resolver::from_env`]).

pub mod generate;
pub mod lookup;
pub mod resolver;

pub use lookup::LookupTable;
pub use resolver::{Resolver, SEARCH_DISPLAY_LIMIT, SearchField, TABLES_DIR_ENV};

use lowe_geography_models::GeoLevel;
use thiserror::Error;

/// Errors that can occur during geography operations.
#[derive(Debug, Error)]
pub enum GeographyError {
    /// A code is not present in its level's lookup table.
    #[error("Unknown {level} code '{code}'")]
    UnknownCode {
        /// Level the code was looked up in.
        level: GeoLevel,
        /// The code as looked up (after any prefix reconstruction).
        code: String,
    },

    /// A name is not present in its level's lookup table.
    #[error("Unknown {level} name '{name}'")]
    UnknownName {
        /// Level the name was looked up in.
        level: GeoLevel,
        /// The name as looked up.
        name: String,
    },

    /// A bare county code was given without a state to qualify it.
    #[error(
        "County code '{county}' is ambiguous without a state; pass it as \
         [state]_[county] or include the state"
    )]
    AmbiguousCounty {
        /// The bare county code.
        county: String,
    },

    /// A short-form place code was given without a state to qualify it.
    #[error(
        "City code '{city}' is ambiguous without a state; pass the 7-digit \
         code or include the state"
    )]
    AmbiguousCity {
        /// The short place code.
        city: String,
    },

    /// A state prefix embedded in a long-form code disagrees with the
    /// descriptor's explicit state.
    #[error("{level} code '{code}' does not belong to state '{state}'")]
    ConflictingState {
        /// Level of the long-form code.
        level: GeoLevel,
        /// The long-form code.
        code: String,
        /// The explicit state code.
        state: String,
    },

    /// A lookup table maps two names to the same code.
    #[error("Duplicate {level} code '{code}' in lookup table")]
    DuplicateCode {
        /// Table level.
        level: GeoLevel,
        /// The repeated code.
        code: String,
    },

    /// A lookup table maps two codes to the same name.
    #[error("Duplicate {level} name '{name}' in lookup table")]
    DuplicateName {
        /// Table level.
        level: GeoLevel,
        /// The repeated name.
        name: String,
    },

    /// No lookup-table directory was given.
    #[error(
        "No geography lookup tables configured: generate them with \
         `lowe geo generate` and point {var} (or --tables) at the output"
    )]
    TablesNotConfigured {
        /// Environment variable that names the directory.
        var: &'static str,
    },

    /// JSON parsing failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error (table file read/write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing failed while generating tables.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

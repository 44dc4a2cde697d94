#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! American Community Survey table types.
//!
//! These types describe what is requested from the ACS API (variable
//! groups, table kinds, estimate windows), how opaque series ids are
//! decoded (variable dictionaries), and the tables the fan-out client
//! returns.

pub mod table;
pub mod variable;

pub use table::{JoinError, ResultRow, Table, TableRow};
pub use variable::{ConceptLabel, VariableDictionary, VariableGroup};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The family of ACS tables a variable group belongs to.
///
/// Selects the endpoint suffix, the variable dictionary and the shape of
/// the `get` clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    /// Detailed tables (`B…`).
    Detail,
    /// Subject tables (`S…`).
    Subject,
    /// Data profiles (`DP…`).
    Profile,
    /// Comparison profiles (`CP…`).
    ComparisonProfile,
}

impl TableKind {
    /// Infers the kind from a table id's prefix (`B`, `S`, `DP`, `CP`,
    /// case-insensitive).
    #[must_use]
    pub fn infer(table_id: &str) -> Option<Self> {
        let id = table_id.trim().to_ascii_uppercase();
        if id.starts_with("DP") {
            Some(Self::Profile)
        } else if id.starts_with("CP") {
            Some(Self::ComparisonProfile)
        } else if id.starts_with('B') {
            Some(Self::Detail)
        } else if id.starts_with('S') {
            Some(Self::Subject)
        } else {
            None
        }
    }

    /// Path suffix appended to the survey endpoint.
    #[must_use]
    pub const fn url_suffix(self) -> &'static str {
        match self {
            Self::Detail => "",
            Self::Subject => "/subject",
            Self::Profile => "/profile",
            Self::ComparisonProfile => "/cprofile",
        }
    }

    /// File stem of this kind's variable dictionary
    /// (`{stem}_vars_{year}.json`).
    #[must_use]
    pub const fn dictionary_stem(self) -> &'static str {
        match self {
            Self::Detail => "detail",
            Self::Subject => "subject",
            Self::Profile => "dprofile",
            Self::ComparisonProfile => "cprofile",
        }
    }

    /// The `get` clause requesting `table_id`.
    ///
    /// Detailed tables are requested by the bare id followed by a
    /// separator; the other kinds use a `group(...)` wrapper.
    #[must_use]
    pub fn get_clause(self, table_id: &str) -> String {
        match self {
            Self::Detail => format!("{table_id},"),
            Self::Subject | Self::Profile | Self::ComparisonProfile => {
                format!("group({table_id})")
            }
        }
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dictionary_stem())
    }
}

/// Error returned when a string does not name a [`TableKind`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown table kind '{0}' (expected detail, subject, dprofile or cprofile)")]
pub struct ParseTableKindError(pub String);

impl FromStr for TableKind {
    type Err = ParseTableKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "detail" => Ok(Self::Detail),
            "subject" => Ok(Self::Subject),
            "profile" | "data profile" | "dprofile" => Ok(Self::Profile),
            "comparison profile" | "comp profile" | "cprofile" => Ok(Self::ComparisonProfile),
            _ => Err(ParseTableKindError(s.to_string())),
        }
    }
}

/// The ACS estimate window.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub enum Estimate {
    /// 1-year estimates (`acs1`).
    OneYear,
    /// 3-year estimates (`acs3`).
    ThreeYear,
    /// 5-year estimates (`acs5`).
    #[default]
    FiveYear,
}

impl Estimate {
    /// Survey path segment (`acs1`, `acs3`, `acs5`).
    #[must_use]
    pub const fn survey(self) -> &'static str {
        match self {
            Self::OneYear => "acs1",
            Self::ThreeYear => "acs3",
            Self::FiveYear => "acs5",
        }
    }

    /// Window length in years.
    #[must_use]
    pub const fn years(self) -> u8 {
        match self {
            Self::OneYear => 1,
            Self::ThreeYear => 3,
            Self::FiveYear => 5,
        }
    }
}

impl fmt::Display for Estimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.survey())
    }
}

/// Error returned when a string does not name an [`Estimate`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown estimate window '{0}' (expected 1, 3 or 5)")]
pub struct ParseEstimateError(pub String);

impl FromStr for Estimate {
    type Err = ParseEstimateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1" | "acs1" => Ok(Self::OneYear),
            "3" | "acs3" => Ok(Self::ThreeYear),
            "5" | "acs5" => Ok(Self::FiveYear),
            _ => Err(ParseEstimateError(s.to_string())),
        }
    }
}

impl TryFrom<String> for Estimate {
    type Error = ParseEstimateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Estimate> for String {
    fn from(value: Estimate) -> Self {
        value.years().to_string()
    }
}

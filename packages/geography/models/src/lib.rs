#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geographic location types shared by the resolver and the ACS client.
//!
//! A location is described at up to four nested levels: state,
//! metropolitan statistical area, county and place (city). Values are
//! either lowercase human names (`"palm springs, ca"`) or numeric codes
//! (`"0655254"`).

pub mod fips;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Width of a long-form place code (state prefix + 5-digit place code).
pub const CITY_CODE_WIDTH: usize = 7;

/// Separator between the state and county parts of a compound county code
/// (`"06_065"`).
pub const COUNTY_SEPARATOR: char = '_';

/// One of the four geography levels a location can be described at.
///
/// The declaration order is the order levels are emitted in request
/// clauses (msa, county, city after the state), so `Ord` is meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeoLevel {
    /// US state (two-digit FIPS code).
    State,
    /// Metropolitan / micropolitan statistical area (CBSA code).
    Msa,
    /// County (three-digit code, unique only within a state).
    County,
    /// Census place (five-digit code, unique only within a state).
    City,
}

impl GeoLevel {
    /// All levels in request-clause order.
    pub const ALL: [Self; 4] = [Self::State, Self::Msa, Self::County, Self::City];

    /// Lowercase key used in descriptors and lookup-table file names.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::State => "state",
            Self::Msa => "msa",
            Self::County => "county",
            Self::City => "city",
        }
    }
}

impl fmt::Display for GeoLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string does not name a [`GeoLevel`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown geography level '{0}' (expected state, msa, county or city)")]
pub struct ParseGeoLevelError(pub String);

impl FromStr for GeoLevel {
    type Err = ParseGeoLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "state" | "states" => Ok(Self::State),
            "msa" | "msas" => Ok(Self::Msa),
            "county" | "counties" => Ok(Self::County),
            "city" | "cities" | "place" | "places" => Ok(Self::City),
            _ => Err(ParseGeoLevelError(s.to_string())),
        }
    }
}

/// A location given as at most one value per [`GeoLevel`].
///
/// Values may be names or codes; the resolver decides which. The map type
/// guarantees a level appears at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationDescriptor(BTreeMap<GeoLevel, String>);

impl LocationDescriptor {
    /// Creates an empty descriptor.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Returns the descriptor with `level` set to `value`, replacing any
    /// previous value for that level.
    #[must_use]
    pub fn with(mut self, level: GeoLevel, value: impl Into<String>) -> Self {
        self.0.insert(level, value.into().trim().to_string());
        self
    }

    /// Shorthand for a state-only descriptor.
    #[must_use]
    pub fn state(value: impl Into<String>) -> Self {
        Self::new().with(GeoLevel::State, value)
    }

    /// Value at `level`, if present.
    #[must_use]
    pub fn get(&self, level: GeoLevel) -> Option<&str> {
        self.0.get(&level).map(String::as_str)
    }

    /// Whether a value is present at `level`.
    #[must_use]
    pub fn contains(&self, level: GeoLevel) -> bool {
        self.0.contains_key(&level)
    }

    /// Number of levels present.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no level is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over present levels in [`GeoLevel`] order.
    pub fn iter(&self) -> impl Iterator<Item = (GeoLevel, &str)> {
        self.0.iter().map(|(level, value)| (*level, value.as_str()))
    }
}

impl FromIterator<(GeoLevel, String)> for LocationDescriptor {
    fn from_iter<T: IntoIterator<Item = (GeoLevel, String)>>(iter: T) -> Self {
        iter.into_iter()
            .fold(Self::new(), |desc, (level, value)| desc.with(level, value))
    }
}

impl<const N: usize> From<[(GeoLevel, &str); N]> for LocationDescriptor {
    fn from(pairs: [(GeoLevel, &str); N]) -> Self {
        pairs
            .into_iter()
            .map(|(level, value)| (level, value.to_string()))
            .collect()
    }
}

impl fmt::Display for LocationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (level, value)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{level}: {value}")?;
        }
        f.write_str("}")
    }
}

/// A location reduced to short codes, ready to be placed in request
/// clauses.
///
/// `county` and `city` are the codes without their state prefix, so they
/// are only meaningful together with `state`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NormalizedLocation {
    /// Two-digit state code.
    pub state: Option<String>,
    /// CBSA code.
    pub msa: Option<String>,
    /// Three-digit county code (no state prefix).
    pub county: Option<String>,
    /// Five-digit place code (no state prefix).
    pub city: Option<String>,
}

impl NormalizedLocation {
    /// Code at `level`, if present.
    #[must_use]
    pub fn get(&self, level: GeoLevel) -> Option<&str> {
        match level {
            GeoLevel::State => self.state.as_deref(),
            GeoLevel::Msa => self.msa.as_deref(),
            GeoLevel::County => self.county.as_deref(),
            GeoLevel::City => self.city.as_deref(),
        }
    }

    /// Present non-state levels with their codes, in clause order.
    pub fn sub_state_levels(&self) -> impl Iterator<Item = (GeoLevel, &str)> {
        [GeoLevel::Msa, GeoLevel::County, GeoLevel::City]
            .into_iter()
            .filter_map(|level| self.get(level).map(|code| (level, code)))
    }

    /// Converts back into a code-valued descriptor (short-form codes).
    #[must_use]
    pub fn to_descriptor(&self) -> LocationDescriptor {
        GeoLevel::ALL
            .into_iter()
            .filter_map(|level| self.get(level).map(|code| (level, code.to_string())))
            .collect()
    }
}

impl fmt::Display for NormalizedLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.to_descriptor().fmt(f)
    }
}

/// Human-readable names of a location, as attached to every result row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResolvedLocation {
    /// State name (lowercase postal abbreviation, e.g. `"ca"`).
    pub state: Option<String>,
    /// MSA name, without its state suffix.
    pub msa: Option<String>,
    /// County name, without its state suffix.
    pub county: Option<String>,
    /// City name, without its state suffix.
    pub city: Option<String>,
}

impl ResolvedLocation {
    /// Builds the per-level names from a name-valued descriptor.
    ///
    /// Non-state names are cut at the first comma so the jurisdiction
    /// suffix is not repeated (`"palm springs, ca"` → `"palm springs"`).
    #[must_use]
    pub fn from_names(names: &LocationDescriptor) -> Self {
        let short = |level: GeoLevel| {
            names.get(level).map(|name| {
                let name = if level == GeoLevel::State {
                    name
                } else {
                    name.split(',').next().unwrap_or(name)
                };
                name.trim().to_lowercase()
            })
        };
        Self {
            state: short(GeoLevel::State),
            msa: short(GeoLevel::Msa),
            county: short(GeoLevel::County),
            city: short(GeoLevel::City),
        }
    }

    /// Name at `level`, if present.
    #[must_use]
    pub fn get(&self, level: GeoLevel) -> Option<&str> {
        match level {
            GeoLevel::State => self.state.as_deref(),
            GeoLevel::Msa => self.msa.as_deref(),
            GeoLevel::County => self.county.as_deref(),
            GeoLevel::City => self.city.as_deref(),
        }
    }

    /// Whether any level is present.
    #[must_use]
    pub const fn is_decomposed(&self) -> bool {
        self.state.is_some() || self.msa.is_some() || self.county.is_some() || self.city.is_some()
    }

    /// Join key for rows of different tables describing the same place:
    /// state, county, msa and city names (those present, in that order)
    /// separated by single spaces.
    #[must_use]
    pub fn location_key(&self) -> String {
        [
            self.state.as_deref(),
            self.county.as_deref(),
            self.msa.as_deref(),
            self.city.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_keeps_one_value_per_level() {
        let desc = LocationDescriptor::state("06")
            .with(GeoLevel::City, "55254")
            .with(GeoLevel::State, "04");
        assert_eq!(desc.len(), 2);
        assert_eq!(desc.get(GeoLevel::State), Some("04"));
    }

    #[test]
    fn descriptor_iterates_in_level_order() {
        let desc = LocationDescriptor::from([
            (GeoLevel::City, "55254"),
            (GeoLevel::Msa, "40140"),
            (GeoLevel::State, "06"),
        ]);
        let levels: Vec<GeoLevel> = desc.iter().map(|(level, _)| level).collect();
        assert_eq!(levels, vec![GeoLevel::State, GeoLevel::Msa, GeoLevel::City]);
        assert_eq!(desc.to_string(), "{state: 06, msa: 40140, city: 55254}");
    }

    #[test]
    fn descriptor_deserializes_from_plain_map() {
        let desc: LocationDescriptor =
            serde_json::from_str(r#"{"city": "palm springs, ca", "state": "ca"}"#).unwrap();
        assert_eq!(desc.get(GeoLevel::City), Some("palm springs, ca"));
        assert_eq!(desc.get(GeoLevel::State), Some("ca"));
    }

    #[test]
    fn parses_level_aliases() {
        assert_eq!("Counties".parse::<GeoLevel>(), Ok(GeoLevel::County));
        assert_eq!("place".parse::<GeoLevel>(), Ok(GeoLevel::City));
        assert!("tract".parse::<GeoLevel>().is_err());
    }

    #[test]
    fn location_key_orders_state_county_msa_city() {
        let names = LocationDescriptor::from([
            (GeoLevel::State, "ca"),
            (GeoLevel::Msa, "riverside-san bernardino-ontario, ca"),
            (GeoLevel::County, "riverside county, ca"),
            (GeoLevel::City, "palm springs, ca"),
        ]);
        let resolved = ResolvedLocation::from_names(&names);
        assert_eq!(resolved.city.as_deref(), Some("palm springs"));
        assert_eq!(
            resolved.location_key(),
            "ca riverside county riverside-san bernardino-ontario palm springs"
        );
    }

    #[test]
    fn empty_location_has_empty_key() {
        let resolved = ResolvedLocation::default();
        assert!(!resolved.is_decomposed());
        assert_eq!(resolved.location_key(), "");
    }

    #[test]
    fn normalized_location_lists_sub_state_levels_in_clause_order() {
        let loc = NormalizedLocation {
            state: Some("06".to_string()),
            msa: None,
            county: Some("065".to_string()),
            city: Some("55254".to_string()),
        };
        let levels: Vec<(GeoLevel, &str)> = loc.sub_state_levels().collect();
        assert_eq!(
            levels,
            vec![(GeoLevel::County, "065"), (GeoLevel::City, "55254")]
        );
    }
}

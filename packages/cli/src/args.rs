//! Parsers for the argument formats shared by several subcommands.

use std::ops::RangeInclusive;
use std::str::FromStr;

use lowe_acs_models::{TableKind, VariableGroup};
use lowe_geography_models::{GeoLevel, LocationDescriptor};

/// Parses a location such as `"city=palm springs, ca"` or
/// `"state=06;city=55254"`.
///
/// Pairs are separated by `;` because names contain commas.
///
/// # Errors
///
/// Returns a message naming the malformed pair or unknown level.
pub fn parse_location(s: &str) -> Result<LocationDescriptor, String> {
    let mut descriptor = LocationDescriptor::new();
    for pair in s.split(';').map(str::trim).filter(|pair| !pair.is_empty()) {
        let (level, value) = pair
            .split_once('=')
            .ok_or_else(|| format!("expected level=value, got '{pair}'"))?;
        let level = GeoLevel::from_str(level).map_err(|e| e.to_string())?;
        if value.trim().is_empty() {
            return Err(format!("empty value for {level}"));
        }
        if descriptor.contains(level) {
            return Err(format!("{level} given twice in '{s}'"));
        }
        descriptor = descriptor.with(level, value);
    }
    if descriptor.is_empty() {
        return Err("empty location".to_string());
    }
    Ok(descriptor)
}

/// Parses one variable group, optionally with an explicit kind:
/// `"S1701"` or `"S1701:profile"`.
///
/// # Errors
///
/// Returns a message if the id is empty or the kind is unknown.
pub fn parse_variable(s: &str) -> Result<VariableGroup, String> {
    let (id, kind) = match s.split_once(':') {
        Some((id, kind)) => (id, Some(TableKind::from_str(kind).map_err(|e| e.to_string())?)),
        None => (s, None),
    };
    let id = id.trim();
    if id.is_empty() {
        return Err(format!("empty variable id in '{s}'"));
    }
    Ok(match kind {
        Some(kind) => VariableGroup::with_kind(id, kind),
        None => VariableGroup::new(id),
    })
}

/// Parses `"2019"` or `"2015-2019"`.
///
/// # Errors
///
/// Returns a message for non-numeric or reversed ranges.
pub fn parse_years(s: &str) -> Result<RangeInclusive<u16>, String> {
    let year = |y: &str| {
        y.trim()
            .parse::<u16>()
            .map_err(|e| format!("invalid year '{y}': {e}"))
    };
    let (start, end) = match s.split_once('-') {
        Some((start, end)) => (year(start)?, year(end)?),
        None => {
            let y = year(s)?;
            (y, y)
        }
    };
    if start > end {
        return Err(format!("start year {start} is after end year {end}"));
    }
    Ok(start..=end)
}

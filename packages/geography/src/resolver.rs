//! Location descriptor translation between names and codes.
//!
//! County and place codes are only unique within a state, so the lookup
//! tables key them by their long form: `SS_CCC` for counties and the
//! 7-digit `SSPPPPP` GEOID for places. Short forms are accepted on input
//! as long as the descriptor carries a state to complete them.

use std::collections::BTreeMap;
use std::path::Path;

use lowe_geography_models::fips::pad_state_code;
use lowe_geography_models::{
    CITY_CODE_WIDTH, COUNTY_SEPARATOR, GeoLevel, LocationDescriptor, NormalizedLocation,
};

use crate::{GeographyError, LookupTable};

/// Maximum number of search matches shown by interactive callers.
///
/// [`Resolver::search`] always returns every match; this cap only applies
/// to display.
pub const SEARCH_DISPLAY_LIMIT: usize = 25;

/// Environment variable naming the lookup-table directory used by
/// [`Resolver::from_env`].
pub const TABLES_DIR_ENV: &str = "LOWE_GEO_DIR";

/// Width of a county code without its state prefix.
const COUNTY_CODE_WIDTH: usize = 3;

/// Width of a place code without its state prefix.
const SHORT_CITY_CODE_WIDTH: usize = CITY_CODE_WIDTH - 2;

/// Which side of a lookup table [`Resolver::search`] matches against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchField {
    /// Match against lowercase names.
    Name,
    /// Match against codes.
    Code,
}

impl std::str::FromStr for SearchField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "name" => Ok(Self::Name),
            "code" | "fips" => Ok(Self::Code),
            other => Err(format!("unknown search field '{other}' (expected name or code)")),
        }
    }
}

/// Translates [`LocationDescriptor`]s between names and codes using four
/// read-only lookup tables.
#[derive(Debug, Clone)]
pub struct Resolver {
    states: LookupTable,
    msas: LookupTable,
    counties: LookupTable,
    cities: LookupTable,
}

impl Resolver {
    /// Builds a resolver from already-loaded tables.
    #[must_use]
    pub const fn from_tables(
        states: LookupTable,
        msas: LookupTable,
        counties: LookupTable,
        cities: LookupTable,
    ) -> Self {
        Self {
            states,
            msas,
            counties,
            cities,
        }
    }

    /// Loads the tables from the directory named by `LOWE_GEO_DIR`.
    ///
    /// # Errors
    ///
    /// Returns [`GeographyError::TablesNotConfigured`] if the variable is
    /// unset or empty, otherwise any error from [`Self::from_dir`].
    pub fn from_env() -> Result<Self, GeographyError> {
        let dir = std::env::var(TABLES_DIR_ENV)
            .ok()
            .filter(|dir| !dir.trim().is_empty())
            .ok_or(GeographyError::TablesNotConfigured {
                var: TABLES_DIR_ENV,
            })?;
        Self::from_dir(Path::new(&dir))
    }

    /// Loads the four tables from a directory written by
    /// [`crate::generate::GeneratedTables::write`].
    ///
    /// # Errors
    ///
    /// Returns [`GeographyError`] if any table cannot be read or parsed.
    pub fn from_dir(dir: &Path) -> Result<Self, GeographyError> {
        Ok(Self::from_tables(
            LookupTable::load(dir, GeoLevel::State)?,
            LookupTable::load(dir, GeoLevel::Msa)?,
            LookupTable::load(dir, GeoLevel::County)?,
            LookupTable::load(dir, GeoLevel::City)?,
        ))
    }

    /// The lookup table for `level`.
    #[must_use]
    pub const fn table(&self, level: GeoLevel) -> &LookupTable {
        match level {
            GeoLevel::State => &self.states,
            GeoLevel::Msa => &self.msas,
            GeoLevel::County => &self.counties,
            GeoLevel::City => &self.cities,
        }
    }

    /// Replaces every code in `descriptor` with its lowercase name.
    ///
    /// Bare county codes and short place codes are completed with the
    /// descriptor's state. When the output has a city or county but no
    /// state, the state is taken from the trailing `", xx"` suffix of that
    /// name.
    ///
    /// # Errors
    ///
    /// * [`GeographyError::UnknownCode`] if a code is not in its table.
    /// * [`GeographyError::AmbiguousCounty`] / [`GeographyError::AmbiguousCity`]
    ///   if a short code cannot be completed because the state is missing.
    /// * [`GeographyError::ConflictingState`] if a long-form code's state
    ///   prefix disagrees with the explicit state.
    pub fn resolve_to_names(
        &self,
        descriptor: &LocationDescriptor,
    ) -> Result<LocationDescriptor, GeographyError> {
        let codes = self.canonical_codes(descriptor, false)?;

        let mut names = LocationDescriptor::new();
        for (level, code) in &codes {
            let name = self
                .table(*level)
                .name(code)
                .ok_or_else(|| GeographyError::UnknownCode {
                    level: *level,
                    code: code.clone(),
                })?;
            names = names.with(*level, name);
        }

        if !names.contains(GeoLevel::State) {
            let suffix = [GeoLevel::City, GeoLevel::County]
                .into_iter()
                .find_map(|level| names.get(level).and_then(jurisdiction_suffix));
            if let Some(state) = suffix {
                let state = state.to_string();
                names = names.with(GeoLevel::State, state);
            }
        }

        Ok(names)
    }

    /// Replaces every lowercase name in `descriptor` with its long-form
    /// code (`"0655254"`, `"06_065"`).
    ///
    /// Names must match the table exactly; no case folding or fuzzy
    /// matching is done. When a city or county is given without a state,
    /// the state code is taken from the code's prefix.
    ///
    /// # Errors
    ///
    /// Returns [`GeographyError::UnknownName`] if a name is not in its
    /// table.
    pub fn resolve_to_codes(
        &self,
        descriptor: &LocationDescriptor,
    ) -> Result<LocationDescriptor, GeographyError> {
        let mut codes = LocationDescriptor::new();
        for (level, name) in descriptor.iter() {
            let code = self
                .table(level)
                .code(name)
                .ok_or_else(|| GeographyError::UnknownName {
                    level,
                    name: name.to_string(),
                })?;
            codes = codes.with(level, code);
        }

        if !codes.contains(GeoLevel::State)
            && let Some(state) = embedded_state(&codes)
        {
            codes = codes.with(GeoLevel::State, state);
        }

        Ok(codes)
    }

    /// Reduces a descriptor holding any mix of names and codes to
    /// validated short codes.
    ///
    /// A value is treated as a code when it is all ASCII digits (or, for
    /// counties, `digits_digits`); anything else is looked up as a name.
    /// Long-form place codes and compound county codes are split into the
    /// state and the short code.
    ///
    /// # Errors
    ///
    /// Returns any resolution error from [`Self::resolve_to_names`] or
    /// [`Self::resolve_to_codes`], or [`GeographyError::ConflictingState`]
    /// if an embedded state prefix disagrees with the explicit state.
    pub fn normalize_codes(
        &self,
        descriptor: &LocationDescriptor,
    ) -> Result<NormalizedLocation, GeographyError> {
        let mut codes = self.canonical_codes(descriptor, true)?;

        if !codes.contains_key(&GeoLevel::State) {
            let long: LocationDescriptor = codes.iter().map(|(l, c)| (*l, c.clone())).collect();
            if let Some(state) = embedded_state(&long) {
                codes.insert(GeoLevel::State, state);
            }
        }

        let short = |level: GeoLevel| {
            codes.get(&level).map(|code| match level {
                GeoLevel::County => code
                    .split_once(COUNTY_SEPARATOR)
                    .map_or(code.as_str(), |(_, county)| county)
                    .to_string(),
                GeoLevel::City => code
                    .get(code.len().saturating_sub(SHORT_CITY_CODE_WIDTH)..)
                    .unwrap_or(code)
                    .to_string(),
                GeoLevel::State | GeoLevel::Msa => code.clone(),
            })
        };

        Ok(NormalizedLocation {
            state: short(GeoLevel::State),
            msa: short(GeoLevel::Msa),
            county: short(GeoLevel::County),
            city: short(GeoLevel::City),
        })
    }

    /// Finds every `(name, code)` pair at `level` whose `field` contains
    /// `query` (case-insensitive), in code order.
    #[must_use]
    pub fn search(
        &self,
        query: &str,
        level: GeoLevel,
        field: SearchField,
    ) -> Vec<(String, String)> {
        let query = query.trim().to_lowercase();
        self.table(level)
            .iter()
            .filter(|(code, name)| match field {
                SearchField::Name => name.contains(&query),
                SearchField::Code => code.to_lowercase().contains(&query),
            })
            .map(|(code, name)| (name.to_string(), code.to_string()))
            .collect()
    }

    /// Converts a descriptor into long-form codes (the table keys),
    /// validating each against its table.
    fn canonical_codes(
        &self,
        descriptor: &LocationDescriptor,
        accept_names: bool,
    ) -> Result<BTreeMap<GeoLevel, String>, GeographyError> {
        let mut codes = BTreeMap::new();

        for (level, value) in descriptor.iter() {
            if accept_names && !looks_like_code(level, value) {
                let code = self
                    .table(level)
                    .code(value)
                    .ok_or_else(|| GeographyError::UnknownName {
                        level,
                        name: value.to_string(),
                    })?;
                codes.insert(level, code.to_string());
            }
        }

        if let Some(state) = descriptor.get(GeoLevel::State)
            && !codes.contains_key(&GeoLevel::State)
        {
            let state = pad_state_code(state);
            self.check_code(GeoLevel::State, &state)?;
            codes.insert(GeoLevel::State, state);
        }
        let state = codes.get(&GeoLevel::State).cloned();

        if let Some(msa) = descriptor.get(GeoLevel::Msa)
            && !codes.contains_key(&GeoLevel::Msa)
        {
            self.check_code(GeoLevel::Msa, msa)?;
            codes.insert(GeoLevel::Msa, msa.to_string());
        }

        if let Some(county) = descriptor.get(GeoLevel::County)
            && !codes.contains_key(&GeoLevel::County)
        {
            let compound = match county.split_once(COUNTY_SEPARATOR) {
                Some((st, co)) => compound_county(&pad_state_code(st), co),
                None => {
                    let st = state.as_deref().ok_or_else(|| GeographyError::AmbiguousCounty {
                        county: county.to_string(),
                    })?;
                    compound_county(st, county)
                }
            };
            self.check_code(GeoLevel::County, &compound)?;
            codes.insert(GeoLevel::County, compound);
        }

        if let Some(city) = descriptor.get(GeoLevel::City)
            && !codes.contains_key(&GeoLevel::City)
        {
            let long = if city.len() < CITY_CODE_WIDTH {
                let st = state.as_deref().ok_or_else(|| GeographyError::AmbiguousCity {
                    city: city.to_string(),
                })?;
                format!("{st}{city:0>SHORT_CITY_CODE_WIDTH$}")
            } else {
                city.to_string()
            };
            self.check_code(GeoLevel::City, &long)?;
            codes.insert(GeoLevel::City, long);
        }

        if let Some(state) = &state {
            for level in [GeoLevel::County, GeoLevel::City] {
                if let Some(code) = codes.get(&level)
                    && !code.starts_with(state.as_str())
                {
                    return Err(GeographyError::ConflictingState {
                        level,
                        code: code.clone(),
                        state: state.clone(),
                    });
                }
            }
        }

        Ok(codes)
    }

    fn check_code(&self, level: GeoLevel, code: &str) -> Result<(), GeographyError> {
        if self.table(level).name(code).is_some() {
            Ok(())
        } else {
            Err(GeographyError::UnknownCode {
                level,
                code: code.to_string(),
            })
        }
    }
}

/// Formats a compound county key, padding the county part.
fn compound_county(state: &str, county: &str) -> String {
    format!("{state}{COUNTY_SEPARATOR}{county:0>COUNTY_CODE_WIDTH$}")
}

/// Whether `value` has the shape of a code at `level`.
fn looks_like_code(level: GeoLevel, value: &str) -> bool {
    let digits = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
    match level {
        GeoLevel::County => value
            .split_once(COUNTY_SEPARATOR)
            .map_or_else(|| digits(value), |(st, co)| digits(st) && digits(co)),
        GeoLevel::State | GeoLevel::Msa | GeoLevel::City => digits(value),
    }
}

/// The trailing `", xx"` component of a county or place name.
fn jurisdiction_suffix(name: &str) -> Option<&str> {
    name.rsplit_once(',')
        .map(|(_, suffix)| suffix.trim())
        .filter(|suffix| !suffix.is_empty())
}

/// State code embedded in a long-form city or compound county code.
fn embedded_state(codes: &LocationDescriptor) -> Option<String> {
    codes
        .get(GeoLevel::City)
        .filter(|city| city.len() >= CITY_CODE_WIDTH)
        .and_then(|city| city.get(..2))
        .map(str::to_string)
        .or_else(|| {
            codes
                .get(GeoLevel::County)
                .and_then(|county| county.split_once(COUNTY_SEPARATOR))
                .map(|(state, _)| state.to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn testdata() -> &'static Path {
        Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/testdata"))
    }

    fn resolver() -> Resolver {
        Resolver::from_dir(testdata()).unwrap()
    }

    fn desc<const N: usize>(pairs: [(GeoLevel, &str); N]) -> LocationDescriptor {
        LocationDescriptor::from(pairs)
    }

    #[test]
    fn palm_springs_name_resolves_to_codes_with_inferred_state() {
        let codes = resolver()
            .resolve_to_codes(&desc([(GeoLevel::City, "palm springs, ca")]))
            .unwrap();
        assert_eq!(
            codes,
            desc([(GeoLevel::City, "0655254"), (GeoLevel::State, "06")])
        );
    }

    #[test]
    fn names_and_codes_roundtrip_for_every_entry() {
        let r = resolver();
        for level in GeoLevel::ALL {
            for (code, _) in r.table(level).iter() {
                let names = r.resolve_to_names(&desc([(level, code)])).unwrap();
                let codes = r.resolve_to_codes(&names).unwrap();
                let again = r.resolve_to_names(&codes).unwrap();
                assert_eq!(
                    again.get(level),
                    names.get(level),
                    "{level} code {code} did not round-trip"
                );
            }
        }
    }

    #[test]
    fn bare_county_uses_state() {
        let r = resolver();
        let inferred = r
            .resolve_to_names(&desc([(GeoLevel::State, "06"), (GeoLevel::County, "065")]))
            .unwrap();
        let compound = r
            .resolve_to_names(&desc([(GeoLevel::County, "06_065")]))
            .unwrap();
        assert_eq!(inferred, compound);
        assert_eq!(inferred.get(GeoLevel::County), Some("riverside county, ca"));
        assert_eq!(inferred.get(GeoLevel::State), Some("ca"));
    }

    #[test]
    fn unpadded_county_code_is_padded() {
        let names = resolver()
            .resolve_to_names(&desc([(GeoLevel::State, "6"), (GeoLevel::County, "65")]))
            .unwrap();
        assert_eq!(names.get(GeoLevel::County), Some("riverside county, ca"));
    }

    #[test]
    fn short_city_uses_state() {
        let r = resolver();
        let short = r
            .resolve_to_names(&desc([(GeoLevel::State, "06"), (GeoLevel::City, "55254")]))
            .unwrap();
        let long = r
            .resolve_to_names(&desc([(GeoLevel::City, "0655254")]))
            .unwrap();
        assert_eq!(short.get(GeoLevel::City), Some("palm springs, ca"));
        assert_eq!(short, long);
    }

    #[test]
    fn bare_county_without_state_is_ambiguous() {
        let err = resolver()
            .resolve_to_names(&desc([(GeoLevel::County, "065")]))
            .unwrap_err();
        assert!(matches!(err, GeographyError::AmbiguousCounty { county } if county == "065"));
    }

    #[test]
    fn short_city_without_state_is_ambiguous() {
        let err = resolver()
            .resolve_to_names(&desc([(GeoLevel::City, "55254")]))
            .unwrap_err();
        assert!(matches!(err, GeographyError::AmbiguousCity { .. }));
    }

    #[test]
    fn unknown_code_and_name_are_reported() {
        let r = resolver();
        let err = r
            .resolve_to_names(&desc([(GeoLevel::Msa, "99999")]))
            .unwrap_err();
        assert!(matches!(
            err,
            GeographyError::UnknownCode { level: GeoLevel::Msa, code } if code == "99999"
        ));

        let err = r
            .resolve_to_codes(&desc([(GeoLevel::City, "Palm Springs, CA")]))
            .unwrap_err();
        assert!(matches!(err, GeographyError::UnknownName { level: GeoLevel::City, .. }));
    }

    #[test]
    fn normalize_accepts_names_and_long_codes() {
        let r = resolver();
        let from_name = r
            .normalize_codes(&desc([(GeoLevel::City, "palm springs, ca")]))
            .unwrap();
        let from_code = r
            .normalize_codes(&desc([(GeoLevel::City, "0655254")]))
            .unwrap();
        assert_eq!(from_name, from_code);
        assert_eq!(from_code.state.as_deref(), Some("06"));
        assert_eq!(from_code.city.as_deref(), Some("55254"));
    }

    #[test]
    fn normalize_splits_compound_county() {
        let loc = resolver()
            .normalize_codes(&desc([
                (GeoLevel::County, "06_065"),
                (GeoLevel::Msa, "riverside-san bernardino-ontario, ca"),
            ]))
            .unwrap();
        assert_eq!(loc.state.as_deref(), Some("06"));
        assert_eq!(loc.county.as_deref(), Some("065"));
        assert_eq!(loc.msa.as_deref(), Some("40140"));
    }

    #[test]
    fn normalize_rejects_conflicting_state() {
        let err = resolver()
            .normalize_codes(&desc([(GeoLevel::State, "04"), (GeoLevel::City, "0655254")]))
            .unwrap_err();
        assert!(matches!(err, GeographyError::ConflictingState { .. }));
    }

    #[test]
    fn names_reject_conflicting_state() {
        let r = resolver();
        let err = r
            .resolve_to_names(&desc([(GeoLevel::State, "04"), (GeoLevel::City, "0655254")]))
            .unwrap_err();
        assert!(matches!(
            err,
            GeographyError::ConflictingState { level: GeoLevel::City, state, .. } if state == "04"
        ));

        let err = r
            .resolve_to_names(&desc([(GeoLevel::State, "04"), (GeoLevel::County, "06_065")]))
            .unwrap_err();
        assert!(matches!(
            err,
            GeographyError::ConflictingState { level: GeoLevel::County, .. }
        ));
    }

    #[test]
    fn from_env_requires_a_table_directory() {
        // SAFETY: only this test touches this variable.
        unsafe { std::env::remove_var(TABLES_DIR_ENV) };
        let err = Resolver::from_env().unwrap_err();
        assert!(matches!(
            err,
            GeographyError::TablesNotConfigured { var } if var == TABLES_DIR_ENV
        ));

        // SAFETY: as above.
        unsafe { std::env::set_var(TABLES_DIR_ENV, testdata()) };
        let r = Resolver::from_env().unwrap();
        assert_eq!(r.table(GeoLevel::City).code("palm springs, ca"), Some("0655254"));
        unsafe { std::env::remove_var(TABLES_DIR_ENV) };
    }

    #[test]
    fn search_by_name_and_code() {
        let r = resolver();
        let hits = r.search("PALM", GeoLevel::City, SearchField::Name);
        assert_eq!(
            hits,
            vec![
                ("palm desert, ca".to_string(), "0655184".to_string()),
                ("palm springs, ca".to_string(), "0655254".to_string()),
            ]
        );

        let hits = r.search("06_07", GeoLevel::County, SearchField::Code);
        assert_eq!(hits.len(), 3);
        assert!(hits.iter().all(|(_, code)| code.starts_with("06_07")));
    }

    #[test]
    fn search_returns_more_than_display_limit() {
        let hits = resolver().search("", GeoLevel::State, SearchField::Name);
        assert!(hits.len() > SEARCH_DISPLAY_LIMIT);
    }
}

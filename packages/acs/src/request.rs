//! URL construction for data and dictionary requests.
//!
//! A data request for one cell looks like
//!
//! ```text
//! {base}/{year}/acs/{survey}{suffix}?get={get}&for={for}[&in=state:{ss}]&key={key}
//! ```
//!
//! where `for` names the most specific levels of the location and `in`
//! scopes them to a state.

use lowe_acs_models::{Estimate, TableKind};
use lowe_geography_models::{GeoLevel, NormalizedLocation};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC};

use crate::AcsError;

/// Characters left unescaped in query values. Clause punctuation
/// (`group(...)`, `level:code`, the MSA token's `/`) stays readable.
const SAFE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b':')
    .remove(b'/')
    .remove(b'*')
    .remove(b'(')
    .remove(b')')
    .remove(b',');

/// Geography token the API uses for `level` in `for`/`in` clauses.
#[must_use]
pub const fn geography_token(level: GeoLevel) -> &'static str {
    match level {
        GeoLevel::State => "state",
        GeoLevel::Msa => "metropolitan statistical area/micropolitan statistical area",
        GeoLevel::County => "county",
        GeoLevel::City => "place",
    }
}

fn enc(s: &str) -> String {
    percent_encoding::utf8_percent_encode(s, SAFE).to_string()
}

/// Survey endpoint for a year, kind and estimate window.
#[must_use]
pub fn endpoint(base_url: &str, year: u16, kind: TableKind, estimate: Estimate) -> String {
    format!(
        "{}/{year}/acs/{}{}",
        base_url.trim_end_matches('/'),
        estimate.survey(),
        kind.url_suffix()
    )
}

/// Location of the published variable dictionary for an endpoint.
#[must_use]
pub fn dictionary_url(base_url: &str, year: u16, kind: TableKind, estimate: Estimate) -> String {
    format!("{}/variables.json", endpoint(base_url, year, kind, estimate))
}

/// Builds the encoded `for` clause and optional `in` clause.
///
/// A state-only location is requested as `for=state:ss`. Otherwise the
/// non-state levels form the `for` clause (space-separated, in MSA,
/// county, city order) and the state, if any, goes to `in`.
///
/// # Errors
///
/// Returns [`AcsError::InvalidRequest`] for an empty location, or for a
/// county or city without a state.
pub fn geography_clauses(
    location: &NormalizedLocation,
) -> Result<(String, Option<String>), AcsError> {
    let state_clause = location
        .state
        .as_deref()
        .map(|code| enc(&format!("{}:{code}", geography_token(GeoLevel::State))));

    let parts: Vec<String> = location
        .sub_state_levels()
        .map(|(level, code)| enc(&format!("{}:{code}", geography_token(level))))
        .collect();

    if parts.is_empty() {
        return state_clause.map(|clause| (clause, None)).ok_or_else(|| {
            AcsError::InvalidRequest {
                message: "location has no geography levels".to_string(),
            }
        });
    }

    if state_clause.is_none() && (location.county.is_some() || location.city.is_some()) {
        return Err(AcsError::InvalidRequest {
            message: format!("location {location} has a county or city but no state"),
        });
    }

    Ok((parts.join("%20"), state_clause))
}

/// Full data request URL for one cell, including the API key.
///
/// # Errors
///
/// Returns [`AcsError::InvalidRequest`] if the location cannot be turned
/// into clauses.
pub fn cell_url(
    base_url: &str,
    year: u16,
    kind: TableKind,
    estimate: Estimate,
    table_id: &str,
    location: &NormalizedLocation,
    api_key: &str,
) -> Result<String, AcsError> {
    let (for_clause, in_clause) = geography_clauses(location)?;
    let mut url = format!(
        "{}?get={}&for={for_clause}",
        endpoint(base_url, year, kind, estimate),
        enc(&kind.get_clause(table_id))
    );
    if let Some(in_clause) = in_clause {
        url.push_str("&in=");
        url.push_str(&in_clause);
    }
    url.push_str("&key=");
    url.push_str(&enc(api_key));
    Ok(url)
}

/// Replaces the value of any `key=` query parameter so the URL can be
/// logged or put in an error.
#[must_use]
pub fn redact_key(url: &str) -> String {
    let Some((base, query)) = url.split_once('?') else {
        return url.to_string();
    };
    let query = query
        .split('&')
        .map(|param| {
            if param.starts_with("key=") {
                "key=REDACTED"
            } else {
                param
            }
        })
        .collect::<Vec<_>>()
        .join("&");
    format!("{base}?{query}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(
        state: Option<&str>,
        county: Option<&str>,
        city: Option<&str>,
    ) -> NormalizedLocation {
        NormalizedLocation {
            state: state.map(str::to_string),
            msa: None,
            county: county.map(str::to_string),
            city: city.map(str::to_string),
        }
    }

    #[test]
    fn subject_table_for_a_city() {
        let url = cell_url(
            "https://api.census.gov/data",
            2019,
            TableKind::Subject,
            Estimate::FiveYear,
            "S1701",
            &location(Some("06"), None, Some("55254")),
            "secret",
        )
        .unwrap();
        assert_eq!(
            url,
            "https://api.census.gov/data/2019/acs/acs5/subject\
             ?get=group(S1701)&for=place:55254&in=state:06&key=secret"
        );
    }

    #[test]
    fn detail_table_for_a_state() {
        let url = cell_url(
            "https://api.census.gov/data/",
            2018,
            TableKind::Detail,
            Estimate::OneYear,
            "B01001",
            &location(Some("06"), None, None),
            "k",
        )
        .unwrap();
        assert_eq!(
            url,
            "https://api.census.gov/data/2018/acs/acs1?get=B01001,&for=state:06&key=k"
        );
    }

    #[test]
    fn county_and_city_share_the_for_clause() {
        let (for_clause, in_clause) =
            geography_clauses(&location(Some("06"), Some("065"), Some("55254"))).unwrap();
        assert_eq!(for_clause, "county:065%20place:55254");
        assert_eq!(in_clause.as_deref(), Some("state:06"));
    }

    #[test]
    fn msa_token_is_encoded() {
        let msa = NormalizedLocation {
            msa: Some("40140".to_string()),
            ..NormalizedLocation::default()
        };
        let (for_clause, in_clause) = geography_clauses(&msa).unwrap();
        assert_eq!(
            for_clause,
            "metropolitan%20statistical%20area/micropolitan%20statistical%20area:40140"
        );
        assert_eq!(in_clause, None);
    }

    #[test]
    fn empty_or_stateless_locations_are_rejected() {
        assert!(matches!(
            geography_clauses(&NormalizedLocation::default()),
            Err(AcsError::InvalidRequest { .. })
        ));
        assert!(matches!(
            geography_clauses(&location(None, None, Some("55254"))),
            Err(AcsError::InvalidRequest { .. })
        ));
    }

    #[test]
    fn profile_dictionary_url() {
        assert_eq!(
            dictionary_url(
                "https://api.census.gov/data",
                2017,
                TableKind::Profile,
                Estimate::FiveYear,
            ),
            "https://api.census.gov/data/2017/acs/acs5/profile/variables.json"
        );
    }

    #[test]
    fn redacts_key() {
        assert_eq!(
            redact_key("https://x/y?get=a&key=secret&for=state:06"),
            "https://x/y?get=a&key=REDACTED&for=state:06"
        );
        assert_eq!(redact_key("https://x/y"), "https://x/y");
    }
}

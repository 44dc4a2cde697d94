//! US state FIPS code utilities.
//!
//! Maps two-digit FIPS codes to two-letter postal abbreviations for the
//! 50 states, DC and Puerto Rico. The state level of
//! the lookup tables is generated from this list (code → lowercase
//! abbreviation), so city and county names such as `"palm springs, ca"`
//! end in a suffix that is itself a state-level name.

/// `(fips, abbreviation)` for every state-equivalent we resolve.
const STATES: &[(&str, &str)] = &[
    ("01", "AL"),
    ("02", "AK"),
    ("04", "AZ"),
    ("05", "AR"),
    ("06", "CA"),
    ("08", "CO"),
    ("09", "CT"),
    ("10", "DE"),
    ("11", "DC"),
    ("12", "FL"),
    ("13", "GA"),
    ("15", "HI"),
    ("16", "ID"),
    ("17", "IL"),
    ("18", "IN"),
    ("19", "IA"),
    ("20", "KS"),
    ("21", "KY"),
    ("22", "LA"),
    ("23", "ME"),
    ("24", "MD"),
    ("25", "MA"),
    ("26", "MI"),
    ("27", "MN"),
    ("28", "MS"),
    ("29", "MO"),
    ("30", "MT"),
    ("31", "NE"),
    ("32", "NV"),
    ("33", "NH"),
    ("34", "NJ"),
    ("35", "NM"),
    ("36", "NY"),
    ("37", "NC"),
    ("38", "ND"),
    ("39", "OH"),
    ("40", "OK"),
    ("41", "OR"),
    ("42", "PA"),
    ("44", "RI"),
    ("45", "SC"),
    ("46", "SD"),
    ("47", "TN"),
    ("48", "TX"),
    ("49", "UT"),
    ("50", "VT"),
    ("51", "VA"),
    ("53", "WA"),
    ("54", "WV"),
    ("55", "WI"),
    ("56", "WY"),
    ("72", "PR"),
];

/// Width of a state FIPS code.
pub const STATE_CODE_WIDTH: usize = 2;

/// Iterates over every known state FIPS code in ascending order.
pub fn state_codes() -> impl Iterator<Item = &'static str> {
    STATES.iter().map(|(fips, _)| *fips)
}

/// Maps a two-digit FIPS code to the two-letter postal abbreviation.
#[must_use]
pub fn state_abbr(fips: &str) -> Option<&'static str> {
    STATES
        .iter()
        .find(|(code, _)| *code == fips)
        .map(|(_, abbr)| *abbr)
}

/// Left-pads a numeric state code to [`STATE_CODE_WIDTH`] digits
/// (`"6"` → `"06"`). Non-numeric input is returned trimmed but unchanged.
#[must_use]
pub fn pad_state_code(code: &str) -> String {
    let code = code.trim();
    if code.chars().all(|c| c.is_ascii_digit()) {
        format!("{code:0>STATE_CODE_WIDTH$}")
    } else {
        code.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn covers_states_dc_and_pr() {
        assert_eq!(state_codes().count(), 52);
    }

    #[test]
    fn abbreviations_are_unique() {
        let mut abbrs: Vec<&str> = state_codes().filter_map(state_abbr).collect();
        abbrs.sort_unstable();
        abbrs.dedup();
        assert_eq!(abbrs.len(), 52);
        assert_eq!(state_abbr("06"), Some("CA"));
    }

    #[test]
    fn unknown_fips() {
        assert_eq!(state_abbr("99"), None);
    }

    #[test]
    fn pads_short_codes() {
        assert_eq!(pad_state_code("6"), "06");
        assert_eq!(pad_state_code("06"), "06");
        assert_eq!(pad_state_code(" 48"), "48");
        assert_eq!(state_abbr(&pad_state_code("6")), Some("CA"));
    }
}

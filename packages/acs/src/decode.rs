//! Decoding of one cell's response into labelled values.
//!
//! The API answers with exactly two rows: a header of series ids and a row
//! of values. Geography context columns are dropped, ids the dictionary
//! does not know (annotations, margins of unpublished lines) are dropped,
//! and series whose rendered name repeats an earlier one are dropped.

use std::collections::BTreeSet;

use lowe_acs_models::{ConceptLabel, VariableDictionary};
use serde_json::Value;

use crate::AcsError;
use crate::request::geography_token;

/// Header fields describing the geography rather than a series.
const CONTEXT_FIELDS: &[&str] = &["NAME", "GEO_ID", "ucgid"];

fn is_context_field(id: &str) -> bool {
    CONTEXT_FIELDS.contains(&id)
        || lowe_geography_models::GeoLevel::ALL
            .into_iter()
            .any(|level| geography_token(level) == id)
}

fn malformed(message: impl Into<String>) -> AcsError {
    AcsError::MalformedResponse {
        message: message.into(),
    }
}

/// Pairs each decodable series in `body` with its value.
///
/// String values are kept as-is, numbers are rendered in their JSON form
/// and nulls are skipped.
///
/// # Errors
///
/// Returns [`AcsError::MalformedResponse`] unless `body` is an array of
/// exactly two equal-length arrays with a string header.
pub fn decode_response(
    body: &Value,
    dictionary: &VariableDictionary,
) -> Result<Vec<(ConceptLabel, String)>, AcsError> {
    let rows = body
        .as_array()
        .ok_or_else(|| malformed("expected a JSON array of rows"))?;
    let [header, values] = rows.as_slice() else {
        return Err(malformed(format!("expected 2 rows, got {}", rows.len())));
    };
    let (Some(header), Some(values)) = (header.as_array(), values.as_array()) else {
        return Err(malformed("rows must be arrays"));
    };
    if header.len() != values.len() {
        return Err(malformed(format!(
            "header has {} fields but value row has {}",
            header.len(),
            values.len()
        )));
    }

    let mut seen = BTreeSet::new();
    let mut decoded = Vec::new();

    for (id, value) in header.iter().zip(values) {
        let id = id
            .as_str()
            .ok_or_else(|| malformed(format!("non-string header field {id}")))?;
        if is_context_field(id) {
            continue;
        }
        let value = match value {
            Value::Null => continue,
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            other => return Err(malformed(format!("unexpected value {other} for {id}"))),
        };
        let Some(label) = dictionary.get(id) else {
            log::trace!("Dropping undocumented series {id}");
            continue;
        };
        if !seen.insert(label.render()) {
            log::trace!("Dropping duplicate series {id} ({label})");
            continue;
        }
        decoded.push((label.clone(), value));
    }

    Ok(decoded)
}

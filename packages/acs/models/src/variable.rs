//! Variable groups and the dictionaries that decode their series ids.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::TableKind;

/// A requested bundle of related series, e.g. `S1701` (poverty status).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariableGroup {
    /// Table id as the API knows it.
    pub id: String,
    /// Table kind; inferred from the id prefix when absent.
    pub kind: Option<TableKind>,
}

impl VariableGroup {
    /// A group whose kind will be inferred from its id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into().trim().to_string(),
            kind: None,
        }
    }

    /// A group with an explicit kind.
    #[must_use]
    pub fn with_kind(id: impl Into<String>, kind: TableKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::new(id)
        }
    }

    /// The explicit kind, or the one inferred from the id prefix.
    #[must_use]
    pub fn kind_or_infer(&self) -> Option<TableKind> {
        self.kind.or_else(|| TableKind::infer(&self.id))
    }
}

impl fmt::Display for VariableGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

impl From<&str> for VariableGroup {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// The human label of one series: its table concept plus its line label.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConceptLabel {
    /// Table concept (e.g. `"POVERTY STATUS IN THE PAST 12 MONTHS"`).
    pub concept: String,
    /// Line label with the API's `!!` separators
    /// (e.g. `"Estimate!!Total!!Population for whom poverty status is determined"`).
    pub label: String,
}

impl ConceptLabel {
    /// Creates a label pair.
    #[must_use]
    pub fn new(concept: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            concept: concept.into(),
            label: label.into(),
        }
    }

    /// Column name: concept and label joined by a space, with `!!`
    /// separators replaced by spaces.
    #[must_use]
    pub fn render(&self) -> String {
        format!("{} {}", self.concept, self.label).replace("!!", " ")
    }
}

impl fmt::Display for ConceptLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

#[derive(Deserialize)]
struct RawVariable {
    concept: Option<String>,
    label: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDocument {
    Wrapped {
        variables: BTreeMap<String, RawVariable>,
    },
    Flat(BTreeMap<String, RawVariable>),
}

/// Decodes opaque series ids (`S1701_C03_001E`) for one (year, kind,
/// estimate) combination.
///
/// Read-only once built. Ids without both a concept and a label are left
/// out, so lookups for them miss just like ids the API never documented.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableDictionary {
    entries: BTreeMap<String, ConceptLabel>,
}

impl VariableDictionary {
    /// Builds a dictionary from already-decoded entries.
    #[must_use]
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, ConceptLabel)>,
        S: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(id, label)| (id.into(), label))
                .collect(),
        }
    }

    /// Parses a `variables.json` document, either as served by the API
    /// (`{"variables": {...}}`) or already flattened (`{...}`).
    ///
    /// # Errors
    ///
    /// Returns [`serde_json::Error`] if the document has neither shape.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        let doc: RawDocument = serde_json::from_slice(bytes)?;
        Ok(Self::from_raw(doc))
    }

    /// Same as [`Self::from_json_slice`] for an already-parsed value.
    ///
    /// # Errors
    ///
    /// Returns [`serde_json::Error`] if the document has neither shape.
    pub fn from_json_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        let doc: RawDocument = serde_json::from_value(value)?;
        Ok(Self::from_raw(doc))
    }

    fn from_raw(doc: RawDocument) -> Self {
        let (RawDocument::Wrapped { variables } | RawDocument::Flat(variables)) = doc;
        let entries = variables
            .into_iter()
            .filter_map(|(id, raw)| match (raw.concept, raw.label) {
                (Some(concept), Some(label)) => Some((id, ConceptLabel { concept, label })),
                _ => None,
            })
            .collect();
        Self { entries }
    }

    /// Label for a series id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&ConceptLabel> {
        self.entries.get(id)
    }

    /// Number of decodable ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing can be decoded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_replaces_separators() {
        let label = ConceptLabel::new(
            "TYPES OF COMPUTERS AND INTERNET SUBSCRIPTIONS",
            "Estimate!!Percent!!Total households!!TYPES OF COMPUTER",
        );
        assert_eq!(
            label.render(),
            concat!(
                "TYPES OF COMPUTERS AND INTERNET SUBSCRIPTIONS ",
                "Estimate Percent Total households TYPES OF COMPUTER"
            )
        );
    }

    #[test]
    fn parses_wrapped_document_and_skips_incomplete_entries() {
        let json = br#"{
            "variables": {
                "S1701_C03_001E": {
                    "label": "Estimate!!Percent below poverty level",
                    "concept": "POVERTY STATUS IN THE PAST 12 MONTHS",
                    "predicateType": "float",
                    "group": "S1701",
                    "limit": 0
                },
                "S1701_C03_001EA": {"label": "Annotation of Estimate", "predicateType": "string"}
            }
        }"#;
        let dict = VariableDictionary::from_json_slice(json).unwrap();
        assert_eq!(dict.len(), 1);
        assert_eq!(
            dict.get("S1701_C03_001E").map(|l| l.concept.as_str()),
            Some("POVERTY STATUS IN THE PAST 12 MONTHS")
        );
        assert!(dict.get("S1701_C03_001EA").is_none());
    }

    #[test]
    fn parses_flat_document() {
        let json = br#"{"B01001_001E": {"label": "Estimate!!Total:", "concept": "SEX BY AGE"}}"#;
        let dict = VariableDictionary::from_json_slice(json).unwrap();
        assert_eq!(dict.get("B01001_001E").unwrap().render(), "SEX BY AGE Estimate Total:");
    }

    #[test]
    fn group_kind_is_explicit_or_inferred() {
        assert_eq!(VariableGroup::new("S1701").kind_or_infer(), Some(TableKind::Subject));
        assert_eq!(
            VariableGroup::with_kind("S1701", TableKind::Profile).kind_or_infer(),
            Some(TableKind::Profile)
        );
        assert_eq!(VariableGroup::new("X01").kind_or_infer(), None);
    }
}

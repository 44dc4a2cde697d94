//! Decoded result rows and the tables built from them.
//!
//! A [`Table`] has one row per (year, location) and one column per
//! decoded series. Row order is always year, then location key, so the
//! same request yields the same table regardless of the order responses
//! arrived in.

use std::collections::{BTreeMap, BTreeSet};

use lowe_geography_models::{GeoLevel, ResolvedLocation};
use serde::{Deserialize, Serialize};

use crate::ConceptLabel;

/// Errors from [`Table::left_join`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JoinError {
    /// One table is split by location and the other is not, so the tables
    /// share no common key beyond the year.
    #[error(
        "Cannot join a location-keyed table with one that has no location decomposition"
    )]
    KeyMismatch,

    /// Both tables carry the same series columns.
    #[error("Tables share series columns: {}", columns.join(", "))]
    OverlappingColumns {
        /// Rendered names of the shared columns.
        columns: Vec<String>,
    },

    /// The right-hand table has two rows for the same key.
    #[error("Duplicate join key (year {year}, location '{location_key}')")]
    DuplicateKey {
        /// Year of the repeated key.
        year: u16,
        /// Location key of the repeated key.
        location_key: String,
    },
}

/// One year of decoded values for one location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRow {
    /// Survey year.
    pub year: u16,
    /// Names of the location the values describe.
    pub location: ResolvedLocation,
    /// Decoded `(series, value)` pairs, labels unique.
    pub values: Vec<(ConceptLabel, String)>,
}

/// One row of a [`Table`]; `values` is aligned with the table's columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRow {
    /// Survey year.
    pub year: u16,
    /// Names of the location the row describes.
    pub location: ResolvedLocation,
    /// One value per table column; `None` where the series was absent.
    pub values: Vec<Option<String>>,
}

impl TableRow {
    fn sort_key(&self) -> (u16, String) {
        (self.year, self.location.location_key())
    }
}

/// Column-labelled rows of decoded ACS values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<ConceptLabel>,
    rows: Vec<TableRow>,
}

impl From<ResultRow> for Table {
    fn from(row: ResultRow) -> Self {
        let (columns, values) = row
            .values
            .into_iter()
            .map(|(label, value)| (label, Some(value)))
            .unzip();
        Self {
            columns,
            rows: vec![TableRow {
                year: row.year,
                location: row.location,
                values,
            }],
        }
    }
}

impl Table {
    /// Series columns, in first-seen order.
    #[must_use]
    pub fn columns(&self) -> &[ConceptLabel] {
        &self.columns
    }

    /// Rows, ordered by year then location key.
    #[must_use]
    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of `column`, if present.
    #[must_use]
    pub fn column_index(&self, column: &ConceptLabel) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Value of `column` in row `row`.
    #[must_use]
    pub fn value(&self, row: usize, column: &ConceptLabel) -> Option<&str> {
        let col = self.column_index(column)?;
        self.rows.get(row)?.values.get(col)?.as_deref()
    }

    /// Whether any row is split by location.
    #[must_use]
    pub fn has_location(&self) -> bool {
        self.rows.iter().any(|row| row.location.is_decomposed())
    }

    /// Stacks tables vertically.
    ///
    /// Columns are the union of all inputs in first-seen order; rows are
    /// re-sorted by year and location key.
    #[must_use]
    pub fn concat(tables: impl IntoIterator<Item = Self>) -> Self {
        let mut columns: Vec<ConceptLabel> = Vec::new();
        let mut index: BTreeMap<ConceptLabel, usize> = BTreeMap::new();
        let mut pending = Vec::new();

        for table in tables {
            let mapping: Vec<usize> = table
                .columns
                .into_iter()
                .map(|column| {
                    *index.entry(column.clone()).or_insert_with(|| {
                        columns.push(column);
                        columns.len() - 1
                    })
                })
                .collect();
            pending.push((mapping, table.rows));
        }

        let width = columns.len();
        let mut rows: Vec<TableRow> = pending
            .into_iter()
            .flat_map(|(mapping, rows)| {
                rows.into_iter().map(move |row| {
                    let mut values = vec![None; width];
                    for (value, &col) in row.values.into_iter().zip(&mapping) {
                        values[col] = value;
                    }
                    TableRow { values, ..row }
                })
            })
            .collect();

        rows.sort_by_cached_key(TableRow::sort_key);

        Self { columns, rows }
    }

    /// Left-joins `other` onto `self` on (year, location key), or on year
    /// alone when neither table is split by location.
    ///
    /// Every row of `self` is kept; `other`'s columns are appended and
    /// filled where a matching row exists.
    ///
    /// # Errors
    ///
    /// * [`JoinError::KeyMismatch`] if only one table is split by location.
    /// * [`JoinError::OverlappingColumns`] if the tables share a column.
    /// * [`JoinError::DuplicateKey`] if `other` repeats a key.
    pub fn left_join(mut self, other: &Self) -> Result<Self, JoinError> {
        if !self.is_empty() && !other.is_empty() && self.has_location() != other.has_location() {
            return Err(JoinError::KeyMismatch);
        }

        let own: BTreeSet<&ConceptLabel> = self.columns.iter().collect();
        let overlap: Vec<String> = other
            .columns
            .iter()
            .filter(|c| own.contains(c))
            .map(ConceptLabel::render)
            .collect();
        if !overlap.is_empty() {
            return Err(JoinError::OverlappingColumns { columns: overlap });
        }

        let mut lookup: BTreeMap<(u16, String), &TableRow> = BTreeMap::new();
        for row in &other.rows {
            let key = row.sort_key();
            if lookup.contains_key(&key) {
                return Err(JoinError::DuplicateKey {
                    year: key.0,
                    location_key: key.1,
                });
            }
            lookup.insert(key, row);
        }

        let extra = other.columns.len();
        for row in &mut self.rows {
            match lookup.get(&row.sort_key()) {
                Some(matched) => row.values.extend(matched.values.iter().cloned()),
                None => row.values.extend(std::iter::repeat_n(None, extra)),
            }
        }
        self.columns.extend(other.columns.iter().cloned());

        Ok(self)
    }

    /// Location levels present in at least one row, in [`GeoLevel`] order.
    #[must_use]
    pub fn location_levels(&self) -> Vec<GeoLevel> {
        GeoLevel::ALL
            .into_iter()
            .filter(|level| self.rows.iter().any(|row| row.location.get(*level).is_some()))
            .collect()
    }

    /// Flat header: `year`, the present location levels, `location_key`
    /// (if split by location), then the rendered series columns.
    #[must_use]
    pub fn header(&self) -> Vec<String> {
        let mut header = vec!["year".to_string()];
        let levels = self.location_levels();
        header.extend(levels.iter().map(|level| level.as_str().to_string()));
        if !levels.is_empty() {
            header.push("location_key".to_string());
        }
        header.extend(self.columns.iter().map(ConceptLabel::render));
        header
    }

    /// Flat records aligned with [`Self::header`]; missing values are empty
    /// strings.
    pub fn records(&self) -> impl Iterator<Item = Vec<String>> + '_ {
        let levels = self.location_levels();
        self.rows.iter().map(move |row| {
            let mut record = vec![row.year.to_string()];
            record.extend(
                levels
                    .iter()
                    .map(|level| row.location.get(*level).unwrap_or_default().to_string()),
            );
            if !levels.is_empty() {
                record.push(row.location.location_key());
            }
            record.extend(row.values.iter().map(|v| v.clone().unwrap_or_default()));
            record
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn city(name: &str) -> ResolvedLocation {
        ResolvedLocation {
            state: Some("ca".to_string()),
            city: Some(name.to_string()),
            ..ResolvedLocation::default()
        }
    }

    fn label(n: &str) -> ConceptLabel {
        ConceptLabel::new("CONCEPT", format!("Estimate!!{n}"))
    }

    fn row(year: u16, location: ResolvedLocation, values: &[(&str, &str)]) -> Table {
        Table::from(ResultRow {
            year,
            location,
            values: values
                .iter()
                .map(|(l, v)| (label(l), (*v).to_string()))
                .collect(),
        })
    }

    #[test]
    fn concat_unions_columns_and_sorts_rows() {
        let table = Table::concat([
            row(2019, city("palm springs"), &[("A", "1")]),
            row(2018, city("palm springs"), &[("A", "2"), ("B", "3")]),
            row(2018, city("indio"), &[("B", "4")]),
        ]);

        assert_eq!(table.columns(), &[label("A"), label("B")]);
        let order: Vec<(u16, String)> = table
            .rows()
            .iter()
            .map(|r| (r.year, r.location.location_key()))
            .collect();
        assert_eq!(
            order,
            vec![
                (2018, "ca indio".to_string()),
                (2018, "ca palm springs".to_string()),
                (2019, "ca palm springs".to_string()),
            ]
        );
        assert_eq!(table.value(0, &label("A")), None);
        assert_eq!(table.value(0, &label("B")), Some("4"));
        assert_eq!(table.value(2, &label("A")), Some("1"));
    }

    #[test]
    fn left_join_on_year_and_location() {
        let left = Table::concat([
            row(2018, city("indio"), &[("A", "1")]),
            row(2019, city("indio"), &[("A", "2")]),
        ]);
        let right = Table::concat([row(2019, city("indio"), &[("B", "9")])]);

        let joined = left.left_join(&right).unwrap();
        assert_eq!(joined.len(), 2);
        assert_eq!(joined.columns(), &[label("A"), label("B")]);
        assert_eq!(joined.value(0, &label("B")), None);
        assert_eq!(joined.value(1, &label("B")), Some("9"));
    }

    #[test]
    fn left_join_rejects_overlapping_columns() {
        let left = row(2019, city("indio"), &[("A", "1")]);
        let right = row(2019, city("indio"), &[("A", "2")]);
        let err = left.left_join(&right).unwrap_err();
        assert_eq!(
            err,
            JoinError::OverlappingColumns {
                columns: vec!["CONCEPT Estimate A".to_string()]
            }
        );
    }

    #[test]
    fn left_join_rejects_mismatched_location_keys() {
        let left = row(2019, city("indio"), &[("A", "1")]);
        let right = row(2019, ResolvedLocation::default(), &[("B", "2")]);
        assert_eq!(left.left_join(&right).unwrap_err(), JoinError::KeyMismatch);
    }

    #[test]
    fn left_join_rejects_duplicate_right_keys() {
        let left = row(2019, city("indio"), &[("A", "1")]);
        let right = Table::concat([
            row(2019, city("indio"), &[("B", "2")]),
            row(2019, city("indio"), &[("B", "3")]),
        ]);
        assert_eq!(
            left.left_join(&right).unwrap_err(),
            JoinError::DuplicateKey {
                year: 2019,
                location_key: "ca indio".to_string(),
            }
        );
    }

    #[test]
    fn left_join_on_year_alone_without_locations() {
        let nowhere = ResolvedLocation::default;
        let left = Table::concat([
            row(2018, nowhere(), &[("A", "1")]),
            row(2019, nowhere(), &[("A", "2")]),
        ]);
        let right = row(2019, nowhere(), &[("B", "9")]);

        let joined = left.left_join(&right).unwrap();
        assert!(!joined.has_location());
        assert_eq!(joined.value(0, &label("B")), None);
        assert_eq!(joined.value(1, &label("B")), Some("9"));
        assert_eq!(
            joined.header(),
            vec!["year", "CONCEPT Estimate A", "CONCEPT Estimate B"]
        );
    }

    #[test]
    fn header_and_records_line_up() {
        let table = row(2019, city("indio"), &[("A", "1")]);
        assert_eq!(
            table.header(),
            vec!["year", "state", "city", "location_key", "CONCEPT Estimate A"]
        );
        let records: Vec<Vec<String>> = table.records().collect();
        assert_eq!(records, vec![vec!["2019", "ca", "indio", "ca indio", "1"]]);
    }
}

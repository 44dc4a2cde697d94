//! CSV rendering of fetched tables.

use std::io::Write;
use std::path::{Path, PathBuf};

use lowe_acs_models::Table;

/// Writes `table` as CSV: the header from [`Table::header`] followed by
/// one record per row.
///
/// # Errors
///
/// Returns [`csv::Error`] if writing fails.
pub fn write_csv<W: Write>(table: &Table, writer: W) -> Result<(), csv::Error> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(table.header())?;
    for record in table.records() {
        csv.write_record(&record)?;
    }
    csv.flush()?;
    Ok(())
}

/// Output path for one variable's table when tables are not joined:
/// `out/poverty.csv` becomes `out/poverty_S1701.csv`.
#[must_use]
pub fn per_variable_path(base: &Path, variable: &str) -> PathBuf {
    let stem = base
        .file_stem()
        .map_or_else(|| "acs".into(), |stem| stem.to_string_lossy());
    let extension = base
        .extension()
        .map_or_else(|| "csv".into(), |ext| ext.to_string_lossy());
    base.with_file_name(format!("{stem}_{variable}.{extension}"))
}

#[cfg(test)]
mod tests {
    use lowe_acs_models::{ConceptLabel, ResultRow};
    use lowe_geography_models::ResolvedLocation;

    use super::*;

    #[test]
    fn csv_has_header_and_rows() {
        let table = Table::from(ResultRow {
            year: 2019,
            location: ResolvedLocation {
                state: Some("ca".to_string()),
                city: Some("palm springs".to_string()),
                ..ResolvedLocation::default()
            },
            values: vec![(
                ConceptLabel::new("POVERTY", "Estimate!!Total"),
                "47427".to_string(),
            )],
        });

        let mut out = Vec::new();
        write_csv(&table, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "year,state,city,location_key,POVERTY Estimate Total\n\
             2019,ca,palm springs,ca palm springs,47427\n"
        );
    }

    #[test]
    fn per_variable_paths() {
        assert_eq!(
            per_variable_path(Path::new("out/poverty.csv"), "S1701"),
            PathBuf::from("out/poverty_S1701.csv")
        );
        assert_eq!(
            per_variable_path(Path::new("data"), "B01001"),
            PathBuf::from("data_B01001.csv")
        );
    }
}

//! Wide-to-long transformation and concatenation of the category tables.
//!
//! Each enriched table melts into one row per (code, attribute, value),
//! tagged with its source category and carrying the identity columns
//! (name, biome, coordinates) redundantly on every row so the map can
//! filter per attribute without re-joining.

use std::fmt;

use log::warn;
use thiserror::Error;

use crate::core::table::{Table, TableError, Value};

/// Errors raised by the long-form transformer.
#[derive(Error, Debug)]
pub enum MeltError {
    #[error("cannot concatenate: table {index} has columns {found:?}, expected {expected:?}")]
    ColumnMismatch {
        index: usize,
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("nothing to concatenate")]
    Empty,

    #[error(transparent)]
    Table(#[from] TableError),
}

/// Result type for melt operations.
pub type Result<T> = std::result::Result<T, MeltError>;

/// Identity columns kept fixed (not melted) on every long row.
pub const IDENTITY_COLUMNS: &[&str] =
    &["ecoregion_name", "code", "biome", "longitude", "latitude"];

/// Source category of a long-table row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Species,
    Climate,
    Ecoregion,
}

impl Category {
    /// All categories, in selector order.
    pub const ALL: [Category; 3] = [Category::Species, Category::Climate, Category::Ecoregion];

    /// Display label used in the long table and the map selector.
    pub fn label(&self) -> &'static str {
        match self {
            Category::Species => "Species Data",
            Category::Climate => "Climate Data",
            Category::Ecoregion => "Ecoregion Data",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Column names of the unified long table.
fn long_columns() -> Vec<String> {
    [
        "code",
        "ecoregion_name",
        "biome",
        "longitude",
        "latitude",
        "category",
        "attribute",
        "value",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Melt one enriched table into long form.
///
/// Every column outside [`IDENTITY_COLUMNS`] becomes (attribute, value)
/// rows; values travel as-is, no re-parsing through text. Each output row
/// is tagged with the category label.
///
/// # Errors
///
/// Returns an error if an identity column is absent.
pub fn melt(table: &Table, category: Category) -> Result<Table> {
    let identity_indices: Vec<usize> = IDENTITY_COLUMNS
        .iter()
        .map(|c| table.require_column(c))
        .collect::<std::result::Result<_, _>>()?;

    let attribute_indices: Vec<usize> = (0..table.n_cols())
        .filter(|i| !identity_indices.contains(i))
        .collect();
    if attribute_indices.is_empty() {
        warn!(
            "{} table has no attribute columns beyond the identity set",
            category
        );
    }

    let code_idx = table.require_column("code")?;
    let name_idx = table.require_column("ecoregion_name")?;
    let biome_idx = table.require_column("biome")?;
    let lon_idx = table.require_column("longitude")?;
    let lat_idx = table.require_column("latitude")?;

    let mut out = Table::new(long_columns())?;
    for row in table.rows() {
        for &attr_idx in &attribute_indices {
            out.push_row(vec![
                row[code_idx].clone(),
                row[name_idx].clone(),
                row[biome_idx].clone(),
                row[lon_idx].clone(),
                row[lat_idx].clone(),
                Value::Text(category.label().to_string()),
                Value::Text(table.columns()[attr_idx].clone()),
                row[attr_idx].clone(),
            ])?;
        }
    }
    Ok(out)
}

/// Concatenate long tables into one.
///
/// All inputs must share the long-table schema; differing attribute sets
/// across categories are expected since rows are per-attribute.
pub fn concat_long(tables: &[Table]) -> Result<Table> {
    let first = tables.first().ok_or(MeltError::Empty)?;
    let expected = first.columns().to_vec();

    let mut out = Table::new(expected.clone())?;
    for (index, table) in tables.iter().enumerate() {
        if table.columns() != expected.as_slice() {
            return Err(MeltError::ColumnMismatch {
                index,
                expected,
                found: table.columns().to_vec(),
            });
        }
        for row in table.rows() {
            out.push_row(row.to_vec())?;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::climate::pivot_wider;
    use crate::processors::join::join_required;

    fn enriched_table() -> Table {
        let mut t = Table::new(
            [
                "code",
                "rain_S",
                "rain_W",
                "ecoregion_name",
                "biome",
                "longitude",
                "latitude",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        )
        .unwrap();
        t.push_row(vec![
            Value::Text("A".into()),
            Value::Number(1200.0),
            Value::Number(900.0),
            Value::Text("North".into()),
            Value::Text("Grasslands".into()),
            Value::Number(47.9),
            Value::Number(-18.4),
        ])
        .unwrap();
        t
    }

    #[test]
    fn test_melt_shape() {
        let long = melt(&enriched_table(), Category::Climate).unwrap();

        // One row per non-identity column
        assert_eq!(long.n_rows(), 2);
        assert_eq!(
            long.get(0, "attribute"),
            Some(&Value::Text("rain_S".into()))
        );
        assert_eq!(long.get(0, "value"), Some(&Value::Number(1200.0)));
        assert_eq!(
            long.get(0, "category"),
            Some(&Value::Text("Climate Data".into()))
        );
        // Identity columns replicated on every row
        assert_eq!(long.get(1, "biome"), Some(&Value::Text("Grasslands".into())));
        assert_eq!(long.get(1, "latitude"), Some(&Value::Number(-18.4)));
    }

    #[test]
    fn test_melt_missing_identity_column() {
        let t = Table::new(vec!["code".to_string(), "rain_S".to_string()]).unwrap();
        assert!(matches!(
            melt(&t, Category::Climate),
            Err(MeltError::Table(TableError::MissingColumn(_)))
        ));
    }

    #[test]
    fn test_concat_long() {
        let a = melt(&enriched_table(), Category::Climate).unwrap();
        let b = melt(&enriched_table(), Category::Ecoregion).unwrap();

        let combined = concat_long(&[a, b]).unwrap();
        assert_eq!(combined.n_rows(), 4);
        let categories: Vec<String> = combined
            .rows()
            .map(|r| r[5].to_string())
            .collect();
        assert!(categories.contains(&"Climate Data".to_string()));
        assert!(categories.contains(&"Ecoregion Data".to_string()));
    }

    #[test]
    fn test_concat_long_schema_mismatch() {
        let a = melt(&enriched_table(), Category::Climate).unwrap();
        let b = Table::new(vec!["code".to_string()]).unwrap();
        assert!(matches!(
            concat_long(&[a, b]),
            Err(MeltError::ColumnMismatch { index: 1, .. })
        ));
    }

    #[test]
    fn test_climate_round_trip() {
        // long (code, type, measure) -> wide -> melt reproduces the triples
        let mut source = Table::new(vec![
            "code".to_string(),
            "type".to_string(),
            "measure".to_string(),
        ])
        .unwrap();
        let triples = [
            ("A", "rain_S", 1200.0),
            ("A", "temp_S", 21.5),
            ("B", "rain_S", 400.0),
            ("B", "temp_S", 26.0),
        ];
        for (code, ty, measure) in triples {
            source
                .push_row(vec![
                    Value::Text(code.into()),
                    Value::Text(ty.into()),
                    Value::Number(measure),
                ])
                .unwrap();
        }

        let wide = pivot_wider(&source, "code", "type", "measure").unwrap();

        // Attach the identity columns the melt expects
        let mut metadata = Table::new(
            ["code", "ecoregion_name", "biome", "longitude", "latitude"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
        .unwrap();
        for (code, lon) in [("A", 47.9), ("B", 44.1)] {
            metadata
                .push_row(vec![
                    Value::Text(code.into()),
                    Value::Text("Somewhere".into()),
                    Value::Text("Grasslands".into()),
                    Value::Number(lon),
                    Value::Number(-20.0),
                ])
                .unwrap();
        }
        let enriched = join_required(&wide, &metadata, "code").unwrap();

        let long = melt(&enriched, Category::Climate).unwrap();

        let mut recovered: Vec<(String, String, f64)> = long
            .rows()
            .map(|r| {
                (
                    r[0].to_string(),
                    r[6].to_string(),
                    r[7].as_f64().unwrap(),
                )
            })
            .collect();
        recovered.sort_by(|a, b| (a.0.clone(), a.1.clone()).cmp(&(b.0.clone(), b.1.clone())));

        let mut expected: Vec<(String, String, f64)> = triples
            .iter()
            .map(|(c, t, m)| (c.to_string(), t.to_string(), *m))
            .collect();
        expected.sort_by(|a, b| (a.0.clone(), a.1.clone()).cmp(&(b.0.clone(), b.1.clone())));

        assert_eq!(recovered, expected);
    }
}

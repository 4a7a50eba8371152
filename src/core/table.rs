//! In-memory tabular data model.
//!
//! Every pipeline stage consumes and produces [`Table`] values: an ordered
//! set of named columns with one [`Value`] per cell. Tables are built once
//! by a loader and then only transformed into new tables, never mutated in
//! place by later stages.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Errors raised by table construction and transformation.
#[derive(Error, Debug)]
pub enum TableError {
    #[error("duplicate column name: {0}")]
    DuplicateColumn(String),

    #[error("row {row} has {found} fields, expected {expected}")]
    WidthMismatch {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("missing required column: {0}")]
    MissingColumn(String),

    #[error("column position {position} out of range for table with {width} columns")]
    PositionOutOfRange { position: usize, width: usize },

    #[error("expected column '{expected}' at position {position}, found '{found}'")]
    PositionalMismatch {
        position: usize,
        expected: String,
        found: String,
    },
}

/// Result type for table operations.
pub type Result<T> = std::result::Result<T, TableError>;

/// A single cell value.
///
/// Numeric literals are parsed exactly once, at load time; everything else
/// stays text. Missing cells are explicit rather than empty strings so that
/// downstream stages never have to guess.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Text(String),
    Missing,
}

impl Value {
    /// Parse a raw field into a value.
    ///
    /// Empty fields and the conventional NA markers become [`Value::Missing`];
    /// anything that parses as a float becomes [`Value::Number`]; the rest is
    /// kept verbatim as [`Value::Text`].
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == "NA" || trimmed == "NaN" {
            return Value::Missing;
        }
        match trimmed.parse::<f64>() {
            Ok(n) if n.is_finite() => Value::Number(n),
            _ => Value::Text(trimmed.to_string()),
        }
    }

    /// Returns the numeric content, if any.
    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the text content, if any.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    #[inline]
    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    /// Canonical string form used as a join key.
    ///
    /// Numbers format through `Display`, so "12" and "12.0" in different
    /// source files produce the same key.
    pub fn to_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::Text(s) => write!(f, "{}", s),
            Value::Missing => Ok(()),
        }
    }
}

/// An ordered collection of named columns with uniform-width rows.
#[derive(Debug, Clone)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Create an empty table with the given column names.
    ///
    /// # Errors
    ///
    /// Returns an error if two columns share a name.
    pub fn new(columns: Vec<String>) -> Result<Self> {
        for (i, name) in columns.iter().enumerate() {
            if columns[..i].contains(name) {
                return Err(TableError::DuplicateColumn(name.clone()));
            }
        }
        Ok(Self {
            columns,
            rows: Vec::new(),
        })
    }

    /// Append a row.
    ///
    /// # Errors
    ///
    /// Returns an error if the row width does not match the column count.
    pub fn push_row(&mut self, row: Vec<Value>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(TableError::WidthMismatch {
                row: self.rows.len() + 1,
                expected: self.columns.len(),
                found: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    /// Column names, in order.
    #[inline]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[inline]
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Index of a column that must exist.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::MissingColumn`] if absent.
    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| TableError::MissingColumn(name.to_string()))
    }

    /// Borrow a row by index.
    pub fn row(&self, index: usize) -> Option<&[Value]> {
        self.rows.get(index).map(|r| r.as_slice())
    }

    /// Iterate over rows.
    pub fn rows(&self) -> impl Iterator<Item = &[Value]> {
        self.rows.iter().map(|r| r.as_slice())
    }

    /// Cell lookup by row index and column name.
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let col = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(col))
    }

    /// New table keeping only the named columns, in the given order.
    ///
    /// # Errors
    ///
    /// Returns an error if any requested column is absent.
    pub fn select(&self, names: &[&str]) -> Result<Table> {
        let indices: Vec<usize> = names
            .iter()
            .map(|n| self.require_column(n))
            .collect::<Result<_>>()?;

        let mut out = Table::new(names.iter().map(|n| n.to_string()).collect())?;
        for row in &self.rows {
            let selected: Vec<Value> = indices.iter().map(|&i| row[i].clone()).collect();
            out.push_row(selected)?;
        }
        Ok(out)
    }

    /// New table with one column renamed.
    ///
    /// # Errors
    ///
    /// Returns an error if `from` is absent or `to` already exists.
    pub fn rename(&self, from: &str, to: &str) -> Result<Table> {
        let idx = self.require_column(from)?;
        if from != to && self.column_index(to).is_some() {
            return Err(TableError::DuplicateColumn(to.to_string()));
        }
        let mut renamed = self.clone();
        renamed.columns[idx] = to.to_string();
        Ok(renamed)
    }

    /// New table with a run of columns renamed by position, validating the
    /// raw header found at each position.
    ///
    /// `start` is the 1-indexed position of the first rename. Each entry of
    /// `renames` is `(expected_raw_name, canonical_name)`; if the column at a
    /// position is not the expected raw name the rename fails loudly instead
    /// of silently relabeling whatever happens to sit there.
    ///
    /// # Errors
    ///
    /// Returns an error if a position is out of range or a raw header does
    /// not match its expectation.
    pub fn rename_positional(&self, start: usize, renames: &[(&str, &str)]) -> Result<Table> {
        let mut renamed = self.clone();
        for (offset, (expected, canonical)) in renames.iter().enumerate() {
            let position = start + offset;
            let idx = position
                .checked_sub(1)
                .filter(|&i| i < self.columns.len())
                .ok_or(TableError::PositionOutOfRange {
                    position,
                    width: self.columns.len(),
                })?;
            let found = &self.columns[idx];
            if found != expected {
                return Err(TableError::PositionalMismatch {
                    position,
                    expected: expected.to_string(),
                    found: found.clone(),
                });
            }
            renamed.columns[idx] = canonical.to_string();
        }
        Ok(renamed)
    }

    /// Join keys for the given column, in row order.
    ///
    /// # Errors
    ///
    /// Returns an error if the column is absent.
    pub fn key_column(&self, name: &str) -> Result<Vec<String>> {
        let idx = self.require_column(name)?;
        Ok(self.rows.iter().map(|r| r[idx].to_key()).collect())
    }
}

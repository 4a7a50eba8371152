//! Climate table normalization: measurement-type cleanup and the
//! long-to-wide pivot.
//!
//! The climate source arrives long: one row per (code, type, measure).
//! Downstream stages need one row per location, so each distinct
//! measurement type becomes its own column.

use std::collections::HashMap;

use thiserror::Error;

use crate::core::table::{Table, TableError, Value};

/// Errors raised while normalizing the climate table.
#[derive(Error, Debug)]
pub enum PivotError {
    /// Two rows carry the same (key, type) pair. The measurement is
    /// ambiguous, so the input is rejected rather than letting one row
    /// win silently.
    #[error("duplicate measurement for code '{key}', type '{name}'")]
    DuplicateKey { key: String, name: String },

    #[error("row with code '{key}' has an empty measurement type")]
    EmptyName { key: String },

    #[error(transparent)]
    Table(#[from] TableError),
}

/// Result type for pivot operations.
pub type Result<T> = std::result::Result<T, PivotError>;

/// Replace literal `.` with `_` in every text value of the given column.
///
/// Measurement types like `rain.S` become `rain_S` so they are usable as
/// column names after the pivot.
pub fn clean_type_labels(table: &Table, column: &str) -> Result<Table> {
    let idx = table.require_column(column)?;

    let mut out = Table::new(table.columns().to_vec())?;
    for row in table.rows() {
        let mut cleaned = row.to_vec();
        if let Value::Text(s) = &cleaned[idx] {
            cleaned[idx] = Value::Text(s.replace('.', "_"));
        }
        out.push_row(cleaned)?;
    }
    Ok(out)
}

/// Pivot a long table wide: one row per key, one column per distinct name.
///
/// Key order and column order both follow first appearance in the input.
/// A key missing a (key, name) combination gets [`Value::Missing`] in that
/// cell; a duplicated combination is a contract violation and fails the
/// pivot.
///
/// # Arguments
///
/// * `table` - Long-format input
/// * `key` - Column identifying the entity (one output row per value)
/// * `name_col` - Column whose distinct values become output columns
/// * `value_col` - Column providing the cell values
///
/// # Errors
///
/// Returns an error if a required column is absent, a name value is empty,
/// or a (key, name) pair occurs twice.
pub fn pivot_wider(table: &Table, key: &str, name_col: &str, value_col: &str) -> Result<Table> {
    let key_idx = table.require_column(key)?;
    let name_idx = table.require_column(name_col)?;
    let value_idx = table.require_column(value_col)?;

    // First pass: key order and column order, both first-seen
    let mut key_order: Vec<String> = Vec::new();
    let mut key_pos: HashMap<String, usize> = HashMap::new();
    let mut name_order: Vec<String> = Vec::new();
    let mut name_pos: HashMap<String, usize> = HashMap::new();
    for row in table.rows() {
        let k = row[key_idx].to_key();
        if !key_pos.contains_key(&k) {
            key_pos.insert(k.clone(), key_order.len());
            key_order.push(k.clone());
        }
        let name = row[name_idx].to_string();
        if name.is_empty() {
            return Err(PivotError::EmptyName { key: k });
        }
        if !name_pos.contains_key(&name) {
            name_pos.insert(name.clone(), name_order.len());
            name_order.push(name);
        }
    }

    // Second pass: fill cells, rejecting duplicates. A cell written twice
    // means the same (key, type) pair occurred twice in the input.
    let mut cells: Vec<Vec<Option<Value>>> = vec![vec![None; name_order.len()]; key_order.len()];
    for row in table.rows() {
        let k = row[key_idx].to_key();
        let name = row[name_idx].to_string();
        let cell = &mut cells[key_pos[&k]][name_pos[&name]];
        if cell.is_some() {
            return Err(PivotError::DuplicateKey { key: k, name });
        }
        *cell = Some(row[value_idx].clone());
    }

    let mut columns = Vec::with_capacity(name_order.len() + 1);
    columns.push(key.to_string());
    columns.extend(name_order);
    let mut out = Table::new(columns)?;

    for (k, row_cells) in key_order.into_iter().zip(cells) {
        let mut row = Vec::with_capacity(row_cells.len() + 1);
        row.push(Value::Text(k));
        row.extend(row_cells.into_iter().map(|c| c.unwrap_or(Value::Missing)));
        out.push_row(row)?;
    }
    Ok(out)
}

/// Normalize the climate source: clean the `type` labels, then pivot wide
/// on `code`.
pub fn normalize_climate(table: &Table) -> Result<Table> {
    let cleaned = clean_type_labels(table, "type")?;
    pivot_wider(&cleaned, "code", "type", "measure")
}

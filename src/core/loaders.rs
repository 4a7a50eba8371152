//! Data loaders for the raw ecoregion, climate, and species sources.
//!
//! This module provides parsers for:
//! - Whitespace-delimited ecoregion text files (metadata + coordinates)
//! - CSV files with header rows (climate measurements, species counts)
//! - The two-column biome abbreviation key
//!
//! All headers are normalized to snake_case on load so every later stage
//! works against one naming convention. A malformed row aborts the load
//! with the file, line, and expected shape; there is no partial recovery.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use thiserror::Error;

use super::table::{Table, TableError, Value};

/// Errors that can occur during file loading.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV parsing error in '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("empty file: {0}")]
    EmptyFile(PathBuf),

    #[error("'{path}' line {line}: row has {found} fields, expected {expected}")]
    RowWidth {
        path: PathBuf,
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("'{path}' record {record}: biome key rows need an abbreviation and a meaning")]
    BadKeyRow { path: PathBuf, record: usize },

    #[error("invalid table in '{path}': {source}")]
    Table {
        path: PathBuf,
        #[source]
        source: TableError,
    },
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Raw-vs-canonical header pairs for ecoregion columns 6-11 (1-indexed).
///
/// The rename is validated by name, not applied blindly by position: if the
/// source file is reordered, loading fails instead of mislabeling columns.
const ECOREGION_RENAMES: &[(&str, &str)] = &[
    ("rain_s", "rain_south"),
    ("rain_w", "rain_west"),
    ("temp_s", "temp_south"),
    ("temp_w", "temp_west"),
    ("patch_n", "patch_num"),
    ("elev_max", "mad_elev"),
];

/// First 1-indexed position covered by [`ECOREGION_RENAMES`].
const ECOREGION_RENAME_START: usize = 6;

/// Normalize a raw header name to snake_case.
///
/// Lowercases, maps every non-alphanumeric run to a single underscore, and
/// trims leading/trailing underscores, so `"Rain.S"` and `"rain s"` both
/// become `"rain_s"`.
pub fn normalize_header(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last_underscore = true;
    for ch in raw.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
            last_underscore = false;
        } else if !last_underscore {
            out.push('_');
            last_underscore = true;
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

fn open(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path).map_err(|e| LoaderError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(BufReader::new(file))
}

fn table_err(path: &Path) -> impl FnOnce(TableError) -> LoaderError + '_ {
    move |source| LoaderError::Table {
        path: path.to_path_buf(),
        source,
    }
}

/// Load a whitespace-delimited text table.
///
/// The first non-empty line is the header; its names are normalized to
/// snake_case. Every following non-empty line must split into exactly as
/// many fields as the header.
///
/// # Arguments
///
/// * `path` - Path to the text file
///
/// # Errors
///
/// Returns an error if the file cannot be read, is empty, or contains a row
/// whose field count differs from the header.
pub fn load_whitespace_table<P: AsRef<Path>>(path: P) -> Result<Table> {
    let path = path.as_ref();
    let reader = open(path)?;

    let mut table: Option<Table> = None;
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| LoaderError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }

        match table.as_mut() {
            None => {
                let columns = fields.iter().map(|f| normalize_header(f)).collect();
                table = Some(Table::new(columns).map_err(table_err(path))?);
            }
            Some(t) => {
                if fields.len() != t.n_cols() {
                    return Err(LoaderError::RowWidth {
                        path: path.to_path_buf(),
                        line: line_no + 1,
                        expected: t.n_cols(),
                        found: fields.len(),
                    });
                }
                let row = fields.iter().map(|f| Value::parse(f)).collect();
                t.push_row(row).map_err(table_err(path))?;
            }
        }
    }

    match table {
        Some(t) if !t.is_empty() => Ok(t),
        _ => Err(LoaderError::EmptyFile(path.to_path_buf())),
    }
}

/// Load a CSV file with a header row into a table.
///
/// Header names are normalized to snake_case. The reader is strict about
/// field counts: a record with the wrong number of fields aborts the load.
///
/// # Errors
///
/// Returns an error if the file cannot be read, parsed, or is empty.
pub fn load_csv_table<P: AsRef<Path>>(path: P) -> Result<Table> {
    let path = path.as_ref();
    let reader = open(path)?;
    let mut csv_reader = ReaderBuilder::new().has_headers(true).from_reader(reader);

    let headers = csv_reader.headers().map_err(|e| LoaderError::Csv {
        path: path.to_path_buf(),
        source: e,
    })?;
    let columns: Vec<String> = headers.iter().map(normalize_header).collect();
    let mut table = Table::new(columns).map_err(table_err(path))?;

    for result in csv_reader.records() {
        let record = result.map_err(|e| LoaderError::Csv {
            path: path.to_path_buf(),
            source: e,
        })?;
        let row = record.iter().map(Value::parse).collect();
        table.push_row(row).map_err(table_err(path))?;
    }

    if table.is_empty() {
        return Err(LoaderError::EmptyFile(path.to_path_buf()));
    }
    Ok(table)
}

/// Load the ecoregion metadata table and apply the canonical column names.
///
/// The source carries short rainfall/temperature/patch/elevation headers in
/// columns 6-11; these are renamed to `rain_south`, `rain_west`,
/// `temp_south`, `temp_west`, `patch_num`, and `mad_elev`. The rename
/// validates the raw header found at each position and fails loudly on a
/// reordered or unexpected source file.
pub fn load_ecoregion_table<P: AsRef<Path>>(path: P) -> Result<Table> {
    let path = path.as_ref();
    let raw = load_whitespace_table(path)?;
    raw.rename_positional(ECOREGION_RENAME_START, ECOREGION_RENAMES)
        .map_err(table_err(path))
}

/// Load the biome abbreviation key: ordered (abbreviation, meaning) pairs.
///
/// File order is substitution precedence, so the returned list preserves it.
///
/// # Errors
///
/// Returns an error if a row lacks either field or the file is empty.
pub fn load_biome_rules<P: AsRef<Path>>(path: P) -> Result<Vec<(String, String)>> {
    let path = path.as_ref();
    let reader = open(path)?;
    let mut csv_reader = ReaderBuilder::new().has_headers(true).from_reader(reader);

    let mut rules = Vec::new();
    for (i, result) in csv_reader.records().enumerate() {
        let record = result.map_err(|e| LoaderError::Csv {
            path: path.to_path_buf(),
            source: e,
        })?;
        let abbrev = record.get(0).map(str::trim).unwrap_or("");
        let meaning = record.get(1).map(str::trim).unwrap_or("");
        if abbrev.is_empty() || meaning.is_empty() {
            return Err(LoaderError::BadKeyRow {
                path: path.to_path_buf(),
                record: i + 1,
            });
        }
        rules.push((abbrev.to_string(), meaning.to_string()));
    }

    if rules.is_empty() {
        return Err(LoaderError::EmptyFile(path.to_path_buf()));
    }
    Ok(rules)
}

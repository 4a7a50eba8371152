//! Relational joins on the shared location code, the three-way merge, and
//! metadata redistribution.
//!
//! Two join flavors exist: [`inner_join`] keeps only matching rows (the
//! merge semantics), while [`join_required`] demands a match for every left
//! row and fails listing the unmatched codes - used when re-attaching
//! coordinates and biome metadata, where a silently shrinking table would
//! hide missing mandatory data.

use std::collections::{HashMap, HashSet};

use log::debug;
use thiserror::Error;

use crate::core::table::{Table, TableError, Value};

/// Errors raised by join operations.
#[derive(Error, Debug)]
pub enum JoinError {
    #[error("duplicate join key '{key}' in {side} table")]
    DuplicateKey { side: String, key: String },

    #[error("{count} row(s) have no match on '{key}': {examples}")]
    UnmatchedKeys {
        key: String,
        count: usize,
        examples: String,
    },

    #[error(
        "three-way join on '{key}' produced no rows \
         (climate: {climate} rows, ecoregion: {ecoregion} rows, species: {species} rows; \
         overlaps climate/ecoregion: {climate_ecoregion}, climate/species: {climate_species}, \
         ecoregion/species: {ecoregion_species})"
    )]
    NoOverlap {
        key: String,
        climate: usize,
        ecoregion: usize,
        species: usize,
        climate_ecoregion: usize,
        climate_species: usize,
        ecoregion_species: usize,
    },

    #[error(transparent)]
    Table(#[from] TableError),
}

/// Result type for join operations.
pub type Result<T> = std::result::Result<T, JoinError>;

/// Output of [`redistribute_metadata`]: the three normalized tables, each
/// carrying coordinates and biome metadata.
#[derive(Debug, Clone)]
pub struct EnrichedTables {
    pub climate: Table,
    pub ecoregion: Table,
    pub species: Table,
}

fn keyed_rows<'t>(table: &'t Table, key: &str, side: &str) -> Result<HashMap<String, &'t [Value]>> {
    let key_idx = table.require_column(key)?;
    let mut map = HashMap::with_capacity(table.n_rows());
    for row in table.rows() {
        let k = row[key_idx].to_key();
        if map.insert(k.clone(), row).is_some() {
            return Err(JoinError::DuplicateKey {
                side: side.to_string(),
                key: k,
            });
        }
    }
    Ok(map)
}

fn join_impl(left: &Table, right: &Table, key: &str, require_all: bool) -> Result<Table> {
    let left_key = left.require_column(key)?;
    let right_key = right.require_column(key)?;
    let right_map = keyed_rows(right, key, "right")?;

    // Right columns carried into the result: everything except the key and
    // any name the left side already has. The denormalized metadata is
    // identical per code across sources, so dropping the collision is
    // lossless.
    let kept: Vec<usize> = right
        .columns()
        .iter()
        .enumerate()
        .filter(|(i, name)| *i != right_key && left.column_index(name).is_none())
        .map(|(i, _)| i)
        .collect();
    for (i, name) in right.columns().iter().enumerate() {
        if i != right_key && !kept.contains(&i) {
            debug!("join on '{}': dropping duplicate column '{}'", key, name);
        }
    }

    let mut columns = left.columns().to_vec();
    columns.extend(kept.iter().map(|&i| right.columns()[i].clone()));
    let mut out = Table::new(columns)?;

    let mut seen: HashSet<String> = HashSet::with_capacity(left.n_rows());
    let mut unmatched: Vec<String> = Vec::new();
    for row in left.rows() {
        let k = row[left_key].to_key();
        if !seen.insert(k.clone()) {
            return Err(JoinError::DuplicateKey {
                side: "left".to_string(),
                key: k,
            });
        }
        match right_map.get(&k) {
            Some(right_row) => {
                let mut merged = row.to_vec();
                merged.extend(kept.iter().map(|&i| right_row[i].clone()));
                out.push_row(merged)?;
            }
            None => unmatched.push(k),
        }
    }

    if require_all && !unmatched.is_empty() {
        let count = unmatched.len();
        let examples = unmatched
            .iter()
            .take(10)
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");
        return Err(JoinError::UnmatchedKeys {
            key: key.to_string(),
            count,
            examples,
        });
    }
    Ok(out)
}

/// Inner join on an exact key match.
///
/// Rows without a partner on the other side are dropped. The key must be
/// unique on both sides.
pub fn inner_join(left: &Table, right: &Table, key: &str) -> Result<Table> {
    join_impl(left, right, key, false)
}

/// Join that requires a match for every left row.
///
/// Fails with the unmatched key values instead of silently shrinking the
/// left table.
pub fn join_required(left: &Table, right: &Table, key: &str) -> Result<Table> {
    join_impl(left, right, key, true)
}

fn key_set(table: &Table, key: &str) -> Result<HashSet<String>> {
    Ok(table.key_column(key)?.into_iter().collect())
}

/// Merge climate, ecoregion, and species into one wide table.
///
/// Inner join on `key`, so only codes present in all three sources survive.
/// A zero-row result is a pipeline error carrying per-source row counts and
/// pairwise overlaps, so the disjoint source is identifiable.
pub fn merge_tables(climate: &Table, ecoregion: &Table, species: &Table, key: &str) -> Result<Table> {
    let merged = inner_join(&inner_join(climate, ecoregion, key)?, species, key)?;
    if !merged.is_empty() {
        return Ok(merged);
    }

    let climate_keys = key_set(climate, key)?;
    let ecoregion_keys = key_set(ecoregion, key)?;
    let species_keys = key_set(species, key)?;
    Err(JoinError::NoOverlap {
        key: key.to_string(),
        climate: climate.n_rows(),
        ecoregion: ecoregion.n_rows(),
        species: species.n_rows(),
        climate_ecoregion: climate_keys.intersection(&ecoregion_keys).count(),
        climate_species: climate_keys.intersection(&species_keys).count(),
        ecoregion_species: ecoregion_keys.intersection(&species_keys).count(),
    })
}

/// New table keeping only rows whose key value is in `keys`.
///
/// Used to restrict each normalized table to the merged code set before
/// metadata redistribution, so the required joins there only fail on
/// genuinely missing metadata.
pub fn restrict_to_keys(table: &Table, key: &str, keys: &HashSet<String>) -> Result<Table> {
    let key_idx = table.require_column(key)?;
    let mut out = Table::new(table.columns().to_vec())?;
    for row in table.rows() {
        if keys.contains(&row[key_idx].to_key()) {
            out.push_row(row.to_vec())?;
        }
    }
    Ok(out)
}

/// Re-attach coordinates and biome metadata to each normalized table.
///
/// Coordinates come from the ecoregion table, biome metadata from the
/// species table. Every join is required: a location missing either side
/// table is an input error, not a row to drop.
pub fn redistribute_metadata(
    climate: &Table,
    ecoregion: &Table,
    species: &Table,
    key: &str,
) -> Result<EnrichedTables> {
    let coordinates = ecoregion.select(&[key, "longitude", "latitude"])?;
    let biome_metadata = species.select(&[key, "ecoregion_name", "biome"])?;

    Ok(EnrichedTables {
        climate: join_required(
            &join_required(climate, &biome_metadata, key)?,
            &coordinates,
            key,
        )?,
        ecoregion: join_required(ecoregion, &biome_metadata, key)?,
        species: join_required(species, &coordinates, key)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::table::Value;

    fn table(columns: &[&str], rows: &[&[&str]]) -> Table {
        let mut t = Table::new(columns.iter().map(|c| c.to_string()).collect()).unwrap();
        for row in rows {
            t.push_row(row.iter().map(|v| Value::parse(v)).collect())
                .unwrap();
        }
        t
    }

    #[test]
    fn test_inner_join_drops_non_matching() {
        let left = table(&["code", "rain"], &[&["A", "1200"], &["B", "400"]]);
        let right = table(&["code", "area"], &[&["A", "10"], &["C", "99"]]);

        let joined = inner_join(&left, &right, "code").unwrap();
        assert_eq!(joined.n_rows(), 1);
        assert_eq!(joined.get(0, "code"), Some(&Value::Text("A".into())));
        assert_eq!(joined.get(0, "area"), Some(&Value::Number(10.0)));
    }

    #[test]
    fn test_inner_join_drops_colliding_column() {
        let left = table(&["code", "name"], &[&["A", "North"]]);
        let right = table(&["code", "name", "biome"], &[&["A", "North", "G"]]);

        let joined = inner_join(&left, &right, "code").unwrap();
        assert_eq!(
            joined.columns(),
            &[
                "code".to_string(),
                "name".to_string(),
                "biome".to_string()
            ]
        );
    }

    #[test]
    fn test_inner_join_duplicate_key() {
        let left = table(&["code", "rain"], &[&["A", "1"], &["A", "2"]]);
        let right = table(&["code", "area"], &[&["A", "10"]]);

        assert!(matches!(
            inner_join(&left, &right, "code"),
            Err(JoinError::DuplicateKey { .. })
        ));
    }

    #[test]
    fn test_join_required_reports_unmatched() {
        let left = table(&["code", "rain"], &[&["A", "1"], &["B", "2"], &["C", "3"]]);
        let right = table(&["code", "area"], &[&["A", "10"]]);

        match join_required(&left, &right, "code") {
            Err(JoinError::UnmatchedKeys {
                count, examples, ..
            }) => {
                assert_eq!(count, 2);
                assert!(examples.contains('B'));
                assert!(examples.contains('C'));
            }
            other => panic!("expected UnmatchedKeys, got {:?}", other),
        }
    }

    #[test]
    fn test_merge_tables_union_of_attributes() {
        let climate = table(&["code", "rain_S"], &[&["A", "1200"], &["B", "400"]]);
        let ecoregion = table(
            &["code", "area_km2", "longitude", "latitude"],
            &[&["A", "100", "47.9", "-18.4"], &["B", "55", "44.1", "-22.9"]],
        );
        let species = table(
            &["code", "ecoregion_name", "biome", "total_num"],
            &[&["A", "North", "G", "12"], &["B", "South", "D", "3"]],
        );

        let wide = merge_tables(&climate, &ecoregion, &species, "code").unwrap();
        assert_eq!(wide.n_rows(), 2);
        assert_eq!(
            wide.columns(),
            &[
                "code".to_string(),
                "rain_S".to_string(),
                "area_km2".to_string(),
                "longitude".to_string(),
                "latitude".to_string(),
                "ecoregion_name".to_string(),
                "biome".to_string(),
                "total_num".to_string(),
            ]
        );
    }

    #[test]
    fn test_merge_tables_drops_partial_codes() {
        let climate = table(&["code", "rain_S"], &[&["A", "1"], &["B", "2"], &["C", "3"]]);
        let ecoregion = table(&["code", "area_km2"], &[&["A", "10"], &["B", "20"]]);
        let species = table(&["code", "total_num"], &[&["A", "5"], &["B", "6"]]);

        let wide = merge_tables(&climate, &ecoregion, &species, "code").unwrap();
        let codes = wide.key_column("code").unwrap();
        assert_eq!(codes, vec!["A", "B"]);
    }

    #[test]
    fn test_merge_tables_no_overlap_diagnostic() {
        let climate = table(&["code", "rain_S"], &[&["A", "1"]]);
        let ecoregion = table(&["code", "area_km2"], &[&["A", "10"]]);
        let species = table(&["code", "total_num"], &[&["Z", "5"]]);

        match merge_tables(&climate, &ecoregion, &species, "code") {
            Err(JoinError::NoOverlap {
                climate_ecoregion,
                climate_species,
                ecoregion_species,
                ..
            }) => {
                assert_eq!(climate_ecoregion, 1);
                assert_eq!(climate_species, 0);
                assert_eq!(ecoregion_species, 0);
            }
            other => panic!("expected NoOverlap, got {:?}", other),
        }
    }

    #[test]
    fn test_redistribute_metadata() {
        let climate = table(&["code", "rain_S"], &[&["A", "1200"]]);
        let ecoregion = table(
            &["code", "ecoregion_name", "area_km2", "longitude", "latitude"],
            &[&["A", "North", "100", "47.9", "-18.4"]],
        );
        let species = table(
            &["code", "biome", "ecoregion_name", "total_num"],
            &[&["A", "Grasslands", "North", "12"]],
        );

        let enriched = redistribute_metadata(&climate, &ecoregion, &species, "code").unwrap();

        // Climate gains biome metadata and coordinates
        assert_eq!(
            enriched.climate.get(0, "biome"),
            Some(&Value::Text("Grasslands".into()))
        );
        assert_eq!(
            enriched.climate.get(0, "longitude"),
            Some(&Value::Number(47.9))
        );
        // Ecoregion gains biome, keeps its own name column
        assert_eq!(
            enriched.ecoregion.get(0, "biome"),
            Some(&Value::Text("Grasslands".into()))
        );
        // Species gains coordinates
        assert_eq!(
            enriched.species.get(0, "latitude"),
            Some(&Value::Number(-18.4))
        );
    }

    #[test]
    fn test_restrict_to_keys() {
        let t = table(&["code", "rain"], &[&["A", "1"], &["B", "2"], &["C", "3"]]);
        let keys: HashSet<String> = ["A", "C"].iter().map(|s| s.to_string()).collect();

        let restricted = restrict_to_keys(&t, "code", &keys).unwrap();
        assert_eq!(restricted.key_column("code").unwrap(), vec!["A", "C"]);
    }

    #[test]
    fn test_redistribute_metadata_missing_coordinates() {
        let climate = table(&["code", "rain_S"], &[&["A", "1200"], &["B", "300"]]);
        let ecoregion = table(
            &["code", "ecoregion_name", "longitude", "latitude"],
            &[&["A", "North", "47.9", "-18.4"], &["B", "South", "44.1", "-22.9"]],
        );
        // Species lacks code B, so biome metadata for B is unobtainable.
        let species = table(
            &["code", "biome", "ecoregion_name"],
            &[&["A", "Grasslands", "North"]],
        );

        assert!(matches!(
            redistribute_metadata(&climate, &ecoregion, &species, "code"),
            Err(JoinError::UnmatchedKeys { .. })
        ));
    }
}

//! Species table normalization: taxon-count renames and biome expansion.
//!
//! Biome labels arrive as short abbreviation codes. Expansion applies an
//! ordered rule list in a single deterministic pass: for each value the
//! first matching rule wins and no further rule is consulted, so a
//! specific multi-letter code can never be corrupted by a looser rule
//! listed after it. The rule order in the key file is the precedence.

use log::warn;
use regex::{NoExpand, Regex};
use thiserror::Error;

use crate::core::table::{Table, TableError, Value};

/// Errors raised while normalizing the species table.
#[derive(Error, Debug)]
pub enum SpeciesError {
    #[error("invalid biome pattern '{pattern}': {source}")]
    BadPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error(transparent)]
    Table(#[from] TableError),
}

/// Result type for species normalization.
pub type Result<T> = std::result::Result<T, SpeciesError>;

/// Raw-vs-canonical header pairs for species columns 4-8 (1-indexed).
const SPECIES_RENAMES: &[(&str, &str)] = &[
    ("birds", "bird_num"),
    ("mammals", "mammal_num"),
    ("reptiles", "reptile_num"),
    ("amphibians", "amphibian_num"),
    ("total", "total_num"),
];

/// First 1-indexed position covered by [`SPECIES_RENAMES`].
const SPECIES_RENAME_START: usize = 4;

/// One compiled biome substitution rule.
#[derive(Debug, Clone)]
pub struct BiomeRule {
    pattern: Regex,
    replacement: String,
}

impl BiomeRule {
    /// Full name this rule expands to.
    pub fn replacement(&self) -> &str {
        &self.replacement
    }
}

/// Compile ordered (abbreviation, meaning) pairs into anchored rules.
///
/// Abbreviations are matched at the start of the value only, so `"Ma"`
/// expands `"Ma"` or `"Ma2"` but never the middle of another code.
///
/// # Errors
///
/// Returns an error if a pattern fails to compile.
pub fn compile_rules(pairs: &[(String, String)]) -> Result<Vec<BiomeRule>> {
    pairs
        .iter()
        .map(|(abbrev, meaning)| {
            let source = format!("^{}", regex::escape(abbrev));
            let pattern = Regex::new(&source).map_err(|e| SpeciesError::BadPattern {
                pattern: abbrev.clone(),
                source: e,
            })?;
            Ok(BiomeRule {
                pattern,
                replacement: meaning.clone(),
            })
        })
        .collect()
}

/// Expand one biome code through the ordered rule list.
///
/// First matching rule wins; the matched prefix is replaced and the rest of
/// the value kept. Already-expanded labels pass through untouched, which
/// makes expansion idempotent. Returns `None` when no rule matches.
pub fn expand_biome(raw: &str, rules: &[BiomeRule]) -> Option<String> {
    if rules.iter().any(|r| r.replacement == raw) {
        return Some(raw.to_string());
    }
    for rule in rules {
        if rule.pattern.is_match(raw) {
            return Some(
                rule.pattern
                    .replace(raw, NoExpand(&rule.replacement))
                    .into_owned(),
            );
        }
    }
    None
}

/// New table with every text value of `column` expanded through the rules.
///
/// Values no rule matches are kept verbatim with a warning; missing values
/// stay missing.
pub fn expand_biomes(table: &Table, column: &str, rules: &[BiomeRule]) -> Result<Table> {
    let idx = table.require_column(column)?;

    let mut out = Table::new(table.columns().to_vec())?;
    for row in table.rows() {
        let mut expanded = row.to_vec();
        if let Value::Text(code) = &expanded[idx] {
            match expand_biome(code, rules) {
                Some(label) => expanded[idx] = Value::Text(label),
                None => warn!("no biome rule matches '{}', keeping it as-is", code),
            }
        }
        out.push_row(expanded)?;
    }
    Ok(out)
}

/// Normalize the species source: canonical taxon-count names, then biome
/// expansion.
///
/// The count renames validate the raw header at each of positions 4-8 and
/// fail loudly if the source columns moved.
pub fn normalize_species(table: &Table, rules: &[BiomeRule]) -> Result<Table> {
    let renamed = table.rename_positional(SPECIES_RENAME_START, SPECIES_RENAMES)?;
    expand_biomes(&renamed, "biome", rules)
}

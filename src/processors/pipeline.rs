//! End-to-end pipeline orchestration.
//!
//! Loads the four sources, normalizes, merges, redistributes metadata,
//! melts, and returns the wide and long tables. Stages are pure table
//! transformations; callers decide what to export or render.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use log::info;

use crate::config::InputConfig;
use crate::core::loaders;
use crate::core::table::Table;
use crate::processors::climate::normalize_climate;
use crate::processors::join::{merge_tables, redistribute_metadata, restrict_to_keys};
use crate::processors::melt::{concat_long, melt, Category};
use crate::processors::species::{compile_rules, normalize_species};

/// The two tables every downstream consumer works from.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// One row per location, union of all attributes.
    pub wide: Table,
    /// One row per (location, attribute), tagged with its category.
    pub long: Table,
}

/// Run the full reshape-and-merge pipeline over a data directory.
///
/// # Arguments
///
/// * `data_dir` - Directory holding the input files
/// * `inputs` - File names within `data_dir`
///
/// # Errors
///
/// Any malformed input, failed join, or zero-overlap merge aborts the run
/// with the offending file or stage in the error chain.
pub fn run_pipeline(data_dir: &Path, inputs: &InputConfig) -> Result<PipelineOutput> {
    let ecoregion_path = data_dir.join(&inputs.ecoregion_file);
    let climate_path = data_dir.join(&inputs.climate_file);
    let species_path = data_dir.join(&inputs.species_file);
    let key_path = data_dir.join(&inputs.biome_key_file);

    info!("loading sources from {}", data_dir.display());
    let ecoregion = loaders::load_ecoregion_table(&ecoregion_path)
        .with_context(|| format!("loading ecoregion table {}", ecoregion_path.display()))?;
    let climate_raw = loaders::load_csv_table(&climate_path)
        .with_context(|| format!("loading climate table {}", climate_path.display()))?;
    let species_raw = loaders::load_csv_table(&species_path)
        .with_context(|| format!("loading species table {}", species_path.display()))?;
    let key_pairs = loaders::load_biome_rules(&key_path)
        .with_context(|| format!("loading biome key {}", key_path.display()))?;
    let rules = compile_rules(&key_pairs).context("compiling biome rules")?;

    info!(
        "loaded {} ecoregion rows, {} climate rows, {} species rows, {} biome rules",
        ecoregion.n_rows(),
        climate_raw.n_rows(),
        species_raw.n_rows(),
        rules.len()
    );

    let climate = normalize_climate(&climate_raw).context("normalizing climate table")?;
    let species = normalize_species(&species_raw, &rules).context("normalizing species table")?;

    let wide =
        merge_tables(&climate, &ecoregion, &species, "code").context("merging source tables")?;
    info!("merged wide table: {} locations", wide.n_rows());

    // Redistribution works on the merged code set: codes outside the
    // three-way intersection are already excluded by the merge semantics,
    // so any unmatched row below means genuinely missing metadata.
    let shared: HashSet<String> = wide.key_column("code")?.into_iter().collect();
    let climate = restrict_to_keys(&climate, "code", &shared)?;
    let ecoregion = restrict_to_keys(&ecoregion, "code", &shared)?;
    let species = restrict_to_keys(&species, "code", &shared)?;

    let enriched = redistribute_metadata(&climate, &ecoregion, &species, "code")
        .context("redistributing coordinates and biome metadata")?;

    let long = concat_long(&[
        melt(&enriched.species, Category::Species)?,
        melt(&enriched.climate, Category::Climate)?,
        melt(&enriched.ecoregion, Category::Ecoregion)?,
    ])
    .context("concatenating long tables")?;
    info!("combined long table: {} rows", long.n_rows());

    Ok(PipelineOutput { wide, long })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    /// Write the minimal synthetic sources: codes A and B everywhere, plus
    /// a code present in only one source.
    fn write_sources(dir: &Path, orphan_in: &str) {
        let mut ecoregion = String::from(
            "code ecoregion.name area.km2 longitude latitude rain.S rain.W temp.S temp.W patch.N elev.max\n",
        );
        ecoregion.push_str("A Anjozorobe 4250 47.94 -18.45 1800 900 21.5 24.0 14 1650\n");
        ecoregion.push_str("B Mikea 3320 43.52 -22.78 420 380 26.0 27.5 6 180\n");
        if orphan_in == "ecoregion" {
            ecoregion.push_str("C Orphan 10 40.0 -20.0 100 100 20.0 20.0 1 50\n");
        }
        fs::write(dir.join("ecoregions.txt"), ecoregion).unwrap();

        let mut climate = String::from("code,type,measure\n");
        for code in ["A", "B"] {
            climate.push_str(&format!("{code},rain.S,1000\n"));
            climate.push_str(&format!("{code},temp.S,22.5\n"));
        }
        if orphan_in == "climate" {
            climate.push_str("C,rain.S,1\nC,temp.S,2\n");
        }
        fs::write(dir.join("climate.csv"), climate).unwrap();

        let mut species =
            String::from("code,biome,ecoregion.name,birds,mammals,reptiles,amphibians,total\n");
        species.push_str("A,TrM,Anjozorobe,120,45,60,80,305\n");
        species.push_str("B,D,Mikea,60,20,75,5,160\n");
        if orphan_in == "species" {
            species.push_str("C,G,Orphan,1,1,1,1,4\n");
        }
        fs::write(dir.join("species.csv"), species).unwrap();

        let key = "abbreviation,meaning\n\
                   TrM,Tropical Moist Forest\n\
                   TrD,Tropical Deciduous Forest\n\
                   Ma,Mangroves\n\
                   G,Grasslands\n\
                   D,Deserts\n";
        fs::write(dir.join("biome_key.csv"), key).unwrap();
    }

    #[test]
    fn test_pipeline_end_to_end() {
        let dir = TempDir::new().unwrap();
        write_sources(dir.path(), "climate");

        let output = run_pipeline(dir.path(), &InputConfig::default()).unwrap();

        // The orphan code C never reaches the wide table
        let codes = output.wide.key_column("code").unwrap();
        assert_eq!(codes, vec!["A", "B"]);

        // Union of attributes from all three sources
        for column in [
            "rain_S",
            "temp_S",
            "area_km2",
            "mad_elev",
            "biome",
            "total_num",
        ] {
            assert!(
                output.wide.column_index(column).is_some(),
                "wide table missing '{}'",
                column
            );
        }

        // Biome codes expanded before the merge
        assert_eq!(
            output.wide.get(0, "biome").map(|v| v.to_string()),
            Some("Tropical Moist Forest".to_string())
        );

        // Long table: every row carries the identity columns and a category
        assert!(!output.long.is_empty());
        let categories: HashSet<String> = output
            .long
            .rows()
            .map(|r| r[5].to_string())
            .collect();
        assert_eq!(categories.len(), 3);
        assert!(categories.contains("Species Data"));
        assert!(categories.contains("Climate Data"));
        assert!(categories.contains("Ecoregion Data"));
        let long_codes: HashSet<String> =
            output.long.rows().map(|r| r[0].to_string()).collect();
        assert_eq!(long_codes.len(), 2);
    }

    #[test]
    fn test_pipeline_orphan_in_any_source_is_dropped() {
        for orphan_in in ["ecoregion", "species"] {
            let dir = TempDir::new().unwrap();
            write_sources(dir.path(), orphan_in);

            let output = run_pipeline(dir.path(), &InputConfig::default()).unwrap();
            let codes = output.wide.key_column("code").unwrap();
            assert_eq!(codes, vec!["A", "B"], "orphan in {}", orphan_in);
        }
    }

    #[test]
    fn test_pipeline_missing_file() {
        let dir = TempDir::new().unwrap();
        write_sources(dir.path(), "none");
        fs::remove_file(dir.path().join("species.csv")).unwrap();

        let result = run_pipeline(dir.path(), &InputConfig::default());
        let message = format!("{:#}", result.unwrap_err());
        assert!(message.contains("species.csv"));
    }

    #[test]
    fn test_pipeline_disjoint_sources_fail_loudly() {
        let dir = TempDir::new().unwrap();
        write_sources(dir.path(), "none");
        // Replace climate with codes that overlap nothing
        fs::write(
            dir.path().join("climate.csv"),
            "code,type,measure\nX,rain.S,1\nY,rain.S,2\n",
        )
        .unwrap();

        let result = run_pipeline(dir.path(), &InputConfig::default());
        let message = format!("{:#}", result.unwrap_err());
        assert!(message.contains("no rows"));
    }
}

//! Configuration types for the ecoregion pipeline.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Input file names, resolved against the data directory argument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Whitespace-delimited ecoregion metadata table
    #[serde(default = "default_ecoregion_file")]
    pub ecoregion_file: String,

    /// Long-format climate CSV (code,type,measure)
    #[serde(default = "default_climate_file")]
    pub climate_file: String,

    /// Wide-format species counts CSV
    #[serde(default = "default_species_file")]
    pub species_file: String,

    /// Two-column biome abbreviation key, in precedence order
    #[serde(default = "default_biome_key_file")]
    pub biome_key_file: String,
}

fn default_ecoregion_file() -> String {
    "ecoregions.txt".to_string()
}

fn default_climate_file() -> String {
    "climate.csv".to_string()
}

fn default_species_file() -> String {
    "species.csv".to_string()
}

fn default_biome_key_file() -> String {
    "biome_key.csv".to_string()
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            ecoregion_file: default_ecoregion_file(),
            climate_file: default_climate_file(),
            species_file: default_species_file(),
            biome_key_file: default_biome_key_file(),
        }
    }
}

/// Output file names, resolved against the output directory argument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_wide_csv")]
    pub wide_csv: String,

    #[serde(default = "default_long_csv")]
    pub long_csv: String,

    #[serde(default = "default_map_html")]
    pub map_html: String,
}

fn default_wide_csv() -> String {
    "ecoregions_wide.csv".to_string()
}

fn default_long_csv() -> String {
    "ecoregions_long.csv".to_string()
}

fn default_map_html() -> String {
    "ecoregions_map.html".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            wide_csv: default_wide_csv(),
            long_csv: default_long_csv(),
            map_html: default_map_html(),
        }
    }
}

/// Settings for the rendered map page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapConfig {
    /// Page title
    #[serde(default = "default_map_title")]
    pub title: String,

    /// Tile layer URL template
    #[serde(default = "default_tile_url")]
    pub tile_url: String,

    /// Tile layer attribution
    #[serde(default = "default_attribution")]
    pub attribution: String,

    /// Initial zoom when the marker bounds cannot be computed
    #[serde(default = "default_zoom")]
    pub zoom: u8,

    /// Fill color for the area circles
    #[serde(default = "default_circle_color")]
    pub circle_color: String,

    /// Fill opacity for the area circles
    #[serde(default = "default_circle_opacity")]
    pub circle_opacity: f64,
}

fn default_map_title() -> String {
    "Ecoregion Explorer".to_string()
}

fn default_tile_url() -> String {
    "https://tile.openstreetmap.org/{z}/{x}/{y}.png".to_string()
}

fn default_attribution() -> String {
    "&copy; OpenStreetMap contributors".to_string()
}

fn default_zoom() -> u8 {
    6
}

fn default_circle_color() -> String {
    "#2b8cbe".to_string()
}

fn default_circle_opacity() -> f64 {
    0.25
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            title: default_map_title(),
            tile_url: default_tile_url(),
            attribution: default_attribution(),
            zoom: default_zoom(),
            circle_color: default_circle_color(),
            circle_opacity: default_circle_opacity(),
        }
    }
}

/// Main pipeline configuration combining all sub-configs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub inputs: InputConfig,

    #[serde(default)]
    pub outputs: OutputConfig,

    #[serde(default)]
    pub map: MapConfig,
}

impl PipelineConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_input_config() {
        let config = InputConfig::default();
        assert_eq!(config.ecoregion_file, "ecoregions.txt");
        assert_eq!(config.biome_key_file, "biome_key.csv");
    }

    #[test]
    fn test_default_pipeline_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.outputs.wide_csv, "ecoregions_wide.csv");
        assert_eq!(config.map.zoom, 6);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = "map:\n  title: Madagascar\n";
        let config: PipelineConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.map.title, "Madagascar");
        assert_eq!(config.map.zoom, 6);
        assert_eq!(config.inputs.climate_file, "climate.csv");
    }
}

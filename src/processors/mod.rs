//! Table normalization, merging, and reshaping stages.

pub mod climate;
pub mod join;
pub mod melt;
pub mod pipeline;
pub mod species;

// Re-export key operations for convenience
pub use climate::{normalize_climate, pivot_wider, PivotError};
pub use join::{inner_join, join_required, merge_tables, redistribute_metadata, JoinError};
pub use melt::{concat_long, melt, Category, MeltError};
pub use pipeline::{run_pipeline, PipelineOutput};
pub use species::{compile_rules, expand_biome, normalize_species, SpeciesError};

//! Ecoregion data-wrangling and visualization pipeline.
//!
//! This crate provides tools for:
//! - Loading whitespace-delimited and CSV ecological datasets
//! - Normalizing, pivoting, and merging them on a shared location code
//! - Exporting the merged wide table and a unified long table as CSV
//! - Rendering an interactive Leaflet map with a category/attribute filter
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use ecomap_pipeline::config::InputConfig;
//! use ecomap_pipeline::processors::pipeline::run_pipeline;
//!
//! let output = run_pipeline(Path::new("data"), &InputConfig::default()).unwrap();
//! println!("{} locations merged", output.wide.n_rows());
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;
pub mod visualization;

pub use crate::config::{InputConfig, MapConfig, OutputConfig, PipelineConfig};
pub use crate::core::table::{Table, Value};
pub use crate::processors::pipeline::{run_pipeline, PipelineOutput};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

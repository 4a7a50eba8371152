//! Command-line interface for the ecoregion pipeline.

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::PathBuf;
use std::time::Instant;

use crate::config::PipelineConfig;
use crate::core::writers::write_table_csv;
use crate::processors::pipeline::{run_pipeline, PipelineOutput};
use crate::visualization::{build_payload, render_html, write_map};

#[derive(Parser)]
#[command(name = "ecomap-pipeline")]
#[command(about = "Ecoregion data-wrangling pipeline with interactive map output", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline: merge, export CSVs, render the map
    Run {
        /// Directory containing the input files
        data_dir: PathBuf,
        /// Directory for the exported tables and the map page
        #[arg(short, long, default_value = "out")]
        output_dir: PathBuf,
    },

    /// Merge the sources and export the wide and long CSV tables
    Export {
        /// Directory containing the input files
        data_dir: PathBuf,
        /// Directory for the exported tables
        #[arg(short, long, default_value = "out")]
        output_dir: PathBuf,
    },

    /// Merge the sources and render only the interactive map
    Render {
        /// Directory containing the input files
        data_dir: PathBuf,
        /// Output HTML file path (defaults to the configured map name)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<62} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.len() > 39 {
            format!("{}...", &value[..36])
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<39} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    // Load config
    let config = match &cli.config {
        Some(path) => match PipelineConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}, using defaults",
                    path.display(),
                    e
                );
                PipelineConfig::default()
            }
        },
        None => PipelineConfig::default(),
    };

    // Dispatch to subcommands
    match cli.command {
        Commands::Run {
            data_dir,
            output_dir,
        } => {
            cmd_run(&data_dir, &output_dir, &config);
        }
        Commands::Export {
            data_dir,
            output_dir,
        } => {
            cmd_export(&data_dir, &output_dir, &config);
        }
        Commands::Render { data_dir, output } => {
            cmd_render(&data_dir, output, &config);
        }
    }
}

fn stage_pipeline(data_dir: &PathBuf, config: &PipelineConfig) -> PipelineOutput {
    let spinner = create_spinner("Merging and reshaping source tables...");

    match run_pipeline(data_dir, &config.inputs) {
        Ok(output) => {
            spinner.finish_and_clear();
            output
        }
        Err(e) => {
            spinner.finish_and_clear();
            error!("Pipeline failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn export_tables(output: &PipelineOutput, output_dir: &PathBuf, config: &PipelineConfig) -> (PathBuf, PathBuf) {
    let wide_path = output_dir.join(&config.outputs.wide_csv);
    let long_path = output_dir.join(&config.outputs.long_csv);

    if let Err(e) = write_table_csv(&wide_path, &output.wide) {
        error!("Failed to export wide table: {}", e);
        std::process::exit(1);
    }
    if let Err(e) = write_table_csv(&long_path, &output.long) {
        error!("Failed to export long table: {}", e);
        std::process::exit(1);
    }
    (wide_path, long_path)
}

fn render_map_page(output: &PipelineOutput, path: &PathBuf, config: &PipelineConfig) {
    let html = match build_payload(&output.wide, &output.long)
        .and_then(|payload| render_html(&payload, &config.map))
    {
        Ok(html) => html,
        Err(e) => {
            error!("Map rendering failed: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = write_map(path, &html) {
        error!("Failed to write map page: {}", e);
        std::process::exit(1);
    }
}

fn cmd_run(data_dir: &PathBuf, output_dir: &PathBuf, config: &PipelineConfig) {
    let start = Instant::now();

    println!("Running full pipeline...");
    println!("Input directory: {}", data_dir.display());
    println!("Output directory: {}", output_dir.display());

    let output = stage_pipeline(data_dir, config);
    let (wide_path, long_path) = export_tables(&output, output_dir, config);

    let map_path = output_dir.join(&config.outputs.map_html);
    render_map_page(&output, &map_path, config);

    print_summary(
        "Pipeline Complete",
        &[
            ("Input directory", data_dir.display().to_string()),
            ("Locations", output.wide.n_rows().to_string()),
            ("Long rows", output.long.n_rows().to_string()),
            ("Wide CSV", wide_path.display().to_string()),
            ("Long CSV", long_path.display().to_string()),
            ("Map page", map_path.display().to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
}

fn cmd_export(data_dir: &PathBuf, output_dir: &PathBuf, config: &PipelineConfig) {
    let start = Instant::now();

    println!("Exporting merged tables...");
    println!("Input directory: {}", data_dir.display());
    println!("Output directory: {}", output_dir.display());

    let output = stage_pipeline(data_dir, config);
    let (wide_path, long_path) = export_tables(&output, output_dir, config);

    print_summary(
        "Export Complete",
        &[
            ("Input directory", data_dir.display().to_string()),
            ("Locations", output.wide.n_rows().to_string()),
            ("Long rows", output.long.n_rows().to_string()),
            ("Wide CSV", wide_path.display().to_string()),
            ("Long CSV", long_path.display().to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
}

fn cmd_render(data_dir: &PathBuf, output: Option<PathBuf>, config: &PipelineConfig) {
    let start = Instant::now();

    let map_path = output.unwrap_or_else(|| PathBuf::from(&config.outputs.map_html));

    println!("Rendering interactive map...");
    println!("Input directory: {}", data_dir.display());
    println!("Output: {}", map_path.display());

    let pipeline_output = stage_pipeline(data_dir, config);

    let spinner = create_spinner("Rendering map page...");
    render_map_page(&pipeline_output, &map_path, config);
    spinner.finish_and_clear();

    print_summary(
        "Render Complete",
        &[
            ("Input directory", data_dir.display().to_string()),
            ("Locations", pipeline_output.wide.n_rows().to_string()),
            ("Map page", map_path.display().to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
}

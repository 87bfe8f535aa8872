#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line front end for crime hotspot clustering and forecasting.
//!
//! With a subcommand it runs that step directly; without one it shows an
//! interactive menu. Configuration comes from an optional TOML file with
//! command-line flags layered on top.
//!
//! Uses `indicatif-log-bridge` (via [`crime_forecast_cli_utils::init_logger`])
//! to route `log` output through `indicatif::MultiProgress` so that log
//! lines and progress bars never fight for the terminal.

mod commands;
mod interactive;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use crime_forecast_pipeline::PipelineConfig;

#[derive(Parser)]
#[command(
    name = "crime_forecast",
    about = "Crime hotspot clustering and daily-count forecasting"
)]
struct Cli {
    /// TOML configuration file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Flags that override values from the configuration file.
#[derive(Args, Default)]
struct Overrides {
    /// Normalized incident CSV
    #[arg(long, global = true)]
    data: Option<PathBuf>,

    /// Artifact directory
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    /// Records sampled per crime type before clustering
    #[arg(long, global = true)]
    sample_size: Option<usize>,

    /// Sampling seed
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Cluster radius in radians of great-circle angle
    #[arg(long, global = true)]
    eps: Option<f64>,

    /// Minimum neighbors (including the point) for a dense point
    #[arg(long, global = true)]
    min_neighbors: Option<usize>,

    /// Number of ranked clusters kept per crime type
    #[arg(long, global = true)]
    top_k: Option<usize>,

    /// Zero-fill days without incidents before fitting
    #[arg(long, global = true)]
    fill_gaps: bool,

    /// Simulated paths for the forecast interval
    #[arg(long, global = true)]
    uncertainty_samples: Option<usize>,
}

impl Overrides {
    fn apply(self, config: &mut PipelineConfig) {
        if let Some(data) = self.data {
            config.data_path = data;
        }
        if let Some(output) = self.output {
            config.output_dir = output;
        }
        if let Some(sample_size) = self.sample_size {
            config.sample_size = sample_size;
        }
        if let Some(seed) = self.seed {
            config.random_seed = seed;
        }
        if let Some(eps) = self.eps {
            config.cluster_radius = eps;
        }
        if let Some(min_neighbors) = self.min_neighbors {
            config.min_neighbors = min_neighbors;
        }
        if let Some(top_k) = self.top_k {
            config.top_k = top_k;
        }
        if self.fill_gaps {
            config.fill_gaps = true;
        }
        if let Some(samples) = self.uncertainty_samples {
            config.uncertainty_samples = samples;
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Forecast daily incidents for every district
    Districts,
    /// Cluster every crime type and forecast its largest hotspot
    Categories,
    /// Cluster one crime type and forecast its largest hotspot
    Hotspots {
        /// Crime type (offense category)
        category: String,
    },
    /// List partitions with saved artifacts
    List,
    /// Show the saved artifacts of one partition
    Show {
        /// District or crime type
        key: String,
    },
}

fn load_config(cli_config: Option<PathBuf>, overrides: Overrides) -> Result<PipelineConfig, Box<dyn std::error::Error>> {
    let mut config = match cli_config {
        Some(path) => PipelineConfig::from_toml_file(&path)?,
        None => PipelineConfig::default(),
    };
    overrides.apply(&mut config);
    config.validate()?;
    Ok(config)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = crime_forecast_cli_utils::init_logger();
    let cli = Cli::parse();
    let config = load_config(cli.config, cli.overrides)?;

    match cli.command {
        Some(Commands::Districts) => commands::districts(&config, &multi)?,
        Some(Commands::Categories) => commands::categories(&config, &multi)?,
        Some(Commands::Hotspots { category }) => commands::hotspots(&config, &category)?,
        Some(Commands::List) => commands::list(&config),
        Some(Commands::Show { key }) => commands::show(&config, &key),
        None => interactive::run(&config, &multi)?,
    }

    Ok(())
}

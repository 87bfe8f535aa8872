//! Interactive menu shown when no subcommand is given.

use crime_forecast_artifacts::ArtifactStore;
use crime_forecast_cli_utils::MultiProgress;
use crime_forecast_incident_models::PartitionBy;
use crime_forecast_ingest::partition::partition_keys;
use crime_forecast_pipeline::{PipelineConfig, load_table};
use dialoguer::Select;

use crate::commands;

/// Top-level actions.
enum Tool {
    Districts,
    Categories,
    Hotspots,
    List,
    Show,
}

impl Tool {
    const ALL: &[Self] = &[
        Self::Districts,
        Self::Categories,
        Self::Hotspots,
        Self::List,
        Self::Show,
    ];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::Districts => "Forecast all districts",
            Self::Categories => "Forecast all crime types (with hotspot clustering)",
            Self::Hotspots => "Cluster and forecast one crime type",
            Self::List => "List saved forecasts",
            Self::Show => "Show a saved forecast",
        }
    }
}

/// Prompts for an action and runs it.
///
/// # Errors
///
/// * If a prompt fails
/// * If the chosen action fails
pub fn run(config: &PipelineConfig, multi: &MultiProgress) -> Result<(), Box<dyn std::error::Error>> {
    println!("Crime Forecast Toolchain");
    println!();

    let labels: Vec<&str> = Tool::ALL.iter().map(Tool::label).collect();

    let idx = Select::new()
        .with_prompt("What would you like to do?")
        .items(&labels)
        .default(0)
        .interact()?;

    match Tool::ALL[idx] {
        Tool::Districts => commands::districts(config, multi)?,
        Tool::Categories => commands::categories(config, multi)?,
        Tool::Hotspots => {
            let table = load_table(config)?;
            let categories = partition_keys(&table, PartitionBy::Category);
            if categories.is_empty() {
                println!("No crime types found in {}.", config.data_path.display());
                return Ok(());
            }

            let idx = Select::new()
                .with_prompt("Crime type")
                .items(&categories)
                .max_length(20)
                .interact()?;
            commands::hotspots_in(config, &table, &categories[idx]);
        }
        Tool::List => commands::list(config),
        Tool::Show => {
            let keys = ArtifactStore::new(&config.output_dir).list_partitions();
            if keys.is_empty() {
                println!("No saved forecasts in {}.", config.output_dir.display());
                return Ok(());
            }

            let idx = Select::new()
                .with_prompt("Partition")
                .items(&keys)
                .max_length(20)
                .interact()?;
            commands::show(config, &keys[idx]);
        }
    }

    Ok(())
}

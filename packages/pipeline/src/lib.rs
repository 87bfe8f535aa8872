#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Crime hotspot clustering and daily-count forecasting pipeline.
//!
//! Two batch variants share one per-partition flow:
//!
//! * **districts**: each district's records are aggregated into daily
//!   counts, fit on the training window, forecast through the held-out
//!   window and scored.
//! * **categories**: each offense category is sampled, clustered with
//!   DBSCAN over great-circle distance, and its largest hotspot is
//!   forecast the same way.
//!
//! Results land in an [`ArtifactStore`](crime_forecast_artifacts::ArtifactStore)
//! and a [`BatchSummary`](batch::BatchSummary).

pub mod arena;
pub mod batch;
pub mod config;
pub mod hotspot;
pub mod progress;

use crime_forecast_incident_models::IncidentRecord;

pub use arena::ModelArena;
pub use batch::{BatchRunner, BatchSummary, PartitionOutcome, PartitionReport, summary_scope};
pub use config::{ConfigError, PipelineConfig};

/// Errors that can abort a pipeline run or a single partition.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The incident table could not be read.
    #[error(transparent)]
    Ingest(#[from] crime_forecast_ingest::IngestError),

    /// The configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Model fitting or projection failed.
    #[error(transparent)]
    Forecast(#[from] crime_forecast_forecast::ForecastError),

    /// Artifacts could not be written or read.
    #[error(transparent)]
    Artifact(#[from] crime_forecast_artifacts::ArtifactError),
}

/// Loads the incident table named by `config`.
///
/// # Errors
///
/// * [`PipelineError::Ingest`] if the file is unreadable or lacks a
///   required column
pub fn load_table(config: &PipelineConfig) -> Result<Vec<IncidentRecord>, PipelineError> {
    Ok(crime_forecast_ingest::read_table(
        &config.data_path,
        &config.columns,
    )?)
}

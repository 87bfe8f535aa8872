//! Pipeline configuration.
//!
//! Every field has a default, so a TOML file only needs the values it
//! changes. Dates are written as quoted `YYYY-MM-DD` strings.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use crime_forecast_forecast::ModelSettings;
use crime_forecast_ingest::ColumnMapping;
use crime_forecast_spatial::ClusterParams;
use serde::{Deserialize, Serialize};

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("I/O error reading {path}: {source}")]
    Io {
        /// File that failed to load.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for [`PipelineConfig`].
    #[error("Invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range or inconsistent with another.
    #[error("Invalid configuration value: {0}")]
    Invalid(String),
}

const fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    match NaiveDate::from_ymd_opt(y, m, d) {
        Some(date) => date,
        None => NaiveDate::MIN,
    }
}

/// Settings for one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct PipelineConfig {
    /// Normalized incident CSV.
    pub data_path: PathBuf,
    /// Artifact directory.
    pub output_dir: PathBuf,
    /// Column names of the incident CSV.
    pub columns: ColumnMapping,

    /// Records sampled per category before clustering.
    pub sample_size: usize,
    /// Seed for sampling.
    pub random_seed: u64,

    /// DBSCAN radius as a great-circle angle in radians.
    pub cluster_radius: f64,
    /// DBSCAN minimum neighborhood size, counting the point itself.
    pub min_neighbors: usize,
    /// Number of ranked clusters kept per category.
    pub top_k: usize,

    /// Horizon in days when the held-out window does not set one.
    pub forecast_horizon: u32,
    /// Partitions with fewer training days are skipped.
    pub min_training_rows: usize,
    /// Zero-fill days without incidents before fitting.
    pub fill_gaps: bool,

    /// First training day.
    pub train_start: NaiveDate,
    /// Last training day.
    pub train_end: NaiveDate,
    /// Last held-out day; the held-out window starts after `train_end`.
    pub test_end: NaiveDate,

    /// Write a forecast for the forward window.
    pub future_forecast: bool,
    /// First day of the forward window.
    pub future_start: NaiveDate,
    /// Last day of the forward window.
    pub future_end: NaiveDate,

    /// Fit a yearly seasonality.
    pub yearly_seasonality: bool,
    /// Fit a weekly seasonality.
    pub weekly_seasonality: bool,
    /// Central probability mass of the forecast interval.
    pub interval_width: f64,
    /// Simulated paths for the forecast interval.
    pub uncertainty_samples: usize,
    /// Seed for the interval simulation.
    pub uncertainty_seed: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("data/crime_data.csv"),
            output_dir: PathBuf::from("output"),
            columns: ColumnMapping::default(),
            sample_size: 10_000,
            random_seed: 42,
            cluster_radius: 0.0001,
            min_neighbors: 20,
            top_k: 5,
            forecast_horizon: 30,
            min_training_rows: 10,
            fill_gaps: false,
            train_start: date(2023, 1, 1),
            train_end: date(2024, 5, 31),
            test_end: date(2024, 10, 31),
            future_forecast: true,
            future_start: date(2024, 12, 1),
            future_end: date(2025, 1, 31),
            yearly_seasonality: true,
            weekly_seasonality: true,
            interval_width: 0.8,
            uncertainty_samples: 300,
            uncertainty_seed: 42,
        }
    }
}

impl PipelineConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// * [`ConfigError::Parse`] if the document is malformed
    /// * [`ConfigError::Invalid`] if a value fails validation
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a TOML file.
    ///
    /// # Errors
    ///
    /// * [`ConfigError::Io`] if the file cannot be read
    /// * [`ConfigError::Parse`] or [`ConfigError::Invalid`] as for
    ///   [`PipelineConfig::from_toml_str`]
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        log::info!("Loading configuration from {}", path.display());
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Checks ranges and window ordering.
    ///
    /// # Errors
    ///
    /// * [`ConfigError::Invalid`] naming the first offending value
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.sample_size == 0 {
            return invalid("sample_size must be positive".to_string());
        }
        if !(self.cluster_radius.is_finite() && self.cluster_radius > 0.0) {
            return invalid(format!(
                "cluster_radius must be a positive angle in radians, got {}",
                self.cluster_radius
            ));
        }
        if self.min_neighbors == 0 {
            return invalid("min_neighbors must be at least 1".to_string());
        }
        if self.top_k == 0 {
            return invalid("top_k must be at least 1".to_string());
        }
        if self.forecast_horizon == 0 {
            return invalid("forecast_horizon must be at least 1 day".to_string());
        }
        if self.train_start > self.train_end {
            return invalid(format!(
                "train_start {} is after train_end {}",
                self.train_start, self.train_end
            ));
        }
        if self.test_end <= self.train_end {
            return invalid(format!(
                "test_end {} must be after train_end {}",
                self.test_end, self.train_end
            ));
        }
        if self.future_forecast && self.future_start > self.future_end {
            return invalid(format!(
                "future_start {} is after future_end {}",
                self.future_start, self.future_end
            ));
        }
        if !(self.interval_width > 0.0 && self.interval_width < 1.0) {
            return invalid(format!(
                "interval_width must be in (0, 1), got {}",
                self.interval_width
            ));
        }
        Ok(())
    }

    /// DBSCAN parameters.
    #[must_use]
    pub const fn cluster_params(&self) -> ClusterParams {
        ClusterParams {
            eps: self.cluster_radius,
            min_samples: self.min_neighbors,
        }
    }

    /// Forecasting model settings.
    #[must_use]
    pub fn model_settings(&self) -> ModelSettings {
        ModelSettings {
            yearly_seasonality: self.yearly_seasonality,
            weekly_seasonality: self.weekly_seasonality,
            min_training_rows: self.min_training_rows,
            interval_width: self.interval_width,
            uncertainty_samples: self.uncertainty_samples,
            seed: self.uncertainty_seed,
            ..ModelSettings::default()
        }
    }
}

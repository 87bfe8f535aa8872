#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Daily incident-count forecasting.
//!
//! Records are bucketed into a [`DailySeries`] by [`aggregate`], a
//! [`Forecaster`] fits it and projects forward, and [`evaluate`] scores the
//! projection against held-out days.

pub mod aggregate;
pub mod evaluate;
pub mod horizon;
mod linalg;
pub mod seasonal;

use chrono::NaiveDate;
use crime_forecast_forecast_models::{DailySeries, ForecastResult, ModelState};

pub use seasonal::{AdditiveSeasonalModel, ModelSettings};

/// Errors that can occur while fitting or projecting a model.
#[derive(Debug, thiserror::Error)]
pub enum ForecastError {
    /// Too few training observations to fit.
    #[error("Insufficient training data: {rows} rows (need at least {required})")]
    InsufficientData {
        /// Observations available.
        rows: usize,
        /// Minimum observations required.
        required: usize,
    },

    /// The regularized normal equations could not be factored.
    #[error("Model fit failed: system is not positive definite")]
    Singular,

    /// A requested date range ends before it starts.
    #[error("Invalid forecast range: {start} to {end}")]
    InvalidRange {
        /// Requested first day.
        start: NaiveDate,
        /// Requested last day.
        end: NaiveDate,
    },
}

/// A forecasting backend.
///
/// Fitting produces a serializable [`ModelState`]; projection only reads
/// it, so the same state can be reloaded from disk and re-projected.
pub trait Forecaster {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Fits the model to a training series.
    ///
    /// # Errors
    ///
    /// * [`ForecastError::InsufficientData`] if the series is too short
    /// * [`ForecastError::Singular`] if the fit cannot be solved
    fn fit(&self, series: &DailySeries) -> Result<ModelState, ForecastError>;

    /// Projects every calendar day from the start of the fitted history to
    /// `horizon_days` past its end.
    ///
    /// # Errors
    ///
    /// Backend-specific projection failures.
    fn predict(&self, state: &ModelState, horizon_days: u32) -> Result<ForecastResult, ForecastError>;

    /// Projects only the days within `[start, end]`.
    ///
    /// # Errors
    ///
    /// * [`ForecastError::InvalidRange`] if `end` precedes `start`
    /// * any error from [`Forecaster::predict`]
    fn predict_range(
        &self,
        state: &ModelState,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<ForecastResult, ForecastError> {
        if end < start {
            return Err(ForecastError::InvalidRange { start, end });
        }

        let ahead = (end - state.history_end).num_days().max(0);
        let horizon = u32::try_from(ahead).unwrap_or(u32::MAX);

        Ok(self.predict(state, horizon)?.restrict(start, end))
    }
}

//! Batch runs over every partition key.
//!
//! Each partition moves through
//! `LOADED → SKIPPED | FITTED → FORECASTED → EVALUATED | NO_TEST_DATA → PERSISTED`.
//! A failure inside one partition is recorded as [`PartitionOutcome::Failed`]
//! and the batch moves on to the next key.

use std::path::PathBuf;
use std::sync::Arc;

use crime_forecast_artifacts::ArtifactStore;
use crime_forecast_forecast::aggregate::{daily_counts, fill_gaps};
use crime_forecast_forecast::evaluate::evaluate;
use crime_forecast_forecast::horizon::test_horizon;
use crime_forecast_forecast::{AdditiveSeasonalModel, ForecastError, Forecaster};
use crime_forecast_forecast_models::EvaluationOutcome;
use crime_forecast_incident_models::{IncidentRecord, PartitionBy};
use crime_forecast_ingest::partition::{partition_keys, records_for_key};
use crime_forecast_spatial::RankedCluster;
use crime_forecast_spatial::hotspot::to_feature_collection;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::PipelineError;
use crate::arena::ModelArena;
use crate::config::PipelineConfig;
use crate::hotspot::analyze_category;
use crate::progress::ProgressCallback;

/// Terminal state of one partition.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum PartitionOutcome {
    /// No records for the key.
    Empty,
    /// Every sampled point was noise; nothing to forecast.
    NoClusters,
    /// Too few training days.
    Skipped,
    /// Forecast persisted and scored against held-out days.
    Evaluated,
    /// Forecast persisted; the held-out window was empty.
    NoTestData,
    /// An error interrupted the partition.
    Failed,
}

impl PartitionOutcome {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Empty,
            Self::NoClusters,
            Self::Skipped,
            Self::Evaluated,
            Self::NoTestData,
            Self::Failed,
        ]
    }
}

/// What happened to one partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionReport {
    /// Partition key.
    pub key: String,
    /// Terminal state.
    pub outcome: PartitionOutcome,
    /// Records the forecast was built from.
    pub records: usize,
    /// Cluster forecast for category partitions.
    pub top_cluster: Option<RankedCluster>,
    /// Days in the training window.
    pub training_rows: usize,
    /// Days in the held-out window.
    pub test_rows: usize,
    /// Forecast horizon in days.
    pub horizon_days: Option<u32>,
    /// Held-out days with a prediction.
    pub matched_days: usize,
    /// Mean absolute error over matched held-out days.
    pub mae: Option<f64>,
    /// Files written.
    pub files: Vec<PathBuf>,
    /// Error message for failed partitions.
    pub error: Option<String>,
}

impl PartitionReport {
    fn new(key: &str, outcome: PartitionOutcome) -> Self {
        Self {
            key: key.to_string(),
            outcome,
            records: 0,
            top_cluster: None,
            training_rows: 0,
            test_rows: 0,
            horizon_days: None,
            matched_days: 0,
            mae: None,
            files: Vec::new(),
            error: None,
        }
    }
}

/// Outcome of a whole batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    /// Attribute the batch partitioned by.
    pub partition_by: PartitionBy,
    /// Forecasting backend used.
    pub model: String,
    /// One report per partition key, in key order.
    pub partitions: Vec<PartitionReport>,
}

/// Scope under which a batch's summary is stored.
#[must_use]
pub const fn summary_scope(partition_by: PartitionBy) -> &'static str {
    match partition_by {
        PartitionBy::District => "district",
        PartitionBy::Category => "category",
    }
}

impl BatchSummary {
    /// Reads the last summary written for `partition_by`, `None` if that
    /// batch never ran.
    ///
    /// # Errors
    ///
    /// * [`PipelineError::Artifact`] if the summary exists but cannot be read
    pub fn load(store: &ArtifactStore, partition_by: PartitionBy) -> Result<Option<Self>, PipelineError> {
        Ok(store.read_summary(summary_scope(partition_by))?)
    }

    /// Number of partitions that ended in `outcome`.
    #[must_use]
    pub fn count(&self, outcome: PartitionOutcome) -> usize {
        self.partitions.iter().filter(|p| p.outcome == outcome).count()
    }

    /// Report for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&PartitionReport> {
        self.partitions.iter().find(|p| p.key == key)
    }

    /// Mean of the per-partition MAEs that are available.
    #[must_use]
    pub fn mean_mae(&self) -> Option<f64> {
        let maes: Vec<f64> = self.partitions.iter().filter_map(|p| p.mae).collect();
        #[allow(clippy::cast_precision_loss)]
        (!maes.is_empty()).then(|| maes.iter().sum::<f64>() / maes.len() as f64)
    }

    /// Logs one line per partition and a per-outcome tally.
    pub fn log(&self) {
        log::info!("=== {} batch summary ({}) ===", self.partition_by, self.model);
        for report in &self.partitions {
            match (report.outcome, report.mae) {
                (_, Some(mae)) => log::info!(
                    "  {:<30} {:<12} MAE {mae:.3} over {} days",
                    report.key,
                    report.outcome,
                    report.matched_days
                ),
                (PartitionOutcome::Failed, None) => log::error!(
                    "  {:<30} {:<12} {}",
                    report.key,
                    report.outcome,
                    report.error.as_deref().unwrap_or("unknown error")
                ),
                (_, None) => log::info!("  {:<30} {}", report.key, report.outcome),
            }
        }
        let tally = PartitionOutcome::all()
            .iter()
            .map(|&o| (o, self.count(o)))
            .filter(|(_, n)| *n > 0)
            .map(|(o, n)| format!("{o}={n}"))
            .collect::<Vec<_>>()
            .join(", ");
        log::info!("{} partitions: {tally}", self.partitions.len());
        if let Some(mae) = self.mean_mae() {
            log::info!("Mean MAE across evaluated partitions: {mae:.3}");
        }
    }
}

/// Drives batch runs against one table, configuration and artifact store.
pub struct BatchRunner<'a> {
    config: &'a PipelineConfig,
    store: &'a ArtifactStore,
    model: Box<dyn Forecaster + 'a>,
    arena: ModelArena,
}

impl<'a> BatchRunner<'a> {
    /// Creates a runner with the additive seasonal model built from
    /// `config`.
    #[must_use]
    pub fn new(config: &'a PipelineConfig, store: &'a ArtifactStore) -> Self {
        Self::with_forecaster(
            config,
            store,
            Box::new(AdditiveSeasonalModel::new(config.model_settings())),
        )
    }

    /// Creates a runner that forecasts with `model`.
    #[must_use]
    pub fn with_forecaster(
        config: &'a PipelineConfig,
        store: &'a ArtifactStore,
        model: Box<dyn Forecaster + 'a>,
    ) -> Self {
        Self {
            config,
            store,
            model,
            arena: ModelArena::new(),
        }
    }

    /// Models fitted so far.
    #[must_use]
    pub const fn arena(&self) -> &ModelArena {
        &self.arena
    }

    /// Forecasts every district. Districts are already spatial units, so
    /// no clustering is done.
    ///
    /// # Errors
    ///
    /// * [`PipelineError::Artifact`] if the batch summary cannot be written
    pub fn run_districts(
        &mut self,
        table: &[IncidentRecord],
        progress: &Arc<dyn ProgressCallback>,
    ) -> Result<BatchSummary, PipelineError> {
        let keys = partition_keys(table, PartitionBy::District);
        log::info!("Forecasting {} districts", keys.len());
        progress.set_total(keys.len() as u64);

        let mut partitions = Vec::with_capacity(keys.len());
        for key in &keys {
            progress.set_message(format!("District {key}"));
            log::info!("Processing district: {key}");

            let records = records_for_key(table, PartitionBy::District, key);
            let report = if records.is_empty() {
                log::warn!("No data for district {key}. Skipping.");
                PartitionReport::new(key, PartitionOutcome::Empty)
            } else {
                self.forecast_partition(key, &records)
            };

            partitions.push(report);
            progress.inc(1);
        }

        self.finish(PartitionBy::District, partitions, progress)
    }

    /// Clusters every category's sample and forecasts the largest hotspot.
    ///
    /// # Errors
    ///
    /// * [`PipelineError::Artifact`] if the batch summary cannot be written
    pub fn run_categories(
        &mut self,
        table: &[IncidentRecord],
        progress: &Arc<dyn ProgressCallback>,
    ) -> Result<BatchSummary, PipelineError> {
        let keys = partition_keys(table, PartitionBy::Category);
        log::info!("Forecasting {} crime types", keys.len());
        progress.set_total(keys.len() as u64);

        let mut partitions = Vec::with_capacity(keys.len());
        for key in &keys {
            progress.set_message(format!("Crime type {key}"));
            log::info!("Processing crime type: {key}");
            partitions.push(self.run_category(table, key));
            progress.inc(1);
        }

        self.finish(PartitionBy::Category, partitions, progress)
    }

    /// Clusters one category and forecasts its largest hotspot.
    pub fn run_category(&mut self, table: &[IncidentRecord], category: &str) -> PartitionReport {
        let Some(analysis) = analyze_category(table, category, self.config) else {
            return PartitionReport::new(category, PartitionOutcome::Empty);
        };

        let Some(top) = analysis.top_cluster() else {
            log::warn!("No clusters found for '{category}'; nothing to forecast.");
            return PartitionReport::new(category, PartitionOutcome::NoClusters);
        };

        log::info!(
            "Forecasting top cluster {} ({} incidents) for '{category}'",
            top.cluster_id,
            top.member_count
        );
        let records = analysis.cluster_records(top.cluster_id);
        let mut report = self.forecast_partition(category, &records);
        report.top_cluster = Some(top);

        // Only completed partitions get a hotspot file.
        if matches!(
            report.outcome,
            PartitionOutcome::Evaluated | PartitionOutcome::NoTestData
        ) {
            match self
                .store
                .write_hotspots(category, &to_feature_collection(&analysis.hotspots))
            {
                Ok(path) => report.files.push(path),
                Err(e) => log::error!("Failed to write hotspots for '{category}': {e}"),
            }
        }

        report
    }

    /// Aggregates, fits, forecasts, evaluates and persists one partition.
    ///
    /// A partition that fails part way leaves no files behind.
    pub fn forecast_partition(&mut self, key: &str, records: &[&IncidentRecord]) -> PartitionReport {
        let mut report = PartitionReport::new(key, PartitionOutcome::Failed);
        report.records = records.len();

        match self.try_forecast_partition(key, records, &mut report) {
            Ok(outcome) => report.outcome = outcome,
            Err(e) => {
                log::error!("Partition '{key}' failed: {e}");
                self.store.discard(&report.files);
                report.files.clear();
                report.mae = None;
                report.matched_days = 0;
                report.outcome = PartitionOutcome::Failed;
                report.error = Some(e.to_string());
            }
        }
        report
    }

    fn try_forecast_partition(
        &mut self,
        key: &str,
        records: &[&IncidentRecord],
        report: &mut PartitionReport,
    ) -> Result<PartitionOutcome, PipelineError> {
        let config = self.config;

        let mut series = daily_counts(records.iter().copied());
        if config.fill_gaps {
            series = fill_gaps(&series);
        }
        let (train, test) = series.split_at(config.train_start, config.train_end, config.test_end);
        report.training_rows = train.len();
        report.test_rows = test.len();

        if train.len() < config.min_training_rows {
            log::warn!(
                "Not enough training data for '{key}' ({} days). Skipping.",
                train.len()
            );
            return Ok(PartitionOutcome::Skipped);
        }

        let state = match self.model.fit(&train) {
            Ok(state) => state,
            Err(ForecastError::InsufficientData { rows, required }) => {
                log::warn!("Not enough training data for '{key}' ({rows} < {required}). Skipping.");
                return Ok(PartitionOutcome::Skipped);
            }
            Err(e) => return Err(e.into()),
        };

        let horizon = test_horizon(state.history_end, &test, config.forecast_horizon);
        report.horizon_days = Some(horizon);
        let forecast = self.model.predict(&state, horizon)?;

        report.files.push(self.store.write_forecast(key, &forecast)?);
        report.files.push(self.store.write_model(key, &state)?);

        let outcome = match evaluate(&forecast, &test) {
            EvaluationOutcome::Evaluated(evaluation) => {
                report.mae = evaluation.mae;
                report.matched_days = evaluation.matched;
                report
                    .files
                    .push(self.store.write_test_results(key, &evaluation.rows)?);
                PartitionOutcome::Evaluated
            }
            EvaluationOutcome::NoTestData => {
                log::warn!("No test data for '{key}'; forecast saved without evaluation.");
                PartitionOutcome::NoTestData
            }
        };

        if config.future_forecast {
            if config.future_start > state.history_end {
                let future = self
                    .model
                    .predict_range(&state, config.future_start, config.future_end)?;
                report
                    .files
                    .push(self.store.write_future_forecast(key, &future)?);
            } else {
                log::warn!(
                    "Forward window starts {} but history for '{key}' runs to {}; not writing it.",
                    config.future_start,
                    state.history_end
                );
            }
        }

        self.arena.insert(key, state);
        Ok(outcome)
    }

    fn finish(
        &self,
        partition_by: PartitionBy,
        partitions: Vec<PartitionReport>,
        progress: &Arc<dyn ProgressCallback>,
    ) -> Result<BatchSummary, PipelineError> {
        let summary = BatchSummary {
            partition_by,
            model: self.model.name().to_string(),
            partitions,
        };
        progress.finish(format!(
            "{} partitions, {} evaluated",
            summary.partitions.len(),
            summary.count(PartitionOutcome::Evaluated)
        ));
        summary.log();
        self.store
            .write_summary(summary_scope(partition_by), &summary)?;
        Ok(summary)
    }
}

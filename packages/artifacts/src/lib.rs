#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! File-based artifact directory shared by the batch runs and the
//! visualization layer.
//!
//! Every partition writes up to five files named `<key>_<suffix>` (see
//! [`naming`]). Readers treat a missing directory or file as "nothing
//! there" rather than an error.

pub mod naming;

use std::fs::File;
use std::path::{Path, PathBuf};

use crime_forecast_forecast_models::{EvaluationRow, ForecastPoint, ForecastResult, ModelState};
use geojson::FeatureCollection;
use serde::Serialize;
use serde::de::DeserializeOwned;

pub use naming::ArtifactKind;

/// Suffix of batch summary files, written as `<scope>_batch_summary.json`.
pub const SUMMARY_FILE_SUFFIX: &str = "batch_summary.json";

/// Errors that can occur while writing or reading artifacts.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    /// I/O error (file or directory access).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV serialization or parsing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization or parsing failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// `GeoJSON` parsing failed.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),
}

/// Everything persisted for one partition. Absent or unreadable files are
/// `None`.
#[derive(Debug, Clone, Default)]
pub struct PartitionArtifact {
    /// Partition key.
    pub key: String,
    /// Fitted history plus horizon.
    pub forecast: Option<ForecastResult>,
    /// Held-out evaluation join.
    pub test_results: Option<Vec<EvaluationRow>>,
    /// Fitted model.
    pub model: Option<ModelState>,
    /// Forward-window forecast.
    pub future_forecast: Option<ForecastResult>,
    /// Hotspot centroids.
    pub hotspots: Option<FeatureCollection>,
}

impl PartitionArtifact {
    /// Whether no artifact could be loaded.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.forecast.is_none()
            && self.test_results.is_none()
            && self.model.is_none()
            && self.future_forecast.is_none()
            && self.hotspots.is_none()
    }
}

/// An artifact directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Opens a store rooted at `root`. Nothing is created until the first
    /// write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The store's directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of one artifact of one partition.
    #[must_use]
    pub fn path_for(&self, key: &str, kind: ArtifactKind) -> PathBuf {
        self.root.join(naming::file_name(key, kind))
    }

    fn ensure_root(&self) -> Result<(), ArtifactError> {
        if !self.root.exists() {
            std::fs::create_dir_all(&self.root)?;
        }
        Ok(())
    }

    fn write_csv<T: Serialize>(&self, path: &Path, rows: &[T]) -> Result<(), ArtifactError> {
        self.ensure_root()?;
        let mut writer = csv::Writer::from_path(path)?;
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        log::info!("Saved {} rows to {}", rows.len(), path.display());
        Ok(())
    }

    fn write_json<T: Serialize + ?Sized>(&self, path: &Path, value: &T) -> Result<(), ArtifactError> {
        self.ensure_root()?;
        let json = serde_json::to_string_pretty(value)?;
        std::fs::write(path, json)?;
        log::info!("Saved {}", path.display());
        Ok(())
    }

    /// Writes `<key>_forecast.csv`.
    ///
    /// # Errors
    ///
    /// * If the directory or file cannot be written
    pub fn write_forecast(&self, key: &str, forecast: &ForecastResult) -> Result<PathBuf, ArtifactError> {
        let path = self.path_for(key, ArtifactKind::Forecast);
        self.write_csv(&path, forecast.points())?;
        Ok(path)
    }

    /// Writes `<key>_test_results.csv`. Unmatched days have empty
    /// prediction cells.
    ///
    /// # Errors
    ///
    /// * If the directory or file cannot be written
    pub fn write_test_results(&self, key: &str, rows: &[EvaluationRow]) -> Result<PathBuf, ArtifactError> {
        let path = self.path_for(key, ArtifactKind::TestResults);
        self.write_csv(&path, rows)?;
        Ok(path)
    }

    /// Writes `<key>_model.json`.
    ///
    /// # Errors
    ///
    /// * If the directory or file cannot be written
    pub fn write_model(&self, key: &str, model: &ModelState) -> Result<PathBuf, ArtifactError> {
        let path = self.path_for(key, ArtifactKind::Model);
        self.write_json(&path, model)?;
        Ok(path)
    }

    /// Writes `<key>_2months_future_forecast.csv`.
    ///
    /// # Errors
    ///
    /// * If the directory or file cannot be written
    pub fn write_future_forecast(
        &self,
        key: &str,
        forecast: &ForecastResult,
    ) -> Result<PathBuf, ArtifactError> {
        let path = self.path_for(key, ArtifactKind::FutureForecast);
        self.write_csv(&path, forecast.points())?;
        Ok(path)
    }

    /// Writes `<key>_hotspots.geojson`.
    ///
    /// # Errors
    ///
    /// * If the directory or file cannot be written
    pub fn write_hotspots(&self, key: &str, hotspots: &FeatureCollection) -> Result<PathBuf, ArtifactError> {
        let path = self.path_for(key, ArtifactKind::Hotspots);
        self.ensure_root()?;
        std::fs::write(&path, hotspots.to_string())?;
        log::info!("Saved {} hotspots to {}", hotspots.features.len(), path.display());
        Ok(path)
    }

    /// Path of the summary for one kind of batch (`district`, `category`).
    #[must_use]
    pub fn summary_path(&self, scope: &str) -> PathBuf {
        self.root.join(format!("{scope}_{SUMMARY_FILE_SUFFIX}"))
    }

    /// Writes `<scope>_batch_summary.json`.
    ///
    /// # Errors
    ///
    /// * If the directory or file cannot be written
    pub fn write_summary<T: Serialize>(&self, scope: &str, summary: &T) -> Result<PathBuf, ArtifactError> {
        let path = self.summary_path(scope);
        self.write_json(&path, summary)?;
        Ok(path)
    }

    /// Removes files written for a partition that did not complete.
    /// Files that are already gone are ignored.
    pub fn discard(&self, paths: &[PathBuf]) {
        for path in paths {
            match std::fs::remove_file(path) {
                Ok(()) => log::debug!("Removed {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => log::warn!("Failed to remove {}: {e}", path.display()),
            }
        }
    }

    fn read_csv<T: DeserializeOwned>(path: &Path) -> Result<Option<Vec<T>>, ArtifactError> {
        if !path.is_file() {
            return Ok(None);
        }
        let mut reader = csv::Reader::from_path(path)?;
        let rows = reader.deserialize().collect::<Result<Vec<T>, _>>()?;
        Ok(Some(rows))
    }

    fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, ArtifactError> {
        if !path.is_file() {
            return Ok(None);
        }
        let file = File::open(path)?;
        Ok(Some(serde_json::from_reader(std::io::BufReader::new(file))?))
    }

    /// Reads `<key>_forecast.csv`, `None` if absent.
    ///
    /// # Errors
    ///
    /// * If the file exists but cannot be parsed
    pub fn read_forecast(&self, key: &str) -> Result<Option<ForecastResult>, ArtifactError> {
        Ok(Self::read_csv::<ForecastPoint>(&self.path_for(key, ArtifactKind::Forecast))?
            .map(ForecastResult::new))
    }

    /// Reads `<key>_test_results.csv`, `None` if absent.
    ///
    /// # Errors
    ///
    /// * If the file exists but cannot be parsed
    pub fn read_test_results(&self, key: &str) -> Result<Option<Vec<EvaluationRow>>, ArtifactError> {
        Self::read_csv(&self.path_for(key, ArtifactKind::TestResults))
    }

    /// Reads `<key>_model.json`, `None` if absent.
    ///
    /// # Errors
    ///
    /// * If the file exists but cannot be parsed
    pub fn read_model(&self, key: &str) -> Result<Option<ModelState>, ArtifactError> {
        Self::read_json(&self.path_for(key, ArtifactKind::Model))
    }

    /// Reads `<key>_2months_future_forecast.csv`, `None` if absent.
    ///
    /// # Errors
    ///
    /// * If the file exists but cannot be parsed
    pub fn read_future_forecast(&self, key: &str) -> Result<Option<ForecastResult>, ArtifactError> {
        Ok(
            Self::read_csv::<ForecastPoint>(&self.path_for(key, ArtifactKind::FutureForecast))?
                .map(ForecastResult::new),
        )
    }

    /// Reads `<key>_hotspots.geojson`, `None` if absent.
    ///
    /// # Errors
    ///
    /// * If the file exists but cannot be parsed
    pub fn read_hotspots(&self, key: &str) -> Result<Option<FeatureCollection>, ArtifactError> {
        let path = self.path_for(key, ArtifactKind::Hotspots);
        if !path.is_file() {
            return Ok(None);
        }
        let text = std::fs::read_to_string(&path)?;
        Ok(Some(text.parse::<FeatureCollection>()?))
    }

    /// Reads `<scope>_batch_summary.json`, `None` if absent.
    ///
    /// # Errors
    ///
    /// * If the file exists but cannot be parsed
    pub fn read_summary<T: DeserializeOwned>(&self, scope: &str) -> Result<Option<T>, ArtifactError> {
        Self::read_json(&self.summary_path(scope))
    }

    /// Distinct partition keys that have at least one artifact, sorted.
    ///
    /// A missing directory yields an empty list.
    #[must_use]
    pub fn list_partitions(&self) -> Vec<String> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("Cannot read artifact directory {}: {e}", self.root.display());
                return Vec::new();
            }
        };

        let mut keys: Vec<String> = entries
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
            .filter_map(|entry| {
                let name = entry.file_name();
                naming::parse_file_name(name.to_str()?).map(|(key, _)| key)
            })
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }

    /// Loads every artifact of one partition.
    ///
    /// Returns `None` when the partition has no readable artifact. Files
    /// that exist but fail to parse are logged and left out.
    #[must_use]
    pub fn load_partition(&self, key: &str) -> Option<PartitionArtifact> {
        fn logged<T>(key: &str, kind: ArtifactKind, result: Result<Option<T>, ArtifactError>) -> Option<T> {
            result.unwrap_or_else(|e| {
                log::error!("Failed to read {kind} artifact for '{key}': {e}");
                None
            })
        }

        let artifact = PartitionArtifact {
            key: key.to_string(),
            forecast: logged(key, ArtifactKind::Forecast, self.read_forecast(key)),
            test_results: logged(key, ArtifactKind::TestResults, self.read_test_results(key)),
            model: logged(key, ArtifactKind::Model, self.read_model(key)),
            future_forecast: logged(key, ArtifactKind::FutureForecast, self.read_future_forecast(key)),
            hotspots: logged(key, ArtifactKind::Hotspots, self.read_hotspots(key)),
        };

        if artifact.is_empty() {
            log::warn!("No artifacts found for '{key}' in {}", self.root.display());
            None
        } else {
            Some(artifact)
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    fn forecast() -> ForecastResult {
        ForecastResult::new(
            (1..=3)
                .map(|d| ForecastPoint {
                    date: date(d),
                    point: f64::from(d),
                    lower: f64::from(d) - 0.5,
                    upper: f64::from(d) + 0.5,
                    trend: f64::from(d),
                    weekly: 0.25,
                    yearly: -0.25,
                })
                .collect(),
        )
    }

    #[test]
    fn forecast_csv_has_dashboard_columns() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let path = store.write_forecast("B2", &forecast()).unwrap();

        let text = std::fs::read_to_string(path).unwrap();
        let header = text.lines().next().unwrap();
        assert_eq!(header, "ds,yhat,yhat_lower,yhat_upper,trend,weekly,yearly");
        assert!(text.contains("2024-06-01,1.0,0.5,1.5"));

        assert_eq!(store.read_forecast("B2").unwrap(), Some(forecast()));
    }

    #[test]
    fn test_results_keep_empty_prediction_cells() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let rows = vec![
            EvaluationRow {
                date: date(1),
                actual: 4,
                point: Some(3.5),
                lower: Some(2.0),
                upper: Some(5.0),
            },
            EvaluationRow {
                date: date(9),
                actual: 7,
                point: None,
                lower: None,
                upper: None,
            },
        ];
        let path = store.write_test_results("B2", &rows).unwrap();

        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.starts_with("ds,y,yhat,yhat_lower,yhat_upper"));
        assert!(text.contains("2024-06-09,7,,,"));
        assert_eq!(store.read_test_results("B2").unwrap(), Some(rows));
    }

    #[test]
    fn lists_partitions_with_awkward_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        store.write_forecast("LARCENY FROM_BUILDING", &forecast()).unwrap();
        store.write_future_forecast("LARCENY FROM_BUILDING", &forecast()).unwrap();
        store.write_forecast("A1", &forecast()).unwrap();
        store
            .write_summary("district", &serde_json::json!({"partitions": []}))
            .unwrap();
        std::fs::create_dir(store.path_for("E5", ArtifactKind::Forecast)).unwrap();

        assert_eq!(
            store.list_partitions(),
            vec!["A1".to_string(), "LARCENY FROM_BUILDING".to_string()]
        );
    }

    #[test]
    fn missing_directory_degrades_gracefully() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path().join("does-not-exist"));
        assert!(store.list_partitions().is_empty());
        assert!(store.load_partition("B2").is_none());
        assert_eq!(store.read_summary::<serde_json::Value>("district").unwrap(), None);
    }

    #[test]
    fn summaries_are_kept_per_scope() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        store.write_summary("district", &serde_json::json!({"n": 1})).unwrap();
        store.write_summary("category", &serde_json::json!({"n": 2})).unwrap();

        assert!(dir.path().join("district_batch_summary.json").is_file());
        assert_eq!(
            store.read_summary::<serde_json::Value>("district").unwrap(),
            Some(serde_json::json!({"n": 1}))
        );
        assert_eq!(
            store.read_summary::<serde_json::Value>("category").unwrap(),
            Some(serde_json::json!({"n": 2}))
        );
        assert!(store.list_partitions().is_empty());
    }

    #[test]
    fn discard_removes_written_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let written = vec![
            store.write_forecast("B2", &forecast()).unwrap(),
            store.path_for("B2", ArtifactKind::Model),
        ];

        store.discard(&written);

        assert!(!written[0].exists());
        assert!(store.list_partitions().is_empty());
    }

    #[test]
    fn load_partition_collects_what_exists() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        store.write_forecast("C11", &forecast()).unwrap();
        std::fs::write(store.path_for("C11", ArtifactKind::Model), "not json").unwrap();

        let artifact = store.load_partition("C11").unwrap();
        assert_eq!(artifact.forecast.map(|f| f.len()), Some(3));
        assert!(artifact.model.is_none());
        assert!(artifact.test_results.is_none());
    }

    #[test]
    fn hotspots_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let collection = FeatureCollection {
            bbox: None,
            features: Vec::new(),
            foreign_members: None,
        };
        store.write_hotspots("VANDALISM", &collection).unwrap();
        let back = store.read_hotspots("VANDALISM").unwrap().unwrap();
        assert!(back.features.is_empty());
    }
}

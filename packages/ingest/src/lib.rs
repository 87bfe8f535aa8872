#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Normalized incident table reader and partition sampling.
//!
//! Raw portal downloads are normalized upstream. This crate reads the
//! resulting CSV (one row per incident with latitude, longitude, occurrence
//! timestamp, offense type and district), validates that the required
//! columns exist before anything else happens, and hands out filtered or
//! sampled views of the table via [`partition`].

pub mod parsing;
pub mod partition;

use std::io::Read;
use std::path::Path;

use crime_forecast_incident_models::{Coordinates, IncidentRecord, UNKNOWN_DISTRICT};
use serde::{Deserialize, Serialize};

use crate::parsing::{parse_lat_lng_str, parse_occurred_at};

/// Errors that can occur while reading the incident table.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// I/O error (file open/read).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The table is missing columns the pipeline cannot run without.
    #[error("Missing required columns: {}", missing.join(", "))]
    MissingColumns {
        /// Names of the absent columns.
        missing: Vec<String>,
    },
}

/// Column names of the normalized incident table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct ColumnMapping {
    /// Latitude column.
    pub latitude: String,
    /// Longitude column.
    pub longitude: String,
    /// Occurrence timestamp column.
    pub occurred_at: String,
    /// Offense type column.
    pub category: String,
    /// District column. Optional in the table itself.
    pub district: String,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            latitude: "Lat".to_string(),
            longitude: "Long".to_string(),
            occurred_at: "OCCURRED_ON_DATE".to_string(),
            category: "OFFENSE_TYPE".to_string(),
            district: "DISTRICT".to_string(),
        }
    }
}

/// Resolved header positions for one table.
struct ColumnIndices {
    latitude: usize,
    longitude: usize,
    occurred_at: usize,
    category: usize,
    district: Option<usize>,
}

impl ColumnIndices {
    fn resolve(headers: &csv::StringRecord, mapping: &ColumnMapping) -> Result<Self, IngestError> {
        let find = |name: &str| headers.iter().position(|h| h.trim() == name);

        let required = [
            &mapping.latitude,
            &mapping.longitude,
            &mapping.occurred_at,
            &mapping.category,
        ];
        let missing: Vec<String> = required
            .iter()
            .filter(|name| find(name).is_none())
            .map(|name| (*name).clone())
            .collect();

        if !missing.is_empty() {
            log::error!("Missing columns in data: {missing:?}");
            return Err(IngestError::MissingColumns { missing });
        }

        let district = find(&mapping.district);
        if district.is_none() {
            log::warn!(
                "No '{}' column found; all records will use district {UNKNOWN_DISTRICT}",
                mapping.district
            );
        }

        // Presence was checked above.
        Ok(Self {
            latitude: find(&mapping.latitude).unwrap_or_default(),
            longitude: find(&mapping.longitude).unwrap_or_default(),
            occurred_at: find(&mapping.occurred_at).unwrap_or_default(),
            category: find(&mapping.category).unwrap_or_default(),
            district,
        })
    }
}

/// Reads the normalized incident table from a CSV file.
///
/// # Errors
///
/// Returns [`IngestError::MissingColumns`] if a required column is absent,
/// or an I/O / CSV error if the file cannot be read.
pub fn read_table(path: &Path, mapping: &ColumnMapping) -> Result<Vec<IncidentRecord>, IngestError> {
    log::info!("Loading incident table from {}", path.display());
    let file = std::fs::File::open(path)?;
    read_table_from_reader(file, mapping)
}

/// Reads the normalized incident table from any CSV source.
///
/// Rows whose timestamp or coordinates cannot be parsed are dropped and
/// counted in the log.
///
/// # Errors
///
/// Returns [`IngestError::MissingColumns`] if a required column is absent,
/// or a CSV error if the input is malformed.
pub fn read_table_from_reader<R: Read>(
    reader: R,
    mapping: &ColumnMapping,
) -> Result<Vec<IncidentRecord>, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Fields)
        .from_reader(reader);

    let columns = ColumnIndices::resolve(reader.headers()?, mapping)?;

    let mut records = Vec::new();
    let mut bad_timestamps = 0u64;
    let mut bad_coordinates = 0u64;

    for row in reader.records() {
        let row = row?;

        let Some(occurred_at) = row.get(columns.occurred_at).and_then(parse_occurred_at) else {
            bad_timestamps += 1;
            continue;
        };

        let Some((lat, lon)) = parse_lat_lng_str(row.get(columns.latitude), row.get(columns.longitude))
        else {
            bad_coordinates += 1;
            continue;
        };

        let category = row.get(columns.category).unwrap_or_default().to_string();
        let district = columns
            .district
            .and_then(|idx| row.get(idx))
            .filter(|d| !d.is_empty())
            .unwrap_or(UNKNOWN_DISTRICT)
            .to_string();

        records.push(IncidentRecord {
            coordinates: Coordinates::new(lat, lon),
            occurred_at,
            category,
            district,
        });
    }

    if bad_timestamps > 0 {
        log::warn!("Dropped {bad_timestamps} rows with unparseable timestamps");
    }
    if bad_coordinates > 0 {
        log::warn!("Dropped {bad_coordinates} rows with missing or invalid coordinates");
    }
    log::info!("Loaded {} incident records", records.len());

    Ok(records)
}

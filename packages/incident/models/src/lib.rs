#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Incident record types shared across the crime forecasting pipeline.
//!
//! The normalized incident table is loaded once into [`IncidentRecord`]s
//! and is read-only from then on. Every downstream stage (sampling,
//! clustering, aggregation) borrows from it.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// District label assigned to records whose source row has no district.
pub const UNKNOWN_DISTRICT: &str = "UNKNOWN";

/// A WGS84 coordinate pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coordinates {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
}

impl Coordinates {
    /// Creates a coordinate pair from latitude and longitude in degrees.
    #[must_use]
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Returns `(lat, lon)` converted to radians.
    #[must_use]
    pub fn to_radians(self) -> (f64, f64) {
        (self.lat.to_radians(), self.lon.to_radians())
    }
}

/// When an incident occurred.
///
/// Sources mix local wall-clock timestamps with offset-aware ones. The two
/// must never be truncated to dates side by side; use
/// [`OccurredAt::to_naive`] to bring them into one convention first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum OccurredAt {
    /// Wall-clock time with no offset information.
    Local(NaiveDateTime),
    /// Timestamp carrying an explicit UTC offset.
    Offset(DateTime<FixedOffset>),
}

impl OccurredAt {
    /// Returns `true` if this timestamp carries an explicit offset.
    #[must_use]
    pub const fn is_offset_aware(&self) -> bool {
        matches!(self, Self::Offset(_))
    }

    /// Converts to a naive timestamp.
    ///
    /// Offset-aware values are converted to UTC and the offset is dropped.
    /// Local values are returned unchanged.
    #[must_use]
    pub fn to_naive(&self) -> NaiveDateTime {
        match self {
            Self::Local(naive) => *naive,
            Self::Offset(aware) => aware.naive_utc(),
        }
    }

    /// Calendar date after normalizing to the naive convention.
    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.to_naive().date()
    }
}

/// Attribute under which the pipeline partitions the incident table.
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
pub enum PartitionBy {
    /// Police district (already spatially partitioned by the source).
    District,
    /// Offense category (clustered spatially before forecasting).
    Category,
}

impl PartitionBy {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::District, Self::Category]
    }
}

/// One row of the normalized incident table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentRecord {
    /// Incident location.
    pub coordinates: Coordinates,
    /// Occurrence timestamp.
    pub occurred_at: OccurredAt,
    /// Offense type label (e.g. `"LARCENY SHOPLIFTING"`).
    pub category: String,
    /// District label, [`UNKNOWN_DISTRICT`] when the source had none.
    pub district: String,
}

impl IncidentRecord {
    /// Returns the partition key of this record for the given grouping.
    #[must_use]
    pub fn partition_key(&self, by: PartitionBy) -> &str {
        match by {
            PartitionBy::District => &self.district,
            PartitionBy::Category => &self.category,
        }
    }
}

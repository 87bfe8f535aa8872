//! Timestamp and coordinate parsing for normalized incident rows.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use crime_forecast_incident_models::OccurredAt;

/// Offset-aware formats, tried after RFC 3339.
const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%#z", "%Y-%m-%d %H:%M:%S%.f%#z"];

/// Naive (local wall-clock) formats.
const LOCAL_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
];

/// Parses an occurrence timestamp, keeping track of whether it carried an
/// offset. Date-only values are taken as local midnight.
#[must_use]
pub fn parse_occurred_at(s: &str) -> Option<OccurredAt> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(aware) = DateTime::parse_from_rfc3339(s) {
        return Some(OccurredAt::Offset(aware));
    }
    for format in OFFSET_FORMATS {
        if let Ok(aware) = DateTime::parse_from_str(s, format) {
            return Some(OccurredAt::Offset(aware));
        }
    }
    for format in LOCAL_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(OccurredAt::Local(naive));
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .map(|date| OccurredAt::Local(date.and_time(chrono::NaiveTime::MIN)))
}

/// Parses lat/lng from optional string fields. Returns `None` if missing,
/// unparseable, non-finite, out of range, or zero.
#[must_use]
pub fn parse_lat_lng_str(lat: Option<&str>, lng: Option<&str>) -> Option<(f64, f64)> {
    let latitude = lat?.trim().parse::<f64>().ok()?;
    let longitude = lng?.trim().parse::<f64>().ok()?;
    if !latitude.is_finite() || !longitude.is_finite() {
        return None;
    }
    if latitude == 0.0 || longitude == 0.0 {
        return None;
    }
    if latitude.abs() > 90.0 || longitude.abs() > 180.0 {
        return None;
    }
    Some((latitude, longitude))
}

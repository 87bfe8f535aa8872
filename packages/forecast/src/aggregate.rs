//! Bucketing incident records into daily counts.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use crime_forecast_forecast_models::{DailyCount, DailySeries};
use crime_forecast_incident_models::IncidentRecord;

/// Counts records per calendar day.
///
/// Timestamps are first brought into one naive convention (offset-aware
/// values become naive UTC wall-clock time). A subset mixing offset-aware
/// and naive timestamps is logged and still normalized the same way.
///
/// Only days with at least one record appear in the result.
#[must_use]
pub fn daily_counts<'a>(records: impl IntoIterator<Item = &'a IncidentRecord>) -> DailySeries {
    let mut counts: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    let mut aware = 0usize;
    let mut naive = 0usize;

    for record in records {
        if record.occurred_at.is_offset_aware() {
            aware += 1;
        } else {
            naive += 1;
        }
        *counts.entry(record.occurred_at.date()).or_default() += 1;
    }

    if aware > 0 && naive > 0 {
        log::warn!(
            "Mixed timestamp representations ({aware} offset-aware, {naive} naive); \
             converting offset-aware values to naive UTC"
        );
    } else if aware > 0 {
        log::debug!("Converting {aware} offset-aware timestamps to naive UTC");
    }

    let series = DailySeries::from_counts(
        counts
            .into_iter()
            .map(|(date, count)| DailyCount { date, count }),
    );
    log::debug!("Aggregated {} incidents into {} days", series.total(), series.len());
    series
}

/// Inserts a zero count for every calendar day missing between the first
/// and last day of the series.
#[must_use]
pub fn fill_gaps(series: &DailySeries) -> DailySeries {
    let (Some(first), Some(last)) = (series.first_date(), series.last_date()) else {
        return series.clone();
    };

    let filled = first
        .iter_days()
        .take_while(|d| *d <= last)
        .map(|date| DailyCount {
            date,
            count: series.get(date).unwrap_or(0),
        });

    DailySeries::from_counts(filled)
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, NaiveDateTime, TimeZone as _};
    use crime_forecast_incident_models::{Coordinates, OccurredAt};

    use super::*;

    fn record(occurred_at: OccurredAt) -> IncidentRecord {
        IncidentRecord {
            coordinates: Coordinates::new(42.35, -71.06),
            occurred_at,
            category: "LARCENY".to_string(),
            district: "B2".to_string(),
        }
    }

    fn local(s: &str) -> OccurredAt {
        OccurredAt::Local(NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap())
    }

    #[test]
    fn counts_per_day_ascending() {
        let records = [
            record(local("2024-01-03 10:00:00")),
            record(local("2024-01-01 09:00:00")),
            record(local("2024-01-03 23:59:59")),
        ];
        let series = daily_counts(&records);
        assert_eq!(series.len(), 2);
        assert_eq!(series.first_date(), NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(series.get(NaiveDate::from_ymd_opt(2024, 1, 3).unwrap()), Some(2));
    }

    #[test]
    fn offset_aware_values_use_utc_date() {
        // 22:30 at -05:00 is 03:30 UTC the next day.
        let offset = FixedOffset::west_opt(5 * 3600).unwrap();
        let aware = offset.with_ymd_and_hms(2024, 3, 9, 22, 30, 0).unwrap();
        let records = [
            record(OccurredAt::Offset(aware)),
            record(local("2024-03-09 22:30:00")),
        ];
        let series = daily_counts(&records);
        assert_eq!(series.get(NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()), Some(1));
        assert_eq!(series.get(NaiveDate::from_ymd_opt(2024, 3, 10).unwrap()), Some(1));
    }

    #[test]
    fn empty_records_give_empty_series() {
        let records: Vec<IncidentRecord> = Vec::new();
        let series = daily_counts(&records);
        assert!(series.is_empty());
        assert!(fill_gaps(&series).is_empty());
    }

    #[test]
    fn fill_gaps_inserts_zero_days() {
        let records = [
            record(local("2024-01-01 09:00:00")),
            record(local("2024-01-04 09:00:00")),
        ];
        let filled = fill_gaps(&daily_counts(&records));
        assert_eq!(filled.len(), 4);
        assert_eq!(filled.get(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()), Some(0));
        assert_eq!(filled.total(), 2);
    }
}

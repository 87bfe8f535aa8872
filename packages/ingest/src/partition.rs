//! Filtering and sampling the incident table by partition key.

use std::collections::BTreeSet;

use crime_forecast_incident_models::{Coordinates, IncidentRecord, PartitionBy};
use rand::SeedableRng as _;
use rand::rngs::StdRng;

/// A sampled record subset with its index-aligned coordinates.
#[derive(Debug, Clone, Default)]
pub struct PartitionSample<'a> {
    /// Sampled records, in table order.
    pub records: Vec<&'a IncidentRecord>,
    /// `coordinates[i]` is the location of `records[i]`.
    pub coordinates: Vec<Coordinates>,
}

impl<'a> PartitionSample<'a> {
    fn from_records(records: Vec<&'a IncidentRecord>) -> Self {
        let coordinates = records.iter().map(|r| r.coordinates).collect();
        Self {
            records,
            coordinates,
        }
    }

    /// Number of sampled records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the sample is empty (a terminal, non-fatal state).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Filters the table by an optional category and draws a reproducible
/// uniform sample without replacement.
///
/// An unmatched category yields an empty sample. When fewer records are
/// available than `sample_size`, all of them are returned. The same
/// `seed` and table always produce the same subset.
#[must_use]
pub fn load_sample<'a>(
    table: &'a [IncidentRecord],
    category: Option<&str>,
    sample_size: usize,
    seed: u64,
) -> PartitionSample<'a> {
    let filtered: Vec<&IncidentRecord> = match category {
        Some(category) => {
            log::info!("Filtering data for crime type: {category}");
            let filtered: Vec<_> = table.iter().filter(|r| r.category == category).collect();
            log::info!(
                "Number of records after filtering for '{category}': {}",
                filtered.len()
            );
            if filtered.is_empty() {
                log::warn!("No data found for crime type '{category}'");
                return PartitionSample::default();
            }
            filtered
        }
        None => table.iter().collect(),
    };

    if filtered.len() <= sample_size {
        if filtered.len() < sample_size {
            log::warn!(
                "Requested sample size {sample_size} is larger than available data {}. \
                 Sampling all available data.",
                filtered.len()
            );
        }
        return PartitionSample::from_records(filtered);
    }

    log::info!("Sampling {sample_size} records from the filtered data...");
    let mut rng = StdRng::seed_from_u64(seed);
    let mut indices = rand::seq::index::sample(&mut rng, filtered.len(), sample_size).into_vec();
    indices.sort_unstable();

    let sample = PartitionSample::from_records(indices.into_iter().map(|i| filtered[i]).collect());
    log::info!("Sampled {} records.", sample.len());
    sample
}

/// Returns every distinct partition key in the table, sorted.
#[must_use]
pub fn partition_keys(table: &[IncidentRecord], by: PartitionBy) -> Vec<String> {
    table
        .iter()
        .map(|r| r.partition_key(by))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Returns all records (unsampled) belonging to one partition key.
#[must_use]
pub fn records_for_key<'a>(
    table: &'a [IncidentRecord],
    by: PartitionBy,
    key: &str,
) -> Vec<&'a IncidentRecord> {
    table.iter().filter(|r| r.partition_key(by) == key).collect()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use crime_forecast_incident_models::OccurredAt;

    use super::*;

    fn table() -> Vec<IncidentRecord> {
        let day = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        (0..100_i32)
            .map(|i| IncidentRecord {
                coordinates: Coordinates::new(42.0 + f64::from(i) * 0.001, -71.0),
                occurred_at: OccurredAt::Local(day),
                category: if i % 4 == 0 { "ROBBERY" } else { "LARCENY" }.to_string(),
                district: format!("D{}", i % 3),
            })
            .collect()
    }

    #[test]
    fn unmatched_category_is_empty_not_error() {
        let table = table();
        let sample = load_sample(&table, Some("ARSON"), 10, 42);
        assert!(sample.is_empty());
        assert!(sample.coordinates.is_empty());
    }

    #[test]
    fn small_population_returns_everything() {
        let table = table();
        let sample = load_sample(&table, Some("ROBBERY"), 1_000, 42);
        assert_eq!(sample.len(), 25);
        assert_eq!(sample.coordinates.len(), 25);
    }

    #[test]
    fn sampling_is_reproducible_under_seed() {
        let table = table();
        let a = load_sample(&table, None, 30, 7);
        let b = load_sample(&table, None, 30, 7);
        assert_eq!(a.len(), 30);
        assert_eq!(a.records, b.records);
        assert_eq!(a.coordinates, b.coordinates);
    }

    #[test]
    fn sample_is_without_replacement_and_aligned() {
        let table = table();
        let sample = load_sample(&table, None, 50, 1);
        let distinct: BTreeSet<_> = sample
            .records
            .iter()
            .map(|r| r.coordinates.lat.to_bits())
            .collect();
        assert_eq!(distinct.len(), 50);
        for (record, coords) in sample.records.iter().zip(&sample.coordinates) {
            assert_eq!(record.coordinates, *coords);
        }
    }

    #[test]
    fn partition_keys_are_distinct_and_sorted() {
        let table = table();
        assert_eq!(
            partition_keys(&table, PartitionBy::District),
            vec!["D0".to_string(), "D1".to_string(), "D2".to_string()]
        );
        assert_eq!(
            partition_keys(&table, PartitionBy::Category),
            vec!["LARCENY".to_string(), "ROBBERY".to_string()]
        );
    }

    #[test]
    fn records_for_key_filters_by_partition() {
        let table = table();
        let records = records_for_key(&table, PartitionBy::District, "D1");
        assert_eq!(records.len(), 33);
        assert!(records.iter().all(|r| r.district == "D1"));
    }
}

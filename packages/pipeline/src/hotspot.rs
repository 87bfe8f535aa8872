//! Clustering one category's sample into ranked hotspots.

use crime_forecast_incident_models::IncidentRecord;
use crime_forecast_ingest::partition::load_sample;
use crime_forecast_spatial::haversine::radians_to_meters;
use crime_forecast_spatial::hotspot::{Hotspot, summarize};
use crime_forecast_spatial::{ClusterLabeling, RankedCluster, cluster, rank_clusters};

use crate::config::PipelineConfig;

/// Result of clustering one category.
#[derive(Debug, Clone)]
pub struct HotspotAnalysis<'a> {
    /// Category that was analyzed.
    pub category: String,
    /// Sampled records, index-aligned with `labeling`.
    pub records: Vec<&'a IncidentRecord>,
    /// One label per sampled record.
    pub labeling: ClusterLabeling,
    /// Up to `top_k` clusters, largest first.
    pub ranked: Vec<RankedCluster>,
    /// Location summary per ranked cluster.
    pub hotspots: Vec<Hotspot>,
}

impl<'a> HotspotAnalysis<'a> {
    /// The largest cluster, if any point was clustered.
    #[must_use]
    pub fn top_cluster(&self) -> Option<RankedCluster> {
        self.ranked.first().copied()
    }

    /// Records belonging to `cluster_id`.
    #[must_use]
    pub fn cluster_records(&self, cluster_id: i32) -> Vec<&'a IncidentRecord> {
        self.labeling
            .members(cluster_id)
            .into_iter()
            .map(|i| self.records[i])
            .collect()
    }
}

/// Samples `category`, clusters the sample and ranks the clusters.
///
/// Returns `None` if the category has no records. An all-noise sample
/// returns an analysis with an empty ranking.
#[must_use]
pub fn analyze_category<'a>(
    table: &'a [IncidentRecord],
    category: &str,
    config: &PipelineConfig,
) -> Option<HotspotAnalysis<'a>> {
    let sample = load_sample(table, Some(category), config.sample_size, config.random_seed);
    if sample.is_empty() {
        log::warn!("No data available for crime type '{category}'. Exiting.");
        return None;
    }

    log::info!(
        "Clustering {} '{category}' incidents within {:.0} m (min {} neighbors)",
        sample.len(),
        radians_to_meters(config.cluster_radius),
        config.min_neighbors
    );
    let labeling = cluster(&sample.coordinates, &config.cluster_params());
    let ranked = rank_clusters(&labeling, config.top_k);
    let hotspots = summarize(&sample.coordinates, &labeling, &ranked);

    for hotspot in &hotspots {
        log::info!(
            "Hotspot #{} for '{category}': cluster {} with {} incidents around ({:.5}, {:.5})",
            hotspot.rank,
            hotspot.cluster_id,
            hotspot.member_count,
            hotspot.centroid.lat,
            hotspot.centroid.lon
        );
    }

    Some(HotspotAnalysis {
        category: category.to_string(),
        records: sample.records,
        labeling,
        ranked,
        hotspots,
    })
}

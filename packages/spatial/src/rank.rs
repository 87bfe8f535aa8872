//! Ranking clusters by membership.

use std::cmp::Reverse;

use serde::{Deserialize, Serialize};

use crate::ClusterLabeling;

/// A cluster id with its member count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedCluster {
    /// Cluster id from the labeling.
    pub cluster_id: i32,
    /// Number of points carrying the id.
    pub member_count: usize,
}

/// Returns up to `top_k` non-noise clusters, largest first.
///
/// Ties are broken by ascending cluster id. An all-noise labeling yields
/// an empty ranking.
#[must_use]
pub fn rank_clusters(labeling: &ClusterLabeling, top_k: usize) -> Vec<RankedCluster> {
    let mut ranked: Vec<RankedCluster> = labeling
        .member_counts()
        .into_iter()
        .map(|(cluster_id, member_count)| RankedCluster {
            cluster_id,
            member_count,
        })
        .collect();

    ranked.sort_by_key(|c| (Reverse(c.member_count), c.cluster_id));
    ranked.truncate(top_k);

    if ranked.is_empty() {
        log::warn!("No clusters found after removing noise.");
    } else {
        log::info!(
            "Top {} clusters: {}",
            ranked.len(),
            ranked
                .iter()
                .map(|c| format!("{}={}", c.cluster_id, c.member_count))
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NOISE;

    #[test]
    fn orders_by_size_then_id() {
        let labeling = ClusterLabeling::new(vec![2, 2, 0, 1, 1, 1, 0, NOISE, NOISE, NOISE, 3]);
        let ranked = rank_clusters(&labeling, 10);
        let ids: Vec<i32> = ranked.iter().map(|c| c.cluster_id).collect();
        assert_eq!(ids, vec![1, 0, 2, 3]);
        assert_eq!(ranked[0].member_count, 3);
    }

    #[test]
    fn returns_exactly_k_largest() {
        let labeling = ClusterLabeling::new(vec![0, 0, 0, 0, 1, 1, 1, 2, 2, 3]);
        let ranked = rank_clusters(&labeling, 2);
        assert_eq!(ranked.len(), 2);
        let smallest_returned = ranked.iter().map(|c| c.member_count).min().unwrap();
        let counts = labeling.member_counts();
        for (id, count) in counts {
            if !ranked.iter().any(|c| c.cluster_id == id) {
                assert!(count <= smallest_returned);
            }
        }
    }

    #[test]
    fn all_noise_is_empty() {
        let labeling = ClusterLabeling::new(vec![NOISE; 5]);
        assert!(rank_clusters(&labeling, 5).is_empty());
    }

    #[test]
    fn fewer_clusters_than_k_returns_all() {
        let labeling = ClusterLabeling::new(vec![0, 1, 1]);
        assert_eq!(rank_clusters(&labeling, 5).len(), 2);
    }
}

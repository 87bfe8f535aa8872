#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Density-based hotspot clustering for incident coordinates.
//!
//! Coordinates are clustered with DBSCAN under the haversine metric (the
//! neighborhood radius is a great-circle angle in radians). Neighbor
//! queries go through an R-tree of unit-sphere embeddings, so a radius
//! query is a chord-length ball check followed by an exact haversine test.
//!
//! The resulting [`ClusterLabeling`] is ranked by [`rank::rank_clusters`]
//! and summarized for the map layer by [`hotspot`].

pub mod dbscan;
pub mod haversine;
pub mod hotspot;
pub mod rank;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use dbscan::cluster;
pub use rank::{RankedCluster, rank_clusters};

/// Label assigned to points that belong to no dense region.
pub const NOISE: i32 = -1;

/// DBSCAN parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ClusterParams {
    /// Neighborhood radius as a great-circle angle in radians.
    pub eps: f64,
    /// Minimum neighborhood size (counting the point itself) for a core
    /// point.
    pub min_samples: usize,
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            eps: 0.0001,
            min_samples: 20,
        }
    }
}

/// One cluster label per input coordinate, [`NOISE`] for outliers.
///
/// Non-noise ids are numbered `0..n` in canonical order (see
/// [`dbscan::cluster`]).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClusterLabeling {
    labels: Vec<i32>,
}

impl ClusterLabeling {
    /// Wraps a raw label vector.
    #[must_use]
    pub const fn new(labels: Vec<i32>) -> Self {
        Self { labels }
    }

    /// Label of the point at `index`.
    #[must_use]
    pub fn label(&self, index: usize) -> Option<i32> {
        self.labels.get(index).copied()
    }

    /// Number of labeled points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether no points were labeled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Member count per non-noise cluster id.
    #[must_use]
    pub fn member_counts(&self) -> BTreeMap<i32, usize> {
        let mut counts = BTreeMap::new();
        for &label in self.labels.iter().filter(|&&l| l != NOISE) {
            *counts.entry(label).or_insert(0) += 1;
        }
        counts
    }

    /// Number of distinct non-noise clusters.
    #[must_use]
    pub fn cluster_count(&self) -> usize {
        self.member_counts().len()
    }

    /// Number of points labeled as noise.
    #[must_use]
    pub fn noise_count(&self) -> usize {
        self.labels.iter().filter(|&&l| l == NOISE).count()
    }

    /// Indices of the points carrying `cluster_id`.
    #[must_use]
    pub fn members(&self, cluster_id: i32) -> Vec<usize> {
        self.labels
            .iter()
            .enumerate()
            .filter(|&(_, &l)| l == cluster_id)
            .map(|(i, _)| i)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labeling_counts() {
        let labeling = ClusterLabeling::new(vec![0, 0, NOISE, 1, 0, NOISE]);
        assert_eq!(labeling.cluster_count(), 2);
        assert_eq!(labeling.noise_count(), 2);
        assert_eq!(labeling.members(0), vec![0, 1, 4]);
        assert_eq!(labeling.member_counts().get(&1), Some(&1));
        assert_eq!(labeling.label(2), Some(NOISE));
        assert_eq!(labeling.label(10), None);
    }
}

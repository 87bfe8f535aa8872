//! DBSCAN over geographic coordinates.

use std::cmp::Ordering;

use crime_forecast_incident_models::Coordinates;
use rstar::RTree;
use rstar::primitives::GeomWithData;

use crate::haversine::{central_angle_rad, chord_length, unit_vector};
use crate::{ClusterLabeling, ClusterParams, NOISE};

/// A unit-sphere embedding tagged with its input index.
type EmbeddedPoint = GeomWithData<[f64; 3], usize>;

/// R-tree over unit-sphere embeddings with exact haversine filtering.
struct NeighborIndex {
    tree: RTree<EmbeddedPoint>,
    radians: Vec<(f64, f64)>,
    embedded: Vec<[f64; 3]>,
}

impl NeighborIndex {
    fn build(coordinates: &[Coordinates]) -> Self {
        let radians: Vec<(f64, f64)> = coordinates.iter().map(|c| c.to_radians()).collect();
        let embedded: Vec<[f64; 3]> = radians
            .iter()
            .map(|&(lat, lon)| unit_vector(lat, lon))
            .collect();
        let tree = RTree::bulk_load(
            embedded
                .iter()
                .enumerate()
                .map(|(i, &p)| EmbeddedPoint::new(p, i))
                .collect(),
        );

        Self {
            tree,
            radians,
            embedded,
        }
    }

    /// Every point within `eps` radians of point `i` (including `i`
    /// itself), with its central angle.
    fn neighbors(&self, i: usize, eps: f64) -> impl Iterator<Item = (usize, f64)> + '_ {
        let chord = chord_length(eps);
        // Slack so the ball query never drops a point the exact test keeps.
        let max_squared = (chord * chord).mul_add(1.0 + 1e-9, 1e-18);
        let origin = self.radians[i];

        self.tree
            .locate_within_distance(self.embedded[i], max_squared)
            .map(move |candidate| {
                let j = candidate.data;
                (j, central_angle_rad(origin, self.radians[j]))
            })
            .filter(move |&(_, angle)| angle <= eps)
    }
}

/// Lexicographic `(lat, lon)` order used for canonical cluster numbering.
fn lexicographic(a: Coordinates, b: Coordinates) -> Ordering {
    a.lat.total_cmp(&b.lat).then(a.lon.total_cmp(&b.lon))
}

/// Clusters coordinates (in degrees) with DBSCAN under the haversine
/// metric.
///
/// A point is core when at least `min_samples` points (itself included)
/// lie within `eps` radians. Clusters are the connected components of core
/// points plus the non-core points within `eps` of a core point.
///
/// The result does not depend on input order:
/// * cluster ids are assigned by each cluster's lexicographically smallest
///   core coordinate;
/// * a border point reachable from several clusters joins the one owning
///   its nearest core neighbor, ties going to the smaller id.
///
/// Empty input yields an empty labeling.
#[must_use]
pub fn cluster(coordinates: &[Coordinates], params: &ClusterParams) -> ClusterLabeling {
    if coordinates.is_empty() {
        log::warn!("No coordinates provided for clustering.");
        return ClusterLabeling::default();
    }

    log::info!(
        "Performing DBSCAN clustering on {} points (eps={} rad, min_samples={})...",
        coordinates.len(),
        params.eps,
        params.min_samples
    );

    let n = coordinates.len();
    let eps = params.eps.max(0.0);
    let index = NeighborIndex::build(coordinates);

    let is_core: Vec<bool> = (0..n)
        .map(|i| index.neighbors(i, eps).count() >= params.min_samples)
        .collect();

    // Connected components of core points.
    let mut component: Vec<Option<usize>> = vec![None; n];
    let mut components: Vec<Vec<usize>> = Vec::new();

    for seed in 0..n {
        if !is_core[seed] || component[seed].is_some() {
            continue;
        }

        let id = components.len();
        let mut members = vec![seed];
        let mut stack = vec![seed];
        component[seed] = Some(id);

        while let Some(p) = stack.pop() {
            for (q, _) in index.neighbors(p, eps) {
                if is_core[q] && component[q].is_none() {
                    component[q] = Some(id);
                    members.push(q);
                    stack.push(q);
                }
            }
        }

        components.push(members);
    }

    // Canonical numbering by smallest core coordinate.
    let anchors: Vec<Coordinates> = components
        .iter()
        .map(|members| {
            members
                .iter()
                .map(|&i| coordinates[i])
                .min_by(|a, b| lexicographic(*a, *b))
                .unwrap_or(coordinates[members[0]])
        })
        .collect();

    let mut order: Vec<usize> = (0..components.len()).collect();
    order.sort_by(|&a, &b| lexicographic(anchors[a], anchors[b]).then(a.cmp(&b)));

    let mut canonical = vec![NOISE; components.len()];
    for (rank, &component_id) in order.iter().enumerate() {
        canonical[component_id] = i32::try_from(rank).unwrap_or(i32::MAX);
    }

    let mut labels = vec![NOISE; n];
    for (i, label) in labels.iter_mut().enumerate() {
        if let Some(c) = component[i] {
            *label = canonical[c];
        }
    }

    // Border points join the cluster of their nearest core neighbor.
    for i in (0..n).filter(|&i| !is_core[i]) {
        let nearest = index
            .neighbors(i, eps)
            .filter_map(|(j, angle)| component[j].map(|c| (angle, canonical[c])))
            .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        if let Some((_, id)) = nearest {
            labels[i] = id;
        }
    }

    let labeling = ClusterLabeling::new(labels);
    log::info!(
        "DBSCAN identified {} clusters (excluding noise), {} noise points.",
        labeling.cluster_count(),
        labeling.noise_count()
    );
    labeling
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::haversine::meters_to_radians;

    /// Dense `rows x cols` grid around `(lat, lon)` with ~1m spacing.
    fn dense_group(lat: f64, lon: f64, rows: u32, cols: u32) -> Vec<Coordinates> {
        let mut points = Vec::new();
        for r in 0..rows {
            for c in 0..cols {
                points.push(Coordinates::new(
                    lat + f64::from(r) * 0.00001,
                    lon + f64::from(c) * 0.00001,
                ));
            }
        }
        points
    }

    /// Sparse grid with ~1km spacing; no point has a neighbor within eps.
    fn scattered(count: u32) -> Vec<Coordinates> {
        (0..count)
            .map(|i| {
                Coordinates::new(
                    42.40 + f64::from(i / 15) * 0.01,
                    -71.30 + f64::from(i % 15) * 0.01,
                )
            })
            .collect()
    }

    /// Canonicalizes a labeling into a set of member-coordinate sets so two
    /// labelings over permuted inputs can be compared.
    fn clusters_as_sets(coords: &[Coordinates], labeling: &ClusterLabeling) -> BTreeSet<Vec<(u64, u64)>> {
        labeling
            .member_counts()
            .keys()
            .map(|&id| {
                let mut members: Vec<(u64, u64)> = labeling
                    .members(id)
                    .into_iter()
                    .map(|i| (coords[i].lat.to_bits(), coords[i].lon.to_bits()))
                    .collect();
                members.sort_unstable();
                members
            })
            .collect()
    }

    fn params() -> ClusterParams {
        ClusterParams {
            eps: 0.0001,
            min_samples: 20,
        }
    }

    #[test]
    fn empty_input_returns_empty_labels() {
        let labeling = cluster(&[], &params());
        assert!(labeling.is_empty());
    }

    #[test]
    fn finds_two_dense_groups_among_noise() {
        let mut coords = dense_group(42.35, -71.06, 20, 10);
        coords.extend(dense_group(42.30, -71.10, 10, 10));
        coords.extend(scattered(180));

        let labeling = cluster(&coords, &params());

        assert_eq!(labeling.len(), 480);
        assert_eq!(labeling.cluster_count(), 2);
        assert_eq!(labeling.noise_count(), 180);
        let mut sizes: Vec<usize> = labeling.member_counts().into_values().collect();
        sizes.sort_unstable();
        assert_eq!(sizes, vec![100, 200]);
    }

    #[test]
    fn canonical_ids_follow_smallest_coordinate() {
        let mut coords = dense_group(42.35, -71.06, 20, 10);
        coords.extend(dense_group(42.30, -71.10, 10, 10));
        let labeling = cluster(&coords, &params());
        // The southern group has the smaller latitude and gets id 0.
        assert_eq!(labeling.label(0), Some(1));
        assert_eq!(labeling.label(200), Some(0));
    }

    #[test]
    fn invariant_under_permutation() {
        let mut coords = dense_group(42.35, -71.06, 20, 10);
        coords.extend(dense_group(42.30, -71.10, 10, 10));
        coords.extend(scattered(60));

        let original = cluster(&coords, &params());

        let mut reversed = coords.clone();
        reversed.reverse();
        let reversed_labels = cluster(&reversed, &params());

        // Deterministic interleaving shuffle.
        let mut shuffled: Vec<Coordinates> = Vec::with_capacity(coords.len());
        let mut idx: Vec<usize> = (0..coords.len()).collect();
        idx.sort_by_key(|&i| (i * 7919) % coords.len());
        shuffled.extend(idx.iter().map(|&i| coords[i]));
        let shuffled_labels = cluster(&shuffled, &params());

        let expected = clusters_as_sets(&coords, &original);
        assert_eq!(clusters_as_sets(&reversed, &reversed_labels), expected);
        assert_eq!(clusters_as_sets(&shuffled, &shuffled_labels), expected);

        // Canonical numbering also survives the permutation.
        for (pos, &i) in idx.iter().enumerate() {
            assert_eq!(shuffled_labels.label(pos), original.label(i));
        }
    }

    #[test]
    fn border_points_join_a_cluster() {
        // Two stacks ~400m apart are both core. A point ~400m north of the
        // northern stack only sees that stack (11 neighbors), so it is a
        // border point reachable from the core.
        let mut coords = vec![Coordinates::new(42.35, -71.06); 10];
        coords.extend(vec![Coordinates::new(42.3464, -71.06); 10]);
        coords.push(Coordinates::new(42.3536, -71.06));
        let labeling = cluster(&coords, &params());
        assert_eq!(labeling.cluster_count(), 1);
        assert_eq!(labeling.label(20), Some(0));
        assert_eq!(labeling.noise_count(), 0);
    }

    #[test]
    fn point_just_outside_radius_is_noise() {
        let mut coords = vec![Coordinates::new(42.35, -71.06); 20];
        // ~1.1km north.
        coords.push(Coordinates::new(42.36, -71.06));
        let labeling = cluster(&coords, &params());
        assert_eq!(labeling.label(20), Some(NOISE));
    }

    #[test]
    fn radius_uses_great_circle_not_degrees() {
        // Two points 0.005 degrees of longitude apart at 60N are ~278m on
        // the ground, far closer than their planar degree difference
        // suggests. With eps = 300m they must be neighbors.
        let eps = meters_to_radians(300.0);
        let coords = vec![Coordinates::new(60.0, 10.0), Coordinates::new(60.0, 10.005)];
        let labeling = cluster(
            &coords,
            &ClusterParams {
                eps,
                min_samples: 2,
            },
        );
        assert_eq!(labeling.cluster_count(), 1);
    }

    #[test]
    fn all_noise_when_nothing_is_dense() {
        let labeling = cluster(&scattered(30), &params());
        assert_eq!(labeling.cluster_count(), 0);
        assert_eq!(labeling.noise_count(), 30);
    }
}

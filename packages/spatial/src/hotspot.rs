//! Hotspot summaries for ranked clusters and their `GeoJSON` export.

use crime_forecast_incident_models::Coordinates;
use geo::{BoundingRect as _, Centroid as _, MultiPoint, Point};
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, JsonValue};
use serde::{Deserialize, Serialize};

use crate::{ClusterLabeling, RankedCluster};

/// Location summary of one ranked cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hotspot {
    /// 1-based rank (1 = most members).
    pub rank: usize,
    /// Cluster id from the labeling.
    pub cluster_id: i32,
    /// Number of member points.
    pub member_count: usize,
    /// Planar centroid of the members.
    pub centroid: Coordinates,
    /// South-west corner of the members' bounding box.
    pub min: Coordinates,
    /// North-east corner of the members' bounding box.
    pub max: Coordinates,
}

/// Summarizes each ranked cluster. Clusters without members are skipped.
#[must_use]
pub fn summarize(
    coordinates: &[Coordinates],
    labeling: &ClusterLabeling,
    ranked: &[RankedCluster],
) -> Vec<Hotspot> {
    ranked
        .iter()
        .enumerate()
        .filter_map(|(i, cluster)| {
            let points: MultiPoint<f64> = labeling
                .members(cluster.cluster_id)
                .into_iter()
                .filter_map(|idx| coordinates.get(idx))
                .map(|c| Point::new(c.lon, c.lat))
                .collect::<Vec<_>>()
                .into();

            let centroid = points.centroid()?;
            let rect = points.bounding_rect()?;

            Some(Hotspot {
                rank: i + 1,
                cluster_id: cluster.cluster_id,
                member_count: cluster.member_count,
                centroid: Coordinates::new(centroid.y(), centroid.x()),
                min: Coordinates::new(rect.min().y, rect.min().x),
                max: Coordinates::new(rect.max().y, rect.max().x),
            })
        })
        .collect()
}

/// Builds a `GeoJSON` feature collection of hotspot centroids, with the
/// members' bounding box as each feature's `bbox`.
#[must_use]
pub fn to_feature_collection(hotspots: &[Hotspot]) -> FeatureCollection {
    let features = hotspots
        .iter()
        .map(|h| {
            let point = Point::new(h.centroid.lon, h.centroid.lat);

            let mut properties = JsonObject::new();
            properties.insert("rank".to_string(), JsonValue::from(h.rank));
            properties.insert("clusterId".to_string(), JsonValue::from(h.cluster_id));
            properties.insert("memberCount".to_string(), JsonValue::from(h.member_count));

            Feature {
                bbox: Some(vec![h.min.lon, h.min.lat, h.max.lon, h.max.lat]),
                geometry: Some(Geometry::new(geojson::Value::from(&point))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NOISE;

    #[test]
    fn summarizes_centroid_and_bounds() {
        let coords = vec![
            Coordinates::new(42.0, -71.0),
            Coordinates::new(42.2, -71.2),
            Coordinates::new(10.0, 10.0),
        ];
        let labeling = ClusterLabeling::new(vec![0, 0, NOISE]);
        let ranked = [RankedCluster {
            cluster_id: 0,
            member_count: 2,
        }];

        let hotspots = summarize(&coords, &labeling, &ranked);
        assert_eq!(hotspots.len(), 1);
        let h = &hotspots[0];
        assert_eq!(h.rank, 1);
        assert!((h.centroid.lat - 42.1).abs() < 1e-9);
        assert!((h.centroid.lon - -71.1).abs() < 1e-9);
        assert!((h.min.lat - 42.0).abs() < 1e-12);
        assert!((h.max.lon - -71.0).abs() < 1e-12);
    }

    #[test]
    fn exports_feature_per_hotspot() {
        let hotspot = Hotspot {
            rank: 1,
            cluster_id: 3,
            member_count: 250,
            centroid: Coordinates::new(42.35, -71.06),
            min: Coordinates::new(42.34, -71.07),
            max: Coordinates::new(42.36, -71.05),
        };
        let collection = to_feature_collection(&[hotspot]);
        assert_eq!(collection.features.len(), 1);

        let json = collection.to_string();
        assert!(json.contains("\"memberCount\":250"));
        assert!(json.contains("-71.06"));
    }
}

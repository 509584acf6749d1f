//! Fixed-radius density clustering (DBSCAN).
//!
//! Neighbor queries go through an `rstar` R-tree rather than a brute
//! force scan, so large record sets stay tractable. Cluster expansion
//! is breadth-first with neighbor lists sorted by ascending record
//! index, which makes the labeling stable for a fixed input order.

use std::collections::VecDeque;

use hotspot_analytics_models::NOISE;
use rstar::{AABB, PointDistance, RTree, RTreeObject};

use crate::AnalyticsError;
use crate::features::FeatureSet;

/// Label for points the expansion has not reached yet.
const UNVISITED: i32 = -2;

/// A feature vector stored in the R-tree with its record index.
struct IndexedPoint {
    index: usize,
    position: [f64; 3],
}

impl RTreeObject for IndexedPoint {
    type Envelope = AABB<[f64; 3]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.position)
    }
}

impl PointDistance for IndexedPoint {
    fn distance_2(&self, point: &[f64; 3]) -> f64 {
        let dx = self.position[0] - point[0];
        let dy = self.position[1] - point[1];
        let dz = self.position[2] - point[2];
        dz.mul_add(dz, dx.mul_add(dx, dy * dy))
    }
}

/// Assigns density-reachability cluster ids over the feature vectors.
///
/// A point is a core point when at least `min_neighbors` *other* points
/// lie within `radius`; clusters chain core points with their reachable
/// neighbors, and everything else gets [`NOISE`].
///
/// # Errors
///
/// Returns [`AnalyticsError::InvalidParameter`] if `radius` is not a
/// finite positive number or `min_neighbors` is zero.
pub fn dbscan(
    features: &FeatureSet,
    radius: f64,
    min_neighbors: usize,
) -> Result<Vec<i32>, AnalyticsError> {
    if !radius.is_finite() || radius <= 0.0 {
        return Err(AnalyticsError::InvalidParameter {
            name: "radius",
            value: radius.to_string(),
            expected: "a finite number greater than 0",
        });
    }
    if min_neighbors == 0 {
        return Err(AnalyticsError::InvalidParameter {
            name: "min_neighbors",
            value: min_neighbors.to_string(),
            expected: "an integer greater than or equal to 1",
        });
    }

    let vectors = features.vectors();
    let n = vectors.len();
    if n == 0 {
        return Ok(Vec::new());
    }

    let tree = RTree::bulk_load(
        vectors
            .iter()
            .enumerate()
            .map(|(index, &position)| IndexedPoint { index, position })
            .collect(),
    );

    let neighbors = |index: usize| -> Vec<usize> {
        let mut found: Vec<usize> = tree
            .locate_within_distance(vectors[index], radius * radius)
            .map(|p| p.index)
            .filter(|&i| i != index)
            .collect();
        found.sort_unstable();
        found
    };

    let mut labels = vec![UNVISITED; n];
    let mut next_id: i32 = 0;

    for i in 0..n {
        if labels[i] != UNVISITED {
            continue;
        }

        let seed = neighbors(i);
        if seed.len() < min_neighbors {
            labels[i] = NOISE;
            continue;
        }

        let id = next_id;
        next_id += 1;
        labels[i] = id;

        let mut queue: VecDeque<usize> = seed.into();
        while let Some(q) = queue.pop_front() {
            if labels[q] == NOISE {
                // Previously labeled noise, now reachable: border point.
                labels[q] = id;
                continue;
            }
            if labels[q] != UNVISITED {
                continue;
            }
            labels[q] = id;

            let reachable = neighbors(q);
            if reachable.len() >= min_neighbors {
                queue.extend(reachable);
            }
        }
    }

    log::debug!(
        "dbscan: {} points, {} clusters, {} noise",
        n,
        next_id,
        labels.iter().filter(|&&l| l == NOISE).count()
    );

    Ok(labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{FeatureMode, build_features};
    use crate::test_support::{record_set, two_blobs};

    fn spatial(records: &hotspot_records_models::RecordSet) -> FeatureSet {
        build_features(records, FeatureMode::Spatial).unwrap()
    }

    #[test]
    fn separates_two_blobs_without_noise() {
        let feats = spatial(&two_blobs());
        let labels = dbscan(&feats, 0.01, 3).unwrap();

        assert_eq!(labels[..6], [0, 0, 0, 0, 0, 0]);
        assert_eq!(labels[6..], [1, 1, 1, 1, 1, 1]);
    }

    #[test]
    fn sparse_points_are_noise() {
        let records = record_set(&[
            ("Burglary", 0.0, 0.0, None),
            ("Burglary", 5.0, 5.0, None),
            ("Burglary", 10.0, 10.0, None),
        ]);
        let labels = dbscan(&spatial(&records), 0.01, 2).unwrap();
        assert_eq!(labels, vec![NOISE, NOISE, NOISE]);
    }

    #[test]
    fn ids_are_noise_or_non_negative() {
        let feats = spatial(&two_blobs());
        let labels = dbscan(&feats, 0.01, 10).unwrap();
        assert!(labels.iter().all(|&l| l == NOISE || l >= 0));
    }

    #[test]
    fn min_neighbors_counts_other_points_only() {
        // Six points per blob: each has five others within the radius,
        // so min_neighbors=5 still forms clusters.
        let feats = spatial(&two_blobs());
        let labels = dbscan(&feats, 0.01, 5).unwrap();
        assert!(labels.iter().all(|&l| l != NOISE));
    }

    #[test]
    fn rejects_non_positive_radius() {
        let feats = spatial(&two_blobs());
        let err = dbscan(&feats, 0.0, 3).unwrap_err();
        assert!(matches!(
            err,
            crate::AnalyticsError::InvalidParameter { name: "radius", .. }
        ));
    }

    #[test]
    fn rejects_zero_min_neighbors() {
        let feats = spatial(&two_blobs());
        assert!(dbscan(&feats, 0.01, 0).is_err());
    }

    #[test]
    fn empty_input_is_valid() {
        let feats = spatial(&record_set(&[]));
        assert!(dbscan(&feats, 0.01, 3).unwrap().is_empty());
    }
}

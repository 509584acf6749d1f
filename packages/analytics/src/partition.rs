//! Fixed-k partition clustering (k-means).
//!
//! k-means++ seeding from a fixed-seed `StdRng` keeps every run
//! deterministic for a given input order and parameter set, matching
//! the purity contract of the other engines.

use rand::rngs::StdRng;
use rand::{Rng as _, SeedableRng as _};

use crate::AnalyticsError;
use crate::features::FeatureSet;

/// Seed for the k-means++ initialization.
const KMEANS_SEED: u64 = 0;

/// Lloyd iteration cap.
const MAX_ITERATIONS: usize = 300;

/// Partitions the feature vectors into exactly `n_clusters` groups.
///
/// Returns one non-negative label per vector plus the total
/// within-cluster sum of squared distances (inertia).
///
/// # Errors
///
/// Returns [`AnalyticsError::InvalidParameter`] if `n_clusters` is zero
/// or exceeds the number of records.
pub fn kmeans(features: &FeatureSet, n_clusters: usize) -> Result<(Vec<i32>, f64), AnalyticsError> {
    let vectors = features.vectors();
    let n = vectors.len();

    if n_clusters == 0 || n_clusters > n {
        return Err(AnalyticsError::InvalidParameter {
            name: "n_clusters",
            value: n_clusters.to_string(),
            expected: "an integer between 1 and the record count",
        });
    }

    let mut rng = StdRng::seed_from_u64(KMEANS_SEED);
    let mut centroids = plus_plus_init(vectors, n_clusters, &mut rng);
    let mut labels = vec![0_usize; n];

    for _ in 0..MAX_ITERATIONS {
        let mut changed = false;
        for (i, point) in vectors.iter().enumerate() {
            let nearest = nearest_centroid(point, &centroids);
            if labels[i] != nearest {
                labels[i] = nearest;
                changed = true;
            }
        }

        let mut sums = vec![[0.0_f64; 3]; n_clusters];
        let mut counts = vec![0_usize; n_clusters];
        for (i, point) in vectors.iter().enumerate() {
            let c = labels[i];
            counts[c] += 1;
            for axis in 0..3 {
                sums[c][axis] += point[axis];
            }
        }

        // Points already claimed by a reseed this pass; without this,
        // coincident points let one reseed steal another's point and a
        // cluster id vanishes from the output.
        let mut claimed = vec![false; n];
        for c in 0..n_clusters {
            if counts[c] == 0 {
                // Re-seed an emptied cluster with the point farthest
                // from its current centroid.
                let far = farthest_point(vectors, &labels, &centroids, &claimed);
                claimed[far] = true;
                centroids[c] = vectors[far];
                labels[far] = c;
                changed = true;
            } else {
                #[allow(clippy::cast_precision_loss)]
                let count = counts[c] as f64;
                for axis in 0..3 {
                    centroids[c][axis] = sums[c][axis] / count;
                }
            }
        }

        if !changed {
            break;
        }
    }

    let inertia: f64 = vectors
        .iter()
        .enumerate()
        .map(|(i, point)| squared_distance(point, &centroids[labels[i]]))
        .sum();

    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    let labels = labels.into_iter().map(|l| l as i32).collect();

    Ok((labels, inertia))
}

fn squared_distance(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    dz.mul_add(dz, dx.mul_add(dx, dy * dy))
}

/// Index of the closest centroid; ties go to the lowest index.
fn nearest_centroid(point: &[f64; 3], centroids: &[[f64; 3]]) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (c, centroid) in centroids.iter().enumerate() {
        let dist = squared_distance(point, centroid);
        if dist < best_dist {
            best = c;
            best_dist = dist;
        }
    }
    best
}

/// The unclaimed point farthest from its assigned centroid; ties go to
/// the lowest index.
fn farthest_point(
    vectors: &[[f64; 3]],
    labels: &[usize],
    centroids: &[[f64; 3]],
    claimed: &[bool],
) -> usize {
    let mut far = 0;
    let mut far_dist = -1.0_f64;
    for (i, point) in vectors.iter().enumerate() {
        if claimed[i] {
            continue;
        }
        let dist = squared_distance(point, &centroids[labels[i]]);
        if dist > far_dist {
            far = i;
            far_dist = dist;
        }
    }
    far
}

/// k-means++ seeding: each subsequent centroid is drawn weighted by
/// squared distance to the nearest already-chosen centroid.
fn plus_plus_init(vectors: &[[f64; 3]], n_clusters: usize, rng: &mut StdRng) -> Vec<[f64; 3]> {
    let n = vectors.len();
    let mut centroids = Vec::with_capacity(n_clusters);
    centroids.push(vectors[rng.gen_range(0..n)]);

    while centroids.len() < n_clusters {
        let weights: Vec<f64> = vectors
            .iter()
            .map(|p| {
                centroids
                    .iter()
                    .map(|c| squared_distance(p, c))
                    .fold(f64::INFINITY, f64::min)
            })
            .collect();
        let total: f64 = weights.iter().sum();

        let next = if total > 0.0 {
            let mut target = rng.r#gen::<f64>() * total;
            let mut chosen = n - 1;
            for (i, w) in weights.iter().enumerate() {
                target -= w;
                if target <= 0.0 {
                    chosen = i;
                    break;
                }
            }
            chosen
        } else {
            // All points coincide with a centroid already.
            rng.gen_range(0..n)
        };

        centroids.push(vectors[next]);
    }

    centroids
}

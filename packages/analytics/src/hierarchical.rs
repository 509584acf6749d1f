//! Variable-density hierarchical clustering (HDBSCAN-style).
//!
//! Pipeline: core distances at `min_samples`, mutual-reachability
//! distances, a Prim minimum spanning tree, a single-linkage
//! dendrogram, a condensed tree at `min_cluster_size`, and
//! excess-of-mass cluster selection. Each point additionally receives a
//! membership probability and a GLOSH outlier score, both in `[0, 1]`.
//!
//! Everything here is deterministic: ties in the MST are broken by
//! ascending point index, and condensed cluster ids follow creation
//! order.

use hotspot_analytics_models::NOISE;

use crate::AnalyticsError;
use crate::features::FeatureSet;

/// Cap for `1 / distance` when points coincide.
const LAMBDA_CAP: f64 = 1e12;

/// Per-point output of the variable-density clusterer.
#[derive(Debug, Clone, PartialEq)]
pub struct HierarchicalFit {
    /// Cluster id per point, or [`NOISE`].
    pub labels: Vec<i32>,
    /// Membership confidence per point in `[0, 1]`; 0 for noise.
    pub probabilities: Vec<f64>,
    /// Relative sparsity per point in `[0, 1]`; higher is more
    /// outlying.
    pub outlier_scores: Vec<f64>,
}

/// An edge of the mutual-reachability minimum spanning tree.
struct MstEdge {
    a: usize,
    b: usize,
    weight: f64,
}

/// An internal dendrogram node (`node id = point count + merge index`).
struct Merge {
    left: usize,
    right: usize,
    dist: f64,
}

/// One row of the condensed tree. `child < n` means a point falling
/// out of `parent`; otherwise `child` is a condensed cluster id offset
/// by `n`.
struct CondensedRow {
    parent: usize,
    child: usize,
    lambda: f64,
    size: usize,
}

/// Runs the variable-density clusterer over the feature vectors.
///
/// # Errors
///
/// Returns [`AnalyticsError::InvalidParameter`] if `min_cluster_size`
/// is below 2 or `min_samples` is zero.
pub fn hdbscan(
    features: &FeatureSet,
    min_cluster_size: usize,
    min_samples: usize,
) -> Result<HierarchicalFit, AnalyticsError> {
    if min_cluster_size < 2 {
        return Err(AnalyticsError::InvalidParameter {
            name: "min_cluster_size",
            value: min_cluster_size.to_string(),
            expected: "an integer greater than or equal to 2",
        });
    }
    if min_samples == 0 {
        return Err(AnalyticsError::InvalidParameter {
            name: "min_samples",
            value: min_samples.to_string(),
            expected: "an integer greater than or equal to 1",
        });
    }

    let vectors = features.vectors();
    let n = vectors.len();

    if n < min_cluster_size {
        // Too few points to form any cluster.
        return Ok(HierarchicalFit {
            labels: vec![NOISE; n],
            probabilities: vec![0.0; n],
            outlier_scores: vec![0.0; n],
        });
    }

    let core = core_distances(vectors, min_samples);
    let edges = minimum_spanning_tree(vectors, &core);
    let merges = single_linkage(n, edges);
    let rows = condense(n, &merges, min_cluster_size);

    label_points(n, &rows)
}

fn distance(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    dz.mul_add(dz, dx.mul_add(dx, dy * dy)).sqrt()
}

/// Distance to each point's `min_samples`-th nearest other point,
/// clamped to the set size.
fn core_distances(vectors: &[[f64; 3]], min_samples: usize) -> Vec<f64> {
    let n = vectors.len();
    let k = min_samples.min(n - 1);

    (0..n)
        .map(|i| {
            if k == 0 {
                return 0.0;
            }
            let mut dists: Vec<f64> = (0..n)
                .filter(|&j| j != i)
                .map(|j| distance(&vectors[i], &vectors[j]))
                .collect();
            let (_, kth, _) =
                dists.select_nth_unstable_by(k - 1, |a, b| a.total_cmp(b));
            *kth
        })
        .collect()
}

/// Prim MST over the complete mutual-reachability graph. Ties are
/// broken by ascending point index.
fn minimum_spanning_tree(vectors: &[[f64; 3]], core: &[f64]) -> Vec<MstEdge> {
    let n = vectors.len();
    let reach = |a: usize, b: usize| {
        distance(&vectors[a], &vectors[b])
            .max(core[a])
            .max(core[b])
    };

    let mut in_tree = vec![false; n];
    let mut best = vec![f64::INFINITY; n];
    let mut from = vec![0_usize; n];
    let mut edges = Vec::with_capacity(n - 1);

    in_tree[0] = true;
    for j in 1..n {
        best[j] = reach(0, j);
    }

    for _ in 1..n {
        let mut next = usize::MAX;
        for j in 0..n {
            if !in_tree[j] && (next == usize::MAX || best[j] < best[next]) {
                next = j;
            }
        }

        edges.push(MstEdge {
            a: from[next],
            b: next,
            weight: best[next],
        });
        in_tree[next] = true;

        for j in 0..n {
            if !in_tree[j] {
                let w = reach(next, j);
                if w < best[j] {
                    best[j] = w;
                    from[j] = next;
                }
            }
        }
    }

    edges.sort_by(|x, y| x.weight.total_cmp(&y.weight).then(x.a.cmp(&y.a)).then(x.b.cmp(&y.b)));
    edges
}

/// Builds the single-linkage dendrogram from sorted MST edges via
/// union-find.
fn single_linkage(n: usize, edges: Vec<MstEdge>) -> Vec<Merge> {
    let mut uf_parent: Vec<usize> = (0..n).collect();
    // Current dendrogram node per component root.
    let mut comp_node: Vec<usize> = (0..n).collect();

    fn find(uf: &mut [usize], x: usize) -> usize {
        let mut root = x;
        while uf[root] != root {
            root = uf[root];
        }
        let mut cur = x;
        while uf[cur] != root {
            let next = uf[cur];
            uf[cur] = root;
            cur = next;
        }
        root
    }

    let mut merges = Vec::with_capacity(n - 1);
    for edge in edges {
        let ra = find(&mut uf_parent, edge.a);
        let rb = find(&mut uf_parent, edge.b);

        let node_id = n + merges.len();
        merges.push(Merge {
            left: comp_node[ra],
            right: comp_node[rb],
            dist: edge.weight,
        });

        uf_parent[rb] = ra;
        comp_node[ra] = node_id;
    }
    merges
}

/// Leaf count under a dendrogram node.
fn subtree_size(n: usize, merges: &[Merge], node: usize) -> usize {
    leaves_under(n, merges, node).len()
}

/// All point indices under a dendrogram node.
fn leaves_under(n: usize, merges: &[Merge], node: usize) -> Vec<usize> {
    let mut leaves = Vec::new();
    let mut stack = vec![node];
    while let Some(cur) = stack.pop() {
        if cur < n {
            leaves.push(cur);
        } else {
            let merge = &merges[cur - n];
            stack.push(merge.left);
            stack.push(merge.right);
        }
    }
    leaves.sort_unstable();
    leaves
}

fn lambda_of(dist: f64) -> f64 {
    if dist > 1.0 / LAMBDA_CAP {
        1.0 / dist
    } else {
        LAMBDA_CAP
    }
}

/// Collapses the dendrogram into the condensed tree: splits where both
/// sides reach `min_cluster_size` spawn new clusters, smaller sides
/// fall out as points at the split's lambda.
fn condense(n: usize, merges: &[Merge], min_cluster_size: usize) -> Vec<CondensedRow> {
    let root = n + merges.len() - 1;
    let mut rows = Vec::with_capacity(n);
    let mut next_cluster = 1_usize; // cluster 0 is the root

    // (dendrogram node, condensed cluster it belongs to)
    let mut stack = vec![(root, 0_usize)];

    while let Some((node, cluster)) = stack.pop() {
        let merge = &merges[node - n];
        let lambda = lambda_of(merge.dist);

        let shed_points = |child: usize, rows: &mut Vec<CondensedRow>| {
            for point in leaves_under(n, merges, child) {
                rows.push(CondensedRow {
                    parent: cluster,
                    child: point,
                    lambda,
                    size: 1,
                });
            }
        };

        let left_size = subtree_size(n, merges, merge.left);
        let right_size = subtree_size(n, merges, merge.right);

        if left_size >= min_cluster_size && right_size >= min_cluster_size {
            for child in [merge.left, merge.right] {
                let id = next_cluster;
                next_cluster += 1;
                rows.push(CondensedRow {
                    parent: cluster,
                    child: n + id,
                    lambda,
                    size: subtree_size(n, merges, child),
                });
                stack.push((child, id));
            }
        } else if left_size < min_cluster_size && right_size < min_cluster_size {
            shed_points(merge.left, &mut rows);
            shed_points(merge.right, &mut rows);
        } else if left_size < min_cluster_size {
            shed_points(merge.left, &mut rows);
            stack.push((merge.right, cluster));
        } else {
            shed_points(merge.right, &mut rows);
            stack.push((merge.left, cluster));
        }
    }

    rows
}

/// Excess-of-mass cluster selection plus per-point labels,
/// probabilities, and GLOSH outlier scores.
fn label_points(n: usize, rows: &[CondensedRow]) -> Result<HierarchicalFit, AnalyticsError> {
    let cluster_count = rows
        .iter()
        .filter(|r| r.child >= n)
        .map(|r| r.child - n)
        .max()
        .unwrap_or(0)
        + 1;

    // Birth lambda and parent per condensed cluster.
    let mut birth = vec![0.0_f64; cluster_count];
    let mut parent_of = vec![usize::MAX; cluster_count];
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); cluster_count];
    for row in rows {
        if row.child >= n {
            let child = row.child - n;
            birth[child] = row.lambda;
            parent_of[child] = row.parent;
            children[row.parent].push(child);
        }
    }

    // Stability: sum of (lambda - birth) over everything leaving the
    // cluster, weighted by size.
    let mut stability = vec![0.0_f64; cluster_count];
    for row in rows {
        #[allow(clippy::cast_precision_loss)]
        let weight = row.size as f64;
        stability[row.parent] += (row.lambda - birth[row.parent]) * weight;
    }

    if stability.iter().any(|s| !s.is_finite()) {
        return Err(AnalyticsError::ModelFit {
            message: "non-finite cluster stability".to_string(),
        });
    }

    // Bottom-up: a cluster beats its children when its own stability
    // reaches the sum of theirs. Child ids are always larger than the
    // parent's, so descending order visits children first.
    let mut selected = vec![false; cluster_count];
    let mut subtree_stability = stability.clone();
    for c in (1..cluster_count).rev() {
        if children[c].is_empty() {
            selected[c] = true;
        } else {
            let child_sum: f64 = children[c].iter().map(|&k| subtree_stability[k]).sum();
            if stability[c] >= child_sum {
                selected[c] = true;
            } else {
                selected[c] = false;
                subtree_stability[c] = child_sum;
            }
        }
    }

    // Top-down: emit the shallowest selected cluster on each branch;
    // the root itself is never a cluster.
    let mut emitted = vec![false; cluster_count];
    let mut stack: Vec<usize> = children[0].clone();
    while let Some(c) = stack.pop() {
        if selected[c] {
            emitted[c] = true;
        } else {
            stack.extend(children[c].iter().copied());
        }
    }

    // Nearest emitted ancestor (inclusive) per condensed cluster.
    let mut emitted_of: Vec<Option<usize>> = vec![None; cluster_count];
    for c in 0..cluster_count {
        if emitted[c] {
            emitted_of[c] = Some(c);
        } else if c > 0 {
            emitted_of[c] = emitted_of[parent_of[c]];
        }
    }

    // Compact ids in creation order.
    let mut compact = vec![NOISE; cluster_count];
    let mut next_id = 0_i32;
    for c in 0..cluster_count {
        if emitted[c] {
            compact[c] = next_id;
            next_id += 1;
        }
    }

    // Max lambda inside each condensed subtree (for GLOSH) and inside
    // each emitted cluster's membership (for probabilities).
    let mut subtree_max = vec![0.0_f64; cluster_count];
    for row in rows {
        if row.child < n && row.lambda > subtree_max[row.parent] {
            subtree_max[row.parent] = row.lambda;
        }
    }
    for c in (1..cluster_count).rev() {
        let parent = parent_of[c];
        if subtree_max[c] > subtree_max[parent] {
            subtree_max[parent] = subtree_max[c];
        }
    }

    let mut cluster_max = vec![0.0_f64; cluster_count];
    for row in rows {
        if row.child < n
            && let Some(e) = emitted_of[row.parent]
            && row.lambda > cluster_max[e]
        {
            cluster_max[e] = row.lambda;
        }
    }

    let mut labels = vec![NOISE; n];
    let mut probabilities = vec![0.0_f64; n];
    let mut outlier_scores = vec![0.0_f64; n];

    for row in rows {
        if row.child >= n {
            continue;
        }
        let point = row.child;

        if subtree_max[row.parent] > 0.0 {
            outlier_scores[point] =
                (1.0 - row.lambda / subtree_max[row.parent]).clamp(0.0, 1.0);
        }

        if let Some(e) = emitted_of[row.parent] {
            labels[point] = compact[e];
            probabilities[point] = if cluster_max[e] > 0.0 {
                (row.lambda / cluster_max[e]).clamp(0.0, 1.0)
            } else {
                1.0
            };
        }
    }

    Ok(HierarchicalFit {
        labels,
        probabilities,
        outlier_scores,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{FeatureMode, build_features};
    use crate::test_support::record_set;

    fn blob(center: (f64, f64), count: usize) -> Vec<(&'static str, f64, f64, Option<&'static str>)> {
        (0..count)
            .map(|i| {
                #[allow(clippy::cast_precision_loss)]
                let offset = i as f64 * 0.001;
                ("Burglary", center.0 + offset, center.1 - offset, None)
            })
            .collect()
    }

    fn features_of(points: Vec<(&str, f64, f64, Option<&str>)>) -> FeatureSet {
        build_features(&record_set(&points), FeatureMode::Spatial).unwrap()
    }

    #[test]
    fn finds_two_separated_blobs() {
        let mut points = blob((0.0, 0.0), 8);
        points.extend(blob((5.0, 5.0), 8));
        let fit = hdbscan(&features_of(points), 4, 1).unwrap();

        let first = fit.labels[0];
        let second = fit.labels[8];
        assert!(first >= 0);
        assert!(second >= 0);
        assert_ne!(first, second);
        assert!(fit.labels[..8].iter().all(|&l| l == first));
        assert!(fit.labels[8..].iter().all(|&l| l == second));
    }

    #[test]
    fn far_point_is_noise_with_high_outlier_score() {
        let mut points = blob((0.0, 0.0), 8);
        points.extend(blob((5.0, 5.0), 8));
        points.push(("Drugs", 50.0, 50.0, None));
        let fit = hdbscan(&features_of(points), 4, 1).unwrap();

        assert_eq!(fit.labels[16], NOISE);
        assert!((fit.probabilities[16] - 0.0).abs() < f64::EPSILON);
        let max_member_score = fit.outlier_scores[..16]
            .iter()
            .fold(0.0_f64, |acc, &s| acc.max(s));
        assert!(fit.outlier_scores[16] > max_member_score);
    }

    #[test]
    fn probabilities_and_scores_stay_in_range() {
        let mut points = blob((0.0, 0.0), 10);
        points.extend(blob((3.0, 3.0), 10));
        let fit = hdbscan(&features_of(points), 5, 2).unwrap();

        assert!(fit
            .probabilities
            .iter()
            .all(|&p| (0.0..=1.0).contains(&p)));
        assert!(fit
            .outlier_scores
            .iter()
            .all(|&s| (0.0..=1.0).contains(&s)));
    }

    #[test]
    fn tiny_sets_are_all_noise() {
        let fit = hdbscan(&features_of(blob((0.0, 0.0), 3)), 5, 1).unwrap();
        assert!(fit.labels.iter().all(|&l| l == NOISE));
    }

    #[test]
    fn is_deterministic() {
        let mut points = blob((0.0, 0.0), 8);
        points.extend(blob((5.0, 5.0), 8));
        let feats = features_of(points);
        let a = hdbscan(&feats, 4, 1).unwrap();
        let b = hdbscan(&feats, 4, 1).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_min_cluster_size_below_two() {
        let feats = features_of(blob((0.0, 0.0), 5));
        assert!(hdbscan(&feats, 1, 1).is_err());
    }

    #[test]
    fn empty_input_is_valid() {
        let feats = features_of(Vec::new());
        let fit = hdbscan(&feats, 5, 1).unwrap();
        assert!(fit.labels.is_empty());
    }
}

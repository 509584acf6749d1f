#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Parameter and result types for the hotspot analytics engines.
//!
//! Every engine call is a pure request/response pair: structured
//! parameters in, a structured result out. These types are shared by
//! the library API, the HTTP server, and the CLI, so they all carry
//! serde derives with `camelCase` wire names.

use chrono::NaiveDate;
use hotspot_records_models::{CanonicalField, IncidentRecord};
use serde::{Deserialize, Serialize};

/// Cluster id reserved for noise / unassigned records.
pub const NOISE: i32 = -1;

/// Selection of clustering algorithm plus its parameters.
///
/// Serialized with an `algorithm` tag so API callers write e.g.
/// `{ "algorithm": "density", "radius": 0.01, "minNeighbors": 10 }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum ClusteringAlgorithm {
    /// Fixed-radius density clustering (DBSCAN).
    #[serde(rename_all = "camelCase")]
    Density {
        /// Neighborhood distance in coordinate units.
        #[serde(default = "default_radius")]
        radius: f64,
        /// Minimum number of *other* points within `radius` for a core
        /// point.
        #[serde(default = "default_min_neighbors")]
        min_neighbors: usize,
    },
    /// Variable-density hierarchical clustering (HDBSCAN-style).
    #[serde(rename_all = "camelCase")]
    Hierarchical {
        /// Smallest group of points treated as a cluster.
        #[serde(default = "default_min_cluster_size")]
        min_cluster_size: usize,
        /// Neighbor count used for core distances.
        #[serde(default = "default_min_samples")]
        min_samples: usize,
    },
    /// Fixed-k partition clustering (k-means).
    #[serde(rename_all = "camelCase")]
    Partition {
        /// Number of partitions; every record is assigned to one.
        #[serde(default = "default_n_clusters")]
        n_clusters: usize,
    },
    /// Density clustering over (lon, lat, day-offset) vectors.
    #[serde(rename_all = "camelCase")]
    Spatiotemporal {
        /// Neighborhood distance in coordinate units.
        #[serde(default = "default_radius")]
        radius: f64,
        /// Minimum number of other points within `radius`.
        #[serde(default = "default_min_neighbors")]
        min_neighbors: usize,
        /// Use the variable-density algorithm instead of fixed-radius.
        #[serde(default)]
        variable_density: bool,
        /// Cluster size floor for the variable-density sub-mode.
        #[serde(default = "default_min_cluster_size")]
        min_cluster_size: usize,
    },
}

const fn default_radius() -> f64 {
    0.01
}

const fn default_min_neighbors() -> usize {
    10
}

const fn default_min_cluster_size() -> usize {
    10
}

const fn default_min_samples() -> usize {
    1
}

const fn default_n_clusters() -> usize {
    5
}

/// Per-record clustering annotation, parallel to the input record
/// order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterAssignment {
    /// Assigned cluster id, or [`NOISE`].
    pub cluster: i32,
    /// Membership confidence in `[0, 1]` (variable-density only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probability: Option<f64>,
    /// Relative sparsity in `[0, 1]`; higher is more outlying
    /// (variable-density only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outlier_score: Option<f64>,
}

impl ClusterAssignment {
    /// An assignment carrying only a cluster id.
    #[must_use]
    pub const fn plain(cluster: i32) -> Self {
        Self {
            cluster,
            probability: None,
            outlier_score: None,
        }
    }
}

/// Aggregated view of one cluster, recomputed from scratch on every
/// clustering call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSummary {
    /// Cluster id (never [`NOISE`]).
    pub cluster: i32,
    /// Number of member records.
    pub crime_count: u64,
    /// Mean longitude over members.
    pub centroid_lon: f64,
    /// Mean latitude over members.
    pub centroid_lat: f64,
    /// Most frequent crime type among members; ties broken by first
    /// occurrence in record order.
    pub top_crime_type: String,
}

/// Result of one clustering invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterOutput {
    /// One assignment per input record, in input order.
    pub assignments: Vec<ClusterAssignment>,
    /// Per-cluster aggregates, sorted by cluster id.
    pub summary: Vec<ClusterSummary>,
    /// Total within-cluster sum of squared distances (partition
    /// clustering only); lower is better.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inertia: Option<f64>,
}

/// Parameters for the forecasting engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ForecastParams {
    /// Restrict the series to one crime type before counting.
    pub crime_type: Option<String>,
    /// Number of future days to project.
    pub periods: u32,
}

impl Default for ForecastParams {
    fn default() -> Self {
        Self {
            crime_type: None,
            periods: 30,
        }
    }
}

/// One row of a forecast series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastRow {
    /// Calendar date of this row.
    pub ds: NaiveDate,
    /// Point estimate of the daily count.
    pub yhat: f64,
    /// Lower uncertainty bound.
    pub yhat_lower: f64,
    /// Upper uncertainty bound.
    pub yhat_upper: f64,
}

/// Result of one forecasting invocation: either a series covering the
/// historical fit plus the horizon, or an explicit unavailable marker
/// when the data carries no dates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ForecastResult {
    /// Historical fit followed by the projected horizon.
    Series {
        /// Rows in ascending date order.
        rows: Vec<ForecastRow>,
    },
    /// The record set has no usable date field.
    Unavailable {
        /// Human-readable explanation.
        reason: String,
    },
}

/// Parameters for the anomaly engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnomalyParams {
    /// Feature columns to score over; empty means the two spatial axes.
    pub features: Vec<CanonicalField>,
    /// Expected outlier proportion, strictly inside `(0, 0.5)`.
    pub contamination: f64,
}

impl Default for AnomalyParams {
    fn default() -> Self {
        Self {
            features: Vec::new(),
            contamination: 0.05,
        }
    }
}

/// A record flagged as anomalous, with its score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlaggedRecord {
    /// Index of the record in the input set.
    pub index: usize,
    /// The flagged record itself.
    pub record: IncidentRecord,
    /// Continuous score; higher means more normal, so flagged records
    /// carry the lowest scores in the set.
    pub anomaly_score: f64,
}

/// Result of one anomaly-detection invocation: only the flagged subset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyOutput {
    /// Flagged records, most anomalous first.
    pub outliers: Vec<FlaggedRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn algorithm_tag_deserializes_with_defaults() {
        let alg: ClusteringAlgorithm =
            serde_json::from_str(r#"{ "algorithm": "density" }"#).unwrap();
        assert_eq!(
            alg,
            ClusteringAlgorithm::Density {
                radius: 0.01,
                min_neighbors: 10,
            }
        );
    }

    #[test]
    fn spatiotemporal_defaults_to_fixed_radius() {
        let alg: ClusteringAlgorithm =
            serde_json::from_str(r#"{ "algorithm": "spatiotemporal", "radius": 0.02 }"#).unwrap();
        let ClusteringAlgorithm::Spatiotemporal {
            radius,
            variable_density,
            ..
        } = alg
        else {
            panic!("wrong variant");
        };
        assert!((radius - 0.02).abs() < f64::EPSILON);
        assert!(!variable_density);
    }

    #[test]
    fn forecast_result_tags_status() {
        let json = serde_json::to_string(&ForecastResult::Unavailable {
            reason: "no dates".to_string(),
        })
        .unwrap();
        assert!(json.contains(r#""status":"unavailable""#));
    }
}

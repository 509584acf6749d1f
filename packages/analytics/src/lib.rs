#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Clustering, forecasting, and anomaly-scoring engines.
//!
//! Every engine is a pure function over a [`RecordSet`]: it reads the
//! records, allocates fresh output, and never mutates its input. A
//! repeated call with identical input order and parameters yields an
//! identical result, so callers can recompute freely on any parameter
//! change instead of patching stale state.

pub mod anomaly;
pub mod density;
pub mod features;
pub mod forecast;
pub mod hierarchical;
pub mod partition;

use hotspot_analytics_models::{
    ClusterAssignment, ClusterOutput, ClusterSummary, ClusteringAlgorithm, NOISE,
};
use hotspot_records_models::RecordSet;
use thiserror::Error;

use crate::features::{FeatureMode, build_features};

/// Errors that can occur during an engine invocation.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// A parameter was outside its valid range. Never silently clamped.
    #[error("invalid parameter {name}={value}: expected {expected}")]
    InvalidParameter {
        /// Name of the offending parameter.
        name: &'static str,
        /// The value that was passed.
        value: String,
        /// Human-readable description of the valid range.
        expected: &'static str,
    },

    /// A record carried a non-finite coordinate past normalization.
    /// This is a contract violation, not a data error.
    #[error("record {index} has a non-finite coordinate ({longitude}, {latitude})")]
    InvalidCoordinate {
        /// Index of the record in the input set.
        index: usize,
        /// The offending longitude.
        longitude: f64,
        /// The offending latitude.
        latitude: f64,
    },

    /// A model failed to converge to finite values. Fatal to the call;
    /// no partial result is produced.
    #[error("model fit failed: {message}")]
    ModelFit {
        /// Description of what went wrong.
        message: String,
    },
}

/// Runs one clustering algorithm over `records` and returns the
/// annotated assignments plus the per-cluster summary.
///
/// An empty record set is valid and yields an empty output.
///
/// # Errors
///
/// Returns [`AnalyticsError::InvalidParameter`] for out-of-range
/// parameters and [`AnalyticsError::InvalidCoordinate`] if a record
/// carries a non-finite coordinate.
pub fn cluster(
    records: &RecordSet,
    algorithm: &ClusteringAlgorithm,
) -> Result<ClusterOutput, AnalyticsError> {
    if records.is_empty() {
        return Ok(ClusterOutput {
            assignments: Vec::new(),
            summary: Vec::new(),
            inertia: None,
        });
    }

    match *algorithm {
        ClusteringAlgorithm::Density {
            radius,
            min_neighbors,
        } => {
            let feats = build_features(records, FeatureMode::Spatial)?;
            let labels = density::dbscan(&feats, radius, min_neighbors)?;
            Ok(plain_output(records, labels))
        }
        ClusteringAlgorithm::Hierarchical {
            min_cluster_size,
            min_samples,
        } => {
            let feats = build_features(records, FeatureMode::Spatial)?;
            let fit = hierarchical::hdbscan(&feats, min_cluster_size, min_samples)?;
            let summary = summarize(records, &fit.labels);
            let assignments = fit
                .labels
                .iter()
                .zip(fit.probabilities.iter().zip(&fit.outlier_scores))
                .map(|(&cluster, (&probability, &outlier_score))| ClusterAssignment {
                    cluster,
                    probability: Some(probability),
                    outlier_score: Some(outlier_score),
                })
                .collect();
            Ok(ClusterOutput {
                assignments,
                summary,
                inertia: None,
            })
        }
        ClusteringAlgorithm::Partition { n_clusters } => {
            let feats = build_features(records, FeatureMode::Spatial)?;
            let (labels, inertia) = partition::kmeans(&feats, n_clusters)?;
            let summary = summarize(records, &labels);
            let assignments = labels.iter().map(|&c| ClusterAssignment::plain(c)).collect();
            Ok(ClusterOutput {
                assignments,
                summary,
                inertia: Some(inertia),
            })
        }
        ClusteringAlgorithm::Spatiotemporal {
            radius,
            min_neighbors,
            variable_density,
            min_cluster_size,
        } => {
            let feats = build_features(records, FeatureMode::Spatiotemporal)?;
            if variable_density {
                let fit = hierarchical::hdbscan(&feats, min_cluster_size, 1)?;
                let summary = summarize(records, &fit.labels);
                let assignments = fit
                    .labels
                    .iter()
                    .zip(fit.probabilities.iter().zip(&fit.outlier_scores))
                    .map(|(&cluster, (&probability, &outlier_score))| ClusterAssignment {
                        cluster,
                        probability: Some(probability),
                        outlier_score: Some(outlier_score),
                    })
                    .collect();
                Ok(ClusterOutput {
                    assignments,
                    summary,
                    inertia: None,
                })
            } else {
                let labels = density::dbscan(&feats, radius, min_neighbors)?;
                Ok(plain_output(records, labels))
            }
        }
    }
}

fn plain_output(records: &RecordSet, labels: Vec<i32>) -> ClusterOutput {
    let summary = summarize(records, &labels);
    ClusterOutput {
        assignments: labels.iter().map(|&c| ClusterAssignment::plain(c)).collect(),
        summary,
        inertia: None,
    }
}

/// Aggregates per-cluster statistics over the non-noise records.
///
/// `crime_count` is the member count, the centroid is the arithmetic
/// mean of member coordinates, and `top_crime_type` is the modal crime
/// type with ties broken by first occurrence in record order.
#[must_use]
pub fn summarize(records: &RecordSet, labels: &[i32]) -> Vec<ClusterSummary> {
    use std::collections::BTreeMap;

    struct Agg {
        count: u64,
        lon_sum: f64,
        lat_sum: f64,
        // (crime type, count) in first-occurrence order
        type_counts: Vec<(String, u64)>,
    }

    let mut clusters: BTreeMap<i32, Agg> = BTreeMap::new();

    for (record, &label) in records.records().iter().zip(labels) {
        if label == NOISE {
            continue;
        }
        let agg = clusters.entry(label).or_insert_with(|| Agg {
            count: 0,
            lon_sum: 0.0,
            lat_sum: 0.0,
            type_counts: Vec::new(),
        });
        agg.count += 1;
        agg.lon_sum += record.longitude;
        agg.lat_sum += record.latitude;
        if let Some(entry) = agg
            .type_counts
            .iter_mut()
            .find(|(name, _)| *name == record.crime_type)
        {
            entry.1 += 1;
        } else {
            agg.type_counts.push((record.crime_type.clone(), 1));
        }
    }

    clusters
        .into_iter()
        .map(|(cluster, agg)| {
            // First strictly-greater scan keeps the earliest type on ties.
            let mut top = ("", 0_u64);
            for (name, count) in &agg.type_counts {
                if *count > top.1 {
                    top = (name.as_str(), *count);
                }
            }
            #[allow(clippy::cast_precision_loss)]
            ClusterSummary {
                cluster,
                crime_count: agg.count,
                centroid_lon: agg.lon_sum / agg.count as f64,
                centroid_lat: agg.lat_sum / agg.count as f64,
                top_crime_type: top.0.to_string(),
            }
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod test_support {
    use hotspot_records_models::{IncidentRecord, RecordSet, UNKNOWN};

    /// Builds a record set from (crime type, longitude, latitude, date)
    /// tuples.
    pub fn record_set(points: &[(&str, f64, f64, Option<&str>)]) -> RecordSet {
        RecordSet::new(
            points
                .iter()
                .map(|(crime_type, longitude, latitude, date)| IncidentRecord {
                    crime_type: (*crime_type).to_string(),
                    longitude: *longitude,
                    latitude: *latitude,
                    date: date.map(|d| d.parse().unwrap()),
                    street_name: UNKNOWN.to_string(),
                    outcome_category: UNKNOWN.to_string(),
                    region: UNKNOWN.to_string(),
                })
                .collect(),
        )
    }

    /// Two tight blobs of six points each, separated by more than one
    /// coordinate unit.
    pub fn two_blobs() -> RecordSet {
        let mut points = Vec::new();
        for i in 0..6 {
            let offset = f64::from(i) * 0.001;
            points.push(("Burglary", offset, offset, None));
        }
        for i in 0..6 {
            let offset = f64::from(i) * 0.001;
            points.push(("Drugs", 2.0 + offset, 2.0 + offset, None));
        }
        record_set(&points)
    }
}

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the hotspot map server.
//!
//! Each engine endpoint takes a filter plus the engine's own
//! parameters; the filter selects the working subset of the in-memory
//! dataset before the engine runs. No live UI state crosses this
//! boundary, only plain scalars and small collections.

use hotspot_analytics_models::{AnomalyParams, ClusteringAlgorithm, ForecastParams};
use hotspot_records_models::{CanonicalField, RecordFilter};
use serde::{Deserialize, Serialize};

/// `GET /api/health` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether the server is up.
    pub healthy: bool,
    /// Crate version.
    pub version: String,
}

/// `GET /api/fields` response: what the loaded dataset supports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiFields {
    /// Canonical fields populated in the dataset.
    pub fields: Vec<CanonicalField>,
    /// Total records in the working set.
    pub record_count: usize,
}

/// `POST /api/cluster` request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRequest {
    /// Subset selection applied before clustering.
    #[serde(default)]
    pub filter: RecordFilter,
    /// Algorithm choice and parameters.
    #[serde(flatten)]
    pub algorithm: ClusteringAlgorithm,
}

/// `POST /api/forecast` request body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ForecastRequest {
    /// Subset selection applied before counting.
    pub filter: RecordFilter,
    /// Forecast parameters.
    #[serde(flatten)]
    pub params: ForecastParams,
}

/// `POST /api/anomalies` request body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnomalyRequest {
    /// Subset selection applied before scoring.
    pub filter: RecordFilter,
    /// Anomaly parameters.
    #[serde(flatten)]
    pub params: AnomalyParams,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cluster_request_flattens_the_algorithm_tag() {
        let body = r#"{
            "filter": { "crimeTypes": ["Burglary"] },
            "algorithm": "partition",
            "nClusters": 4
        }"#;
        let request: ClusterRequest = serde_json::from_str(body).unwrap();
        assert_eq!(
            request.algorithm,
            hotspot_analytics_models::ClusteringAlgorithm::Partition { n_clusters: 4 }
        );
        assert_eq!(request.filter.crime_types, vec!["Burglary".to_string()]);
    }

    #[test]
    fn forecast_request_defaults_are_complete() {
        let request: ForecastRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request.params.periods, 30);
        assert!(request.params.crime_type.is_none());
    }
}

//! HTTP handler functions for the hotspot map API.

use actix_web::{HttpResponse, web};
use hotspot_analytics::AnalyticsError;
use hotspot_server_models::{AnomalyRequest, ApiFields, ApiHealth, ClusterRequest, ForecastRequest};

use crate::AppState;

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /api/fields`
///
/// Reports which canonical fields the loaded dataset populates and how
/// many records are in the working set.
pub async fn fields(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(ApiFields {
        fields: state.fields.clone(),
        record_count: state.records.len(),
    })
}

/// `POST /api/cluster`
///
/// Filters the working set and runs the requested clustering
/// algorithm, returning per-record assignments plus the cluster
/// summary.
pub async fn cluster(state: web::Data<AppState>, body: web::Json<ClusterRequest>) -> HttpResponse {
    let subset = state.records.filter(&body.filter);
    match hotspot_analytics::cluster(&subset, &body.algorithm) {
        Ok(output) => HttpResponse::Ok().json(output),
        Err(e) => error_response("clustering", &e),
    }
}

/// `POST /api/forecast`
///
/// Builds the daily count series from the filtered subset and projects
/// it forward.
pub async fn forecast(
    state: web::Data<AppState>,
    body: web::Json<ForecastRequest>,
) -> HttpResponse {
    let subset = state.records.filter(&body.filter);
    match hotspot_analytics::forecast::forecast(&subset, &body.params) {
        Ok(result) => HttpResponse::Ok().json(result),
        Err(e) => error_response("forecasting", &e),
    }
}

/// `POST /api/anomalies`
///
/// Scores the filtered subset and returns only the flagged outliers.
pub async fn anomalies(
    state: web::Data<AppState>,
    body: web::Json<AnomalyRequest>,
) -> HttpResponse {
    let subset = state.records.filter(&body.filter);
    match hotspot_analytics::anomaly::detect_anomalies(&subset, &body.params) {
        Ok(output) => HttpResponse::Ok().json(output),
        Err(e) => error_response("anomaly detection", &e),
    }
}

/// Maps engine errors onto HTTP responses: parameter errors are the
/// caller's fault, everything else is ours.
fn error_response(operation: &str, error: &AnalyticsError) -> HttpResponse {
    log::error!("{operation} failed: {error}");
    let body = serde_json::json!({ "error": error.to_string() });
    match error {
        AnalyticsError::InvalidParameter { .. } => HttpResponse::BadRequest().json(body),
        AnalyticsError::InvalidCoordinate { .. } | AnalyticsError::ModelFit { .. } => {
            HttpResponse::InternalServerError().json(body)
        }
    }
}

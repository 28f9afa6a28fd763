//! Health Check API Handler

use axum::Json;
use itinera_core::dto::health::HealthStatus;

/// GET /api/health
pub async fn health_check() -> Json<HealthStatus> {
    Json(HealthStatus::healthy("itinera-api"))
}

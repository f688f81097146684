use axum::extract::State;
use axum::Json;
use serde::Serialize;
use sqlx::PgPool;
use utoipa::ToSchema;

use crate::db::queries;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status ("ok" when healthy, "degraded" when DB is unreachable
    /// or no vehicles are configured)
    pub status: String,
    /// API version
    pub version: String,
    /// Whether the database is reachable
    pub database: bool,
    /// Number of configured vehicle types
    pub vehicles: i64,
}

/// Health check endpoint.
///
/// Verifies database connectivity by counting configured vehicles. Returns
/// status "degraded" (still 200) if the DB is unreachable or the reference
/// data was never seeded.
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_check(State(pool): State<PgPool>) -> Json<HealthResponse> {
    let vehicles = queries::count_vehicles(&pool).await;
    Json(build_health(vehicles.ok()))
}

fn build_health(vehicles: Option<i64>) -> HealthResponse {
    let database = vehicles.is_some();
    let vehicles = vehicles.unwrap_or(0);
    let status = if database && vehicles > 0 {
        "ok"
    } else {
        "degraded"
    };

    HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database,
        vehicles,
    }
}

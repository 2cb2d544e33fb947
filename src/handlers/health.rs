use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use sqlx::PgPool;

use crate::db;
use crate::error::ApiError;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    database: &'static str,
    version: &'static str,
}

pub async fn health_check(State(pool): State<PgPool>) -> (StatusCode, Json<HealthResponse>) {
    let (status, code, database) = match db::check_health(&pool).await {
        Ok(()) => ("healthy", StatusCode::OK, "connected"),
        Err(e) => {
            tracing::error!(error = %e, "Health check failed");
            ("unhealthy", StatusCode::SERVICE_UNAVAILABLE, "unreachable")
        }
    };

    (
        code,
        Json(HealthResponse {
            status,
            database,
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}

/// Fallback for unknown routes
pub async fn not_found() -> ApiError {
    ApiError::NotFound("Ruta no encontrada".to_string())
}

pub mod checkin;
pub mod transactions;

use crate::AppState;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub store: String,
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let (store, healthy) = match &state.db {
        Some(pool) => match sqlx::query("SELECT 1").execute(pool).await {
            Ok(_) => ("postgres".to_string(), true),
            Err(_) => ("postgres (disconnected)".to_string(), false),
        },
        None => ("memory".to_string(), true),
    };

    let body = HealthStatus {
        status: if healthy { "healthy".into() } else { "unhealthy".into() },
        version: env!("CARGO_PKG_VERSION").to_string(),
        store,
    };

    let status_code = if healthy { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(body))
}

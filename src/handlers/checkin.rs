use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};

use crate::AppState;
use crate::error::AppError;

/// Venue scan. Repeat scans respond 200 with `already_used = true`;
/// only an unknown token is an error.
pub async fn check_in(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let result = state.checkin.check_in(&token).await?;
    Ok(Json(result))
}

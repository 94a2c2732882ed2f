//! Dashboard route.

use axum::extract::State;
use axum::response::Json;

use crate::error::ApiError;
use crate::routes::auth::AuthUser;
use crate::services::dashboard::{self, Dashboard};
use crate::state::AppState;

/// `GET /api/dashboard`: per-kind counts for the caller's role.
pub async fn dashboard(State(state): State<AppState>, auth: AuthUser) -> Result<Json<Dashboard>, ApiError> {
    let dash = dashboard::dashboard(&state.pool, &auth.user)
        .await
        .map_err(|e| ApiError::database(&e))?;
    Ok(Json(dash))
}

//! User management routes (directors only).

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use uuid::Uuid;

use super::auth::AuthUser;
use crate::error::ApiError;
use crate::roles::Role;
use crate::services::users::{self, UserError, UserRow};
use crate::state::AppState;

pub(crate) fn user_error_to_api(err: &UserError) -> ApiError {
    match err {
        UserError::Forbidden => ApiError::from_err(StatusCode::FORBIDDEN, err),
        UserError::NotFound(_) => ApiError::from_err(StatusCode::NOT_FOUND, err),
        UserError::SelfDemotion => ApiError::from_err(StatusCode::BAD_REQUEST, err).with_field("role"),
        UserError::Database(e) => ApiError::database(e),
    }
}

/// `GET /api/users`: every user with their role.
pub async fn list_users(State(state): State<AppState>, auth: AuthUser) -> Result<Json<Vec<UserRow>>, ApiError> {
    let rows = users::list_users(&state.pool, &auth.user)
        .await
        .map_err(|e| user_error_to_api(&e))?;
    Ok(Json(rows))
}

#[derive(Deserialize)]
pub struct SetRoleBody {
    pub role: String,
}

/// `PATCH /api/users/:id/role`: change a user's role.
pub async fn set_role(
    State(state): State<AppState>,
    auth: AuthUser,
    user_id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<SetRoleBody>, JsonRejection>,
) -> Result<Json<UserRow>, ApiError> {
    let Path(user_id) = user_id?;
    let Json(body) = body?;
    let role = Role::parse(&body.role).ok_or_else(|| {
        ApiError::bad_request(format!("unknown role {:?}", body.role)).with_field("role")
    })?;
    let row = users::set_role(&state.pool, &auth.user, user_id, role)
        .await
        .map_err(|e| user_error_to_api(&e))?;
    Ok(Json(row))
}

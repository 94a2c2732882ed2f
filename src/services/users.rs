//! User listing and role assignment.

use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::ErrorCode;
use crate::roles::Role;
use crate::services::session::{SessionUser, role_from_db};

#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("only directors can manage users")]
    Forbidden,
    #[error("user not found: {0}")]
    NotFound(Uuid),
    #[error("directors cannot change their own role")]
    SelfDemotion,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ErrorCode for UserError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Forbidden => "E_FORBIDDEN",
            Self::NotFound(_) => "E_USER_NOT_FOUND",
            Self::SelfDemotion => "E_SELF_DEMOTION",
            Self::Database(_) => "E_DATABASE",
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

type UserTuple = (Uuid, String, String, String, OffsetDateTime);

fn to_row((id, email, name, role, created_at): UserTuple) -> UserRow {
    UserRow { id, email, name, role: role_from_db(&role), created_at }
}

/// List every user, oldest first.
///
/// # Errors
///
/// `Forbidden` unless the caller is a director.
pub async fn list_users(pool: &PgPool, actor: &SessionUser) -> Result<Vec<UserRow>, UserError> {
    if !actor.role.can_manage_users() {
        return Err(UserError::Forbidden);
    }
    let rows = sqlx::query_as::<_, UserTuple>(
        "SELECT id, email, name, role, created_at FROM users ORDER BY created_at ASC",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(to_row).collect())
}

/// Change a user's role.
///
/// # Errors
///
/// `Forbidden` unless the caller is a director, `SelfDemotion` when a director
/// targets themselves, `NotFound` for an unknown user.
pub async fn set_role(pool: &PgPool, actor: &SessionUser, user_id: Uuid, role: Role) -> Result<UserRow, UserError> {
    if !actor.role.can_manage_users() {
        return Err(UserError::Forbidden);
    }
    if actor.id == user_id {
        return Err(UserError::SelfDemotion);
    }
    let row = sqlx::query_as::<_, UserTuple>(
        "UPDATE users SET role = $2 WHERE id = $1
         RETURNING id, email, name, role, created_at",
    )
    .bind(user_id)
    .bind(role.as_str())
    .fetch_optional(pool)
    .await?
    .ok_or(UserError::NotFound(user_id))?;

    tracing::info!(actor = %actor.id, %user_id, role = %role, "user role changed");
    Ok(to_row(row))
}

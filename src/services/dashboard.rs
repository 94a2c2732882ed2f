//! Dashboard counts.
//!
//! One read-only count query per readable record kind, issued concurrently.
//! Contractors only count their own rows.

use futures::future::try_join_all;
use serde::Serialize;
use sqlx::PgPool;

use crate::form::RecordKind;
use crate::services::session::SessionUser;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KindCount {
    pub kind: RecordKind,
    pub label: &'static str,
    pub total: i64,
    pub pending: i64,
    /// Rows whose record date is today (server time zone of the database).
    pub today: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dashboard {
    pub role: crate::roles::Role,
    pub kinds: Vec<KindCount>,
    /// Pending rows across all reviewable kinds; only present for reviewers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub awaiting_review: Option<i64>,
}

async fn count_kind(pool: &PgPool, user: &SessionUser, kind: RecordKind) -> Result<KindCount, sqlx::Error> {
    let owner = (!user.role.sees_all_rows()).then_some(user.id);
    let (total, pending, today): (i64, i64, i64) = sqlx::query_as(
        "SELECT COUNT(*),
                COUNT(*) FILTER (WHERE status = 'pending'),
                COUNT(*) FILTER (WHERE record_date = CURRENT_DATE)
         FROM records
         WHERE kind = $1 AND ($2::uuid IS NULL OR created_by = $2)",
    )
    .bind(kind.as_str())
    .bind(owner)
    .fetch_one(pool)
    .await?;
    Ok(KindCount { kind, label: kind.label(), total, pending, today })
}

/// Build the dashboard for `user`.
///
/// # Errors
///
/// Returns the first database error from any count query.
pub async fn dashboard(pool: &PgPool, user: &SessionUser) -> Result<Dashboard, sqlx::Error> {
    let kinds = user.role.readable_kinds();
    let counts = try_join_all(kinds.iter().map(|kind| count_kind(pool, user, *kind))).await?;
    Ok(build(user, counts))
}

pub(crate) fn build(user: &SessionUser, kinds: Vec<KindCount>) -> Dashboard {
    let awaiting_review = user.role.can_review().then(|| {
        kinds
            .iter()
            .filter(|c| c.kind.requires_approval())
            .map(|c| c.pending)
            .sum()
    });
    Dashboard { role: user.role, kinds, awaiting_review }
}

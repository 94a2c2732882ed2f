//! Record service: submit, list, open, delete and review business records.
//!
//! DESIGN
//! ======
//! Every record type lives in the single `records` table with its fields in a
//! JSONB `data` column; the per-type shape is enforced by `crate::form` before
//! anything is written. `record_date` is copied out of the data so list
//! filters can use an index.
//!
//! ACCESS
//! ======
//! The role matrix in `crate::roles` is checked on every call. Contractors are
//! row-filtered to their own submissions, and rows they cannot see are reported
//! as not found rather than forbidden.
//!
//! APPROVAL
//! ========
//! `pending → approved | rejected` is a single guarded `UPDATE … WHERE status =
//! 'pending'`, so two concurrent reviews cannot both succeed and a reviewed row
//! can never be re-reviewed.

use serde_json::{Map, Value};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::error::ErrorCode;
use crate::form::{self, FieldType, FormError, RecordKind, ValidatedRecord};
use crate::services::session::SessionUser;

pub const DEFAULT_LIST_LIMIT: i64 = 100;
pub const MAX_LIST_LIMIT: i64 = 500;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("your role cannot access {0} records")]
    Forbidden(RecordKind),
    #[error("record not found: {0}")]
    NotFound(Uuid),
    #[error(transparent)]
    Form(#[from] FormError),
    #[error("{field} refers to a record that does not exist: {id}")]
    MissingReference { field: &'static str, id: Uuid },
    #[error("record {0} has already been reviewed")]
    AlreadyReviewed(Uuid),
    #[error("only managers and directors can review records")]
    NotReviewer,
    #[error("{0} records have no approval workflow")]
    NoApproval(RecordKind),
    #[error("media records are created by uploading a file")]
    UploadRequired,
    #[error("invalid filter: {0}")]
    BadFilter(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ErrorCode for RecordError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Forbidden(_) | Self::NotReviewer => "E_FORBIDDEN",
            Self::NotFound(_) => "E_RECORD_NOT_FOUND",
            Self::Form(err) => err.error_code(),
            Self::MissingReference { .. } => "E_MISSING_REFERENCE",
            Self::AlreadyReviewed(_) => "E_ALREADY_REVIEWED",
            Self::NoApproval(_) => "E_NO_APPROVAL",
            Self::UploadRequired => "E_UPLOAD_REQUIRED",
            Self::BadFilter(_) => "E_BAD_FILTER",
            Self::Database(_) => "E_DATABASE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Pending,
    Approved,
    Rejected,
}

impl Status {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// Reviewer verdict. The only transitions out of `pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "approve" | "approved" => Some(Self::Approve),
            "reject" | "rejected" => Some(Self::Reject),
            _ => None,
        }
    }

    #[must_use]
    pub fn status(self) -> Status {
        match self {
            Self::Approve => Status::Approved,
            Self::Reject => Status::Rejected,
        }
    }
}

/// A stored record as returned to clients.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RecordRow {
    pub id: Uuid,
    pub kind: RecordKind,
    pub data: Map<String, Value>,
    pub status: Option<Status>,
    pub record_date: Option<String>,
    pub created_by: Uuid,
    pub created_by_name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub reviewed_by: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub reviewed_at: Option<OffsetDateTime>,
    pub review_note: Option<String>,
}

/// List filters. All bounds are inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFilter {
    pub status: Option<Status>,
    pub from: Option<Date>,
    pub to: Option<Date>,
    pub created_by: Option<Uuid>,
    pub q: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for RecordFilter {
    fn default() -> Self {
        Self { status: None, from: None, to: None, created_by: None, q: None, limit: DEFAULT_LIST_LIMIT, offset: 0 }
    }
}

/// Raw query-string form of [`RecordFilter`].
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub created_by: Option<String>,
    pub q: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl RecordFilter {
    /// Parse query-string values. Blank values are ignored; `limit` is clamped.
    ///
    /// # Errors
    ///
    /// `BadFilter` for an unknown status, malformed date or id, or `from > to`.
    pub fn from_query(query: &ListQuery) -> Result<Self, RecordError> {
        fn present(v: Option<&String>) -> Option<&str> {
            v.map(|s| s.trim()).filter(|s| !s.is_empty())
        }

        let status = present(query.status.as_ref())
            .map(|s| Status::parse(s).ok_or_else(|| RecordError::BadFilter(format!("unknown status {s:?}"))))
            .transpose()?;
        let from = present(query.from.as_ref())
            .map(|s| form::parse_date(s).map_err(|_| RecordError::BadFilter(format!("from: bad date {s:?}"))))
            .transpose()?;
        let to = present(query.to.as_ref())
            .map(|s| form::parse_date(s).map_err(|_| RecordError::BadFilter(format!("to: bad date {s:?}"))))
            .transpose()?;
        if let (Some(from), Some(to)) = (from, to) {
            if from > to {
                return Err(RecordError::BadFilter("from is after to".into()));
            }
        }
        let created_by = present(query.created_by.as_ref())
            .map(|s| Uuid::parse_str(s).map_err(|_| RecordError::BadFilter(format!("created_by: bad id {s:?}"))))
            .transpose()?;

        Ok(Self {
            status,
            from,
            to,
            created_by,
            q: present(query.q.as_ref()).map(str::to_owned),
            limit: clamp_limit(query.limit),
            offset: query.offset.unwrap_or(0).max(0),
        })
    }
}

/// Page size for a requested `limit`: the default when absent, clamped to `1..=MAX_LIST_LIMIT`.
#[must_use]
pub fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT)
}

/// Offset of the page after one that returned `page_len` rows, or `None` when
/// that page was the last.
#[must_use]
pub fn next_page_offset(offset: i64, page_len: usize, page_size: i64) -> Option<i64> {
    let len = i64::try_from(page_len).ok()?;
    (len >= page_size).then_some(offset + len)
}

// =============================================================================
// ACCESS
// =============================================================================

pub(crate) fn ensure_read(user: &SessionUser, kind: RecordKind) -> Result<(), RecordError> {
    if user.role.can_read(kind) { Ok(()) } else { Err(RecordError::Forbidden(kind)) }
}

pub(crate) fn ensure_write(user: &SessionUser, kind: RecordKind) -> Result<(), RecordError> {
    if user.role.can_write(kind) { Ok(()) } else { Err(RecordError::Forbidden(kind)) }
}

/// Whether `user` may delete `row`: directors always, creators while unreviewed.
#[must_use]
pub fn can_delete(user: &SessionUser, row: &RecordRow) -> bool {
    if user.role.can_manage_users() {
        return true;
    }
    row.created_by == user.id && matches!(row.status, None | Some(Status::Pending))
}

/// Escape `%`, `_` and `\` for use inside an `ILIKE` pattern.
#[must_use]
pub fn like_pattern(q: &str) -> String {
    let mut out = String::with_capacity(q.len() + 2);
    out.push('%');
    for c in q.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

fn searchable_fields(kind: RecordKind) -> impl Iterator<Item = &'static str> {
    kind.fields()
        .iter()
        .filter(|f| {
            !f.system && matches!(f.ty, FieldType::Text | FieldType::LongText | FieldType::Choice { .. })
        })
        .map(|f| f.name)
}

// =============================================================================
// ROW DECODING
// =============================================================================

const SELECT_COLUMNS: &str = "SELECT r.id, r.kind, r.data, r.status, r.record_date, r.created_by,
        u.name AS created_by_name, r.created_at, r.reviewed_by, r.reviewed_at, r.review_note
     FROM records r
     JOIN users u ON u.id = r.created_by";

fn decode_row(row: &PgRow) -> Option<RecordRow> {
    let kind_raw: String = row.get("kind");
    let Some(kind) = RecordKind::parse(&kind_raw) else {
        tracing::warn!(kind = %kind_raw, "skipping record with unknown kind");
        return None;
    };
    let data = match row.get::<Value, _>("data") {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    let status: Option<String> = row.get("status");
    let record_date: Option<Date> = row.get("record_date");
    Some(RecordRow {
        id: row.get("id"),
        kind,
        data,
        status: status.as_deref().and_then(Status::parse),
        record_date: record_date.map(form::format_date),
        created_by: row.get("created_by"),
        created_by_name: row.get("created_by_name"),
        created_at: row.get("created_at"),
        reviewed_by: row.get("reviewed_by"),
        reviewed_at: row.get("reviewed_at"),
        review_note: row.get("review_note"),
    })
}

async fn fetch_one(pool: &PgPool, kind: RecordKind, id: Uuid) -> Result<Option<RecordRow>, RecordError> {
    let sql = format!("{SELECT_COLUMNS} WHERE r.id = $1 AND r.kind = $2");
    let row = sqlx::query(&sql)
        .bind(id)
        .bind(kind.as_str())
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().and_then(decode_row))
}

// =============================================================================
// CREATE
// =============================================================================

/// Validate and insert one submission.
///
/// # Errors
///
/// `Forbidden` for kinds outside the caller's role, `UploadRequired` for media,
/// `Form` for validation failures, `MissingReference` for dangling ids.
pub async fn create_record(
    pool: &PgPool,
    user: &SessionUser,
    kind: RecordKind,
    submission: &Value,
) -> Result<RecordRow, RecordError> {
    ensure_write(user, kind)?;
    if kind == RecordKind::Media {
        return Err(RecordError::UploadRequired);
    }
    let validated = form::validate(kind, submission)?;
    insert_validated(pool, user, validated).await
}

/// Insert an already validated record after checking its references.
///
/// # Errors
///
/// `MissingReference` for dangling ids, `Database` on query failure.
pub async fn insert_validated(
    pool: &PgPool,
    user: &SessionUser,
    record: ValidatedRecord,
) -> Result<RecordRow, RecordError> {
    for reference in &record.references {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM records WHERE id = $1 AND kind = $2)")
            .bind(reference.id)
            .bind(reference.kind.as_str())
            .fetch_one(pool)
            .await?;
        if !exists {
            return Err(RecordError::MissingReference { field: reference.field, id: reference.id });
        }
    }

    let id = Uuid::new_v4();
    let status = record.kind.requires_approval().then_some(Status::Pending);
    let created_at: OffsetDateTime = sqlx::query_scalar(
        "INSERT INTO records (id, kind, data, status, record_date, created_by)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING created_at",
    )
    .bind(id)
    .bind(record.kind.as_str())
    .bind(Value::Object(record.data.clone()))
    .bind(status.map(Status::as_str))
    .bind(record.record_date)
    .bind(user.id)
    .fetch_one(pool)
    .await?;

    tracing::info!(kind = %record.kind, record_id = %id, user_id = %user.id, "record created");

    Ok(RecordRow {
        id,
        kind: record.kind,
        data: record.data,
        status,
        record_date: record.record_date.map(form::format_date),
        created_by: user.id,
        created_by_name: user.name.clone(),
        created_at,
        reviewed_by: None,
        reviewed_at: None,
        review_note: None,
    })
}

// =============================================================================
// READ
// =============================================================================

fn push_filters<'a>(
    builder: &mut QueryBuilder<'a, Postgres>,
    user: &SessionUser,
    kind: RecordKind,
    filter: &'a RecordFilter,
) {
    builder.push(" WHERE r.kind = ");
    builder.push_bind(kind.as_str());
    if !user.role.sees_all_rows() {
        builder.push(" AND r.created_by = ");
        builder.push_bind(user.id);
    }
    if let Some(status) = filter.status {
        builder.push(" AND r.status = ");
        builder.push_bind(status.as_str());
    }
    if let Some(from) = filter.from {
        builder.push(" AND r.record_date >= ");
        builder.push_bind(from);
    }
    if let Some(to) = filter.to {
        builder.push(" AND r.record_date <= ");
        builder.push_bind(to);
    }
    if let Some(created_by) = filter.created_by {
        builder.push(" AND r.created_by = ");
        builder.push_bind(created_by);
    }
    if let Some(q) = filter.q.as_deref() {
        let pattern = like_pattern(q);
        builder.push(" AND (");
        let mut first = true;
        for field in searchable_fields(kind) {
            if !first {
                builder.push(" OR ");
            }
            first = false;
            builder.push("r.data ->> ");
            builder.push_bind(field);
            builder.push(" ILIKE ");
            builder.push_bind(pattern.clone());
        }
        if first {
            builder.push("FALSE");
        }
        builder.push(")");
    }
}

/// List records of one kind, newest record date first.
///
/// # Errors
///
/// `Forbidden` for kinds outside the caller's role.
pub async fn list_records(
    pool: &PgPool,
    user: &SessionUser,
    kind: RecordKind,
    filter: &RecordFilter,
) -> Result<Vec<RecordRow>, RecordError> {
    ensure_read(user, kind)?;
    fetch_page(pool, user, kind, filter, filter.limit, filter.offset).await
}

async fn fetch_page(
    pool: &PgPool,
    user: &SessionUser,
    kind: RecordKind,
    filter: &RecordFilter,
    limit: i64,
    offset: i64,
) -> Result<Vec<RecordRow>, RecordError> {
    let mut builder = QueryBuilder::<Postgres>::new(SELECT_COLUMNS);
    push_filters(&mut builder, user, kind, filter);
    builder.push(" ORDER BY r.record_date DESC NULLS LAST, r.created_at DESC, r.id LIMIT ");
    builder.push_bind(limit);
    builder.push(" OFFSET ");
    builder.push_bind(offset);

    let rows = builder.build().fetch_all(pool).await?;
    Ok(rows.iter().filter_map(decode_row).collect())
}

/// Every record matching `filter` from `filter.offset` on, ignoring
/// `filter.limit`. Rows are read in pages of [`MAX_LIST_LIMIT`].
///
/// # Errors
///
/// `Forbidden` for kinds outside the caller's role.
pub async fn list_all_records(
    pool: &PgPool,
    user: &SessionUser,
    kind: RecordKind,
    filter: &RecordFilter,
) -> Result<Vec<RecordRow>, RecordError> {
    collect_pages(pool, user, kind, filter, MAX_LIST_LIMIT).await
}

pub(crate) async fn collect_pages(
    pool: &PgPool,
    user: &SessionUser,
    kind: RecordKind,
    filter: &RecordFilter,
    page_size: i64,
) -> Result<Vec<RecordRow>, RecordError> {
    ensure_read(user, kind)?;

    let mut all = Vec::new();
    let mut offset = filter.offset;
    loop {
        let page = fetch_page(pool, user, kind, filter, page_size, offset).await?;
        let next = next_page_offset(offset, page.len(), page_size);
        all.extend(page);
        match next {
            Some(n) => offset = n,
            None => break,
        }
    }
    Ok(all)
}

/// Open one record.
///
/// # Errors
///
/// `Forbidden` for kinds outside the caller's role; `NotFound` when the row
/// does not exist or belongs to another contractor.
pub async fn get_record(pool: &PgPool, user: &SessionUser, kind: RecordKind, id: Uuid) -> Result<RecordRow, RecordError> {
    ensure_read(user, kind)?;
    let row = fetch_one(pool, kind, id).await?.ok_or(RecordError::NotFound(id))?;
    if !user.role.sees_all_rows() && row.created_by != user.id {
        return Err(RecordError::NotFound(id));
    }
    Ok(row)
}

/// Records awaiting review across every kind the reviewer can read, oldest first.
///
/// # Errors
///
/// `NotReviewer` for contractors.
pub async fn list_pending(
    pool: &PgPool,
    user: &SessionUser,
    limit: i64,
    offset: i64,
) -> Result<Vec<RecordRow>, RecordError> {
    if !user.role.can_review() {
        return Err(RecordError::NotReviewer);
    }
    let kinds: Vec<&'static str> = user
        .role
        .readable_kinds()
        .into_iter()
        .filter(|k| k.requires_approval())
        .map(RecordKind::as_str)
        .collect();

    let sql = format!(
        "{SELECT_COLUMNS} WHERE r.status = 'pending' AND r.kind = ANY($1)
         ORDER BY r.created_at ASC, r.id LIMIT $2 OFFSET $3"
    );
    let rows = sqlx::query(&sql)
        .bind(kinds)
        .bind(limit.clamp(1, MAX_LIST_LIMIT))
        .bind(offset.max(0))
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().filter_map(decode_row).collect())
}

// =============================================================================
// DELETE
// =============================================================================

/// Delete one record, returning what was removed.
///
/// # Errors
///
/// `Forbidden` when the caller may not delete this row.
pub async fn delete_record(
    pool: &PgPool,
    user: &SessionUser,
    kind: RecordKind,
    id: Uuid,
) -> Result<RecordRow, RecordError> {
    ensure_write(user, kind)?;
    let row = get_record(pool, user, kind, id).await?;
    if !can_delete(user, &row) {
        return Err(RecordError::Forbidden(kind));
    }

    let result = sqlx::query("DELETE FROM records WHERE id = $1 AND kind = $2")
        .bind(id)
        .bind(kind.as_str())
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(RecordError::NotFound(id));
    }

    tracing::info!(%kind, record_id = %id, user_id = %user.id, "record deleted");
    Ok(row)
}

// =============================================================================
// REVIEW
// =============================================================================

/// Approve or reject a pending record.
///
/// # Errors
///
/// `NotReviewer`, `NoApproval`, `Forbidden`, `NotFound`, or `AlreadyReviewed`
/// when the row has left `pending`.
pub async fn review_record(
    pool: &PgPool,
    user: &SessionUser,
    kind: RecordKind,
    id: Uuid,
    decision: Decision,
    note: Option<&str>,
) -> Result<RecordRow, RecordError> {
    if !user.role.can_review() {
        return Err(RecordError::NotReviewer);
    }
    if !kind.requires_approval() {
        return Err(RecordError::NoApproval(kind));
    }
    ensure_read(user, kind)?;

    let note = note.map(str::trim).filter(|n| !n.is_empty());
    let updated = sqlx::query(
        "UPDATE records
         SET status = $3, reviewed_by = $4, reviewed_at = now(), review_note = $5
         WHERE id = $1 AND kind = $2 AND status = 'pending'
         RETURNING id",
    )
    .bind(id)
    .bind(kind.as_str())
    .bind(decision.status().as_str())
    .bind(user.id)
    .bind(note)
    .fetch_optional(pool)
    .await?;

    if updated.is_none() {
        return match fetch_one(pool, kind, id).await? {
            Some(_) => Err(RecordError::AlreadyReviewed(id)),
            None => Err(RecordError::NotFound(id)),
        };
    }

    tracing::info!(%kind, record_id = %id, reviewer = %user.id, status = decision.status().as_str(), "record reviewed");
    fetch_one(pool, kind, id).await?.ok_or(RecordError::NotFound(id))
}

// =============================================================================
// EXPORT
// =============================================================================

#[derive(serde::Serialize)]
struct ExportMetaLine {
    #[serde(rename = "type")]
    line_type: &'static str,
    version: u32,
    kind: RecordKind,
    exported_at: String,
    record_count: usize,
}

#[derive(serde::Serialize)]
struct ExportRecordLine<'a> {
    #[serde(rename = "type")]
    line_type: &'static str,
    #[serde(flatten)]
    record: &'a RecordRow,
    /// Data keys computed at submit time; importers must drop them.
    derived: &'static [&'static str],
}

/// Render rows as JSON lines: one meta line, then one line per record.
///
/// # Errors
///
/// Returns a serialization error if a row cannot be encoded.
pub fn export_jsonl_lines(
    kind: RecordKind,
    rows: &[RecordRow],
    exported_at: OffsetDateTime,
) -> Result<Vec<String>, serde_json::Error> {
    let mut lines = Vec::with_capacity(rows.len() + 1);
    let meta = ExportMetaLine {
        line_type: "records_export_meta",
        version: 1,
        kind,
        exported_at: exported_at
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default(),
        record_count: rows.len(),
    };
    lines.push(format!("{}\n", serde_json::to_string(&meta)?));
    for record in rows {
        let line = ExportRecordLine { line_type: "record", record, derived: kind.derived_fields() };
        lines.push(format!("{}\n", serde_json::to_string(&line)?));
    }
    Ok(lines)
}

#[cfg(test)]
#[path = "record_test.rs"]
mod tests;

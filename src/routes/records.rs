//! Record routes: forms, list/create/open/delete, review, summary, export.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::ApiError;
use crate::form::{self, FormSchema, RecordKind};
use crate::routes::auth::AuthUser;
use crate::services::media;
use crate::services::record::{self, Decision, ListQuery, RecordError, RecordFilter, RecordRow};
use crate::services::summary::{self, RecordSummary};
use crate::state::AppState;

// =============================================================================
// HELPERS
// =============================================================================

pub(crate) fn parse_kind(raw: &str) -> Result<RecordKind, ApiError> {
    RecordKind::parse(raw)
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "E_UNKNOWN_KIND", format!("unknown record type {raw:?}")))
}

pub(crate) fn record_error_to_api(err: RecordError) -> ApiError {
    match &err {
        RecordError::Forbidden(_) | RecordError::NotReviewer => ApiError::from_err(StatusCode::FORBIDDEN, &err),
        RecordError::NotFound(_) => ApiError::from_err(StatusCode::NOT_FOUND, &err),
        RecordError::AlreadyReviewed(_) => ApiError::from_err(StatusCode::CONFLICT, &err),
        RecordError::Form(form_err) => {
            let api = ApiError::from_err(StatusCode::BAD_REQUEST, &err);
            match form_err.field() {
                Some(field) => api.with_field(field),
                None => api,
            }
        }
        RecordError::MissingReference { field, .. } => {
            ApiError::from_err(StatusCode::BAD_REQUEST, &err).with_field(*field)
        }
        RecordError::NoApproval(_) | RecordError::UploadRequired | RecordError::BadFilter(_) => {
            ApiError::from_err(StatusCode::BAD_REQUEST, &err)
        }
        RecordError::Database(e) => ApiError::database(e),
    }
}

fn filter_from(query: &ListQuery) -> Result<RecordFilter, ApiError> {
    RecordFilter::from_query(query).map_err(record_error_to_api)
}

// =============================================================================
// FORMS & NAVIGATION
// =============================================================================

/// `GET /api/forms`: schemas for every kind the caller can submit.
pub async fn list_forms(auth: AuthUser) -> Json<Vec<FormSchema>> {
    let role = auth.user.role;
    Json(
        RecordKind::ALL
            .iter()
            .copied()
            .filter(|kind| role.can_write(*kind))
            .map(form::schema)
            .collect(),
    )
}

/// `GET /api/forms/:kind`: schema for one kind.
pub async fn get_form(auth: AuthUser, Path(kind): Path<String>) -> Result<Json<FormSchema>, ApiError> {
    let kind = parse_kind(&kind)?;
    record::ensure_read(&auth.user, kind).map_err(record_error_to_api)?;
    Ok(Json(form::schema(kind)))
}

/// `GET /api/navigation`: navigation items for the caller's role.
pub async fn navigation(auth: AuthUser) -> Json<Vec<crate::roles::NavItem>> {
    Json(auth.user.role.navigation())
}

// =============================================================================
// RECORDS
// =============================================================================

/// `GET /api/records/:kind`: filtered list.
pub async fn list_records(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(kind): Path<String>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<Vec<RecordRow>>, ApiError> {
    let kind = parse_kind(&kind)?;
    let Query(query) = query?;
    let filter = filter_from(&query)?;
    let rows = record::list_records(&state.pool, &auth.user, kind, &filter)
        .await
        .map_err(record_error_to_api)?;
    Ok(Json(rows))
}

/// `POST /api/records/:kind`: submit a new record.
pub async fn create_record(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(kind): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<RecordRow>), ApiError> {
    let kind = parse_kind(&kind)?;
    let Json(body) = body?;
    let row = record::create_record(&state.pool, &auth.user, kind, &body)
        .await
        .map_err(record_error_to_api)?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// `GET /api/records/:kind/:id`: open one record.
pub async fn get_record(
    State(state): State<AppState>,
    auth: AuthUser,
    path: Result<Path<(String, Uuid)>, PathRejection>,
) -> Result<Json<RecordRow>, ApiError> {
    let Path((kind, id)) = path?;
    let kind = parse_kind(&kind)?;
    let row = record::get_record(&state.pool, &auth.user, kind, id)
        .await
        .map_err(record_error_to_api)?;
    Ok(Json(row))
}

/// `DELETE /api/records/:kind/:id`: delete a record (and its file for media).
pub async fn delete_record(
    State(state): State<AppState>,
    auth: AuthUser,
    path: Result<Path<(String, Uuid)>, PathRejection>,
) -> Result<Json<Value>, ApiError> {
    let Path((kind, id)) = path?;
    let kind = parse_kind(&kind)?;
    let row = record::delete_record(&state.pool, &auth.user, kind, id)
        .await
        .map_err(record_error_to_api)?;
    if kind == RecordKind::Media {
        media::discard_blob(state.media.as_ref(), &row).await;
    }
    Ok(Json(serde_json::json!({ "ok": true, "id": row.id })))
}

#[derive(Deserialize)]
pub struct ReviewBody {
    pub decision: String,
    pub note: Option<String>,
}

/// `POST /api/records/:kind/:id/review`: approve or reject a pending record.
pub async fn review_record(
    State(state): State<AppState>,
    auth: AuthUser,
    path: Result<Path<(String, Uuid)>, PathRejection>,
    body: Result<Json<ReviewBody>, JsonRejection>,
) -> Result<Json<RecordRow>, ApiError> {
    let Path((kind, id)) = path?;
    let kind = parse_kind(&kind)?;
    let Json(body) = body?;
    let decision = Decision::parse(&body.decision).ok_or_else(|| {
        ApiError::bad_request(format!("decision must be approve or reject, got {:?}", body.decision))
            .with_field("decision")
    })?;
    let row = record::review_record(&state.pool, &auth.user, kind, id, decision, body.note.as_deref())
        .await
        .map_err(record_error_to_api)?;
    Ok(Json(row))
}

#[derive(Deserialize, Default)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// `GET /api/approvals`: pending records across reviewable kinds, paged.
pub async fn approvals(
    State(state): State<AppState>,
    auth: AuthUser,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<Vec<RecordRow>>, ApiError> {
    let Query(page) = query?;
    let limit = record::clamp_limit(page.limit);
    let rows = record::list_pending(&state.pool, &auth.user, limit, page.offset.unwrap_or(0))
        .await
        .map_err(record_error_to_api)?;
    Ok(Json(rows))
}

/// `GET /api/records/:kind/summary`: totals over the filtered list.
pub async fn summary(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(kind): Path<String>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<RecordSummary>, ApiError> {
    let kind = parse_kind(&kind)?;
    let Query(query) = query?;
    let filter = filter_from(&query)?;
    let rows = record::list_records(&state.pool, &auth.user, kind, &filter)
        .await
        .map_err(record_error_to_api)?;
    Ok(Json(summary::summarize(kind, &rows)))
}

/// `GET /api/records/:kind/export.jsonl`: JSON-lines download of the filtered list.
///
/// Without an explicit `limit` every matching record is exported.
pub async fn export_jsonl(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(kind): Path<String>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let kind = parse_kind(&kind)?;
    let Query(query) = query?;
    let filter = filter_from(&query)?;
    let rows = if query.limit.is_some() {
        record::list_records(&state.pool, &auth.user, kind, &filter).await
    } else {
        record::list_all_records(&state.pool, &auth.user, kind, &filter).await
    }
    .map_err(record_error_to_api)?;
    tracing::info!(%kind, records = rows.len(), user_id = %auth.user.id, "records exported");

    let lines = record::export_jsonl_lines(kind, &rows, OffsetDateTime::now_utc()).map_err(|e| {
        tracing::error!(error = %e, %kind, "export serialization failed");
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "E_EXPORT", "export failed")
    })?;

    let stream = futures::stream::iter(
        lines
            .into_iter()
            .map(|line| Ok::<axum::body::Bytes, std::convert::Infallible>(axum::body::Bytes::from(line))),
    );
    let body = axum::body::Body::from_stream(stream);
    let filename = format!("{kind}-records.jsonl");

    Ok((
        [
            (CONTENT_TYPE, "application/x-ndjson; charset=utf-8".to_owned()),
            (CONTENT_DISPOSITION, format!("attachment; filename=\"{filename}\"")),
        ],
        body,
    )
        .into_response())
}

#[cfg(test)]
#[path = "records_test.rs"]
mod tests;

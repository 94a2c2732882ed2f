//! Media upload and download routes.
//!
//! Uploads are the raw request body. The `Content-Type` header is recorded as
//! the file's type, and title/description/file name come from the query string.

use axum::body::{Body, Bytes};
use axum::extract::rejection::{BytesRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;
use crate::routes::auth::AuthUser;
use crate::routes::records::record_error_to_api;
use crate::services::media::{self, MediaError, UploadMeta};
use crate::services::record::RecordRow;
use crate::state::AppState;

pub(crate) fn media_error_to_api(err: MediaError) -> ApiError {
    match err {
        MediaError::Empty => ApiError::from_err(StatusCode::BAD_REQUEST, &err),
        MediaError::TooLarge { .. } => ApiError::from_err(StatusCode::PAYLOAD_TOO_LARGE, &err),
        MediaError::MissingBlob(ref key) => {
            tracing::warn!(storage_key = %key, "media record has no stored file");
            ApiError::from_err(StatusCode::NOT_FOUND, &err)
        }
        MediaError::InvalidKey | MediaError::Io(_) => {
            tracing::error!(error = %err, "media storage failure");
            ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "E_STORAGE", "media storage error")
        }
        MediaError::Record(e) => record_error_to_api(e),
    }
}

fn body_rejection_to_api(rejection: &BytesRejection, limit: usize) -> ApiError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        media_error_to_api(MediaError::TooLarge { limit })
    } else {
        ApiError::bad_request(rejection.body_text())
    }
}

#[derive(Deserialize, Default)]
pub struct UploadQuery {
    pub title: Option<String>,
    pub description: Option<String>,
    pub file_name: Option<String>,
}

/// `POST /api/media`: store the request body and create a media record.
pub async fn upload(
    State(state): State<AppState>,
    auth: AuthUser,
    query: Result<Query<UploadQuery>, QueryRejection>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<(StatusCode, Json<RecordRow>), ApiError> {
    let Query(query) = query?;
    let limit = state.config.media_max_bytes;
    let bytes = body.map_err(|e| body_rejection_to_api(&e, limit))?;

    let meta = UploadMeta {
        title: query.title,
        description: query.description,
        file_name: query.file_name,
        content_type: headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned),
    };

    let row = media::upload_media(&state.pool, state.media.as_ref(), &auth.user, meta, &bytes, limit)
        .await
        .map_err(media_error_to_api)?;
    tracing::info!(record_id = %row.id, size = bytes.len(), user_id = %auth.user.id, "media uploaded");
    Ok((StatusCode::CREATED, Json(row)))
}

/// `GET /api/media/:id/content`: the stored bytes with their recorded type.
pub async fn download(
    State(state): State<AppState>,
    auth: AuthUser,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Response, ApiError> {
    let Path(id) = id?;
    let (row, bytes) = media::open_media(&state.pool, state.media.as_ref(), &auth.user, id)
        .await
        .map_err(media_error_to_api)?;

    let content_type = media::blob_ref(&row).map_or("application/octet-stream", |(_, ct)| ct).to_owned();
    let disposition = match row.data.get("file_name").and_then(serde_json::Value::as_str) {
        Some(name) => format!("inline; filename=\"{}\"", name.replace('"', "")),
        None => "inline".to_owned(),
    };

    Ok(([(CONTENT_TYPE, content_type), (CONTENT_DISPOSITION, disposition)], Body::from(bytes)).into_response())
}

//! Media uploads.
//!
//! ARCHITECTURE
//! ============
//! File bytes go to a `MediaStore`; the searchable metadata becomes a `media`
//! record in the `records` table carrying the storage key. The local store
//! writes one file per key under the configured media directory.
//!
//! ERROR HANDLING
//! ==============
//! Bytes are stored before the row is inserted. If the insert fails the stored
//! file is removed again so no orphan is left behind.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Value, json};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::ErrorCode;
use crate::form::{self, RecordKind};
use crate::services::record::{self, RecordError, RecordRow};
use crate::services::session::SessionUser;

const MAX_FILE_NAME_LEN: usize = 200;
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("upload is empty")]
    Empty,
    #[error("upload exceeds {limit} bytes")]
    TooLarge { limit: usize },
    #[error("invalid storage key")]
    InvalidKey,
    #[error("stored file missing for {0}")]
    MissingBlob(String),
    #[error("storage error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Record(#[from] RecordError),
}

impl ErrorCode for MediaError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Empty => "E_EMPTY_UPLOAD",
            Self::TooLarge { .. } => "E_UPLOAD_TOO_LARGE",
            Self::InvalidKey => "E_INVALID_STORAGE_KEY",
            Self::MissingBlob(_) => "E_MISSING_BLOB",
            Self::Io(_) => "E_STORAGE",
            Self::Record(err) => err.error_code(),
        }
    }
}

// =============================================================================
// STORE
// =============================================================================

/// Byte storage for uploaded media, addressed by opaque key.
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), MediaError>;
    async fn get(&self, key: &str) -> Result<Vec<u8>, MediaError>;
    async fn delete(&self, key: &str) -> Result<(), MediaError>;
}

/// Filesystem-backed store: one file per key under `root`.
pub struct LocalMediaStore {
    root: PathBuf,
}

impl LocalMediaStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, MediaError> {
        if !is_valid_key(key) {
            return Err(MediaError::InvalidKey);
        }
        Ok(self.root.join(key))
    }
}

pub(crate) fn is_valid_key(key: &str) -> bool {
    !key.is_empty() && key.len() <= 64 && key.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), MediaError> {
        let path = self.path_for(key)?;
        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(path, bytes).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, MediaError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(MediaError::MissingBlob(key.to_owned())),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), MediaError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// =============================================================================
// UPLOAD / DOWNLOAD
// =============================================================================

/// Client-supplied metadata for an upload.
#[derive(Debug, Clone, Default)]
pub struct UploadMeta {
    pub title: Option<String>,
    pub description: Option<String>,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
}

/// Keep only the last path component, drop control characters, cap the length.
#[must_use]
pub fn sanitize_file_name(raw: &str) -> Option<String> {
    let last = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
    let cleaned: String = last
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_FILE_NAME_LEN)
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        None
    } else {
        Some(cleaned.to_owned())
    }
}

/// Store an upload and create its `media` record.
///
/// # Errors
///
/// `Record(Forbidden)` if the role cannot write media, `Record(Form)` for a
/// missing title, `Empty`/`TooLarge` for bad bodies, `Io` for storage failures.
pub async fn upload_media(
    pool: &PgPool,
    store: &dyn MediaStore,
    user: &SessionUser,
    meta: UploadMeta,
    bytes: &[u8],
    max_bytes: usize,
) -> Result<RecordRow, MediaError> {
    record::ensure_write(user, RecordKind::Media)?;

    let mut validated = form::validate(
        RecordKind::Media,
        &json!({ "title": meta.title, "description": meta.description }),
    )
    .map_err(RecordError::from)?;

    if bytes.is_empty() {
        return Err(MediaError::Empty);
    }
    if bytes.len() > max_bytes {
        return Err(MediaError::TooLarge { limit: max_bytes });
    }

    let storage_key = Uuid::new_v4().to_string();
    let content_type = meta
        .content_type
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_owned();

    validated.data.insert("storage_key".into(), Value::from(storage_key.clone()));
    validated.data.insert("content_type".into(), Value::from(content_type));
    validated.data.insert("size_bytes".into(), Value::from(bytes.len()));
    if let Some(name) = meta.file_name.as_deref().and_then(sanitize_file_name) {
        validated.data.insert("file_name".into(), Value::from(name));
    }

    store.put(&storage_key, bytes).await?;

    match record::insert_validated(pool, user, validated).await {
        Ok(row) => Ok(row),
        Err(err) => {
            if let Err(cleanup) = store.delete(&storage_key).await {
                tracing::warn!(error = %cleanup, %storage_key, "failed to remove orphaned upload");
            }
            Err(err.into())
        }
    }
}

/// Storage key and content type recorded on a media row.
#[must_use]
pub fn blob_ref(row: &RecordRow) -> Option<(&str, &str)> {
    let key = row.data.get("storage_key").and_then(Value::as_str)?;
    let content_type = row
        .data
        .get("content_type")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_CONTENT_TYPE);
    Some((key, content_type))
}

/// Load a media record and its bytes.
///
/// # Errors
///
/// `Record(NotFound)` when the row is not visible, `MissingBlob` when the file is gone.
pub async fn open_media(
    pool: &PgPool,
    store: &dyn MediaStore,
    user: &SessionUser,
    id: Uuid,
) -> Result<(RecordRow, Vec<u8>), MediaError> {
    let row = record::get_record(pool, user, RecordKind::Media, id).await?;
    let Some((key, _)) = blob_ref(&row) else {
        return Err(MediaError::MissingBlob(id.to_string()));
    };
    let bytes = store.get(key).await?;
    Ok((row, bytes))
}

/// Remove the stored bytes of a deleted media row. Failures are logged only.
pub async fn discard_blob(store: &dyn MediaStore, row: &RecordRow) {
    if let Some((key, _)) = blob_ref(row) {
        if let Err(e) = store.delete(key).await {
            tracing::warn!(error = %e, record_id = %row.id, "failed to delete media file");
        }
    }
}

#[cfg(test)]
#[path = "media_test.rs"]
mod tests;

//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! This module binds every HTTP endpoint under a single Axum router and wraps
//! it with CORS, gzip compression and request tracing. Media uploads get their
//! own body limit taken from configuration; every other route keeps Axum's
//! default.

pub mod auth;
pub mod dashboard;
pub mod media;
pub mod records;
pub mod users;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let media_limit = DefaultBodyLimit::max(state.config.media_max_bytes);

    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/auth/email/request-code", post(auth::request_code))
        .route("/api/auth/email/verify-code", post(auth::verify_code))
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/navigation", get(records::navigation))
        .route("/api/forms", get(records::list_forms))
        .route("/api/forms/{kind}", get(records::get_form))
        .route("/api/dashboard", get(dashboard::dashboard))
        .route("/api/approvals", get(records::approvals))
        .route(
            "/api/records/{kind}",
            get(records::list_records).post(records::create_record),
        )
        .route("/api/records/{kind}/summary", get(records::summary))
        .route("/api/records/{kind}/export.jsonl", get(records::export_jsonl))
        .route(
            "/api/records/{kind}/{id}",
            get(records::get_record).delete(records::delete_record),
        )
        .route("/api/records/{kind}/{id}/review", post(records::review_record))
        .route("/api/media", post(media::upload).layer(media_limit))
        .route("/api/media/{id}/content", get(media::download))
        .route("/api/users", get(users::list_users))
        .route("/api/users/{id}/role", patch(users::set_role))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

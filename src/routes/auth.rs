//! Auth routes: email access codes, session management.

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRef, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use time::Duration;

use crate::config::AppConfig;
use crate::error::{ApiError, ErrorCode};
use crate::rate_limit::RateLimitError;
use crate::services::email_auth::{self, EmailAuthError};
use crate::services::session::{self, SessionUser};
use crate::state::AppState;

pub(crate) const COOKIE_NAME: &str = "session_token";

// =============================================================================
// AUTH EXTRACTOR
// =============================================================================

/// Authenticated user resolved from the session cookie or a bearer token.
/// Use as a handler parameter to require authentication.
pub struct AuthUser {
    pub user: SessionUser,
    pub token: String,
}

/// Session token from the `session_token` cookie, falling back to
/// `Authorization: Bearer <token>`.
pub(crate) fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(token) = jar.get(COOKIE_NAME).map(Cookie::value).filter(|t| !t.is_empty()) {
        return Some(token.to_owned());
    }

    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_owned)
}

impl<S> axum::extract::FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut axum::http::request::Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = token_from_headers(&parts.headers).ok_or_else(ApiError::unauthorized)?;

        let app_state = AppState::from_ref(state);
        let user = session::validate_session(&app_state.pool, &token)
            .await
            .map_err(|e| ApiError::database(&e))?
            .ok_or_else(ApiError::unauthorized)?;

        Ok(Self { user, token })
    }
}

// =============================================================================
// ERROR MAPPING
// =============================================================================

pub(crate) fn email_auth_error_to_api(err: &EmailAuthError) -> ApiError {
    match err {
        EmailAuthError::InvalidEmail | EmailAuthError::InvalidCode => ApiError::from_err(StatusCode::BAD_REQUEST, err),
        EmailAuthError::VerificationFailed => ApiError::from_err(StatusCode::UNAUTHORIZED, err),
        EmailAuthError::EmailDelivery(reason) => {
            tracing::error!(error = %reason, "access code delivery failed");
            ApiError::new(StatusCode::SERVICE_UNAVAILABLE, err.error_code(), "could not send the access code email")
        }
        EmailAuthError::Db(e) => ApiError::database(e),
    }
}

pub(crate) fn rate_limit_error_to_api(err: &RateLimitError) -> ApiError {
    ApiError::from_err(StatusCode::TOO_MANY_REQUESTS, err)
}

/// The code to return in the response. Only echoed when no email is sent.
pub(crate) fn echoed_code(config: &AppConfig, code: String) -> Option<String> {
    (config.resend.is_none() && config.dev_echo_codes).then_some(code)
}

fn session_cookie(token: String, secure: bool, max_age: Duration) -> Cookie<'static> {
    Cookie::build((COOKIE_NAME, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(max_age)
        .build()
}

// =============================================================================
// HANDLERS
// =============================================================================

#[derive(Deserialize)]
pub struct RequestCodeBody {
    pub email: String,
}

#[derive(Serialize)]
pub struct RequestCodeResponse {
    pub ok: bool,
    /// Present only when dev echo is enabled and no email was sent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// `POST /api/auth/email/request-code`: issue an access code for an email.
pub async fn request_code(
    State(state): State<AppState>,
    body: Result<Json<RequestCodeBody>, JsonRejection>,
) -> Result<Json<RequestCodeResponse>, ApiError> {
    let Json(body) = body?;
    let email = email_auth::normalize_email(&body.email)
        .ok_or_else(|| email_auth_error_to_api(&EmailAuthError::InvalidEmail))?;

    let config = &state.config;
    if config.resend.is_none() && !config.dev_echo_codes {
        return Err(ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "E_EMAIL_UNAVAILABLE",
            "email sign-in is not configured",
        ));
    }

    state
        .rate_limiter
        .check_and_record(&email)
        .map_err(|e| rate_limit_error_to_api(&e))?;

    let code = email_auth::request_access_code(&state.pool, &email, config.bootstrap_director_email.as_deref())
        .await
        .map_err(|e| email_auth_error_to_api(&e))?;

    if let Some(resend) = &config.resend {
        email_auth::send_access_code_email(&resend.api_key, &resend.from, &email, &code)
            .await
            .map_err(|e| email_auth_error_to_api(&e))?;
    }

    tracing::info!(%email, "access code issued");
    Ok(Json(RequestCodeResponse { ok: true, code: echoed_code(config, code) }))
}

#[derive(Deserialize)]
pub struct VerifyCodeBody {
    pub email: String,
    pub code: String,
}

#[derive(Serialize)]
pub struct VerifyCodeResponse {
    pub token: String,
    pub user: SessionUser,
}

/// `POST /api/auth/email/verify-code`: exchange a code for a session.
pub async fn verify_code(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Result<Json<VerifyCodeBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = body?;
    let user_id = email_auth::verify_access_code(&state.pool, &body.email, &body.code)
        .await
        .map_err(|e| email_auth_error_to_api(&e))?;

    let ttl_days = state.config.session_ttl_days;
    let token = session::create_session(&state.pool, user_id, ttl_days)
        .await
        .map_err(|e| ApiError::database(&e))?;
    let user = session::validate_session(&state.pool, &token)
        .await
        .map_err(|e| ApiError::database(&e))?
        .ok_or_else(ApiError::unauthorized)?;

    tracing::info!(user_id = %user.id, role = user.role.as_str(), "signed in");
    let jar = jar.add(session_cookie(token.clone(), state.config.cookie_secure, Duration::days(ttl_days)));
    Ok((jar, Json(VerifyCodeResponse { token, user })))
}

/// `GET /api/auth/me`: return current user.
pub async fn me(auth: AuthUser) -> Json<SessionUser> {
    Json(auth.user)
}

/// `POST /api/auth/logout`: delete session, clear cookie.
pub async fn logout(State(state): State<AppState>, auth: AuthUser) -> impl IntoResponse {
    if let Err(e) = session::delete_session(&state.pool, &auth.token).await {
        tracing::warn!(error = %e, user_id = %auth.user.id, "session delete failed");
    }

    let jar = CookieJar::new().add(session_cookie(String::new(), state.config.cookie_secure, Duration::ZERO));
    (jar, StatusCode::NO_CONTENT)
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;

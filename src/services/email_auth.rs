//! Email access-code sign-in.
//!
//! Users sign in with a short-lived six-character code sent to their email.
//! Only the SHA-256 of the code is stored. The first sign-in creates the user
//! as a contractor unless the address is the configured bootstrap director.

use rand::Rng;
use resend_rs::Resend;
use resend_rs::types::CreateEmailBaseOptions;
use sha2::{Digest, Sha256};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::ErrorCode;
use crate::services::session::bytes_to_hex;

const CODE_LEN: usize = 6;
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const MAX_FAILED_ATTEMPTS: i32 = 5;
const ACCESS_CODE_TEMPLATE: &str = include_str!("../../templates/access_code.html");

#[derive(Debug, thiserror::Error)]
pub enum EmailAuthError {
    #[error("invalid email")]
    InvalidEmail,
    #[error("invalid code")]
    InvalidCode,
    #[error("expired or incorrect code")]
    VerificationFailed,
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("email delivery failed: {0}")]
    EmailDelivery(String),
}

impl ErrorCode for EmailAuthError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidEmail => "E_INVALID_EMAIL",
            Self::InvalidCode => "E_INVALID_CODE",
            Self::VerificationFailed => "E_VERIFICATION_FAILED",
            Self::Db(_) => "E_DATABASE",
            Self::EmailDelivery(_) => "E_EMAIL_DELIVERY",
        }
    }
}

#[must_use]
pub fn normalize_email(email: &str) -> Option<String> {
    let normalized = email.trim().to_ascii_lowercase();
    let (local, domain) = normalized.split_once('@')?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return None;
    }
    Some(normalized)
}

#[must_use]
pub fn normalize_code(code: &str) -> Option<String> {
    let normalized = code.trim().to_ascii_uppercase();
    if normalized.len() != CODE_LEN || !normalized.bytes().all(|c| CODE_ALPHABET.contains(&c)) {
        return None;
    }
    Some(normalized)
}

#[must_use]
pub fn generate_access_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LEN)
        .map(|_| {
            let idx = rng.random_range(0..CODE_ALPHABET.len());
            CODE_ALPHABET[idx] as char
        })
        .collect()
}

#[must_use]
pub fn hash_access_code(code: &str) -> String {
    let digest = Sha256::digest(code.as_bytes());
    bytes_to_hex(&digest)
}

pub(crate) fn name_from_email(email: &str) -> String {
    email
        .split('@')
        .next()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or("user")
        .to_owned()
}

/// Create (or reuse) the user for `email` and issue a fresh access code.
///
/// Any outstanding codes for the address are discarded first.
pub async fn request_access_code(
    pool: &PgPool,
    email: &str,
    bootstrap_director_email: Option<&str>,
) -> Result<String, EmailAuthError> {
    let normalized = normalize_email(email).ok_or(EmailAuthError::InvalidEmail)?;
    let name = name_from_email(&normalized);
    let is_bootstrap_director = bootstrap_director_email == Some(normalized.as_str());

    sqlx::query(
        r"INSERT INTO users (email, name, role)
          VALUES ($1, $2, CASE WHEN $3 THEN 'director' ELSE 'contractor' END)
          ON CONFLICT (email) DO UPDATE
          SET role = CASE WHEN $3 THEN 'director' ELSE users.role END",
    )
    .bind(&normalized)
    .bind(name)
    .bind(is_bootstrap_director)
    .execute(pool)
    .await?;

    sqlx::query("DELETE FROM email_login_codes WHERE email = $1 AND consumed_at IS NULL")
        .bind(&normalized)
        .execute(pool)
        .await?;

    let code = generate_access_code();
    sqlx::query("INSERT INTO email_login_codes (email, code_hash) VALUES ($1, $2)")
        .bind(&normalized)
        .bind(hash_access_code(&code))
        .execute(pool)
        .await?;

    Ok(code)
}

/// Consume a matching, unexpired code and return the user's id.
///
/// A wrong code counts as a failed attempt; the code is burned after
/// `MAX_FAILED_ATTEMPTS` failures.
pub async fn verify_access_code(pool: &PgPool, email: &str, code: &str) -> Result<Uuid, EmailAuthError> {
    let normalized_email = normalize_email(email).ok_or(EmailAuthError::InvalidEmail)?;
    let normalized_code = normalize_code(code).ok_or(EmailAuthError::InvalidCode)?;

    let update = sqlx::query(
        r"UPDATE email_login_codes
          SET consumed_at = now()
          WHERE id = (
              SELECT id
              FROM email_login_codes
              WHERE email = $1
                AND consumed_at IS NULL
                AND expires_at > now()
              ORDER BY created_at DESC
              LIMIT 1
          )
          AND code_hash = $2
          RETURNING id",
    )
    .bind(&normalized_email)
    .bind(hash_access_code(&normalized_code))
    .fetch_optional(pool)
    .await?;

    if update.is_none() {
        sqlx::query(
            r"UPDATE email_login_codes
              SET attempts = attempts + 1,
                  consumed_at = CASE WHEN attempts + 1 >= $2 THEN now() ELSE consumed_at END
              WHERE id = (
                  SELECT id
                  FROM email_login_codes
                  WHERE email = $1
                    AND consumed_at IS NULL
                    AND expires_at > now()
                  ORDER BY created_at DESC
                  LIMIT 1
              )",
        )
        .bind(&normalized_email)
        .bind(MAX_FAILED_ATTEMPTS)
        .execute(pool)
        .await?;
        return Err(EmailAuthError::VerificationFailed);
    }

    let user_row = sqlx::query("SELECT id FROM users WHERE email = $1")
        .bind(&normalized_email)
        .fetch_optional(pool)
        .await?
        .ok_or(EmailAuthError::VerificationFailed)?;

    Ok(user_row.get("id"))
}

pub async fn send_access_code_email(
    resend_api_key: &str,
    resend_from: &str,
    to_email: &str,
    code: &str,
) -> Result<(), EmailAuthError> {
    let resend = Resend::new(resend_api_key);
    let html = render_access_code_template(to_email, code);
    let email = CreateEmailBaseOptions::new(resend_from, [to_email], "Your quarry dashboard sign-in code").with_html(&html);
    resend
        .emails
        .send(email)
        .await
        .map_err(|e| EmailAuthError::EmailDelivery(e.to_string()))?;
    Ok(())
}

#[must_use]
pub fn render_access_code_template(email: &str, code: &str) -> String {
    ACCESS_CODE_TEMPLATE
        .replace("{{EMAIL}}", email)
        .replace("{{CODE}}", code)
}

#[cfg(test)]
#[path = "email_auth_test.rs"]
mod tests;

//! Environment-driven configuration.
//!
//! DESIGN
//! ======
//! Everything is read once at startup into `AppConfig` and shared through
//! `AppState`. A `.env` file is honored via `dotenvy` before parsing.

use std::path::PathBuf;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_MEDIA_DIR: &str = "./media";
const DEFAULT_MEDIA_MAX_BYTES: usize = 10 * 1024 * 1024;
const DEFAULT_SESSION_TTL_DAYS: i64 = 30;
const DEFAULT_LOGIN_CODE_RATE_LIMIT: usize = 5;
const DEFAULT_LOGIN_CODE_RATE_WINDOW_SECS: u64 = 600;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Resend delivery settings for access-code emails.
#[derive(Debug, Clone)]
pub struct ResendConfig {
    pub api_key: String,
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub db_max_connections: u32,
    pub media_dir: PathBuf,
    pub media_max_bytes: usize,
    pub session_ttl_days: i64,
    /// `None` disables email delivery.
    pub resend: Option<ResendConfig>,
    /// Return access codes in the HTTP response. Local development only.
    pub dev_echo_codes: bool,
    pub bootstrap_director_email: Option<String>,
    pub cookie_secure: bool,
    pub login_code_rate_limit: usize,
    pub login_code_rate_window_secs: u64,
}

impl AppConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if `DATABASE_URL` is missing or any value fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`AppConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let resend = match (lookup("RESEND_API_KEY"), lookup("RESEND_FROM")) {
            (Some(api_key), Some(from)) if !api_key.trim().is_empty() && !from.trim().is_empty() => {
                Some(ResendConfig { api_key, from })
            }
            _ => None,
        };

        Ok(Self {
            database_url,
            port: parse_or(&lookup, "PORT", DEFAULT_PORT)?,
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS)?,
            media_dir: lookup("MEDIA_DIR").map_or_else(|| PathBuf::from(DEFAULT_MEDIA_DIR), PathBuf::from),
            media_max_bytes: parse_or(&lookup, "MEDIA_MAX_BYTES", DEFAULT_MEDIA_MAX_BYTES)?,
            session_ttl_days: parse_or(&lookup, "SESSION_TTL_DAYS", DEFAULT_SESSION_TTL_DAYS)?,
            resend,
            dev_echo_codes: bool_or(&lookup, "AUTH_DEV_ECHO_CODE", false)?,
            bootstrap_director_email: lookup("BOOTSTRAP_DIRECTOR_EMAIL")
                .map(|v| v.trim().to_ascii_lowercase())
                .filter(|v| !v.is_empty()),
            cookie_secure: bool_or(&lookup, "COOKIE_SECURE", false)?,
            login_code_rate_limit: parse_or(&lookup, "LOGIN_CODE_RATE_LIMIT", DEFAULT_LOGIN_CODE_RATE_LIMIT)?,
            login_code_rate_window_secs: parse_or(
                &lookup,
                "LOGIN_CODE_RATE_WINDOW_SECS",
                DEFAULT_LOGIN_CODE_RATE_WINDOW_SECS,
            )?,
        })
    }
}

pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) if raw.trim().is_empty() => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}

fn bool_or(lookup: &impl Fn(&str) -> Option<String>, key: &'static str, default: bool) -> Result<bool, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) if raw.trim().is_empty() => Ok(default),
        Some(raw) => parse_bool(&raw).ok_or(ConfigError::Invalid { key, value: raw }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

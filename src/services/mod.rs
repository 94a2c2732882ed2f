//! Domain services used by the HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own business rules and persistence so route handlers can
//! stay focused on request parsing, auth plumbing and status mapping.

pub mod dashboard;
pub mod email_auth;
pub mod media;
pub mod record;
pub mod session;
pub mod summary;
pub mod users;

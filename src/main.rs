mod config;
mod db;
mod error;
mod form;
mod rate_limit;
mod roles;
mod routes;
mod services;
mod state;

use std::sync::Arc;

use crate::services::media::LocalMediaStore;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt::init();

    let config = config::AppConfig::from_env().expect("invalid configuration");

    let pool = db::init_pool(&config.database_url, config.db_max_connections)
        .await
        .expect("database init failed");

    match services::session::delete_expired_sessions(&pool).await {
        Ok(removed) if removed > 0 => tracing::info!(removed, "expired sessions removed"),
        Ok(_) => {}
        Err(e) => tracing::warn!(error = %e, "expired session cleanup failed"),
    }

    tokio::fs::create_dir_all(&config.media_dir)
        .await
        .expect("failed to create media directory");
    let media = Arc::new(LocalMediaStore::new(config.media_dir.clone()));
    tracing::info!(media_dir = %media.root().display(), "media store ready");

    if config.resend.is_none() {
        if config.dev_echo_codes {
            tracing::warn!("email delivery not configured; access codes are echoed in responses");
        } else {
            tracing::warn!("email delivery not configured; sign-in is disabled");
        }
    }

    let port = config.port;
    let state = state::AppState::new(pool, config, media);
    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "quarryops listening");
    axum::serve(listener, app).await.expect("server failed");
}

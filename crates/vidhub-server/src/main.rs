mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{
    HeaderValue, Method,
    header::{AUTHORIZATION, CONTENT_TYPE, RANGE},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use vidhub_api::auth::{AppState, AppStateInner, AuthConfig};
use vidhub_db::Database;
use vidhub_media::MediaStore;

use crate::config::Config;

/// Used when RUST_LOG is unset. The binary's own target is `vidhub`, its bin name.
const DEFAULT_LOG_FILTER: &str =
    "vidhub=debug,vidhub_api=debug,vidhub_db=info,vidhub_media=info,tower_http=debug";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: invalid configuration: {e:#}");
            eprintln!("       Set the VIDHUB_* variables in your .env file and restart.");
            std::process::exit(1);
        }
    };

    let db = Database::open(&config.db_path)?;
    let media = MediaStore::new(config.media_dir.clone(), config.media_base_url()).await?;

    let state: AppState = Arc::new(AppStateInner {
        db,
        media,
        auth: AuthConfig {
            access_secret: config.access_token_secret.clone(),
            refresh_secret: config.refresh_token_secret.clone(),
            access_ttl: chrono::Duration::minutes(config.access_token_ttl_minutes),
            refresh_ttl: chrono::Duration::days(config.refresh_token_ttl_days),
            secure_cookies: config.secure_cookies,
        },
    });
    if !config.secure_cookies {
        warn!("Session cookies are not marked Secure; use only for local development");
    }

    let app = vidhub_api::router(state, config.max_upload_bytes())
        .layer(cors_layer(&config)?)
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Vidhub server listening on {}", addr);
    info!("Media served from {}", config.media_base_url());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// A configured origin gets credentialed CORS so cookies flow; otherwise
/// any origin is allowed without credentials.
fn cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let Some(origin) = &config.cors_origin else {
        return Ok(CorsLayer::permissive());
    };
    Ok(CorsLayer::new()
        .allow_origin(origin.parse::<HeaderValue>()?)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, RANGE])
        .allow_credentials(true))
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}

//! Guincoin server - REST endpoints for bulk balance imports

mod error;
mod extract;
mod handlers;
mod routes;
mod state;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use guincoin_core::services::{EntryPoint, LoggingService};
use guincoin_core::GuincoinContext;

use crate::state::AppState;

/// Data directory from GUINCOIN_DIR, default ~/.guincoin
fn data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("GUINCOIN_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(".guincoin"))
        .ok_or_else(|| anyhow!("Could not find home directory; set GUINCOIN_DIR"))
}

/// stdout plus a plain-text copy in `<data dir>/logs/server.log`
fn init_tracing(data_dir: &Path) -> Result<()> {
    let log_dir = data_dir.join("logs");
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Cannot create log directory {}", log_dir.display()))?;

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("server.log"))?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::sync::Arc::new(log_file))
                .with_ansi(false),
        )
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let data_dir = data_dir()?;
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create guincoin directory: {:?}", data_dir))?;
    init_tracing(&data_dir)?;

    // The relay mailer holds a blocking HTTP client, which must be built off the runtime
    let dir = data_dir.clone();
    let (ctx, logger) = tokio::task::spawn_blocking(move || -> Result<_> {
        let ctx = GuincoinContext::new(&dir).context("Failed to initialize guincoin context")?;
        let logger = LoggingService::new(&dir, EntryPoint::Server, env!("CARGO_PKG_VERSION"))
            .map_err(|e| tracing::warn!("event logging disabled: {}", e))
            .ok();
        Ok((ctx, logger))
    })
    .await??;

    let addr: SocketAddr = ctx
        .config
        .bind
        .parse()
        .with_context(|| format!("Invalid bind address: {}", ctx.config.bind))?;

    tracing::info!(
        data_dir = %data_dir.display(),
        mailer = ctx.pending_service.mailer_name(),
        "guincoin server starting"
    );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let app = routes::router(AppState::new(ctx, logger)).layer(cors);

    let listener = TcpListener::bind(addr).await?;
    tracing::info!("listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

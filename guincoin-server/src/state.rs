//! Shared server state

use std::sync::Arc;

use guincoin_core::services::{LogEvent, LoggingService};
use guincoin_core::GuincoinContext;

use crate::error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub ctx: Arc<GuincoinContext>,
    logger: Option<Arc<LoggingService>>,
}

impl AppState {
    pub fn new(ctx: GuincoinContext, logger: Option<LoggingService>) -> Self {
        Self {
            ctx: Arc::new(ctx),
            logger: logger.map(Arc::new),
        }
    }

    /// Record an event in logs.duckdb; failures only reach tracing
    pub fn log(&self, event: LogEvent) {
        if let Some(logger) = &self.logger {
            if let Err(e) = logger.log(event) {
                tracing::warn!("failed to write log event: {}", e);
            }
        }
    }

    /// Run blocking core work off the async runtime
    pub async fn run<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&AppState) -> anyhow::Result<T> + Send + 'static,
    {
        let state = self.clone();
        tokio::task::spawn_blocking(move || f(&state))
            .await
            .map_err(|e| ApiError::internal(format!("worker failed: {}", e)))?
            .map_err(ApiError::from)
    }
}

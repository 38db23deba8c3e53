//! CLI command implementations

pub mod import;
pub mod jobs;
pub mod logs;
pub mod pending;
pub mod status;
pub mod users;

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use guincoin_core::services::{EntryPoint, LogEvent, LoggingService};
use guincoin_core::GuincoinContext;
use uuid::Uuid;

/// Get the logging service for CLI operations
///
/// Returns None if logging fails to initialize (shouldn't block operations)
pub fn get_logger() -> Option<LoggingService> {
    let guincoin_dir = get_guincoin_dir().ok()?;
    std::fs::create_dir_all(&guincoin_dir).ok()?;
    LoggingService::new(&guincoin_dir, EntryPoint::Cli, env!("CARGO_PKG_VERSION")).ok()
}

/// Log an event, ignoring any errors (logging should never break the app)
pub fn log_event(logger: &Option<LoggingService>, event: LogEvent) {
    if let Some(l) = logger {
        let _ = l.log(event);
    }
}

/// Get the guincoin directory from environment or default
pub fn get_guincoin_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("GUINCOIN_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(".guincoin"))
        .ok_or_else(|| anyhow!("Could not find home directory; set GUINCOIN_DIR"))
}

/// Get or create guincoin context
pub fn get_context() -> Result<GuincoinContext> {
    let guincoin_dir = get_guincoin_dir()?;

    std::fs::create_dir_all(&guincoin_dir)
        .with_context(|| format!("Failed to create guincoin directory: {:?}", guincoin_dir))?;

    GuincoinContext::new(&guincoin_dir).context("Failed to initialize guincoin context")
}

/// Parse an id argument
pub fn parse_id(value: &str, what: &str) -> Result<Uuid> {
    Uuid::parse_str(value.trim()).with_context(|| format!("Invalid {} id: {}", what, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id() {
        let id = Uuid::new_v4();
        assert_eq!(parse_id(&format!(" {} ", id), "job").unwrap(), id);

        let err = parse_id("42", "job").unwrap_err();
        assert!(err.to_string().contains("Invalid job id"));
    }
}

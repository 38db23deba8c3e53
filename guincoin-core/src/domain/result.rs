//! Result and error types for the core library

use thiserror::Error;

/// Core library error type
///
/// Services return `anyhow::Result` but attach one of these at the point of
/// failure so callers (the HTTP layer in particular) can downcast and pick a
/// status code.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error("Mail error: {0}")]
    Mail(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a database error
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a spreadsheet parsing error
    pub fn spreadsheet(msg: impl Into<String>) -> Self {
        Self::Spreadsheet(msg.into())
    }

    /// Create a mail delivery error
    pub fn mail(msg: impl Into<String>) -> Self {
        Self::Mail(msg.into())
    }

    /// True for errors caused by the caller's input rather than the system
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Spreadsheet(_) | Self::Json(_))
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::validation("bad input");
        assert_eq!(err.to_string(), "Validation error: bad input");

        let err = Error::not_found("job 42");
        assert_eq!(err.to_string(), "Not found: job 42");
    }

    #[test]
    fn test_client_errors() {
        assert!(Error::validation("x").is_client_error());
        assert!(Error::spreadsheet("x").is_client_error());
        assert!(!Error::database("x").is_client_error());
        assert!(!Error::mail("x").is_client_error());
    }

    #[test]
    fn test_downcast_through_anyhow() {
        let err: anyhow::Error = Error::not_found("pending balance").into();
        let core = err.downcast_ref::<Error>().unwrap();
        assert!(matches!(core, Error::NotFound(_)));
    }
}

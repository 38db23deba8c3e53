//! Adapter implementations
//!
//! Adapters implement the ports and the storage layer with concrete technologies:
//! - DuckDB for persistence
//! - csv / calamine for spreadsheet uploads
//! - reqwest mail relay or database outbox for the InvitationMailer port

pub mod duckdb;
pub mod mailer;
pub mod spreadsheet;

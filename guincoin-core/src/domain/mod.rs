//! Core domain entities
//!
//! All business entities are defined here. These are pure data structures
//! with validation logic - no I/O or external dependencies.

pub mod column_mapping;
mod job;
pub mod merged_row;
mod pending;
pub mod result;
mod sheet;
mod transaction;
mod user;
mod validation;

pub use column_mapping::{BalanceColumns, ColumnMapping, DetectedColumns, EmailColumns};
pub use job::{BulkImportJob, BulkImportJobDetail, JobStatus};
pub use merged_row::{MatchTier, MatchType, MergedRow};
pub use pending::{PendingImportBalance, PendingStatus};
pub use sheet::{SheetData, UploadedFile, PREVIEW_ROW_LIMIT};
pub use transaction::{Transaction, TransactionKind};
pub use user::{normalize_email, User};
pub use validation::{RowIssue, ValidationResult, ValidationSummary};

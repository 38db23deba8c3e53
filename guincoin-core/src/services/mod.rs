//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! covers one stage of the import flow or one follow-up area.

mod commit;
pub mod import;
pub mod logging;
pub mod matching;
pub mod migration;
mod pending;
mod status;
mod user;
pub mod validation;

pub use commit::{CommitResult, JobService};
pub use import::{ImportService, PreviewResult, PreviewSummary, UploadResult};
pub use logging::{now_ms, EntryPoint, EventCount, LogEntry, LogEvent, LogFilter, LoggingService};
pub use matching::{Candidate, NameMatcher};
pub use migration::{MigrationResult, MigrationService};
pub use pending::{InvitationBatchResult, InvitationFailure, PendingService};
pub use status::{PendingBreakdown, StatusBucket, StatusService, StatusSummary};
pub use user::{Registration, UserService};
pub use validation::{EmailFormat, ValidationService};

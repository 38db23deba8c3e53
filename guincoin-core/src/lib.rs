//! Guincoin Core - bulk balance import reconciliation
//!
//! This crate implements the core domain logic following hexagonal architecture:
//!
//! - **domain**: Core entities (MergedRow, BulkImportJob, PendingImportBalance, etc.)
//! - **ports**: Trait definitions for external dependencies (InvitationMailer)
//! - **services**: Business logic orchestration, one service per import stage
//! - **adapters**: Concrete implementations (DuckDB, spreadsheets, mail relay)

pub mod adapters;
pub mod config;
pub mod domain;
pub mod log_migrations;
pub mod migrations;
pub mod ports;
pub mod services;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use adapters::duckdb::DuckDbRepository;
use adapters::mailer::{HttpMailer, OutboxMailer};
use config::Config;
use ports::InvitationMailer;
use services::*;

// Re-export commonly used types at crate root
pub use domain::result::Error;
pub use domain::{
    BulkImportJob, BulkImportJobDetail, ColumnMapping, MatchTier, MatchType, MergedRow,
    PendingImportBalance, PendingStatus, SheetData, Transaction, User, ValidationResult,
};

/// Database file inside the data directory
pub const DB_FILENAME: &str = "guincoin.duckdb";

/// Main context for Guincoin operations
///
/// Holds the database connection, configuration, and all services.
pub struct GuincoinContext {
    pub config: Config,
    pub repository: Arc<DuckDbRepository>,
    pub import_service: ImportService,
    pub validation_service: Arc<ValidationService>,
    pub job_service: JobService,
    pub pending_service: PendingService,
    pub user_service: UserService,
    pub status_service: StatusService,
}

impl GuincoinContext {
    /// Open the data directory, choosing the mailer from configuration
    pub fn new(data_dir: &Path) -> Result<Self> {
        let config = Config::load(data_dir)?;
        let repository = Arc::new(DuckDbRepository::new(&data_dir.join(DB_FILENAME))?);
        repository.ensure_schema()?;

        let mailer: Arc<dyn InvitationMailer> = match &config.relay_url {
            Some(url) => Arc::new(HttpMailer::new(url, config.relay_token.as_deref())?),
            None => Arc::new(OutboxMailer::new(Arc::clone(&repository))),
        };

        Self::with_mailer(data_dir, config, repository, mailer)
    }

    /// Wire services around an explicit mailer
    pub fn with_mailer(
        data_dir: &Path,
        config: Config,
        repository: Arc<DuckDbRepository>,
        mailer: Arc<dyn InvitationMailer>,
    ) -> Result<Self> {
        repository.ensure_schema()?;

        let validation_service = Arc::new(ValidationService::new(Arc::clone(&repository))?);
        let import_service = ImportService::new(Arc::clone(&repository), data_dir.to_path_buf());
        let job_service = JobService::new(Arc::clone(&repository), Arc::clone(&validation_service));
        let pending_service = PendingService::new(Arc::clone(&repository), mailer, config.clone());
        let user_service = UserService::new(Arc::clone(&repository))?;
        let status_service = StatusService::new(Arc::clone(&repository));

        Ok(Self {
            config,
            repository,
            import_service,
            validation_service,
            job_service,
            pending_service,
            user_service,
            status_service,
        })
    }
}

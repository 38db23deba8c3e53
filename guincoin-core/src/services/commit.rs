//! Job service - commits validated rows as a bulk import job
//!
//! Every row maps to exactly one outcome: a `bulk_import` transaction when
//! the recipient is registered, otherwise one pending balance. A row's writes
//! share a database transaction, so a failed row leaves nothing behind.

use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::adapters::duckdb::DuckDbRepository;
use crate::domain::result::Error;
use crate::domain::{
    normalize_email, BulkImportJob, BulkImportJobDetail, ColumnMapping, JobStatus, MergedRow,
    PendingImportBalance, RowIssue, Transaction,
};
use crate::services::validation::ValidationService;

/// Outcome of committing a job
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitResult {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub success_count: i64,
    pub error_count: i64,
    pub transactions_created: i64,
    pub pending_balances_created: i64,
    pub errors: Vec<RowIssue>,
}

enum RowOutcome {
    Credited,
    Pending,
}

pub struct JobService {
    repository: Arc<DuckDbRepository>,
    validator: Arc<ValidationService>,
}

impl JobService {
    pub fn new(repository: Arc<DuckDbRepository>, validator: Arc<ValidationService>) -> Self {
        Self {
            repository,
            validator,
        }
    }

    /// Create a named job from merged rows
    ///
    /// Rows are validated again here and the commit is refused unless the
    /// whole set is valid. Row-level write failures are counted, not retried.
    pub fn create_job(
        &self,
        name: &str,
        rows: &[MergedRow],
        column_mapping: Option<ColumnMapping>,
        created_by: &str,
    ) -> Result<CommitResult> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::validation("Job name is required").into());
        }

        let validation = self.validator.validate(rows)?;
        if !validation.valid {
            let detail = match validation.errors.first() {
                Some(first) => format!(": row {}: {}", first.row, first.message),
                None => String::new(),
            };
            return Err(Error::validation(format!(
                "Import is not valid ({} error(s)){}",
                validation.errors.len(),
                detail
            ))
            .into());
        }

        let mut job = BulkImportJob::new(name, created_by, rows.len() as i64);
        job.column_mapping = column_mapping;
        self.repository.read(|db| db.insert_job(&job))?;

        let mut errors = Vec::new();
        let mut transactions_created = 0;
        let mut pending_balances_created = 0;

        for (idx, row) in rows.iter().enumerate() {
            match self.commit_row(&job, row) {
                Ok(RowOutcome::Credited) => transactions_created += 1,
                Ok(RowOutcome::Pending) => pending_balances_created += 1,
                Err(e) => errors.push(RowIssue::new(idx + 1, e.to_string())),
            }
        }

        let error_count = errors.len() as i64;
        job.finish(transactions_created + pending_balances_created, error_count);
        self.repository.read(|db| db.update_job_result(&job))?;

        Ok(CommitResult {
            job_id: job.id,
            status: job.status,
            success_count: job.success_count,
            error_count,
            transactions_created,
            pending_balances_created,
            errors,
        })
    }

    fn commit_row(&self, job: &BulkImportJob, row: &MergedRow) -> Result<RowOutcome> {
        let email = normalize_email(&row.email);
        let amount = row.amount.round_dp(2);

        self.repository.transaction(|db| match db.get_user_by_email(&email)? {
            Some(user) => {
                db.insert_transaction(&Transaction::bulk_import(user.id, amount, job.id, &job.name))?;
                Ok(RowOutcome::Credited)
            }
            None => {
                db.insert_pending(&PendingImportBalance::new(job.id, &email, row.name.trim(), amount))?;
                Ok(RowOutcome::Pending)
            }
        })
    }

    /// All jobs, newest first, with their open pending counts
    pub fn list_jobs(&self) -> Result<Vec<BulkImportJob>> {
        self.repository.read(|db| db.list_jobs())
    }

    /// One job with all of its pending balances
    pub fn get_job(&self, id: Uuid) -> Result<BulkImportJobDetail> {
        self.repository.read(|db| {
            let job = db
                .get_job(id)?
                .ok_or_else(|| Error::not_found(format!("Import job {}", id)))?;
            let pending_balances = db.list_pending_for_job(id)?;
            Ok(BulkImportJobDetail {
                job,
                pending_balances,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PendingStatus, User};
    use rust_decimal::Decimal;
    use tempfile::TempDir;

    fn service(dir: &TempDir) -> (Arc<DuckDbRepository>, JobService) {
        let repo = Arc::new(DuckDbRepository::new(&dir.path().join("t.duckdb")).unwrap());
        repo.ensure_schema().unwrap();
        let validator = Arc::new(ValidationService::new(Arc::clone(&repo)).unwrap());
        (Arc::clone(&repo), JobService::new(repo, validator))
    }

    fn row(name: &str, email: &str, amount: Decimal) -> MergedRow {
        MergedRow::matched(name, email, amount, None, 1.0)
    }

    #[test]
    fn test_commit_splits_registered_and_pending() {
        let dir = TempDir::new().unwrap();
        let (repo, jobs) = service(&dir);
        let jane = User::new("jane@corp.com", "Jane");
        repo.read(|db| db.insert_user(&jane)).unwrap();

        let rows = vec![
            row("Jane", "Jane@Corp.com", Decimal::new(10050, 2)),
            row("New Hire", "new@corp.com", Decimal::new(25, 0)),
        ];
        let result = jobs.create_job("March", &rows, None, "admin@corp.com").unwrap();

        assert_eq!(result.status, JobStatus::Completed);
        assert_eq!(result.success_count, 2);
        assert_eq!(result.error_count, 0);
        assert_eq!(result.transactions_created, 1);
        assert_eq!(result.pending_balances_created, 1);

        let balance = repo.read(|db| db.get_balance(jane.id)).unwrap();
        assert_eq!(balance, Decimal::new(10050, 2));

        let detail = jobs.get_job(result.job_id).unwrap();
        assert_eq!(detail.job.created_by, "admin@corp.com");
        assert_eq!(detail.job.pending_count, 1);
        assert!(detail.job.completed_at.is_some());
        assert_eq!(detail.pending_balances.len(), 1);
        assert_eq!(detail.pending_balances[0].email, "new@corp.com");
        assert_eq!(detail.pending_balances[0].status, PendingStatus::Pending);
    }

    #[test]
    fn test_invalid_rows_block_commit() {
        let dir = TempDir::new().unwrap();
        let (repo, jobs) = service(&dir);
        let rows = vec![MergedRow::unmatched("Nobody", Decimal::new(5, 0), None)];

        let err = jobs.create_job("Broken", &rows, None, "admin").unwrap_err();
        assert!(err.to_string().contains("Missing email address"));
        assert_eq!(repo.read(|db| db.count_jobs()).unwrap(), 0);
    }

    #[test]
    fn test_job_name_required() {
        let dir = TempDir::new().unwrap();
        let (_, jobs) = service(&dir);
        let rows = vec![row("A", "a@corp.com", Decimal::ONE)];
        let err = jobs.create_job("  ", &rows, None, "admin").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::Validation(_))
        ));
    }

    #[test]
    fn test_missing_job_is_not_found() {
        let dir = TempDir::new().unwrap();
        let (_, jobs) = service(&dir);
        let err = jobs.get_job(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::NotFound(_))));
    }
}

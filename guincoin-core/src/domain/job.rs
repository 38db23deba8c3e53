//! Bulk import job domain model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::column_mapping::ColumnMapping;
use super::pending::PendingImportBalance;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Final status once every row has been processed
    pub fn from_counts(success_count: i64, error_count: i64) -> Self {
        if error_count > 0 && success_count == 0 {
            Self::Failed
        } else {
            Self::Completed
        }
    }
}

/// Persisted record of one committed import
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkImportJob {
    pub id: Uuid,
    pub name: String,
    pub created_by: String,
    pub total_rows: i64,
    pub success_count: i64,
    pub error_count: i64,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_mapping: Option<ColumnMapping>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Pending balances of this job still awaiting a claim (derived)
    #[serde(default)]
    pub pending_count: i64,
}

impl BulkImportJob {
    pub fn new(name: impl Into<String>, created_by: impl Into<String>, total_rows: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            created_by: created_by.into(),
            total_rows,
            success_count: 0,
            error_count: 0,
            status: JobStatus::Pending,
            column_mapping: None,
            created_at: Utc::now(),
            completed_at: None,
            pending_count: 0,
        }
    }

    /// Record final counts and settle the status
    pub fn finish(&mut self, success_count: i64, error_count: i64) {
        self.success_count = success_count;
        self.error_count = error_count;
        self.status = JobStatus::from_counts(success_count, error_count);
        self.completed_at = Some(Utc::now());
    }
}

/// Job plus its pending balances, for the detail view
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkImportJobDetail {
    #[serde(flatten)]
    pub job: BulkImportJob,
    pub pending_balances: Vec<PendingImportBalance>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_job_starts_pending() {
        let job = BulkImportJob::new("March balances", "admin@corp.com", 3);
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.completed_at.is_none());
    }

    #[test]
    fn test_finish_sets_status_from_counts() {
        let mut job = BulkImportJob::new("March balances", "admin@corp.com", 3);
        job.finish(2, 1);
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.completed_at.is_some());

        let mut failed = BulkImportJob::new("Broken", "admin@corp.com", 2);
        failed.finish(0, 2);
        assert_eq!(failed.status, JobStatus::Failed);

        let mut empty = BulkImportJob::new("Empty", "admin@corp.com", 0);
        empty.finish(0, 0);
        assert_eq!(empty.status, JobStatus::Completed);
    }
}

//! Status service - directory, job and balance summaries

use std::sync::Arc;

use anyhow::Result;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::adapters::duckdb::DuckDbRepository;
use crate::domain::PendingStatus;

/// Status service for overall summaries
pub struct StatusService {
    repository: Arc<DuckDbRepository>,
}

impl StatusService {
    pub fn new(repository: Arc<DuckDbRepository>) -> Self {
        Self { repository }
    }

    /// Get overall status summary
    pub fn get_status(&self) -> Result<StatusSummary> {
        self.repository.read(|db| {
            let (total_transactions, posted_amount) = db.transaction_totals()?;

            let mut pending = PendingBreakdown::default();
            for totals in db.pending_totals()? {
                let bucket = StatusBucket {
                    count: totals.count,
                    amount: totals.amount,
                };
                match totals.status {
                    PendingStatus::Pending => pending.pending = bucket,
                    PendingStatus::Claimed => pending.claimed = bucket,
                    PendingStatus::Expired => pending.expired = bucket,
                }
            }

            Ok(StatusSummary {
                total_users: db.count_users()?,
                total_jobs: db.count_jobs()?,
                total_transactions,
                posted_amount,
                outstanding_amount: pending.pending.amount,
                pending,
                outbox_size: db.count_outbox()?,
            })
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSummary {
    pub total_users: i64,
    pub total_jobs: i64,
    pub total_transactions: i64,
    pub posted_amount: Decimal,
    /// Amount still reserved for unregistered recipients
    pub outstanding_amount: Decimal,
    pub pending: PendingBreakdown,
    pub outbox_size: i64,
}

#[derive(Debug, Default, Serialize)]
pub struct PendingBreakdown {
    pub pending: StatusBucket,
    pub claimed: StatusBucket,
    pub expired: StatusBucket,
}

#[derive(Debug, Default, Serialize)]
pub struct StatusBucket {
    pub count: i64,
    pub amount: Decimal,
}

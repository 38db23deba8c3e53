//! Transaction domain model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where a posted credit came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Credited directly at commit time to an already registered user
    BulkImport,
    /// Credited when a new user claimed a pending import balance
    PendingClaim,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BulkImport => "bulk_import",
            Self::PendingClaim => "pending_claim",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "bulk_import" => Some(Self::BulkImport),
            "pending_claim" => Some(Self::PendingClaim),
            _ => None,
        }
    }
}

/// A posted Guincoin credit. A user's balance is the sum of these.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub kind: TransactionKind,
    pub description: String,
    /// Import job that produced the credit, if any
    pub job_id: Option<Uuid>,
    /// Pending balance this credit settled (claims only)
    pub pending_balance_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Credit posted immediately by a bulk import job
    pub fn bulk_import(user_id: Uuid, amount: Decimal, job_id: Uuid, job_name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            amount,
            kind: TransactionKind::BulkImport,
            description: format!("Bulk import: {}", job_name),
            job_id: Some(job_id),
            pending_balance_id: None,
            created_at: Utc::now(),
        }
    }

    /// Credit posted when a pending balance is claimed
    pub fn pending_claim(user_id: Uuid, amount: Decimal, job_id: Uuid, pending_balance_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            amount,
            kind: TransactionKind::PendingClaim,
            description: "Claimed pending import balance".to_string(),
            job_id: Some(job_id),
            pending_balance_id: Some(pending_balance_id),
            created_at: Utc::now(),
        }
    }
}

//! Pending import balance domain model
//!
//! A pending balance is a credit reserved for someone who was in an import
//! file but has no account yet. It moves `pending -> claimed` when a user
//! registers with the stored email, or `pending -> expired` when an admin
//! gives up on it. Both transitions are final.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::result::{Error, Result};
use super::user::normalize_email;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PendingStatus {
    Pending,
    Claimed,
    Expired,
}

impl PendingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Claimed => "claimed",
            Self::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "claimed" => Some(Self::Claimed),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingImportBalance {
    pub id: Uuid,
    pub job_id: Uuid,
    pub email: String,
    pub name: String,
    pub amount: Decimal,
    pub status: PendingStatus,
    pub invite_sent_at: Option<DateTime<Utc>>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub claimed_by_user_id: Option<Uuid>,
    pub expired_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl PendingImportBalance {
    pub fn new(job_id: Uuid, email: &str, name: impl Into<String>, amount: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_id,
            email: normalize_email(email),
            name: name.into(),
            amount,
            status: PendingStatus::Pending,
            invite_sent_at: None,
            claimed_at: None,
            claimed_by_user_id: None,
            expired_at: None,
            created_at: Utc::now(),
        }
    }

    /// Invitations are only offered while the balance is unclaimed and live
    pub fn can_send_invitation(&self) -> bool {
        self.status == PendingStatus::Pending
    }

    pub fn mark_invited(&mut self) -> Result<()> {
        self.ensure_pending("send an invitation for")?;
        self.invite_sent_at = Some(Utc::now());
        Ok(())
    }

    pub fn claim(&mut self, user_id: Uuid) -> Result<()> {
        self.ensure_pending("claim")?;
        self.status = PendingStatus::Claimed;
        self.claimed_at = Some(Utc::now());
        self.claimed_by_user_id = Some(user_id);
        Ok(())
    }

    pub fn expire(&mut self) -> Result<()> {
        self.ensure_pending("expire")?;
        self.status = PendingStatus::Expired;
        self.expired_at = Some(Utc::now());
        Ok(())
    }

    /// Token embedded in invitation claim links
    ///
    /// First 16 hex chars of SHA-256 over `id|email`.
    pub fn claim_token(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!("{}|{}", self.id, self.email).as_bytes());
        let digest = hasher.finalize();
        hex::encode(&digest[..8])
    }

    fn ensure_pending(&self, action: &str) -> Result<()> {
        if self.status != PendingStatus::Pending {
            return Err(Error::validation(format!(
                "Cannot {} a pending balance that is already {}",
                action,
                self.status.as_str()
            )));
        }
        Ok(())
    }
}

//! Pending balance service - invitations and expiry
//!
//! Every send is a single attempt through the mailer port. Failures go back
//! to the caller; the admin resends by hand.

use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::adapters::duckdb::DuckDbRepository;
use crate::config::Config;
use crate::domain::result::Error;
use crate::domain::{PendingImportBalance, PendingStatus};
use crate::ports::{Invitation, InvitationMailer};

/// A pending balance an invitation could not be sent for
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvitationFailure {
    pub pending_balance_id: Uuid,
    pub message: String,
}

/// Outcome of sending invitations for a whole job
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvitationBatchResult {
    pub sent: usize,
    pub failed: usize,
    /// Balances already claimed or expired
    pub skipped: usize,
    pub errors: Vec<InvitationFailure>,
}

pub struct PendingService {
    repository: Arc<DuckDbRepository>,
    mailer: Arc<dyn InvitationMailer>,
    config: Config,
}

impl PendingService {
    pub fn new(
        repository: Arc<DuckDbRepository>,
        mailer: Arc<dyn InvitationMailer>,
        config: Config,
    ) -> Self {
        Self {
            repository,
            mailer,
            config,
        }
    }

    pub fn mailer_name(&self) -> &str {
        self.mailer.name()
    }

    pub fn list(&self, status: Option<PendingStatus>) -> Result<Vec<PendingImportBalance>> {
        self.repository.read(|db| db.list_pending(status))
    }

    pub fn get(&self, id: Uuid) -> Result<PendingImportBalance> {
        self.repository
            .read(|db| db.get_pending(id))?
            .ok_or_else(|| Error::not_found(format!("Pending balance {}", id)).into())
    }

    /// Send (or resend) the claim invitation for one pending balance
    ///
    /// Rejected unless the balance is still `pending`.
    pub fn send_invitation(&self, id: Uuid) -> Result<PendingImportBalance> {
        let mut pending = self.get(id)?;
        if !pending.can_send_invitation() {
            return Err(Error::validation(format!(
                "Cannot send an invitation for a pending balance that is already {}",
                pending.status.as_str()
            ))
            .into());
        }

        let job_name = self
            .repository
            .read(|db| db.get_job(pending.job_id))?
            .map(|job| job.name)
            .unwrap_or_default();

        self.deliver(&pending, &job_name)?;

        pending = self.record_invitation(id)?;
        Ok(pending)
    }

    /// Stamp `invite_sent_at` on the stored row, unless it was closed while sending
    fn record_invitation(&self, id: Uuid) -> Result<PendingImportBalance> {
        self.repository.transaction(|db| {
            let mut current = db
                .get_pending(id)?
                .ok_or_else(|| Error::not_found(format!("Pending balance {}", id)))?;
            if current.can_send_invitation() {
                current.mark_invited()?;
                db.update_pending(&current)?;
            }
            Ok(current)
        })
    }

    /// One attempt per still-pending balance of a job
    pub fn send_job_invitations(&self, job_id: Uuid) -> Result<InvitationBatchResult> {
        let (job, balances) = self.repository.read(|db| {
            let job = db
                .get_job(job_id)?
                .ok_or_else(|| Error::not_found(format!("Import job {}", job_id)))?;
            Ok((job, db.list_pending_for_job(job_id)?))
        })?;

        let mut result = InvitationBatchResult::default();
        for pending in balances {
            if !pending.can_send_invitation() {
                result.skipped += 1;
                continue;
            }

            let attempt = self
                .deliver(&pending, &job.name)
                .and_then(|_| self.record_invitation(pending.id));
            match attempt {
                Ok(_) => result.sent += 1,
                Err(e) => {
                    result.failed += 1;
                    result.errors.push(InvitationFailure {
                        pending_balance_id: pending.id,
                        message: e.to_string(),
                    });
                }
            }
        }
        Ok(result)
    }

    /// Give up on a pending balance; it can never be claimed afterwards
    pub fn expire(&self, id: Uuid) -> Result<PendingImportBalance> {
        self.repository.transaction(|db| {
            let mut pending = db
                .get_pending(id)?
                .ok_or_else(|| Error::not_found(format!("Pending balance {}", id)))?;
            pending.expire()?;
            db.update_pending(&pending)?;
            Ok(pending)
        })
    }

    /// The payload handed to the mailer for a pending balance
    pub fn invitation_for(&self, pending: &PendingImportBalance, job_name: &str) -> Invitation {
        Invitation {
            pending_balance_id: pending.id,
            to_email: pending.email.clone(),
            to_name: pending.name.clone(),
            amount: pending.amount,
            job_name: job_name.to_string(),
            claim_url: self.config.claim_url(&pending.claim_token()),
        }
    }

    fn deliver(&self, pending: &PendingImportBalance, job_name: &str) -> Result<()> {
        let invitation = self.invitation_for(pending, job_name);
        self.mailer.send_invitation(&invitation)?;
        Ok(())
    }
}

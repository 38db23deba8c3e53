//! Invitation mailer port
//!
//! Defines how a claim invitation leaves the system. Implementations live in
//! `adapters::mailer`; tests substitute a recording mailer.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::result::Result;

/// Everything a mail template needs to invite someone to claim a balance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invitation {
    pub pending_balance_id: Uuid,
    pub to_email: String,
    pub to_name: String,
    pub amount: Decimal,
    pub job_name: String,
    pub claim_url: String,
}

/// Invitation delivery trait
///
/// One call is one delivery attempt. Implementations must not retry; the
/// admin resends by hand if a send fails.
pub trait InvitationMailer: Send + Sync {
    /// Mailer name (e.g., "http", "outbox")
    fn name(&self) -> &str;

    /// Deliver a single invitation
    fn send_invitation(&self, invitation: &Invitation) -> Result<()>;
}

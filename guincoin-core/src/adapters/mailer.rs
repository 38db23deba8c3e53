//! Invitation mailer adapters
//!
//! - `HttpMailer` posts the invitation JSON to a mail relay
//! - `OutboxMailer` records it in `sys_invitation_outbox` when no relay is set up

use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::Client;
use url::Url;

use crate::adapters::duckdb::DuckDbRepository;
use crate::domain::result::{Error, Result};
use crate::ports::{Invitation, InvitationMailer};

const RELAY_TIMEOUT_SECS: u64 = 30;

/// Mail relay client
#[derive(Debug)]
pub struct HttpMailer {
    client: Client,
    relay_url: Url,
    token: Option<String>,
}

impl HttpMailer {
    pub fn new(relay_url: &str, token: Option<&str>) -> Result<Self> {
        let relay_url = Url::parse(relay_url)
            .map_err(|e| Error::Config(format!("Invalid mail relay URL '{}': {}", relay_url, e)))?;
        if relay_url.scheme() != "https" && relay_url.scheme() != "http" {
            return Err(Error::Config(
                "Mail relay URL must use http or https".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(RELAY_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::mail(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            relay_url,
            token: token.filter(|t| !t.is_empty()).map(|t| t.to_string()),
        })
    }

    fn map_request_error(&self, error: reqwest::Error) -> Error {
        if error.is_timeout() {
            Error::mail(format!(
                "Mail relay timed out after {} seconds",
                RELAY_TIMEOUT_SECS
            ))
        } else if error.is_connect() {
            Error::mail(format!(
                "Unable to connect to mail relay at {}",
                self.relay_url
            ))
        } else {
            Error::mail(format!("Mail relay request failed: {}", error))
        }
    }

    fn check_response_status(&self, response: &reqwest::blocking::Response) -> Result<()> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        match status.as_u16() {
            401 | 403 => Err(Error::mail(
                "Mail relay rejected the credentials; check invitations.relayToken",
            )),
            code => Err(Error::mail(format!("Mail relay error: HTTP {}", code))),
        }
    }
}

impl InvitationMailer for HttpMailer {
    fn name(&self) -> &str {
        "http"
    }

    fn send_invitation(&self, invitation: &Invitation) -> Result<()> {
        let mut request = self.client.post(self.relay_url.clone()).json(invitation);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().map_err(|e| self.map_request_error(e))?;
        self.check_response_status(&response)
    }
}

/// Stores invitations in the database for later pickup
pub struct OutboxMailer {
    repository: Arc<DuckDbRepository>,
}

impl OutboxMailer {
    pub fn new(repository: Arc<DuckDbRepository>) -> Self {
        Self { repository }
    }
}

impl InvitationMailer for OutboxMailer {
    fn name(&self) -> &str {
        "outbox"
    }

    fn send_invitation(&self, invitation: &Invitation) -> Result<()> {
        let payload = serde_json::to_string(invitation)?;
        self.repository
            .read(|db| {
                db.insert_outbox(
                    invitation.pending_balance_id,
                    &invitation.to_email,
                    &payload,
                )
            })
            .map_err(|e| Error::mail(format!("Failed to queue invitation: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn invitation() -> Invitation {
        Invitation {
            pending_balance_id: Uuid::new_v4(),
            to_email: "new.hire@corp.com".to_string(),
            to_name: "New Hire".to_string(),
            amount: Decimal::new(7500, 2),
            job_name: "March balances".to_string(),
            claim_url: "https://guincoin.local/claim?token=abc".to_string(),
        }
    }

    #[test]
    fn test_http_mailer_rejects_bad_urls() {
        assert!(HttpMailer::new("not a url", None).is_err());
        assert!(HttpMailer::new("ftp://relay.corp.com", None).is_err());
        assert!(HttpMailer::new("https://relay.corp.com/send", Some("t0k")).is_ok());
    }

    #[test]
    fn test_http_mailer_reports_connection_failure() {
        let mailer = HttpMailer::new("http://127.0.0.1:1/send", None).unwrap();
        let err = mailer.send_invitation(&invitation()).unwrap_err();
        assert!(matches!(err, Error::Mail(_)));
    }

    #[test]
    fn test_outbox_mailer_records_payload() {
        let dir = TempDir::new().unwrap();
        let repo = Arc::new(DuckDbRepository::new(&dir.path().join("t.duckdb")).unwrap());
        repo.ensure_schema().unwrap();

        let mailer = OutboxMailer::new(Arc::clone(&repo));
        let inv = invitation();
        mailer.send_invitation(&inv).unwrap();

        let payloads = repo.read(|db| db.outbox_for_pending(inv.pending_balance_id)).unwrap();
        assert_eq!(payloads.len(), 1);
        let stored: Invitation = serde_json::from_str(&payloads[0]).unwrap();
        assert_eq!(stored, inv);
        assert_eq!(mailer.name(), "outbox");
    }
}

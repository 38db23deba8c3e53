//! User service - directory entries and claim-on-registration

use std::sync::Arc;

use anyhow::Result;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::adapters::duckdb::DuckDbRepository;
use crate::domain::result::Error;
use crate::domain::{normalize_email, PendingImportBalance, Transaction, User};
use crate::services::validation::EmailFormat;

/// A new user plus whatever pending balances were waiting for them
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub user: User,
    pub claimed: Vec<PendingImportBalance>,
    pub claimed_amount: Decimal,
}

pub struct UserService {
    repository: Arc<DuckDbRepository>,
    email_format: EmailFormat,
}

impl UserService {
    pub fn new(repository: Arc<DuckDbRepository>) -> Result<Self> {
        Ok(Self {
            repository,
            email_format: EmailFormat::new()?,
        })
    }

    /// Register a user and claim their open pending balances
    ///
    /// Each claimed balance posts one `pending_claim` transaction. The user
    /// and all claims are written in one database transaction.
    pub fn register_user(&self, email: &str, name: &str) -> Result<Registration> {
        let email = normalize_email(email);
        if !self.email_format.is_valid(&email) {
            return Err(Error::validation(format!("Invalid email address: {}", email)).into());
        }
        let user = User::new(&email, name);

        self.repository.transaction(|db| {
            if db.get_user_by_email(&user.email)?.is_some() {
                return Err(Error::validation(format!("User {} is already registered", user.email)).into());
            }
            db.insert_user(&user)?;

            let mut claimed = Vec::new();
            let mut claimed_amount = Decimal::ZERO;
            for mut pending in db.find_open_pending_by_email(&user.email)? {
                pending.claim(user.id)?;
                db.update_pending(&pending)?;
                db.insert_transaction(&Transaction::pending_claim(
                    user.id,
                    pending.amount,
                    pending.job_id,
                    pending.id,
                ))?;
                claimed_amount += pending.amount;
                claimed.push(pending);
            }

            Ok(Registration {
                user: user.clone(),
                claimed,
                claimed_amount,
            })
        })
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        self.repository.read(|db| db.list_users())
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let email = normalize_email(email);
        self.repository.read(|db| db.get_user_by_email(&email))
    }

    pub fn get_balance(&self, user_id: Uuid) -> Result<Decimal> {
        self.repository.read(|db| {
            if db.get_user(user_id)?.is_none() {
                return Err(Error::not_found(format!("User {}", user_id)).into());
            }
            db.get_balance(user_id)
        })
    }

    pub fn get_transactions(&self, user_id: Uuid) -> Result<Vec<Transaction>> {
        self.repository.read(|db| db.get_transactions_for_user(user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BulkImportJob, PendingStatus, TransactionKind};
    use tempfile::TempDir;

    fn service(dir: &TempDir) -> (Arc<DuckDbRepository>, UserService) {
        let repo = Arc::new(DuckDbRepository::new(&dir.path().join("t.duckdb")).unwrap());
        repo.ensure_schema().unwrap();
        (Arc::clone(&repo), UserService::new(repo).unwrap())
    }

    #[test]
    fn test_register_claims_open_balances_only() {
        let dir = TempDir::new().unwrap();
        let (repo, users) = service(&dir);
        let job = BulkImportJob::new("March", "admin", 2);
        let open = PendingImportBalance::new(job.id, "new@corp.com", "New", Decimal::new(30, 0));
        let mut expired = PendingImportBalance::new(job.id, "new@corp.com", "New", Decimal::new(99, 0));
        expired.expire().unwrap();
        repo.transaction(|db| {
            db.insert_job(&job)?;
            db.insert_pending(&open)?;
            db.insert_pending(&expired)
        })
        .unwrap();

        let reg = users.register_user(" New@Corp.com ", "New Hire").unwrap();
        assert_eq!(reg.user.email, "new@corp.com");
        assert_eq!(reg.claimed.len(), 1);
        assert_eq!(reg.claimed_amount, Decimal::new(30, 0));

        let stored = repo.read(|db| db.get_pending(open.id)).unwrap().unwrap();
        assert_eq!(stored.status, PendingStatus::Claimed);
        assert_eq!(stored.claimed_by_user_id, Some(reg.user.id));

        let txs = users.get_transactions(reg.user.id).unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].kind, TransactionKind::PendingClaim);
        assert_eq!(txs[0].pending_balance_id, Some(open.id));
        assert_eq!(users.get_balance(reg.user.id).unwrap(), Decimal::new(30, 0));
    }

    #[test]
    fn test_duplicate_and_invalid_registration() {
        let dir = TempDir::new().unwrap();
        let (_, users) = service(&dir);
        users.register_user("a@corp.com", "A").unwrap();
        assert!(users.register_user("A@CORP.COM", "A again").is_err());
        assert!(users.register_user("not-an-email", "X").is_err());
        assert_eq!(users.list_users().unwrap().len(), 1);
        assert!(users.get_user_by_email("A@corp.com").unwrap().is_some());
    }

    #[test]
    fn test_balance_of_unknown_user() {
        let dir = TempDir::new().unwrap();
        let (_, users) = service(&dir);
        assert!(users.get_balance(Uuid::new_v4()).is_err());
    }
}

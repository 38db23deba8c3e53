//! DuckDB repository implementation
//!
//! One connection guarded by a mutex. Reads and writes go through [`Store`],
//! which borrows the locked connection; [`DuckDbRepository::transaction`]
//! wraps a closure in BEGIN/COMMIT so multi-row writes land atomically.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use duckdb::types::Type;
use duckdb::{params, Connection, Row};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::{
    BulkImportJob, ColumnMapping, JobStatus, PendingImportBalance, PendingStatus, Transaction,
    TransactionKind, User,
};
use crate::services::{MigrationResult, MigrationService};

/// Maximum number of retries when database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400, 800ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

/// Check if an error message indicates a file locking issue that should be retried
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    // Windows error messages
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        // Unix/macOS error messages
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("file is already open")
}

/// DuckDB repository implementation
pub struct DuckDbRepository {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl DuckDbRepository {
    /// Open (or create) the database file
    ///
    /// Retries with exponential backoff on file locking errors, which show up
    /// when the CLI and the server touch the same data directory at once.
    pub fn new(db_path: &Path) -> Result<Self> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            match Self::try_open_connection(db_path) {
                Ok(conn) => {
                    return Ok(Self {
                        conn: Mutex::new(conn),
                        db_path: db_path.to_path_buf(),
                    });
                }
                Err(e) => {
                    let err_msg = e.to_string();
                    if is_retryable_error(&err_msg) && attempt < MAX_RETRIES - 1 {
                        let delay =
                            Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                        eprintln!(
                            "[guincoin] Database busy, retrying in {}ms (attempt {}/{}): {}",
                            delay.as_millis(),
                            attempt + 1,
                            MAX_RETRIES,
                            err_msg
                        );
                        thread::sleep(delay);
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| anyhow!("Failed to open database after {} retries", MAX_RETRIES)))
    }

    fn try_open_connection(db_path: &Path) -> Result<Connection> {
        // Extension autoloading stays off; JSON is linked in through the cargo feature
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        Ok(Connection::open_with_flags(db_path, config)?)
    }

    /// Run database migrations using the MigrationService
    pub fn run_migrations(&self) -> Result<MigrationResult> {
        let conn = self.lock()?;
        MigrationService::new(&conn).run_pending()
    }

    /// Ensure database schema exists (runs pending migrations)
    pub fn ensure_schema(&self) -> Result<()> {
        self.run_migrations()?;
        Ok(())
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| anyhow!("Database lock poisoned: {}", e))
    }

    /// Run `f` against the connection outside any explicit transaction
    pub fn read<T>(&self, f: impl FnOnce(&Store<'_>) -> Result<T>) -> Result<T> {
        let conn = self.lock()?;
        f(&Store { conn: &conn })
    }

    /// Run `f` inside BEGIN/COMMIT; any error rolls everything back
    pub fn transaction<T>(&self, f: impl FnOnce(&Store<'_>) -> Result<T>) -> Result<T> {
        let conn = self.lock()?;
        conn.execute_batch("BEGIN TRANSACTION")?;
        match f(&Store { conn: &conn }) {
            Ok(value) => {
                conn.execute_batch("COMMIT")?;
                Ok(value)
            }
            Err(e) => {
                let _ = conn.execute_batch("ROLLBACK");
                Err(e)
            }
        }
    }
}

/// Aggregate of pending balances in one status
#[derive(Debug, Clone, PartialEq)]
pub struct PendingTotals {
    pub status: PendingStatus,
    pub count: i64,
    pub amount: Decimal,
}

/// Query surface over a borrowed connection
pub struct Store<'a> {
    conn: &'a Connection,
}

const USER_COLUMNS: &str = "user_id, email, name, created_at";

const TRANSACTION_COLUMNS: &str = "transaction_id, user_id, CAST(amount AS VARCHAR), kind, \
     description, job_id, pending_balance_id, created_at";

const JOB_COLUMNS: &str = "j.job_id, j.name, j.created_by, j.total_rows, j.success_count, \
     j.error_count, j.status, j.column_mapping, j.created_at, j.completed_at, \
     (SELECT COUNT(*) FROM sys_pending_import_balances p \
      WHERE p.job_id = j.job_id AND p.status = 'pending') AS pending_count";

const PENDING_COLUMNS: &str = "pending_balance_id, job_id, email, name, CAST(amount AS VARCHAR), \
     status, invite_sent_at, claimed_at, claimed_by_user_id, expired_at, created_at";

impl Store<'_> {
    // === Users ===

    pub fn insert_user(&self, user: &User) -> Result<()> {
        self.conn.execute(
            "INSERT INTO sys_users (user_id, email, name, created_at) VALUES (?, ?, ?, ?)",
            params![
                user.id.to_string(),
                user.email,
                user.name,
                format_timestamp(&user.created_at),
            ],
        )?;
        Ok(())
    }

    /// Lookup by already-normalized email
    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM sys_users WHERE email = ?", USER_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query_map([email], row_to_user)?;
        Ok(rows.next().transpose()?)
    }

    pub fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM sys_users WHERE user_id = ?", USER_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query_map([id.to_string()], row_to_user)?;
        Ok(rows.next().transpose()?)
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        let sql = format!("SELECT {} FROM sys_users ORDER BY email", USER_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let users = stmt
            .query_map([], row_to_user)?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(users)
    }

    pub fn count_users(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM sys_users", [], |row| row.get(0))?)
    }

    // === Transactions ===

    pub fn insert_transaction(&self, tx: &Transaction) -> Result<()> {
        self.conn.execute(
            "INSERT INTO sys_transactions (transaction_id, user_id, amount, kind, description,
                                           job_id, pending_balance_id, created_at)
             VALUES (?, ?, CAST(? AS DECIMAL(18, 2)), ?, ?, ?, ?, ?)",
            params![
                tx.id.to_string(),
                tx.user_id.to_string(),
                tx.amount.to_string(),
                tx.kind.as_str(),
                tx.description,
                tx.job_id.map(|id| id.to_string()),
                tx.pending_balance_id.map(|id| id.to_string()),
                format_timestamp(&tx.created_at),
            ],
        )?;
        Ok(())
    }

    pub fn get_transactions_for_user(&self, user_id: Uuid) -> Result<Vec<Transaction>> {
        let sql = format!(
            "SELECT {} FROM sys_transactions WHERE user_id = ? ORDER BY created_at",
            TRANSACTION_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let txs = stmt
            .query_map([user_id.to_string()], row_to_transaction)?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(txs)
    }

    pub fn get_transactions_for_job(&self, job_id: Uuid) -> Result<Vec<Transaction>> {
        let sql = format!(
            "SELECT {} FROM sys_transactions WHERE job_id = ? ORDER BY created_at",
            TRANSACTION_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let txs = stmt
            .query_map([job_id.to_string()], row_to_transaction)?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(txs)
    }

    /// Sum of a user's posted credits
    pub fn get_balance(&self, user_id: Uuid) -> Result<Decimal> {
        let total: String = self.conn.query_row(
            "SELECT CAST(COALESCE(SUM(amount), 0) AS VARCHAR) FROM sys_transactions WHERE user_id = ?",
            [user_id.to_string()],
            |row| row.get(0),
        )?;
        parse_decimal_str(&total)
    }

    /// Number of transactions and their total amount
    pub fn transaction_totals(&self) -> Result<(i64, Decimal)> {
        let (count, total): (i64, String) = self.conn.query_row(
            "SELECT COUNT(*), CAST(COALESCE(SUM(amount), 0) AS VARCHAR) FROM sys_transactions",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok((count, parse_decimal_str(&total)?))
    }

    // === Bulk import jobs ===

    pub fn insert_job(&self, job: &BulkImportJob) -> Result<()> {
        let mapping = job
            .column_mapping
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        self.conn.execute(
            "INSERT INTO sys_bulk_import_jobs (job_id, name, created_by, total_rows, success_count,
                                               error_count, status, column_mapping, created_at, completed_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                job.id.to_string(),
                job.name,
                job.created_by,
                job.total_rows,
                job.success_count,
                job.error_count,
                job.status.as_str(),
                mapping,
                format_timestamp(&job.created_at),
                job.completed_at.as_ref().map(format_timestamp),
            ],
        )?;
        Ok(())
    }

    /// Persist the final counts, status and completion time
    pub fn update_job_result(&self, job: &BulkImportJob) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE sys_bulk_import_jobs
             SET success_count = ?, error_count = ?, status = ?, completed_at = ?
             WHERE job_id = ?",
            params![
                job.success_count,
                job.error_count,
                job.status.as_str(),
                job.completed_at.as_ref().map(format_timestamp),
                job.id.to_string(),
            ],
        )?;
        if updated == 0 {
            return Err(crate::Error::not_found(format!("Import job {}", job.id)).into());
        }
        Ok(())
    }

    pub fn get_job(&self, id: Uuid) -> Result<Option<BulkImportJob>> {
        let sql = format!(
            "SELECT {} FROM sys_bulk_import_jobs j WHERE j.job_id = ?",
            JOB_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query_map([id.to_string()], row_to_job)?;
        Ok(rows.next().transpose()?)
    }

    /// All jobs, newest first
    pub fn list_jobs(&self) -> Result<Vec<BulkImportJob>> {
        let sql = format!(
            "SELECT {} FROM sys_bulk_import_jobs j ORDER BY j.created_at DESC, j.job_id",
            JOB_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let jobs = stmt
            .query_map([], row_to_job)?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(jobs)
    }

    pub fn count_jobs(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM sys_bulk_import_jobs", [], |row| row.get(0))?)
    }

    // === Pending import balances ===

    pub fn insert_pending(&self, pending: &PendingImportBalance) -> Result<()> {
        self.conn.execute(
            "INSERT INTO sys_pending_import_balances (pending_balance_id, job_id, email, name, amount,
                                                      status, invite_sent_at, claimed_at,
                                                      claimed_by_user_id, expired_at, created_at)
             VALUES (?, ?, ?, ?, CAST(? AS DECIMAL(18, 2)), ?, ?, ?, ?, ?, ?)",
            params![
                pending.id.to_string(),
                pending.job_id.to_string(),
                pending.email,
                pending.name,
                pending.amount.to_string(),
                pending.status.as_str(),
                pending.invite_sent_at.as_ref().map(format_timestamp),
                pending.claimed_at.as_ref().map(format_timestamp),
                pending.claimed_by_user_id.map(|id| id.to_string()),
                pending.expired_at.as_ref().map(format_timestamp),
                format_timestamp(&pending.created_at),
            ],
        )?;
        Ok(())
    }

    /// Write back the lifecycle fields of a pending balance
    pub fn update_pending(&self, pending: &PendingImportBalance) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE sys_pending_import_balances
             SET status = ?, invite_sent_at = ?, claimed_at = ?, claimed_by_user_id = ?, expired_at = ?
             WHERE pending_balance_id = ?",
            params![
                pending.status.as_str(),
                pending.invite_sent_at.as_ref().map(format_timestamp),
                pending.claimed_at.as_ref().map(format_timestamp),
                pending.claimed_by_user_id.map(|id| id.to_string()),
                pending.expired_at.as_ref().map(format_timestamp),
                pending.id.to_string(),
            ],
        )?;
        if updated == 0 {
            return Err(crate::Error::not_found(format!("Pending balance {}", pending.id)).into());
        }
        Ok(())
    }

    pub fn get_pending(&self, id: Uuid) -> Result<Option<PendingImportBalance>> {
        let sql = format!(
            "SELECT {} FROM sys_pending_import_balances WHERE pending_balance_id = ?",
            PENDING_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query_map([id.to_string()], row_to_pending)?;
        Ok(rows.next().transpose()?)
    }

    pub fn list_pending_for_job(&self, job_id: Uuid) -> Result<Vec<PendingImportBalance>> {
        let sql = format!(
            "SELECT {} FROM sys_pending_import_balances WHERE job_id = ? ORDER BY created_at, email",
            PENDING_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([job_id.to_string()], row_to_pending)?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Pending balances across all jobs, optionally narrowed to one status
    pub fn list_pending(&self, status: Option<PendingStatus>) -> Result<Vec<PendingImportBalance>> {
        let rows = match status {
            Some(status) => {
                let sql = format!(
                    "SELECT {} FROM sys_pending_import_balances WHERE status = ?
                     ORDER BY created_at DESC, email",
                    PENDING_COLUMNS
                );
                let mut stmt = self.conn.prepare(&sql)?;
                let rows = stmt
                    .query_map([status.as_str()], row_to_pending)?
                    .collect::<duckdb::Result<Vec<_>>>()?;
                rows
            }
            None => {
                let sql = format!(
                    "SELECT {} FROM sys_pending_import_balances ORDER BY created_at DESC, email",
                    PENDING_COLUMNS
                );
                let mut stmt = self.conn.prepare(&sql)?;
                let rows = stmt
                    .query_map([], row_to_pending)?
                    .collect::<duckdb::Result<Vec<_>>>()?;
                rows
            }
        };
        Ok(rows)
    }

    /// Unclaimed, unexpired balances waiting on an email address
    pub fn find_open_pending_by_email(&self, email: &str) -> Result<Vec<PendingImportBalance>> {
        let sql = format!(
            "SELECT {} FROM sys_pending_import_balances
             WHERE email = ? AND status = 'pending'
             ORDER BY created_at",
            PENDING_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([email], row_to_pending)?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Count and sum per status; statuses with no rows are omitted
    pub fn pending_totals(&self) -> Result<Vec<PendingTotals>> {
        let mut stmt = self.conn.prepare(
            "SELECT status, COUNT(*), CAST(COALESCE(SUM(amount), 0) AS VARCHAR)
             FROM sys_pending_import_balances
             GROUP BY status
             ORDER BY status",
        )?;
        let raw = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<duckdb::Result<Vec<_>>>()?;

        raw.into_iter()
            .map(|(status, count, amount)| {
                let status = PendingStatus::parse(&status)
                    .ok_or_else(|| anyhow!("Unknown pending status '{}'", status))?;
                Ok(PendingTotals {
                    status,
                    count,
                    amount: parse_decimal_str(&amount)?,
                })
            })
            .collect()
    }

    // === Invitation outbox ===

    pub fn insert_outbox(&self, pending_balance_id: Uuid, to_email: &str, payload: &str) -> Result<Uuid> {
        let id = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO sys_invitation_outbox (outbox_id, pending_balance_id, to_email, payload, created_at)
             VALUES (?, ?, ?, ?, ?)",
            params![
                id.to_string(),
                pending_balance_id.to_string(),
                to_email,
                payload,
                format_timestamp(&Utc::now()),
            ],
        )?;
        Ok(id)
    }

    /// Outbox payloads for one pending balance, oldest first
    pub fn outbox_for_pending(&self, pending_balance_id: Uuid) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT payload FROM sys_invitation_outbox WHERE pending_balance_id = ? ORDER BY created_at",
        )?;
        let payloads = stmt
            .query_map([pending_balance_id.to_string()], |row| row.get::<_, String>(0))?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(payloads)
    }

    pub fn count_outbox(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM sys_invitation_outbox", [], |row| row.get(0))?)
    }
}

// === Row mapping ===

fn row_to_user(row: &Row) -> duckdb::Result<User> {
    Ok(User {
        id: uuid_at(row, 0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        created_at: timestamp_at(row, 3)?,
    })
}

fn row_to_transaction(row: &Row) -> duckdb::Result<Transaction> {
    let kind: String = row.get(3)?;
    Ok(Transaction {
        id: uuid_at(row, 0)?,
        user_id: uuid_at(row, 1)?,
        amount: decimal_at(row, 2)?,
        kind: TransactionKind::parse(&kind).ok_or_else(|| unknown_value(3, "transaction kind", &kind))?,
        description: row.get(4)?,
        job_id: optional_uuid_at(row, 5)?,
        pending_balance_id: optional_uuid_at(row, 6)?,
        created_at: timestamp_at(row, 7)?,
    })
}

fn row_to_job(row: &Row) -> duckdb::Result<BulkImportJob> {
    let status: String = row.get(6)?;
    let mapping: Option<String> = row.get(7)?;
    let column_mapping = mapping
        .map(|m| serde_json::from_str::<ColumnMapping>(&m))
        .transpose()
        .map_err(|e| duckdb::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e)))?;

    Ok(BulkImportJob {
        id: uuid_at(row, 0)?,
        name: row.get(1)?,
        created_by: row.get(2)?,
        total_rows: row.get(3)?,
        success_count: row.get(4)?,
        error_count: row.get(5)?,
        status: JobStatus::parse(&status).ok_or_else(|| unknown_value(6, "job status", &status))?,
        column_mapping,
        created_at: timestamp_at(row, 8)?,
        completed_at: optional_timestamp_at(row, 9)?,
        pending_count: row.get(10)?,
    })
}

fn row_to_pending(row: &Row) -> duckdb::Result<PendingImportBalance> {
    let status: String = row.get(5)?;
    Ok(PendingImportBalance {
        id: uuid_at(row, 0)?,
        job_id: uuid_at(row, 1)?,
        email: row.get(2)?,
        name: row.get(3)?,
        amount: decimal_at(row, 4)?,
        status: PendingStatus::parse(&status)
            .ok_or_else(|| unknown_value(5, "pending status", &status))?,
        invite_sent_at: optional_timestamp_at(row, 6)?,
        claimed_at: optional_timestamp_at(row, 7)?,
        claimed_by_user_id: optional_uuid_at(row, 8)?,
        expired_at: optional_timestamp_at(row, 9)?,
        created_at: timestamp_at(row, 10)?,
    })
}

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> duckdb::Error {
    duckdb::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn unknown_value(idx: usize, what: &str, value: &str) -> duckdb::Error {
    conversion_error(
        idx,
        crate::Error::database(format!("Unknown {} '{}'", what, value)),
    )
}

fn uuid_at(row: &Row, idx: usize) -> duckdb::Result<Uuid> {
    let s: String = row.get(idx)?;
    Uuid::parse_str(&s).map_err(|e| conversion_error(idx, e))
}

fn optional_uuid_at(row: &Row, idx: usize) -> duckdb::Result<Option<Uuid>> {
    let s: Option<String> = row.get(idx)?;
    s.map(|s| Uuid::parse_str(&s).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

fn decimal_at(row: &Row, idx: usize) -> duckdb::Result<Decimal> {
    let s: String = row.get(idx)?;
    Decimal::from_str(s.trim()).map_err(|e| conversion_error(idx, e))
}

fn timestamp_at(row: &Row, idx: usize) -> duckdb::Result<DateTime<Utc>> {
    let s: String = row.get(idx)?;
    parse_timestamp(&s).map_err(|e| conversion_error(idx, e))
}

fn optional_timestamp_at(row: &Row, idx: usize) -> duckdb::Result<Option<DateTime<Utc>>> {
    let s: Option<String> = row.get(idx)?;
    s.map(|s| parse_timestamp(&s).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

fn parse_timestamp(s: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}

fn parse_decimal_str(s: &str) -> Result<Decimal> {
    Decimal::from_str(s.trim()).map_err(|e| anyhow!("Invalid amount '{}' in database: {}", s, e))
}

/// Fixed-width RFC 3339 so stored timestamps sort lexically
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn repo(dir: &TempDir) -> DuckDbRepository {
        let repo = DuckDbRepository::new(&dir.path().join("test.duckdb")).unwrap();
        repo.ensure_schema().unwrap();
        repo
    }

    #[test]
    fn test_retryable_error_detection() {
        assert!(is_retryable_error("IO Error: database is locked"));
        assert!(is_retryable_error(
            "The process cannot access the file because it is being used by another process"
        ));
        assert!(!is_retryable_error("Catalog Error: Table does not exist"));
    }

    #[test]
    fn test_timestamp_format_sorts_lexically() {
        let early = DateTime::parse_from_rfc3339("2026-03-01T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let later = early + chrono::Duration::microseconds(1500);
        assert!(format_timestamp(&early) < format_timestamp(&later));
        assert_eq!(format_timestamp(&early), "2026-03-01T09:00:00.000000Z");
        assert_eq!(parse_timestamp(&format_timestamp(&later)).unwrap(), later);
    }

    #[test]
    fn test_user_roundtrip_and_balance() {
        let dir = TempDir::new().unwrap();
        let repo = repo(&dir);
        let user = User::new("Jane.Doe@Corp.com", "Jane Doe");

        repo.transaction(|db| {
            db.insert_user(&user)?;
            db.insert_transaction(&Transaction::bulk_import(
                user.id,
                Decimal::new(10050, 2),
                Uuid::new_v4(),
                "March",
            ))?;
            db.insert_transaction(&Transaction::bulk_import(
                user.id,
                Decimal::new(25, 1),
                Uuid::new_v4(),
                "April",
            ))
        })
        .unwrap();

        repo.read(|db| {
            let found = db.get_user_by_email("jane.doe@corp.com")?.unwrap();
            assert_eq!(found.id, user.id);
            assert_eq!(db.get_balance(user.id)?, Decimal::new(10300, 2));
            assert_eq!(db.get_transactions_for_user(user.id)?.len(), 2);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let dir = TempDir::new().unwrap();
        let repo = repo(&dir);
        let user = User::new("a@corp.com", "A");

        let result: Result<()> = repo.transaction(|db| {
            db.insert_user(&user)?;
            Err(anyhow!("boom"))
        });
        assert!(result.is_err());
        assert_eq!(repo.read(|db| db.count_users()).unwrap(), 0);
    }

    #[test]
    fn test_duplicate_user_email_rejected() {
        let dir = TempDir::new().unwrap();
        let repo = repo(&dir);
        repo.read(|db| db.insert_user(&User::new("a@corp.com", "A")))
            .unwrap();
        assert!(repo
            .read(|db| db.insert_user(&User::new("A@corp.com", "Other")))
            .is_err());
    }

    #[test]
    fn test_job_pending_count_tracks_open_balances() {
        let dir = TempDir::new().unwrap();
        let repo = repo(&dir);
        let job = BulkImportJob::new("March", "admin", 2);
        let open = PendingImportBalance::new(job.id, "x@corp.com", "X", Decimal::new(5, 0));
        let mut expired = PendingImportBalance::new(job.id, "y@corp.com", "Y", Decimal::new(7, 0));

        repo.transaction(|db| {
            db.insert_job(&job)?;
            db.insert_pending(&open)?;
            db.insert_pending(&expired)
        })
        .unwrap();

        expired.expire().unwrap();
        repo.read(|db| db.update_pending(&expired)).unwrap();

        let listed = repo.read(|db| db.list_jobs()).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].pending_count, 1);

        let reread = repo.read(|db| db.get_pending(expired.id)).unwrap().unwrap();
        assert_eq!(reread.status, PendingStatus::Expired);
        assert!(reread.expired_at.is_some());
        assert_eq!(reread.amount, Decimal::new(7, 0));

        let totals = repo.read(|db| db.pending_totals()).unwrap();
        assert_eq!(totals.len(), 2);
    }
}

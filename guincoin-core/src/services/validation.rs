//! Validation service - re-checks merged rows before commit

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use regex::Regex;
use rust_decimal::Decimal;

use crate::adapters::duckdb::DuckDbRepository;
use crate::domain::{
    normalize_email, MatchTier, MatchType, MergedRow, RowIssue, ValidationResult,
    ValidationSummary,
};

const EMAIL_PATTERN: &str = r"^[^\s@]+@[^\s@]+\.[^\s@]+$";

/// `local@domain.tld` shape check
#[derive(Debug, Clone)]
pub struct EmailFormat {
    pattern: Regex,
}

impl EmailFormat {
    pub fn new() -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(EMAIL_PATTERN)?,
        })
    }

    pub fn is_valid(&self, email: &str) -> bool {
        self.pattern.is_match(email.trim())
    }
}

/// Directory facts about one recipient email
#[derive(Debug, Clone, Copy, Default)]
struct Recipient {
    registered: bool,
    has_open_pending: bool,
}

pub struct ValidationService {
    repository: Arc<DuckDbRepository>,
    email_format: EmailFormat,
}

impl ValidationService {
    pub fn new(repository: Arc<DuckDbRepository>) -> Result<Self> {
        Ok(Self {
            repository,
            email_format: EmailFormat::new()?,
        })
    }

    /// Validate merged rows against the user directory
    ///
    /// Row numbers in the result are 1-based positions in `rows`. Findings
    /// are data; this only fails when the database can't be read.
    pub fn validate(&self, rows: &[MergedRow]) -> Result<ValidationResult> {
        let recipients = self.lookup_recipients(rows)?;

        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let mut summary = ValidationSummary {
            total_rows: rows.len(),
            ..Default::default()
        };
        let mut first_seen: HashMap<String, usize> = HashMap::new();

        for (idx, row) in rows.iter().enumerate() {
            let row_no = idx + 1;
            let email = normalize_email(&row.email);
            let mut row_ok = true;

            if email.is_empty() {
                errors.push(RowIssue::new(row_no, "Missing email address"));
                row_ok = false;
            } else {
                if !self.email_format.is_valid(&email) {
                    errors.push(RowIssue::new(
                        row_no,
                        format!("Invalid email address: {}", row.email.trim()),
                    ));
                    row_ok = false;
                }
                match first_seen.get(&email) {
                    Some(first) => {
                        errors.push(RowIssue::new(
                            row_no,
                            format!("Duplicate email {} (first seen on row {})", email, first),
                        ));
                        summary.duplicates += 1;
                        row_ok = false;
                    }
                    None => {
                        first_seen.insert(email.clone(), row_no);
                    }
                }
            }

            // Stored amounts carry two decimal places
            if row.amount.round_dp(2) <= Decimal::ZERO {
                errors.push(RowIssue::new(row_no, "Amount must be greater than zero"));
                row_ok = false;
            }

            if row.name.trim().is_empty() {
                warnings.push(RowIssue::new(row_no, "Missing recipient name"));
            }
            if row.match_type != MatchType::Manual && row.tier() == MatchTier::Review {
                warnings.push(RowIssue::new(
                    row_no,
                    format!(
                        "Email match needs review ({}% confidence)",
                        (row.confidence * 100.0).round() as i64
                    ),
                ));
            }

            if !row_ok {
                continue;
            }

            summary.valid_rows += 1;
            let recipient = recipients.get(&email).copied().unwrap_or_default();
            if recipient.registered {
                summary.registered_users += 1;
            } else {
                summary.unregistered_users += 1;
                if recipient.has_open_pending {
                    warnings.push(RowIssue::new(
                        row_no,
                        "Recipient already has a pending balance from an earlier import",
                    ));
                }
            }
        }

        Ok(ValidationResult {
            valid: errors.is_empty() && summary.total_rows > 0,
            errors,
            warnings,
            summary,
        })
    }

    pub fn email_format(&self) -> &EmailFormat {
        &self.email_format
    }

    fn lookup_recipients(&self, rows: &[MergedRow]) -> Result<HashMap<String, Recipient>> {
        let mut emails: Vec<String> = rows
            .iter()
            .map(|r| normalize_email(&r.email))
            .filter(|e| !e.is_empty())
            .collect();
        emails.sort();
        emails.dedup();

        self.repository.read(|db| {
            let mut found = HashMap::with_capacity(emails.len());
            for email in emails {
                let registered = db.get_user_by_email(&email)?.is_some();
                let has_open_pending = !registered && !db.find_open_pending_by_email(&email)?.is_empty();
                found.insert(
                    email,
                    Recipient {
                        registered,
                        has_open_pending,
                    },
                );
            }
            Ok(found)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BulkImportJob, PendingImportBalance, User};
    use tempfile::TempDir;

    fn service(dir: &TempDir) -> ValidationService {
        let repo = Arc::new(DuckDbRepository::new(&dir.path().join("t.duckdb")).unwrap());
        repo.ensure_schema().unwrap();
        ValidationService::new(repo).unwrap()
    }

    fn row(name: &str, email: &str, amount: i64, confidence: f64) -> MergedRow {
        MergedRow::matched(name, email, Decimal::new(amount, 0), None, confidence)
    }

    #[test]
    fn test_email_format() {
        let format = EmailFormat::new().unwrap();
        assert!(format.is_valid("jane.doe@corp.com"));
        assert!(format.is_valid(" jane@corp.co.uk "));
        assert!(!format.is_valid("jane@corp"));
        assert!(!format.is_valid("jane doe@corp.com"));
        assert!(!format.is_valid("@corp.com"));
    }

    #[test]
    fn test_row_errors_and_counts() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir);
        let rows = vec![
            row("Jane Doe", "jane@corp.com", 10, 1.0),
            MergedRow::unmatched("Nobody", Decimal::new(5, 0), None),
            row("Bad Email", "not-an-email", 5, 1.0),
            row("Zero", "zero@corp.com", 0, 1.0),
            row("Jane Again", "JANE@corp.com", 3, 1.0),
        ];

        let result = svc.validate(&rows).unwrap();
        assert!(!result.valid);
        assert_eq!(result.summary.total_rows, 5);
        assert_eq!(result.summary.valid_rows, 1);
        assert_eq!(result.summary.duplicates, 1);
        assert_eq!(
            result.summary.valid_rows + result.invalid_rows(),
            result.summary.total_rows
        );

        let messages: Vec<(usize, &str)> = result
            .errors
            .iter()
            .map(|e| (e.row, e.message.as_str()))
            .collect();
        assert!(messages.contains(&(2, "Missing email address")));
        assert!(messages.contains(&(3, "Invalid email address: not-an-email")));
        assert!(messages.contains(&(4, "Amount must be greater than zero")));
        assert!(messages.contains(&(5, "Duplicate email jane@corp.com (first seen on row 1)")));
    }

    #[test]
    fn test_registered_and_unregistered_split() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir);
        svc.repository
            .read(|db| db.insert_user(&User::new("jane@corp.com", "Jane")))
            .unwrap();

        let rows = vec![
            row("Jane", "jane@corp.com", 10, 1.0),
            row("New Hire", "new@corp.com", 10, 1.0),
        ];
        let result = svc.validate(&rows).unwrap();
        assert!(result.valid);
        assert_eq!(result.summary.registered_users, 1);
        assert_eq!(result.summary.unregistered_users, 1);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_warnings() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir);
        let job = BulkImportJob::new("Earlier", "admin", 1);
        svc.repository
            .transaction(|db| {
                db.insert_job(&job)?;
                db.insert_pending(&PendingImportBalance::new(
                    job.id,
                    "again@corp.com",
                    "Again",
                    Decimal::new(1, 0),
                ))
            })
            .unwrap();

        let mut manual = row("Typed", "typed@corp.com", 5, 0.2);
        manual.set_email_manually("typed@corp.com");
        let rows = vec![
            row("", "noname@corp.com", 5, 1.0),
            row("Jon Smith", "john@corp.com", 5, 0.765),
            row("Again", "again@corp.com", 5, 1.0),
            manual,
        ];

        let result = svc.validate(&rows).unwrap();
        assert!(result.valid);
        let warnings: Vec<(usize, &str)> = result
            .warnings
            .iter()
            .map(|w| (w.row, w.message.as_str()))
            .collect();
        assert_eq!(
            warnings,
            vec![
                (1, "Missing recipient name"),
                (2, "Email match needs review (77% confidence)"),
                (3, "Recipient already has a pending balance from an earlier import"),
            ]
        );
    }

    #[test]
    fn test_empty_row_set_is_not_valid() {
        let dir = TempDir::new().unwrap();
        let result = service(&dir).validate(&[]).unwrap();
        assert!(!result.valid);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_amount_rounding_to_zero_is_rejected() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir);
        let rows = vec![
            MergedRow::matched("Tiny", "tiny@corp.com", Decimal::new(4, 3), None, 1.0),
            MergedRow::matched("Cent", "cent@corp.com", Decimal::new(6, 3), None, 1.0),
        ];
        let result = svc.validate(&rows).unwrap();
        assert!(!result.valid);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].row, 1);
        assert_eq!(result.errors[0].message, "Amount must be greater than zero");
        assert_eq!(result.summary.valid_rows, 1);
    }
}

//! Import service - upload inspection, column detection and match preview

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::adapters::duckdb::DuckDbRepository;
use crate::config::Config;
use crate::domain::result::Error;
use crate::domain::{
    normalize_email, ColumnMapping, DetectedColumns, MatchTier, MergedRow, SheetData,
    UploadedFile, PREVIEW_ROW_LIMIT,
};
use crate::services::matching::{Candidate, NameMatcher};

const EMAIL_PATTERNS: [&str; 2] = ["email", "mail"];
const AMOUNT_PATTERNS: [&str; 4] = ["amount", "guincoin", "coin", "balance"];
const MARKET_PATTERNS: [&str; 2] = ["market", "location"];
const NAME_PATTERNS: [&str; 2] = ["name", "employee"];

/// Parsed headers and previews for the files of one upload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    pub balance_file: UploadedFile,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_file: Option<UploadedFile>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewSummary {
    pub total_rows: usize,
    pub auto_matched: usize,
    pub needs_review: usize,
    pub manual_required: usize,
    /// Rows whose name and amount cells were both blank
    pub skipped_rows: usize,
}

/// Merged rows ready for review
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewResult {
    pub summary: PreviewSummary,
    pub rows: Vec<MergedRow>,
}

/// Import service for the upload, mapping and preview stages
pub struct ImportService {
    repository: Arc<DuckDbRepository>,
    data_dir: PathBuf,
}

impl ImportService {
    pub fn new(repository: Arc<DuckDbRepository>, data_dir: PathBuf) -> Self {
        Self {
            repository,
            data_dir,
        }
    }

    /// Describe one parsed file: headers, first rows and detected columns
    pub fn inspect(&self, sheet: &SheetData) -> UploadedFile {
        UploadedFile {
            file_name: sheet.file_name.clone(),
            headers: sheet.headers.clone(),
            preview_rows: sheet.rows.iter().take(PREVIEW_ROW_LIMIT).cloned().collect(),
            total_rows: sheet.rows.len(),
            detected: detect_columns(&sheet.headers),
        }
    }

    pub fn upload(&self, balances: &SheetData, emails: Option<&SheetData>) -> UploadResult {
        UploadResult {
            balance_file: self.inspect(balances),
            email_file: emails.map(|s| self.inspect(s)),
        }
    }

    /// Merge balance rows with emails and score each match
    ///
    /// Emails come from, in order: the balances file's own email column,
    /// the email file when one is given, or the registered user directory.
    pub fn preview(
        &self,
        balances: &SheetData,
        emails: Option<&SheetData>,
        mapping: &ColumnMapping,
    ) -> Result<PreviewResult> {
        mapping.ensure_complete()?;

        let name_idx = balances.require_column(&mapping.balances.name)?;
        let amount_idx = balances.require_column(&mapping.balances.amount)?;
        let email_idx = optional_column(balances, mapping.balances.email.as_deref())?;
        let market_idx = optional_column(balances, mapping.balances.market.as_deref())?;

        let matcher = NameMatcher::new(self.candidates(emails, mapping)?);

        let mut summary = PreviewSummary::default();
        let mut rows = Vec::with_capacity(balances.rows.len());

        for raw in &balances.rows {
            let name = balances.cell(raw, name_idx);
            let amount_text = balances.cell(raw, amount_idx);
            if name.is_empty() && amount_text.is_empty() {
                summary.skipped_rows += 1;
                continue;
            }

            // Unreadable amounts become zero and fail validation
            let amount = parse_amount(amount_text).unwrap_or(Decimal::ZERO);
            let market = market_idx
                .map(|idx| balances.cell(raw, idx))
                .filter(|m| !m.is_empty())
                .map(|m| m.to_string());
            let own_email = email_idx
                .map(|idx| balances.cell(raw, idx))
                .filter(|e| !e.is_empty());

            let row = match own_email {
                Some(email) => MergedRow::matched(name, normalize_email(email), amount, market, 1.0),
                None => matcher.merge(name, amount, market),
            };

            match row.tier() {
                MatchTier::Auto => summary.auto_matched += 1,
                MatchTier::Review => summary.needs_review += 1,
                MatchTier::Manual => summary.manual_required += 1,
            }
            rows.push(row);
        }

        summary.total_rows = rows.len();
        Ok(PreviewResult { summary, rows })
    }

    fn candidates(
        &self,
        emails: Option<&SheetData>,
        mapping: &ColumnMapping,
    ) -> Result<Vec<Candidate>> {
        match (emails, &mapping.emails) {
            (Some(sheet), Some(columns)) => {
                let name_idx = sheet.require_column(&columns.name)?;
                let email_idx = sheet.require_column(&columns.email)?;
                Ok(sheet
                    .rows
                    .iter()
                    .map(|raw| Candidate::new(sheet.cell(raw, name_idx), sheet.cell(raw, email_idx)))
                    .collect())
            }
            (Some(sheet), None) => Err(Error::validation(format!(
                "Email file {} was uploaded but its columns are not mapped",
                sheet.file_name
            ))
            .into()),
            (None, Some(_)) => Err(Error::validation(
                "Email file columns are mapped but no email file was uploaded",
            )
            .into()),
            (None, None) => {
                let users = self.repository.read(|db| db.list_users())?;
                Ok(users
                    .into_iter()
                    .map(|u| Candidate::new(u.name, u.email))
                    .collect())
            }
        }
    }

    /// List saved column mapping profiles
    pub fn list_profiles(&self) -> Result<HashMap<String, ColumnMapping>> {
        let config = Config::load(&self.data_dir)?;
        Ok(config.import_profiles)
    }

    /// Save a column mapping under a profile name, replacing any existing one
    pub fn save_profile(&self, name: &str, mapping: &ColumnMapping) -> Result<()> {
        if name.trim().is_empty() {
            return Err(Error::validation("Profile name cannot be empty").into());
        }
        mapping.ensure_complete()?;

        let mut config = Config::load(&self.data_dir)?;
        config
            .import_profiles
            .insert(name.trim().to_string(), mapping.clone());
        config.save(&self.data_dir)
    }

    pub fn get_profile(&self, name: &str) -> Result<Option<ColumnMapping>> {
        let config = Config::load(&self.data_dir)?;
        Ok(config.import_profiles.get(name).cloned())
    }

    pub fn delete_profile(&self, name: &str) -> Result<bool> {
        let mut config = Config::load(&self.data_dir)?;
        let removed = config.import_profiles.remove(name).is_some();
        if removed {
            config.save(&self.data_dir)?;
        }
        Ok(removed)
    }
}

fn optional_column(sheet: &SheetData, header: Option<&str>) -> Result<Option<usize>> {
    match header.map(str::trim).filter(|h| !h.is_empty()) {
        Some(h) => Ok(Some(sheet.require_column(h)?)),
        None => Ok(None),
    }
}

/// Guess the column mapping from header names
///
/// Case-insensitive substring hints; the first matching header wins per
/// field. Email is claimed first and a claimed header is never reused, so
/// "Employee Email" becomes the email column rather than the name column.
pub fn detect_columns(headers: &[String]) -> DetectedColumns {
    let mut claimed: Vec<&str> = Vec::new();
    let mut pick = |patterns: &[&str]| -> Option<String> {
        let found = headers.iter().find(|h| {
            let lower = h.to_lowercase();
            !claimed.contains(&h.as_str()) && patterns.iter().any(|p| lower.contains(p))
        })?;
        claimed.push(found.as_str());
        Some(found.clone())
    };

    let email = pick(&EMAIL_PATTERNS[..]);
    let amount = pick(&AMOUNT_PATTERNS[..]);
    let market = pick(&MARKET_PATTERNS[..]);
    let name = pick(&NAME_PATTERNS[..]);

    DetectedColumns {
        name,
        amount,
        email,
        market,
    }
}

const CURRENCY_SYMBOLS: [char; 4] = ['$', '€', '£', '¥'];

/// Parse a spreadsheet amount cell, rounded to cents
///
/// Accepts currency symbols, comma thousands separators and `(12.50)`
/// negatives. Anything else, including decimal commas and exponents, is
/// unreadable.
pub fn parse_amount(s: &str) -> Option<Decimal> {
    let s = s.trim();

    let (is_negative, s) = if s.starts_with('(') && s.ends_with(')') && s.len() >= 2 {
        (true, &s[1..s.len() - 1])
    } else {
        (false, s)
    };

    let cleaned: String = s
        .chars()
        .filter(|c| !c.is_whitespace() && !CURRENCY_SYMBOLS.contains(c))
        .collect();
    let (sign, digits) = match cleaned.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", cleaned.as_str()),
    };
    let (whole, fraction) = match digits.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (digits, None),
    };

    if !is_grouped_integer(whole) {
        return None;
    }
    if let Some(fraction) = fraction {
        if fraction.is_empty() || !fraction.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
    }

    let plain = match fraction {
        Some(fraction) => format!("{}{}.{}", sign, whole.replace(',', ""), fraction),
        None => format!("{}{}", sign, whole.replace(',', "")),
    };
    let mut amount: Decimal = plain.parse().ok()?;
    if is_negative && amount > Decimal::ZERO {
        amount = -amount;
    }
    Some(amount.round_dp(2))
}

/// `1250` or `1,250`; every group after the first is exactly three digits
fn is_grouped_integer(whole: &str) -> bool {
    let groups: Vec<&str> = whole.split(',').collect();
    let all_digits = groups
        .iter()
        .all(|g| !g.is_empty() && g.chars().all(|c| c.is_ascii_digit()));
    all_digits && (groups.len() == 1 || (groups[0].len() <= 3 && groups[1..].iter().all(|g| g.len() == 3)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BalanceColumns, EmailColumns, MatchType, User};
    use tempfile::TempDir;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn sheet(file_name: &str, header: &[&str], rows: &[&[&str]]) -> SheetData {
        SheetData {
            file_name: file_name.to_string(),
            headers: headers(header),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        }
    }

    fn service(dir: &TempDir) -> ImportService {
        let repo = Arc::new(DuckDbRepository::new(&dir.path().join("t.duckdb")).unwrap());
        repo.ensure_schema().unwrap();
        ImportService::new(repo, dir.path().to_path_buf())
    }

    fn mapping(email_file: bool) -> ColumnMapping {
        ColumnMapping {
            balances: BalanceColumns {
                name: "Name".to_string(),
                amount: "Guincoins".to_string(),
                email: None,
                market: Some("Market".to_string()),
            },
            emails: email_file.then(|| EmailColumns {
                name: "Employee".to_string(),
                email: "Work Email".to_string(),
            }),
        }
    }

    #[test]
    fn test_detect_columns_hints() {
        let detected = detect_columns(&headers(&["Employee Name", "Guincoin Balance", "Location"]));
        assert_eq!(detected.name.as_deref(), Some("Employee Name"));
        assert_eq!(detected.amount.as_deref(), Some("Guincoin Balance"));
        assert_eq!(detected.market.as_deref(), Some("Location"));
        assert!(detected.email.is_none());
    }

    #[test]
    fn test_detect_columns_email_claimed_first() {
        let detected = detect_columns(&headers(&["Employee Email", "Employee", "Coins"]));
        assert_eq!(detected.email.as_deref(), Some("Employee Email"));
        assert_eq!(detected.name.as_deref(), Some("Employee"));
        assert_eq!(detected.amount.as_deref(), Some("Coins"));
    }

    #[test]
    fn test_detect_columns_nothing_found() {
        let detected = detect_columns(&headers(&["A", "B"]));
        assert_eq!(detected, DetectedColumns::default());
        assert!(ColumnMapping {
            balances: detected.to_balance_columns(),
            emails: None
        }
        .ensure_complete()
        .is_err());
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("100"), Some(Decimal::new(100, 0)));
        assert_eq!(parse_amount("$1,250.50"), Some(Decimal::new(125050, 2)));
        assert_eq!(parse_amount("(12.50)"), Some(Decimal::new(-1250, 2)));
        assert_eq!(parse_amount("10.005"), Some(Decimal::new(1000, 2)));
        assert_eq!(parse_amount("n/a"), None);
        assert_eq!(parse_amount(""), None);
    }

    #[test]
    fn test_parse_amount_rejects_ambiguous_cells() {
        assert_eq!(parse_amount("€ 2,000"), Some(Decimal::new(2000, 0)));
        assert_eq!(parse_amount("-7.5"), Some(Decimal::new(-750, 2)));
        assert_eq!(parse_amount("1.250,50"), None);
        assert_eq!(parse_amount("12,5"), None);
        assert_eq!(parse_amount("1e3"), None);
        assert_eq!(parse_amount("50 coins"), None);
        assert_eq!(parse_amount("1.2.3"), None);
        assert_eq!(parse_amount("1,2345"), None);
    }

    #[test]
    fn test_upload_reports_preview_rows() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir);
        let rows: Vec<Vec<String>> = (0..8).map(|i| vec![format!("P{}", i), "1".to_string()]).collect();
        let balances = SheetData {
            file_name: "b.csv".to_string(),
            headers: headers(&["Name", "Amount"]),
            rows,
        };
        let result = svc.upload(&balances, None);
        assert_eq!(result.balance_file.total_rows, 8);
        assert_eq!(result.balance_file.preview_rows.len(), PREVIEW_ROW_LIMIT);
        assert!(result.email_file.is_none());
    }

    #[test]
    fn test_preview_with_email_file() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir);
        let balances = sheet(
            "balances.csv",
            &["Name", "Guincoins", "Market"],
            &[
                &["Jane Doe", "100", "Austin"],
                &["Jon Smith", "50", ""],
                &["Pat Unknown", "25", ""],
                &["", "", ""],
            ],
        );
        let emails = sheet(
            "emails.csv",
            &["Employee", "Work Email"],
            &[&["Jane Doe", "Jane.Doe@corp.com"], &["John Smith", "john.smith@corp.com"]],
        );

        let preview = svc.preview(&balances, Some(&emails), &mapping(true)).unwrap();
        assert_eq!(preview.summary.total_rows, 3);
        assert_eq!(preview.summary.skipped_rows, 1);
        assert_eq!(preview.summary.auto_matched, 1);
        assert_eq!(preview.summary.needs_review, 1);
        assert_eq!(preview.summary.manual_required, 1);

        assert_eq!(preview.rows[0].email, "jane.doe@corp.com");
        assert_eq!(preview.rows[0].confidence, 1.0);
        assert_eq!(preview.rows[0].market.as_deref(), Some("Austin"));
        assert_eq!(preview.rows[1].tier(), MatchTier::Review);
        assert_eq!(preview.rows[2].match_type, MatchType::None);
        assert!(preview.rows[2].market.is_none());
    }

    #[test]
    fn test_preview_uses_user_directory_without_email_file() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir);
        svc.repository
            .read(|db| db.insert_user(&User::new("sam.lee@corp.com", "")))
            .unwrap();

        let balances = sheet("b.csv", &["Name", "Guincoins", "Market"], &[&["Sam Lee", "5", ""]]);
        let preview = svc.preview(&balances, None, &mapping(false)).unwrap();
        assert_eq!(preview.rows[0].email, "sam.lee@corp.com");
        assert_eq!(preview.rows[0].match_type, MatchType::Auto);
    }

    #[test]
    fn test_balances_email_column_wins() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir);
        let balances = sheet(
            "b.csv",
            &["Name", "Guincoins", "Email"],
            &[&["Anyone", "5", "Direct@Corp.com"], &["Nobody", "abc", ""]],
        );
        let mut m = mapping(false);
        m.balances.email = Some("Email".to_string());
        m.balances.market = None;

        let preview = svc.preview(&balances, None, &m).unwrap();
        assert_eq!(preview.rows[0].email, "direct@corp.com");
        assert_eq!(preview.rows[0].confidence, 1.0);
        assert_eq!(preview.rows[1].amount, Decimal::ZERO);
        assert_eq!(preview.rows[1].tier(), MatchTier::Manual);
    }

    #[test]
    fn test_preview_rejects_inconsistent_inputs() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir);
        let balances = sheet("b.csv", &["Name", "Guincoins", "Market"], &[&["A", "1", ""]]);
        let emails = sheet("e.csv", &["Employee", "Work Email"], &[]);

        assert!(svc.preview(&balances, Some(&emails), &mapping(false)).is_err());
        assert!(svc.preview(&balances, None, &mapping(true)).is_err());

        let mut m = mapping(false);
        m.balances.amount = "Coins".to_string();
        let err = svc.preview(&balances, None, &m).unwrap_err();
        assert!(err.to_string().contains("Column 'Coins' not found"));
    }

    #[test]
    fn test_profiles_roundtrip() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir);
        svc.save_profile("payroll", &mapping(true)).unwrap();
        assert_eq!(svc.get_profile("payroll").unwrap(), Some(mapping(true)));
        assert_eq!(svc.list_profiles().unwrap().len(), 1);
        assert!(svc.delete_profile("payroll").unwrap());
        assert!(!svc.delete_profile("payroll").unwrap());
        assert!(svc.save_profile(" ", &mapping(false)).is_err());
    }
}

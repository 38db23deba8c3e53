//! Spreadsheet column mapping for the bulk import wizard

use serde::{Deserialize, Serialize};

use super::result::{Error, Result};

/// Columns of the balances file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceColumns {
    pub name: String,
    pub amount: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market: Option<String>,
}

/// Columns of the optional name-to-email file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailColumns {
    pub name: String,
    pub email: String,
}

/// Full mapping submitted with a preview or stored with a job
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMapping {
    pub balances: BalanceColumns,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emails: Option<EmailColumns>,
}

impl ColumnMapping {
    /// Reject mappings with blank required fields
    pub fn ensure_complete(&self) -> Result<()> {
        if self.balances.name.trim().is_empty() {
            return Err(Error::validation("Balances file: name column is required"));
        }
        if self.balances.amount.trim().is_empty() {
            return Err(Error::validation("Balances file: amount column is required"));
        }
        if let Some(emails) = &self.emails {
            if emails.name.trim().is_empty() || emails.email.trim().is_empty() {
                return Err(Error::validation(
                    "Email file: both name and email columns are required",
                ));
            }
        }
        Ok(())
    }
}

/// Result of column auto-detection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedColumns {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market: Option<String>,
}

impl DetectedColumns {
    /// Pre-populated balances mapping; missing fields stay blank
    pub fn to_balance_columns(&self) -> BalanceColumns {
        BalanceColumns {
            name: self.name.clone().unwrap_or_default(),
            amount: self.amount.clone().unwrap_or_default(),
            email: self.email.clone(),
            market: self.market.clone(),
        }
    }

    /// Pre-populated email file mapping; missing fields stay blank
    pub fn to_email_columns(&self) -> EmailColumns {
        EmailColumns {
            name: self.name.clone().unwrap_or_default(),
            email: self.email.clone().unwrap_or_default(),
        }
    }
}

//! Validation result model

use serde::{Deserialize, Serialize};

/// A problem attached to one submitted row (1-based)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowIssue {
    pub row: usize,
    pub message: String,
}

impl RowIssue {
    pub fn new(row: usize, message: impl Into<String>) -> Self {
        Self {
            row,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSummary {
    pub total_rows: usize,
    pub valid_rows: usize,
    pub registered_users: usize,
    pub unregistered_users: usize,
    pub duplicates: usize,
}

/// Outcome of validating a merged row set. Derived, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<RowIssue>,
    pub warnings: Vec<RowIssue>,
    pub summary: ValidationSummary,
}

impl ValidationResult {
    /// Number of distinct rows carrying at least one error
    pub fn invalid_rows(&self) -> usize {
        let mut rows: Vec<usize> = self.errors.iter().map(|e| e.row).collect();
        rows.sort_unstable();
        rows.dedup();
        rows.len()
    }

    pub fn row_has_error(&self, row: usize) -> bool {
        self.errors.iter().any(|e| e.row == row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_rows_counts_distinct_rows() {
        let result = ValidationResult {
            valid: false,
            errors: vec![
                RowIssue::new(2, "Missing email address"),
                RowIssue::new(2, "Amount must be greater than zero"),
                RowIssue::new(5, "Missing email address"),
            ],
            warnings: vec![],
            summary: ValidationSummary::default(),
        };
        assert_eq!(result.invalid_rows(), 2);
        assert!(result.row_has_error(5));
        assert!(!result.row_has_error(1));
    }
}

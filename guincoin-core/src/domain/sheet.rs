//! Parsed spreadsheet data

use serde::{Deserialize, Serialize};

use super::column_mapping::DetectedColumns;
use super::result::{Error, Result};

/// Number of data rows echoed back on upload
pub const PREVIEW_ROW_LIMIT: usize = 5;

/// A spreadsheet reduced to a header row and string cells
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetData {
    pub file_name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl SheetData {
    /// Index of a header, compared exactly after trimming
    pub fn column_index(&self, header: &str) -> Option<usize> {
        let wanted = header.trim();
        self.headers.iter().position(|h| h.trim() == wanted)
    }

    /// Like `column_index` but an error naming the file when missing
    pub fn require_column(&self, header: &str) -> Result<usize> {
        self.column_index(header).ok_or_else(|| {
            Error::validation(format!(
                "Column '{}' not found in {}",
                header, self.file_name
            ))
        })
    }

    /// Trimmed cell text; short rows read as empty
    pub fn cell<'a>(&self, row: &'a [String], idx: usize) -> &'a str {
        row.get(idx).map(|s| s.trim()).unwrap_or("")
    }
}

/// What the upload stage reports per file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub file_name: String,
    pub headers: Vec<String>,
    pub preview_rows: Vec<Vec<String>>,
    pub total_rows: usize,
    pub detected: DetectedColumns,
}

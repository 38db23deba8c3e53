//! Spreadsheet reader for import uploads
//!
//! CSV goes through the `csv` crate; Excel and OpenDocument workbooks go
//! through calamine, reading the first worksheet. Either way the result is a
//! header row plus string cells with fully blank rows dropped.

use std::io::Cursor;
use std::path::Path;

use calamine::{Data, Reader};

use crate::domain::result::{Error, Result};
use crate::domain::SheetData;

/// Supported formats, picked by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetFormat {
    Csv,
    Workbook,
}

impl SheetFormat {
    pub fn from_file_name(file_name: &str) -> Result<Self> {
        let ext = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "csv" => Ok(Self::Csv),
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Ok(Self::Workbook),
            "" => Err(Error::spreadsheet(format!(
                "{} has no file extension; expected CSV, XLSX, XLS or ODS",
                file_name
            ))),
            other => Err(Error::spreadsheet(format!(
                "Unsupported file type '.{}' for {}; expected CSV, XLSX, XLS or ODS",
                other, file_name
            ))),
        }
    }
}

/// Read a spreadsheet from disk
pub fn read_sheet(path: &Path) -> Result<SheetData> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    let bytes = std::fs::read(path)?;
    read_sheet_bytes(&file_name, &bytes)
}

/// Read an uploaded spreadsheet held in memory
pub fn read_sheet_bytes(file_name: &str, bytes: &[u8]) -> Result<SheetData> {
    let rows = match SheetFormat::from_file_name(file_name)? {
        SheetFormat::Csv => read_csv_rows(file_name, bytes)?,
        SheetFormat::Workbook => read_workbook_rows(file_name, bytes)?,
    };
    into_sheet(file_name, rows)
}

fn read_csv_rows(file_name: &str, bytes: &[u8]) -> Result<Vec<Vec<String>>> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut rows = Vec::new();
    for record in reader.byte_records() {
        let record = record
            .map_err(|e| Error::spreadsheet(format!("Failed to read {}: {}", file_name, e)))?;
        rows.push(
            record
                .iter()
                .map(|field| String::from_utf8_lossy(field).trim().to_string())
                .collect(),
        );
    }
    Ok(rows)
}

fn read_workbook_rows(file_name: &str, bytes: &[u8]) -> Result<Vec<Vec<String>>> {
    let mut workbook = calamine::open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| Error::spreadsheet(format!("Failed to open {}: {}", file_name, e)))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| Error::spreadsheet(format!("{} contains no worksheets", file_name)))?
        .map_err(|e| Error::spreadsheet(format!("Failed to read {}: {}", file_name, e)))?;

    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect())
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        // Whole numbers come back as floats from most workbooks
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => b.to_string(),
        other => other.to_string().trim().to_string(),
    }
}

fn into_sheet(file_name: &str, rows: Vec<Vec<String>>) -> Result<SheetData> {
    let mut rows = rows
        .into_iter()
        .filter(|row| row.iter().any(|cell| !cell.is_empty()));

    let header_row = rows
        .next()
        .ok_or_else(|| Error::spreadsheet(format!("{} is empty", file_name)))?;

    let headers = header_row
        .into_iter()
        .enumerate()
        .map(|(i, h)| {
            if h.is_empty() {
                format!("Column {}", i + 1)
            } else {
                h
            }
        })
        .collect();

    Ok(SheetData {
        file_name: file_name.to_string(),
        headers,
        rows: rows.collect(),
    })
}

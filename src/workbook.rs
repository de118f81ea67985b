//! Read-only XLSX access backed by calamine.
//!
//! calamine materializes one worksheet range at a time; the write pipeline
//! buffers only one batch of rows on top of that, so the memory high-water
//! mark is a single sheet, never the whole workbook.

use crate::error::{AppError, Result};
use calamine::{Data, Reader, Xlsx, open_workbook};
use chrono::{NaiveDateTime, NaiveTime};
use serde_json::Value;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

pub struct WorkbookReader {
    workbook: Xlsx<BufReader<File>>,
}

impl WorkbookReader {
    pub fn open(path: &Path) -> Result<Self> {
        let workbook = open_workbook(path)
            .map_err(|e: calamine::XlsxError| AppError::Workbook(format!("Failed to open {:?}: {}", path, e)))?;
        Ok(Self { workbook })
    }

    pub fn sheet_names(&self) -> Vec<String> {
        self.workbook.sheet_names()
    }

    pub fn sheet(&mut self, name: &str) -> Result<SheetRange> {
        let range = self
            .workbook
            .worksheet_range(name)
            .map_err(|e| AppError::Workbook(format!("Failed to read sheet '{}': {}", name, e)))?;
        Ok(SheetRange { range })
    }
}

/// The populated rectangle of one worksheet.
pub struct SheetRange {
    range: calamine::Range<Data>,
}

impl SheetRange {
    pub fn row_count(&self) -> usize {
        self.range.height()
    }

    pub fn column_count(&self) -> usize {
        self.range.width()
    }

    /// Rows in sheet order, each cell normalized for transmission.
    pub fn rows(&self) -> impl Iterator<Item = Vec<Value>> + '_ {
        self.range
            .rows()
            .map(|row| row.iter().map(normalize_cell).collect())
    }
}

/// Normalize a raw workbook cell for the Sheets API: empty cells become
/// empty strings, dates become ISO-8601 text, everything else passes
/// through as its JSON counterpart.
pub(crate) fn normalize_cell(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::String(String::new()),
        Data::String(s) => Value::String(s.clone()),
        Data::Float(f) => Value::from(*f),
        Data::Int(i) => Value::from(*i),
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(dt) => Value::String(match dt.as_datetime() {
            Some(naive) => iso_datetime(naive),
            None => dt.as_f64().to_string(),
        }),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::String(s.clone()),
        Data::Error(e) => Value::String(e.to_string()),
    }
}

// Date-only values render without the midnight time component.
fn iso_datetime(naive: NaiveDateTime) -> String {
    if naive.time() == NaiveTime::MIN {
        naive.date().format("%Y-%m-%d").to_string()
    } else {
        naive.format("%Y-%m-%dT%H:%M:%S").to_string()
    }
}

pub(crate) mod auth;
mod client;

pub use auth::clear_tokens;
pub use client::SheetsClient;

use crate::error::{AppError, Result};
use async_trait::async_trait;
use serde_json::Value;

/// Characters the Sheets API rejects in sheet titles.
const INVALID_TITLE_CHARS: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];

const MAX_TITLE_CHARS: usize = 100;

/// One sheet (tab) inside a spreadsheet, as reported by the service.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetInfo {
    pub id: i32,
    pub title: String,
    pub row_count: u32,
    pub column_count: u32,
}

#[async_trait]
pub trait SheetOperations {
    async fn get_document_sheets(&self, spreadsheet_id: &str) -> Result<Vec<SheetInfo>>;

    async fn add_sheet(&self, spreadsheet_id: &str, title: &str) -> Result<SheetInfo>;

    async fn delete_sheet(&self, spreadsheet_id: &str, sheet_id: i32) -> Result<()>;

    async fn resize_sheet(
        &self,
        spreadsheet_id: &str,
        sheet_id: i32,
        row_count: u32,
        column_count: u32,
    ) -> Result<()>;

    /// Write a rectangular block of values anchored at `range` (A1 notation).
    async fn write_range(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: &[Vec<Value>],
        value_input_option: &str,
    ) -> Result<()>;
}

/// Reject titles the destination service would refuse, before any remote
/// call is made.
pub fn validate_sheet_title(title: &str) -> Result<()> {
    if title.is_empty() {
        return Err(AppError::Validation(
            "Sheet title must not be empty".to_string(),
        ));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(AppError::Validation(format!(
            "Sheet title '{}' exceeds {} characters",
            title, MAX_TITLE_CHARS
        )));
    }
    if let Some(invalid) = title.chars().find(|c| INVALID_TITLE_CHARS.contains(c)) {
        return Err(AppError::Validation(format!(
            "Sheet title '{}' contains invalid character '{}'",
            title, invalid
        )));
    }
    Ok(())
}

//! Batch sizing and A1 range addressing for chunked writes.
//!
//! The Sheets API limits writes by total cell count per request, not by row
//! count, so wide sheets get proportionally fewer rows per batch.

/// Smallest batch the planner will suggest, also the fallback for sheets
/// with no detectable columns.
const MIN_ROWS_PER_BATCH: usize = 200;

/// Largest batch the planner will suggest for very narrow sheets.
const MAX_ROWS_PER_BATCH: usize = 5000;

/// Rows per write batch for a sheet of `column_count` columns, targeting
/// roughly `target_cells_per_request` cells per call.
pub fn choose_batch_size(column_count: i64, target_cells_per_request: usize) -> usize {
    if column_count <= 0 {
        return MIN_ROWS_PER_BATCH;
    }
    let rows = target_cells_per_request / (column_count as usize).max(1);
    rows.clamp(MIN_ROWS_PER_BATCH, MAX_ROWS_PER_BATCH)
}

/// 1-based column index to spreadsheet letters: 1→A, 26→Z, 27→AA, 703→AAA.
pub fn column_letters(column: u32) -> String {
    let mut n = column;
    let mut letters = Vec::new();
    while n > 0 {
        letters.push(char::from(b'A' + ((n - 1) % 26) as u8));
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// A1 address of the top-left cell of a batch, e.g. `'mov_general'!A1001`.
pub fn range_start(sheet_title: &str, start_row: usize, start_col: u32) -> String {
    format!(
        "'{}'!{}{}",
        sheet_title,
        column_letters(start_col),
        start_row
    )
}

use crate::chunk;
use crate::error::Result;
use crate::retry::RetryPolicy;
use crate::sheets::SheetOperations;
use serde_json::Value;
use tracing::{debug, warn};

/// Hard ceiling on rows per write call, independent of the cell-count
/// heuristic, to bound worst-case payload size.
pub const MAX_ROWS_PER_WRITE: usize = 1000;

/// Streams one sheet's rows into the destination in batches, retrying
/// transient failures and bisecting batches the service rejects as
/// oversized.
pub struct SheetWriter<'a, S> {
    sheets: &'a S,
    retry: &'a RetryPolicy,
    spreadsheet_id: &'a str,
    value_input_option: &'a str,
}

impl<'a, S> SheetWriter<'a, S>
where
    S: SheetOperations + Sync,
{
    pub fn new(
        sheets: &'a S,
        retry: &'a RetryPolicy,
        spreadsheet_id: &'a str,
        value_input_option: &'a str,
    ) -> Self {
        Self {
            sheets,
            retry,
            spreadsheet_id,
            value_input_option,
        }
    }

    /// Write `rows` to `sheet_title` starting at row 1, buffering at most
    /// one batch at a time. Returns the number of rows written.
    pub async fn write_sheet<I>(
        &self,
        sheet_title: &str,
        rows: I,
        batch_size: usize,
    ) -> Result<usize>
    where
        I: IntoIterator<Item = Vec<Value>>,
    {
        let batch_size = batch_size.clamp(1, MAX_ROWS_PER_WRITE);
        let mut cursor = 1usize;
        let mut buffer: Vec<Vec<Value>> = Vec::with_capacity(batch_size);

        for row in rows {
            buffer.push(row);
            if buffer.len() >= batch_size {
                let batch = std::mem::take(&mut buffer);
                let flushed = batch.len();
                self.flush(sheet_title, cursor, batch).await?;
                cursor += flushed;
            }
        }

        // the last batch of a sheet is frequently short
        if !buffer.is_empty() {
            let flushed = buffer.len();
            self.flush(sheet_title, cursor, buffer).await?;
            cursor += flushed;
        }

        Ok(cursor - 1)
    }

    /// Write one contiguous batch anchored at `start_row`.
    ///
    /// A batch the service rejects as oversized is bisected and each half
    /// written independently, preserving row order; a single row that is
    /// still oversized is a fatal failure. Implemented with an explicit
    /// work stack rather than recursion (halves pushed second-then-first,
    /// so the first half is always written first).
    pub async fn flush(
        &self,
        sheet_title: &str,
        start_row: usize,
        batch: Vec<Vec<Value>>,
    ) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut pending = vec![(start_row, batch)];
        while let Some((row, rows)) = pending.pop() {
            match self.write_batch(sheet_title, row, &rows).await {
                Ok(()) => {
                    debug!(sheet = sheet_title, start_row = row, rows = rows.len(), "Batch written");
                }
                Err(err) if err.is_payload_too_large() && rows.len() > 1 => {
                    let mid = rows.len() / 2;
                    let mut first = rows;
                    let second = first.split_off(mid);
                    warn!(
                        sheet = sheet_title,
                        start_row = row,
                        rows = first.len() + second.len(),
                        "Write rejected as oversized, splitting batch"
                    );
                    pending.push((row + mid, second));
                    pending.push((row, first));
                }
                Err(err) => return Err(err),
            }
        }

        Ok(())
    }

    async fn write_batch(
        &self,
        sheet_title: &str,
        start_row: usize,
        rows: &[Vec<Value>],
    ) -> Result<()> {
        let range = chunk::range_start(sheet_title, start_row, 1);
        self.retry
            .run(|| {
                self.sheets.write_range(
                    self.spreadsheet_id,
                    &range,
                    rows,
                    self.value_input_option,
                )
            })
            .await
    }
}

#[cfg(test)]
pub(crate) mod mocks {
    use super::*;
    use crate::error::AppError;
    use crate::sheets::SheetInfo;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) struct WriteCall {
        pub range: String,
        pub rows: Vec<Vec<Value>>,
    }

    /// How the mock responds to write_range calls.
    pub(crate) enum WriteBehaviour {
        Accept,
        /// Reject batches above this many rows as oversized.
        RejectOversizedAbove(usize),
        /// Fail every call with this status.
        FailWithStatus(u16),
        /// Fail the first N calls with a retryable status, then accept.
        TransientFailures(u32),
    }

    pub(crate) struct MockSheets {
        pub writes: Mutex<Vec<WriteCall>>,
        /// Structural operations in call order, e.g. "add:datos".
        pub ops: Mutex<Vec<String>>,
        pub existing: Vec<SheetInfo>,
        pub behaviour: WriteBehaviour,
        pub attempts: AtomicU32,
    }

    impl MockSheets {
        pub(crate) fn new(behaviour: WriteBehaviour) -> Self {
            Self::with_existing(behaviour, Vec::new())
        }

        pub(crate) fn with_existing(behaviour: WriteBehaviour, existing: Vec<SheetInfo>) -> Self {
            Self {
                writes: Mutex::new(Vec::new()),
                ops: Mutex::new(Vec::new()),
                existing,
                behaviour,
                attempts: AtomicU32::new(0),
            }
        }

        pub(crate) fn recorded(&self) -> Vec<WriteCall> {
            self.writes.lock().unwrap().clone()
        }

        pub(crate) fn recorded_ops(&self) -> Vec<String> {
            self.ops.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SheetOperations for MockSheets {
        async fn get_document_sheets(&self, _spreadsheet_id: &str) -> Result<Vec<SheetInfo>> {
            self.ops.lock().unwrap().push("get_sheets".to_string());
            Ok(self.existing.clone())
        }

        async fn add_sheet(&self, _spreadsheet_id: &str, title: &str) -> Result<SheetInfo> {
            self.ops.lock().unwrap().push(format!("add:{title}"));
            Ok(SheetInfo {
                id: 1,
                title: title.to_string(),
                row_count: 1000,
                column_count: 26,
            })
        }

        async fn delete_sheet(&self, _spreadsheet_id: &str, sheet_id: i32) -> Result<()> {
            self.ops.lock().unwrap().push(format!("delete:{sheet_id}"));
            Ok(())
        }

        async fn resize_sheet(
            &self,
            _spreadsheet_id: &str,
            sheet_id: i32,
            row_count: u32,
            column_count: u32,
        ) -> Result<()> {
            self.ops
                .lock()
                .unwrap()
                .push(format!("resize:{sheet_id}:{row_count}x{column_count}"));
            Ok(())
        }

        async fn write_range(
            &self,
            _spreadsheet_id: &str,
            range: &str,
            values: &[Vec<Value>],
            _value_input_option: &str,
        ) -> Result<()> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            match self.behaviour {
                WriteBehaviour::Accept => {}
                WriteBehaviour::RejectOversizedAbove(limit) => {
                    if values.len() > limit {
                        return Err(AppError::Remote {
                            api: "Sheets",
                            status: 413,
                            body: "Request payload size exceeds the limit".to_string(),
                        });
                    }
                }
                WriteBehaviour::FailWithStatus(status) => {
                    return Err(AppError::Remote {
                        api: "Sheets",
                        status,
                        body: "mock failure".to_string(),
                    });
                }
                WriteBehaviour::TransientFailures(n) => {
                    if self.attempts.load(Ordering::SeqCst) <= n {
                        return Err(AppError::Remote {
                            api: "Sheets",
                            status: 503,
                            body: "mock transient failure".to_string(),
                        });
                    }
                }
            }
            self.writes.lock().unwrap().push(WriteCall {
                range: range.to_string(),
                rows: values.to_vec(),
            });
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mocks::{MockSheets, WriteBehaviour, WriteCall};
    use super::*;
    use crate::chunk::choose_batch_size;
    use crate::error::AppError;
    use serde_json::json;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn numbered_rows(count: usize, cols: usize) -> Vec<Vec<Value>> {
        (1..=count)
            .map(|n| (0..cols).map(|c| json!(n * 10 + c)).collect())
            .collect()
    }

    fn start_row_of(call: &WriteCall) -> usize {
        // ranges look like 'title'!A123
        let column_anchor = call
            .range
            .rfind("!A")
            .expect("range should be anchored at column A");
        call.range[column_anchor + 2..].parse().unwrap()
    }

    fn policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_write_sheet_batches_at_expected_rows() {
        let sheets = MockSheets::new(WriteBehaviour::Accept);
        let retry = policy();
        let writer = SheetWriter::new(&sheets, &retry, "doc1", "RAW");

        let written = writer
            .write_sheet("datos", numbered_rows(10, 2), 4)
            .await
            .unwrap();
        assert_eq!(written, 10);

        let calls = sheets.recorded();
        assert_eq!(calls.len(), 3);
        assert_eq!(
            calls.iter().map(start_row_of).collect::<Vec<_>>(),
            vec![1, 5, 9]
        );
        assert_eq!(
            calls.iter().map(|c| c.rows.len()).collect::<Vec<_>>(),
            vec![4, 4, 2]
        );
    }

    #[tokio::test]
    async fn test_write_sheet_exact_multiple_has_no_trailing_flush() {
        let sheets = MockSheets::new(WriteBehaviour::Accept);
        let retry = policy();
        let writer = SheetWriter::new(&sheets, &retry, "doc1", "RAW");

        writer
            .write_sheet("datos", numbered_rows(8, 1), 4)
            .await
            .unwrap();

        let calls = sheets.recorded();
        assert_eq!(calls.len(), 2);
        assert_eq!(
            calls.iter().map(|c| c.rows.len()).collect::<Vec<_>>(),
            vec![4, 4]
        );
    }

    #[tokio::test]
    async fn test_write_sheet_empty_stream_makes_no_calls() {
        let sheets = MockSheets::new(WriteBehaviour::Accept);
        let retry = policy();
        let writer = SheetWriter::new(&sheets, &retry, "doc1", "RAW");

        let written = writer
            .write_sheet("datos", Vec::new(), 4)
            .await
            .unwrap();

        assert_eq!(written, 0);
        assert!(sheets.recorded().is_empty());
    }

    #[tokio::test]
    async fn test_flush_empty_batch_is_noop() {
        let sheets = MockSheets::new(WriteBehaviour::Accept);
        let retry = policy();
        let writer = SheetWriter::new(&sheets, &retry, "doc1", "RAW");

        writer.flush("datos", 1, Vec::new()).await.unwrap();
        assert!(sheets.recorded().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_batch_bisects_to_single_rows_in_order() {
        let sheets = MockSheets::new(WriteBehaviour::RejectOversizedAbove(1));
        let retry = policy();
        let writer = SheetWriter::new(&sheets, &retry, "doc1", "RAW");

        writer
            .flush("datos", 1, numbered_rows(10, 1))
            .await
            .unwrap();

        let calls = sheets.recorded();
        // every row lands individually, covering 1..=10 in order
        assert_eq!(
            calls.iter().map(start_row_of).collect::<Vec<_>>(),
            (1..=10).collect::<Vec<_>>()
        );
        for (i, call) in calls.iter().enumerate() {
            assert_eq!(call.rows, vec![vec![json!((i + 1) * 10)]]);
        }
    }

    #[tokio::test]
    async fn test_oversized_recovery_at_intermediate_size() {
        // batches of up to 3 rows are accepted, so a batch of 10 splits
        // into 5+5, then 2+3 and 2+3
        let sheets = MockSheets::new(WriteBehaviour::RejectOversizedAbove(3));
        let retry = policy();
        let writer = SheetWriter::new(&sheets, &retry, "doc1", "RAW");

        writer
            .flush("datos", 1, numbered_rows(10, 1))
            .await
            .unwrap();

        let calls = sheets.recorded();
        assert_eq!(
            calls.iter().map(start_row_of).collect::<Vec<_>>(),
            vec![1, 3, 6, 8]
        );
        assert_eq!(
            calls.iter().map(|c| c.rows.len()).collect::<Vec<_>>(),
            vec![2, 3, 2, 3]
        );
    }

    #[tokio::test]
    async fn test_single_oversized_row_is_fatal() {
        let sheets = MockSheets::new(WriteBehaviour::RejectOversizedAbove(0));
        let retry = policy();
        let writer = SheetWriter::new(&sheets, &retry, "doc1", "RAW");

        let result = writer.flush("datos", 1, numbered_rows(1, 1)).await;
        assert!(matches!(
            result,
            Err(AppError::Remote { status: 413, .. })
        ));
        assert!(sheets.recorded().is_empty());
    }

    #[tokio::test]
    async fn test_non_size_failure_propagates() {
        let sheets = MockSheets::new(WriteBehaviour::FailWithStatus(403));
        let retry = policy();
        let writer = SheetWriter::new(&sheets, &retry, "doc1", "RAW");

        let result = writer.flush("datos", 1, numbered_rows(5, 1)).await;
        assert!(matches!(
            result,
            Err(AppError::Remote { status: 403, .. })
        ));
        // non-retryable, non-size: exactly one attempt
        assert_eq!(sheets.attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried_within_flush() {
        let sheets = MockSheets::new(WriteBehaviour::TransientFailures(2));
        let retry = policy();
        let writer = SheetWriter::new(&sheets, &retry, "doc1", "RAW");

        writer.flush("datos", 1, numbered_rows(3, 1)).await.unwrap();

        assert_eq!(sheets.attempts.load(Ordering::SeqCst), 3);
        assert_eq!(sheets.recorded().len(), 1);
    }

    #[tokio::test]
    async fn test_wide_sheet_scenario_caps_batches_at_hard_ceiling() {
        // 3 columns, 12_500 rows, 80_000-cell budget: the planner suggests
        // 5000 rows but the hard ceiling caps writes at 1000
        let sheets = MockSheets::new(WriteBehaviour::Accept);
        let retry = policy();
        let writer = SheetWriter::new(&sheets, &retry, "doc1", "RAW");

        let batch_size = choose_batch_size(3, 80_000);
        assert_eq!(batch_size, 5000);

        writer
            .write_sheet("mov_general", numbered_rows(12_500, 3), batch_size)
            .await
            .unwrap();

        let calls = sheets.recorded();
        assert_eq!(calls.len(), 13);
        assert_eq!(
            calls.iter().map(start_row_of).collect::<Vec<_>>(),
            (0..13).map(|i| 1 + i * 1000).collect::<Vec<_>>()
        );
        let mut sizes: Vec<usize> = calls.iter().map(|c| c.rows.len()).collect();
        let last = sizes.pop().unwrap();
        assert!(sizes.iter().all(|&s| s == 1000));
        assert_eq!(last, 500);
    }
}

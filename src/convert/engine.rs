use crate::chunk;
use crate::config::ConvertConfig;
use crate::convert::writer::SheetWriter;
use crate::drive::DriveOperations;
use crate::error::{AppError, Result};
use crate::retry::RetryPolicy;
use crate::sheets::{SheetInfo, SheetOperations, validate_sheet_title};
use crate::workbook::WorkbookReader;
use indicatif::ProgressStyle;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{Span, info, instrument, warn};
use tracing_indicatif::span_ext::IndicatifSpanExt;

/// Title Google gives the initial sheet of a fresh spreadsheet.
const DEFAULT_SHEET_TITLE: &str = "Sheet1";

/// Where the copied tabs should land.
#[derive(Debug, Clone, PartialEq)]
pub enum Destination {
    /// An existing spreadsheet, by id.
    Existing(String),
    /// A new spreadsheet, in the given folder or the source file's folder.
    NewInFolder(Option<String>),
}

#[derive(Debug, Clone)]
pub struct ConvertRequest {
    pub xlsx_file_id: String,
    pub selected_tabs: Vec<String>,
    pub destination: Destination,
    /// Title for a newly created spreadsheet; defaults to the source name.
    pub spreadsheet_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConvertOutcome {
    pub spreadsheet_id: String,
    pub url: String,
}

pub struct ConvertEngine<D, S> {
    config: ConvertConfig,
    drive: D,
    sheets: S,
    retry: RetryPolicy,
}

impl<D, S> ConvertEngine<D, S>
where
    D: DriveOperations + Sync,
    S: SheetOperations + Sync,
{
    pub fn new(config: ConvertConfig, drive: D, sheets: S) -> Self {
        let retry = RetryPolicy::new(
            config.max_retries,
            Duration::from_secs_f64(config.base_delay_secs),
        );
        Self {
            config,
            drive,
            sheets,
            retry,
        }
    }

    /// Copy the selected tabs from the source XLSX into the destination
    /// spreadsheet. Sheets are written strictly one after another; batches
    /// within a sheet are sequential.
    #[instrument(name = "Convert", skip_all, fields(file = %request.xlsx_file_id))]
    pub async fn convert(&self, request: &ConvertRequest) -> Result<ConvertOutcome> {
        if request.selected_tabs.is_empty() {
            return Err(AppError::Validation("No tabs selected".to_string()));
        }
        for tab in &request.selected_tabs {
            validate_sheet_title(tab)?;
        }

        let meta = self
            .retry
            .run(|| self.drive.get_file_metadata(&request.xlsx_file_id))
            .await?;

        // Resolve where the output goes before downloading anything, so
        // bad parameters fail fast.
        let plan = resolve_destination(request, &meta)?;

        let download = TempDownload::for_file(&meta.id);
        self.retry
            .run(|| self.drive.download_file(&meta.id, download.path()))
            .await?;

        let mut workbook = WorkbookReader::open(download.path())?;
        check_missing_tabs(&request.selected_tabs, &workbook.sheet_names())?;

        let (spreadsheet_id, created_new) = match plan {
            ResolvedDestination::Existing(id) => (id, false),
            ResolvedDestination::Create { folder_id, name } => {
                let id = self
                    .retry
                    .run(|| self.drive.create_spreadsheet(&name, &folder_id))
                    .await?;
                info!(spreadsheet_id = %id, name = %name, "Created destination spreadsheet");
                (id, true)
            }
        };

        // Also verifies the destination is accessible before any write.
        let existing = self
            .retry
            .run(|| self.sheets.get_document_sheets(&spreadsheet_id))
            .await?;

        let span = Span::current();
        span.pb_set_style(
            &ProgressStyle::with_template(
                "[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}",
            )
            .map_err(|e| AppError::Other(e.into()))?,
        );
        span.pb_set_message("Copying tabs");
        span.pb_set_length(request.selected_tabs.len() as u64);

        for tab in &request.selected_tabs {
            self.copy_tab(&mut workbook, &spreadsheet_id, &existing, tab)
                .await?;
            span.pb_inc(1);
        }

        if created_new {
            self.drop_default_sheet(&spreadsheet_id, &request.selected_tabs)
                .await?;
        }

        Ok(ConvertOutcome {
            url: spreadsheet_url(&spreadsheet_id),
            spreadsheet_id,
        })
    }

    #[instrument(name = "Copying tab", skip_all, fields(tab = %tab))]
    async fn copy_tab(
        &self,
        workbook: &mut WorkbookReader,
        spreadsheet_id: &str,
        existing: &[SheetInfo],
        tab: &str,
    ) -> Result<()> {
        let range = workbook.sheet(tab)?;
        let row_count = range.row_count();
        let column_count = range.column_count();

        match existing.iter().find(|sheet| sheet.title == tab) {
            Some(sheet) => {
                // Shrink or grow the existing grid to the source shape so
                // stale rows beyond the copied data don't survive.
                self.retry
                    .run(|| {
                        self.sheets.resize_sheet(
                            spreadsheet_id,
                            sheet.id,
                            row_count.max(1) as u32,
                            column_count.max(1) as u32,
                        )
                    })
                    .await?;
            }
            None => {
                self.retry
                    .run(|| self.sheets.add_sheet(spreadsheet_id, tab))
                    .await?;
            }
        }

        let batch_size =
            chunk::choose_batch_size(column_count as i64, self.config.target_cells_per_request);
        let writer = SheetWriter::new(
            &self.sheets,
            &self.retry,
            spreadsheet_id,
            &self.config.value_input_option,
        );
        let written = writer.write_sheet(tab, range.rows(), batch_size).await?;

        info!(rows = written, columns = column_count, "Tab copied");
        Ok(())
    }

    /// A freshly created spreadsheet comes with a default sheet; drop it
    /// unless the caller asked for a tab of the same name.
    async fn drop_default_sheet(&self, spreadsheet_id: &str, selected: &[String]) -> Result<()> {
        if selected.iter().any(|tab| tab == DEFAULT_SHEET_TITLE) {
            return Ok(());
        }

        let sheets = self
            .retry
            .run(|| self.sheets.get_document_sheets(spreadsheet_id))
            .await?;
        if let Some(default) = sheets.iter().find(|s| s.title == DEFAULT_SHEET_TITLE) {
            self.retry
                .run(|| self.sheets.delete_sheet(spreadsheet_id, default.id))
                .await?;
        }
        Ok(())
    }
}

enum ResolvedDestination {
    Existing(String),
    Create { folder_id: String, name: String },
}

fn resolve_destination(
    request: &ConvertRequest,
    meta: &crate::drive::FileMetadata,
) -> Result<ResolvedDestination> {
    match &request.destination {
        Destination::Existing(id) => Ok(ResolvedDestination::Existing(id.clone())),
        Destination::NewInFolder(folder) => {
            let folder_id = match folder {
                Some(id) => id.clone(),
                None => meta.parents.first().cloned().ok_or_else(|| {
                    AppError::Validation(format!(
                        "File '{}' has no accessible parent folder; pass a destination folder explicitly",
                        meta.name
                    ))
                })?,
            };
            let name = request
                .spreadsheet_name
                .clone()
                .unwrap_or_else(|| default_spreadsheet_name(&meta.name));
            Ok(ResolvedDestination::Create { folder_id, name })
        }
    }
}

fn spreadsheet_url(spreadsheet_id: &str) -> String {
    format!("https://docs.google.com/spreadsheets/d/{}", spreadsheet_id)
}

fn default_spreadsheet_name(file_name: &str) -> String {
    let base = Path::new(file_name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(file_name);
    format!("{} (selection)", base)
}

fn check_missing_tabs(selected: &[String], available: &[String]) -> Result<()> {
    let missing: Vec<&str> = selected
        .iter()
        .filter(|tab| !available.iter().any(|name| name == *tab))
        .map(String::as_str)
        .collect();

    if missing.is_empty() {
        return Ok(());
    }
    Err(AppError::Validation(format!(
        "Tabs not found in workbook: {:?}. Available: {:?}",
        missing, available
    )))
}

/// Transient local copy of the source file, deleted on every exit path.
struct TempDownload {
    path: PathBuf,
}

impl TempDownload {
    fn for_file(file_id: &str) -> Self {
        static SEQ: AtomicU64 = AtomicU64::new(0);
        let path = std::env::temp_dir().join(format!(
            "tabcopy-{}-{}-{}.xlsx",
            file_id,
            std::process::id(),
            SEQ.fetch_add(1, Ordering::Relaxed)
        ));
        Self { path }
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempDownload {
    fn drop(&mut self) {
        if self.path.exists() {
            if let Err(err) = std::fs::remove_file(&self.path) {
                warn!(path = ?self.path, error = %err, "Failed to remove downloaded file");
            }
        }
    }
}

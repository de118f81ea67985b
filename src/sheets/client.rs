use super::{SheetInfo, SheetOperations};
use crate::config::GoogleConfig;
use crate::error::{AppError, Result};
use crate::sheets::auth::create_and_verify_authenticator;
use async_trait::async_trait;
use google_sheets4::FieldMask;
use google_sheets4::api::{
    AddSheetRequest, BatchUpdateSpreadsheetRequest, DeleteSheetRequest, GridProperties, Request,
    Scope, SheetProperties, Sheets, UpdateSheetPropertiesRequest, ValueRange,
};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use serde_json::Value;
use tracing::instrument;

const AUTH_SCOPE: Scope = Scope::Spreadsheet;

pub struct SheetsClient {
    hub: Sheets<HttpsConnector<HttpConnector>>,
}

impl SheetsClient {
    /// Create a new SheetsClient with authenticated access
    #[instrument(name = "Authenticating to Google Sheets", skip_all)]
    pub async fn new(config: &GoogleConfig) -> Result<Self> {
        let auth = create_and_verify_authenticator(config).await?;

        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()
            .map_err(|e| AppError::Sheets(format!("Failed to load TLS roots: {}", e)))?
            .https_or_http()
            .enable_http1()
            .build();

        let client = Client::builder(hyper_util::rt::TokioExecutor::new()).build(connector);
        let hub = Sheets::new(client, auth);

        Ok(Self { hub })
    }

    async fn batch_update(
        &self,
        spreadsheet_id: &str,
        requests: Vec<Request>,
        context: &str,
    ) -> Result<google_sheets4::api::BatchUpdateSpreadsheetResponse> {
        let batch_update = BatchUpdateSpreadsheetRequest {
            requests: Some(requests),
            ..Default::default()
        };

        let (_, response) = self
            .hub
            .spreadsheets()
            .batch_update(batch_update, spreadsheet_id)
            .add_scope(AUTH_SCOPE)
            .doit()
            .await
            .map_err(|e| classify(context, e))?;

        Ok(response)
    }
}

fn sheet_info(properties: SheetProperties) -> SheetInfo {
    let grid = properties.grid_properties.unwrap_or_default();
    SheetInfo {
        id: properties.sheet_id.unwrap_or_default(),
        title: properties.title.unwrap_or_default(),
        row_count: grid.row_count.unwrap_or_default().max(0) as u32,
        column_count: grid.column_count.unwrap_or_default().max(0) as u32,
    }
}

/// Map a Sheets API error into the crate taxonomy, preserving the HTTP
/// status and body so retry and size-rejection classification can read them.
fn classify(context: &str, err: google_sheets4::Error) -> AppError {
    match err {
        google_sheets4::Error::BadRequest(body) => {
            let status = body
                .pointer("/error/code")
                .and_then(Value::as_u64)
                .unwrap_or(400) as u16;
            AppError::Remote {
                api: "Sheets",
                status,
                body: format!("{}: {}", context, body),
            }
        }
        google_sheets4::Error::Failure(response) => AppError::Remote {
            api: "Sheets",
            status: response.status().as_u16(),
            body: context.to_string(),
        },
        other => AppError::Sheets(format!("{}: {}", context, other)),
    }
}

#[async_trait]
impl SheetOperations for SheetsClient {
    #[instrument(name = "Fetching spreadsheet sheets", skip(self))]
    async fn get_document_sheets(&self, spreadsheet_id: &str) -> Result<Vec<SheetInfo>> {
        let (_, spreadsheet) = self
            .hub
            .spreadsheets()
            .get(spreadsheet_id)
            .include_grid_data(false)
            .add_scope(AUTH_SCOPE)
            .doit()
            .await
            .map_err(|e| classify("Failed to get spreadsheet", e))?;

        Ok(spreadsheet
            .sheets
            .unwrap_or_default()
            .into_iter()
            .filter_map(|sheet| sheet.properties)
            .map(sheet_info)
            .collect())
    }

    #[instrument(name = "Adding sheet", skip(self))]
    async fn add_sheet(&self, spreadsheet_id: &str, title: &str) -> Result<SheetInfo> {
        let request = Request {
            add_sheet: Some(AddSheetRequest {
                properties: Some(SheetProperties {
                    title: Some(title.to_string()),
                    sheet_type: Some("GRID".to_string()),
                    ..Default::default()
                }),
            }),
            ..Default::default()
        };

        let response = self
            .batch_update(spreadsheet_id, vec![request], "Failed to add sheet")
            .await?;

        let properties = response
            .replies
            .and_then(|replies| replies.into_iter().next())
            .and_then(|reply| reply.add_sheet)
            .and_then(|add_sheet| add_sheet.properties)
            .ok_or_else(|| {
                AppError::Sheets("Add sheet response is missing sheet properties".to_string())
            })?;

        Ok(sheet_info(properties))
    }

    #[instrument(name = "Deleting sheet", skip(self))]
    async fn delete_sheet(&self, spreadsheet_id: &str, sheet_id: i32) -> Result<()> {
        let request = Request {
            delete_sheet: Some(DeleteSheetRequest {
                sheet_id: Some(sheet_id),
            }),
            ..Default::default()
        };

        self.batch_update(spreadsheet_id, vec![request], "Failed to delete sheet")
            .await?;
        Ok(())
    }

    #[instrument(name = "Resizing sheet", skip(self))]
    async fn resize_sheet(
        &self,
        spreadsheet_id: &str,
        sheet_id: i32,
        row_count: u32,
        column_count: u32,
    ) -> Result<()> {
        let request = Request {
            update_sheet_properties: Some(UpdateSheetPropertiesRequest {
                properties: Some(SheetProperties {
                    sheet_id: Some(sheet_id),
                    grid_properties: Some(GridProperties {
                        row_count: Some(row_count.max(1) as i32),
                        column_count: Some(column_count.max(1) as i32),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                fields: Some(FieldMask::new(&[
                    "gridProperties.rowCount",
                    "gridProperties.columnCount",
                ])),
            }),
            ..Default::default()
        };

        self.batch_update(spreadsheet_id, vec![request], "Failed to resize sheet")
            .await?;
        Ok(())
    }

    #[instrument(name = "Writing range", skip(self, values), fields(rows = values.len()))]
    async fn write_range(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: &[Vec<Value>],
        value_input_option: &str,
    ) -> Result<()> {
        let value_range = ValueRange {
            major_dimension: Some("ROWS".to_string()),
            range: Some(range.to_string()),
            values: Some(values.to_vec()),
        };

        self.hub
            .spreadsheets()
            .values_update(value_range, spreadsheet_id, range)
            .value_input_option(value_input_option)
            .add_scope(AUTH_SCOPE)
            .doit()
            .await
            .map_err(|e| classify("Failed to write values", e))?;

        Ok(())
    }
}

use super::{DriveOperations, FileMetadata};
use crate::config::GoogleConfig;
use crate::error::{AppError, Result};
use crate::sheets::auth::create_and_verify_authenticator;
use async_trait::async_trait;
use google_drive3::api::{DriveHub, File, Scope};
use http_body_util::BodyExt;
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use indicatif::ProgressStyle;
use serde_json::Value;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::{Span, debug, instrument};
use tracing_indicatif::span_ext::IndicatifSpanExt;

const AUTH_SCOPE: Scope = Scope::Full;

const SPREADSHEET_MIME_TYPE: &str = "application/vnd.google-apps.spreadsheet";

pub struct DriveClient {
    hub: DriveHub<HttpsConnector<HttpConnector>>,
}

impl DriveClient {
    /// Create a new DriveClient with authenticated access
    #[instrument(name = "Authenticating to Google Drive", skip_all)]
    pub async fn new(config: &GoogleConfig) -> Result<Self> {
        let auth = create_and_verify_authenticator(config).await?;

        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()
            .map_err(|e| AppError::Drive(format!("Failed to load TLS roots: {}", e)))?
            .https_or_http()
            .enable_http1()
            .build();

        let client = Client::builder(hyper_util::rt::TokioExecutor::new()).build(connector);
        let hub = DriveHub::new(client, auth);

        Ok(Self { hub })
    }
}

/// Map a Drive API error into the crate taxonomy, preserving the HTTP
/// status and body for retry classification.
fn classify(context: &str, err: google_drive3::Error) -> AppError {
    match err {
        google_drive3::Error::BadRequest(body) => {
            let status = body
                .pointer("/error/code")
                .and_then(Value::as_u64)
                .unwrap_or(400) as u16;
            AppError::Remote {
                api: "Drive",
                status,
                body: format!("{}: {}", context, body),
            }
        }
        google_drive3::Error::Failure(response) => AppError::Remote {
            api: "Drive",
            status: response.status().as_u16(),
            body: context.to_string(),
        },
        other => AppError::Drive(format!("{}: {}", context, other)),
    }
}

#[async_trait]
impl DriveOperations for DriveClient {
    #[instrument(name = "Fetching file metadata", skip(self))]
    async fn get_file_metadata(&self, file_id: &str) -> Result<FileMetadata> {
        let (_, file) = self
            .hub
            .files()
            .get(file_id)
            .param("fields", "id,name,parents,mimeType,size")
            .supports_all_drives(true)
            .add_scope(AUTH_SCOPE)
            .doit()
            .await
            .map_err(|e| classify("Failed to get file metadata", e))?;

        Ok(FileMetadata {
            id: file.id.unwrap_or_else(|| file_id.to_string()),
            name: file.name.unwrap_or_default(),
            mime_type: file.mime_type.unwrap_or_default(),
            parents: file.parents.unwrap_or_default(),
            size: file.size,
        })
    }

    #[instrument(name = "Downloading workbook", skip(self, dest))]
    async fn download_file(&self, file_id: &str, dest: &Path) -> Result<()> {
        let (response, _) = self
            .hub
            .files()
            .get(file_id)
            .supports_all_drives(true)
            .param("alt", "media")
            .add_scope(AUTH_SCOPE)
            .doit()
            .await
            .map_err(|e| classify("Failed to download file", e))?;

        let span = Span::current();
        span.pb_set_style(
            &ProgressStyle::with_template(
                "[{elapsed_precise}] {bar:40.cyan/blue} {bytes:>10}/{total_bytes:10} {msg}",
            )
            .map_err(|e| AppError::Other(e.into()))?,
        );
        span.pb_set_message("Downloading XLSX");
        if let Some(total) = response
            .headers()
            .get("content-length")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
        {
            span.pb_set_length(total);
        }

        // Truncate any partial copy from a previous attempt
        let mut file = tokio::fs::File::create(dest).await?;
        let mut body = response.into_body();
        let mut written = 0u64;

        while let Some(next) = body.frame().await {
            let frame =
                next.map_err(|e| AppError::Drive(format!("Download stream failed: {}", e)))?;
            if let Some(data) = frame.data_ref() {
                file.write_all(data).await?;
                written += data.len() as u64;
                span.pb_inc(data.len() as u64);
            }
        }
        file.flush().await?;

        debug!(bytes = written, path = ?dest, "Download completed");
        Ok(())
    }

    #[instrument(name = "Creating spreadsheet", skip(self))]
    async fn create_spreadsheet(&self, name: &str, folder_id: &str) -> Result<String> {
        let metadata = File {
            name: Some(name.to_string()),
            mime_type: Some(SPREADSHEET_MIME_TYPE.to_string()),
            parents: Some(vec![folder_id.to_string()]),
            ..Default::default()
        };

        let mime_type = SPREADSHEET_MIME_TYPE
            .parse()
            .map_err(|e| AppError::Drive(format!("Invalid MIME type: {}", e)))?;

        // Metadata-only create: Drive's create call is an upload endpoint,
        // so it takes an empty content stream.
        let (_, created) = self
            .hub
            .files()
            .create(metadata)
            .param("fields", "id")
            .supports_all_drives(true)
            .add_scope(AUTH_SCOPE)
            .upload(std::io::Cursor::new(Vec::new()), mime_type)
            .await
            .map_err(|e| classify("Failed to create spreadsheet", e))?;

        created
            .id
            .ok_or_else(|| AppError::Drive("Created spreadsheet has empty ID".to_string()))
    }
}

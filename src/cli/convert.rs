use crate::config::Config;
use crate::convert::{ConvertEngine, ConvertRequest, Destination};
use crate::drive::DriveClient;
use crate::error::Result;
use crate::sheets::SheetsClient;
use clap::Args;
use tracing::info;
use url::Url;

#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Source XLSX file: a Drive file ID or URL
    #[arg(long)]
    pub file: String,

    /// Tab titles to copy, comma-separated
    #[arg(long, value_delimiter = ',', required = true)]
    pub tabs: Vec<String>,

    /// Existing destination spreadsheet: an ID or URL. Omit to create a new one.
    #[arg(long, conflicts_with_all = ["folder", "name"])]
    pub spreadsheet: Option<String>,

    /// Folder ID for a new spreadsheet (defaults to the source file's folder)
    #[arg(long)]
    pub folder: Option<String>,

    /// Title for a new spreadsheet (defaults to the source file name)
    #[arg(long)]
    pub name: Option<String>,

    /// How Sheets should interpret the written values (RAW or USER_ENTERED)
    #[arg(long)]
    pub value_input_option: Option<String>,
}

impl ConvertArgs {
    pub async fn execute(&self) -> Result<()> {
        let mut config = Config::load()?;
        if let Some(option) = &self.value_input_option {
            config.convert.value_input_option = option.clone();
        }

        let drive = DriveClient::new(&config.google).await?;
        let sheets = SheetsClient::new(&config.google).await?;

        let request = ConvertRequest {
            xlsx_file_id: extract_drive_id(&self.file),
            selected_tabs: self.tabs.clone(),
            destination: match &self.spreadsheet {
                Some(spreadsheet) => Destination::Existing(extract_drive_id(spreadsheet)),
                None => Destination::NewInFolder(self.folder.clone()),
            },
            spreadsheet_name: self.name.clone(),
        };

        let engine = ConvertEngine::new(config.convert, drive, sheets);
        let outcome = engine.convert(&request).await?;

        info!(url = %outcome.url, "Conversion completed");

        Ok(())
    }
}

/// Accept a bare Drive/Sheets ID, or a full URL of the `/d/{id}` or
/// `?id={id}` shape, and return the ID.
pub(crate) fn extract_drive_id(input: &str) -> String {
    let Ok(url) = Url::parse(input) else {
        return input.to_string();
    };

    if let Some(segments) = url.path_segments() {
        let segments: Vec<&str> = segments.collect();
        if let Some(pos) = segments.iter().position(|s| *s == "d") {
            if let Some(id) = segments.get(pos + 1).filter(|id| !id.is_empty()) {
                return (*id).to_string();
            }
        }
    }

    if let Some((_, id)) = url.query_pairs().find(|(key, _)| key == "id") {
        return id.into_owned();
    }

    input.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_id_passes_through() {
        assert_eq!(extract_drive_id("1AbCdEfG"), "1AbCdEfG");
    }

    #[test]
    fn test_sheets_url() {
        assert_eq!(
            extract_drive_id("https://docs.google.com/spreadsheets/d/1AbCdEfG/edit#gid=0"),
            "1AbCdEfG"
        );
    }

    #[test]
    fn test_drive_file_url() {
        assert_eq!(
            extract_drive_id("https://drive.google.com/file/d/1AbCdEfG/view"),
            "1AbCdEfG"
        );
    }

    #[test]
    fn test_open_link_with_query_param() {
        assert_eq!(
            extract_drive_id("https://drive.google.com/open?id=1AbCdEfG"),
            "1AbCdEfG"
        );
    }

    #[test]
    fn test_unrecognized_url_passes_through() {
        assert_eq!(
            extract_drive_id("https://example.com/whatever"),
            "https://example.com/whatever"
        );
    }
}

mod client;

pub use client::DriveClient;

use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Metadata of a Drive file, as much of it as the pipeline needs.
#[derive(Debug, Clone, PartialEq)]
pub struct FileMetadata {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub parents: Vec<String>,
    pub size: Option<i64>,
}

#[async_trait]
pub trait DriveOperations {
    async fn get_file_metadata(&self, file_id: &str) -> Result<FileMetadata>;

    /// Stream the file's content to `dest`, truncating any previous copy.
    async fn download_file(&self, file_id: &str, dest: &Path) -> Result<()>;

    /// Create an empty Google Sheets document inside `folder_id`, returning
    /// its spreadsheet id.
    async fn create_spreadsheet(&self, name: &str, folder_id: &str) -> Result<String>;
}

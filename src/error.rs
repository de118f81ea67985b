use thiserror::Error;

/// Body fragments that identify an oversized write request even when the
/// service reports it with a generic status code.
const PAYLOAD_TOO_LARGE_PATTERNS: [&str; 3] = [
    "request payload size exceeds",
    "payload exceeds limit",
    "entity too large",
];

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{api} API error (status {status}): {body}")]
    Remote {
        api: &'static str,
        status: u16,
        body: String,
    },

    #[error("Google Drive API error: {0}")]
    Drive(String),

    #[error("Google Sheets API error: {0}")]
    Sheets(String),

    #[error("Workbook error: {0}")]
    Workbook(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("OAuth2 authentication error: {0}")]
    Auth(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// HTTP status of a classified remote failure, if one was captured.
    pub fn status(&self) -> Option<u16> {
        match self {
            AppError::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the remote service rejected a request for being oversized.
    ///
    /// The Sheets API reports this either as a 413 or as a 400 whose body
    /// describes the payload limit, so both are checked.
    pub fn is_payload_too_large(&self) -> bool {
        let text = match self {
            AppError::Remote { status: 413, .. } => return true,
            AppError::Remote { body, .. } => body,
            AppError::Drive(message) | AppError::Sheets(message) => message,
            _ => return false,
        };
        let text = text.to_lowercase();
        PAYLOAD_TOO_LARGE_PATTERNS
            .iter()
            .any(|pattern| text.contains(pattern))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_only_on_remote() {
        let remote = AppError::Remote {
            api: "Sheets",
            status: 429,
            body: "rate limited".to_string(),
        };
        assert_eq!(remote.status(), Some(429));
        assert_eq!(AppError::Validation("bad".to_string()).status(), None);
        assert_eq!(AppError::Sheets("boom".to_string()).status(), None);
    }

    #[test]
    fn test_payload_too_large_by_status() {
        let err = AppError::Remote {
            api: "Sheets",
            status: 413,
            body: String::new(),
        };
        assert!(err.is_payload_too_large());
    }

    #[test]
    fn test_payload_too_large_by_body_text() {
        let err = AppError::Remote {
            api: "Sheets",
            status: 400,
            body: "Request payload size exceeds the limit: 10485760 bytes.".to_string(),
        };
        assert!(err.is_payload_too_large());

        let err = AppError::Sheets("413 Entity Too Large".to_string());
        assert!(err.is_payload_too_large());
    }

    #[test]
    fn test_other_errors_are_not_payload_too_large() {
        let err = AppError::Remote {
            api: "Sheets",
            status: 400,
            body: "Invalid range".to_string(),
        };
        assert!(!err.is_payload_too_large());
        assert!(!AppError::Validation("nope".to_string()).is_payload_too_large());
    }
}

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by a remote service while uploading or registering a single item.
///
/// Every variant is a counted failure from the point of view of the uploader:
/// recognized-transient and duplicate responses are reported through
/// [`crate::service::UploadOutcome`] and [`crate::service::RegisterOutcome`]
/// instead of through this type.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Request to remote service failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Remote service responded with {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Upload response did not contain an identifier: {0}")]
    MissingIdentifier(String),
    #[error("Failed to read local file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to deserialize remote service response: {0}")]
    Deserialization(String),
}

/// Custom error types for a batch upload campaign.
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Ledger '{path}' could not be accessed: {source}")]
    Ledger {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to scan source directory '{path}': {message}")]
    Discovery { path: PathBuf, message: String },
    #[error("File not found at '{0}'; the ledger and the filesystem disagree")]
    MissingFile(PathBuf),
    #[error("Too many errors ({failures}), stopping")]
    TooManyFailures { failures: u32 },
    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl UploadError {
    /// Wraps an I/O error raised while touching a ledger file.
    pub fn ledger(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        UploadError::Ledger {
            path: path.into(),
            source,
        }
    }
}

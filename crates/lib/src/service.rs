//! # Remote Service Contract
//!
//! A knowledge-base service is reduced to two operations, upload-one and
//! register-one. Each service plugin supplies its endpoint shapes and identifier
//! extraction; the response classification shared by all of them lives here.

use crate::constants::{DUPLICATE_CONTENT_MARKER, STREAM_TIMEOUT_MARKER};
use crate::errors::ServiceError;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use std::path::Path;

/// The result of one upload call that did not fail outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// The service accepted the file and assigned it this identifier.
    Uploaded(String),
    /// The service reported a recognized transient condition; the item is skipped.
    Transient(String),
}

/// The result of one registration call that did not fail outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    Registered,
    /// The service already holds this content. Treated as a successful registration.
    Duplicate,
}

/// The contract a remote knowledge-base service implements for the batch uploader.
#[async_trait]
pub trait RemoteService: Send + Sync {
    /// A short name used in log lines.
    fn name(&self) -> &str;

    /// Uploads the file at `path` and returns the identifier the service assigned.
    async fn upload_one(&self, path: &Path) -> Result<UploadOutcome, ServiceError>;

    /// Attaches an uploaded identifier to the campaign's target collection or dataset.
    async fn register_one(&self, id: &str) -> Result<RegisterOutcome, ServiceError>;
}

/// Classifies an upload response.
///
/// `extract_id` pulls the identifier out of the parsed body; it differs per service.
pub fn classify_upload<F>(status: u16, body: &str, extract_id: F) -> Result<UploadOutcome, ServiceError>
where
    F: FnOnce(&Value) -> Option<String>,
{
    if !(200..300).contains(&status) {
        return Err(ServiceError::Status {
            status,
            body: body.to_string(),
        });
    }

    let id = serde_json::from_str::<Value>(body)
        .ok()
        .as_ref()
        .and_then(extract_id)
        .filter(|id| !id.is_empty());

    match id {
        Some(id) => Ok(UploadOutcome::Uploaded(id)),
        None if is_stream_timeout(body) => Ok(UploadOutcome::Transient(body.to_string())),
        None => Err(ServiceError::MissingIdentifier(body.to_string())),
    }
}

/// Classifies a registration response. A 400 carrying the duplicate-content marker
/// counts as success.
pub fn classify_registration(status: u16, body: &str) -> Result<RegisterOutcome, ServiceError> {
    if (200..300).contains(&status) {
        Ok(RegisterOutcome::Registered)
    } else if status == 400 && body.contains(DUPLICATE_CONTENT_MARKER) {
        Ok(RegisterOutcome::Duplicate)
    } else {
        Err(ServiceError::Status {
            status,
            body: body.to_string(),
        })
    }
}

pub fn is_stream_timeout(body: &str) -> bool {
    body.to_lowercase().contains(STREAM_TIMEOUT_MARKER)
}

/// Builds the multipart form both services expect: one `file` part named after the
/// work item path.
pub async fn file_form(path: &Path, mime: Option<&str>) -> Result<Form, ServiceError> {
    let bytes = tokio::fs::read(path).await?;
    let mut part = Part::bytes(bytes).file_name(path.to_string_lossy().into_owned());
    if let Some(mime) = mime {
        part = part.mime_str(mime)?;
    }
    Ok(Form::new().part("file", part))
}

/// Reads a JSON value as an identifier string. Numeric identifiers are accepted.
pub fn id_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

//! # `kbload-webui`: WebUI Document Store Plugin
//!
//! This crate implements the `RemoteService` trait for the WebUI document store.
//! Files are uploaded to `/api/v1/files/` and then attached to a knowledge
//! collection through `/api/v1/knowledge/{collection_id}/file/add`.

use async_trait::async_trait;
use kbload::service::{classify_registration, classify_upload, file_form, id_from_value};
use kbload::{RegisterOutcome, RemoteService, ServiceError, UploadOutcome, UploaderConfig};
use reqwest::Client as ReqwestClient;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

const FILES_ENDPOINT: &str = "/api/v1/files/";

#[derive(Serialize, Debug)]
struct AddFileRequest<'a> {
    file_id: &'a str,
}

/// A client for the WebUI files and knowledge endpoints.
#[derive(Clone, Debug)]
pub struct WebUiService {
    client: ReqwestClient,
    base_url: String,
    api_key: String,
    collection_id: String,
    upload_timeout: Option<Duration>,
    register_timeout: Duration,
}

impl WebUiService {
    /// Creates a new `WebUiService` targeting the collection in `config.target_id`.
    pub fn new(config: &UploaderConfig) -> Result<Self, ServiceError> {
        let client = ReqwestClient::builder().build()?;
        Ok(Self {
            client,
            base_url: config.trimmed_base_url().to_string(),
            api_key: config.api_key.clone(),
            collection_id: config.target_id.clone(),
            upload_timeout: config.http.upload_timeout(),
            register_timeout: config.http.register_timeout(),
        })
    }

    fn upload_url(&self) -> String {
        format!("{}{FILES_ENDPOINT}", self.base_url)
    }

    fn add_file_url(&self) -> String {
        format!(
            "{}/api/v1/knowledge/{}/file/add",
            self.base_url, self.collection_id
        )
    }
}

#[async_trait]
impl RemoteService for WebUiService {
    fn name(&self) -> &str {
        "webui"
    }

    async fn upload_one(&self, path: &Path) -> Result<UploadOutcome, ServiceError> {
        let url = self.upload_url();
        info!("Sending POST request to: {url}");

        let form = file_form(path, Some("text/plain")).await?;
        let mut request = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form);
        if let Some(timeout) = self.upload_timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        debug!(status, body = %body, "<-- WebUI upload response");

        classify_upload(status, &body, |json| json.get("id").and_then(id_from_value))
    }

    async fn register_one(&self, id: &str) -> Result<RegisterOutcome, ServiceError> {
        let response = self
            .client
            .post(self.add_file_url())
            .bearer_auth(&self.api_key)
            .timeout(self.register_timeout)
            .json(&AddFileRequest { file_id: id })
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        debug!(status, body = %body, "<-- WebUI add-file response");

        classify_registration(status, &body)
    }
}

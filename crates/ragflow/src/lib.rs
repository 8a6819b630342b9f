//! # `kbload-ragflow`: RAGFlow Dataset Plugin
//!
//! This crate implements the `RemoteService` trait for RAGFlow. Documents are
//! uploaded into a dataset through `/api/v1/datasets/{id}/documents` and then
//! queued for chunking through `/api/v1/datasets/{id}/chunks`. It also provides
//! a helper to create the dataset a campaign targets.

use async_trait::async_trait;
use kbload::service::{classify_registration, classify_upload, file_form, id_from_value};
use kbload::{RegisterOutcome, RemoteService, ServiceError, UploadOutcome, UploaderConfig};
use reqwest::Client as ReqwestClient;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, info};

const DATASET_CREATE_TIMEOUT: Duration = Duration::from_secs(10);

// --- RAGFlow request structures ---

#[derive(Serialize, Debug)]
struct ChunkRequest<'a> {
    document_ids: [&'a str; 1],
}

/// The body of `POST /api/v1/datasets`.
#[derive(Serialize, Debug, Clone)]
pub struct DatasetRequest {
    pub name: String,
    pub description: String,
    pub embedding_model: String,
    /// Either `me` or `team`.
    pub permission: String,
    pub chunk_method: String,
    pub pagerank: u32,
    pub parser_config: ParserConfig,
}

impl DatasetRequest {
    /// A request with the defaults used for document campaigns.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: "Dataset created by kbload".to_string(),
            embedding_model: "BAAI/bge-large-zh-v1.5@BAAI".to_string(),
            permission: "me".to_string(),
            chunk_method: "naive".to_string(),
            pagerank: 0,
            parser_config: ParserConfig::default(),
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct ParserConfig {
    pub auto_keywords: u32,
    pub auto_questions: u32,
    pub chunk_token_num: u32,
    pub delimiter: String,
    pub html4excel: bool,
    pub layout_recognize: String,
    pub tag_kb_ids: Vec<String>,
    pub task_page_size: u32,
    pub raptor: RaptorConfig,
    pub graphrag: GraphRagConfig,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            auto_keywords: 0,
            auto_questions: 0,
            chunk_token_num: 1000,
            delimiter: "\n".to_string(),
            html4excel: false,
            layout_recognize: "DeepDOC".to_string(),
            tag_kb_ids: Vec::new(),
            task_page_size: 12,
            raptor: RaptorConfig::default(),
            graphrag: GraphRagConfig::default(),
        }
    }
}

#[derive(Serialize, Debug, Clone, Default)]
pub struct RaptorConfig {
    pub use_raptor: bool,
}

#[derive(Serialize, Debug, Clone, Default)]
pub struct GraphRagConfig {
    pub use_graphrag: bool,
}

// --- RAGFlow Service implementation ---

/// A client for the RAGFlow dataset endpoints.
#[derive(Clone, Debug)]
pub struct RagflowService {
    client: ReqwestClient,
    base_url: String,
    api_key: String,
    dataset_id: String,
    upload_timeout: Option<Duration>,
    register_timeout: Duration,
}

impl RagflowService {
    /// Creates a new `RagflowService` targeting the dataset in `config.target_id`.
    pub fn new(config: &UploaderConfig) -> Result<Self, ServiceError> {
        let client = ReqwestClient::builder().build()?;
        Ok(Self {
            client,
            base_url: config.trimmed_base_url().to_string(),
            api_key: config.api_key.clone(),
            dataset_id: config.target_id.clone(),
            upload_timeout: config.http.upload_timeout(),
            register_timeout: config.http.register_timeout(),
        })
    }

    fn dataset_url(&self, suffix: &str) -> String {
        format!(
            "{}/api/v1/datasets/{}/{suffix}",
            self.base_url, self.dataset_id
        )
    }

    /// Creates a dataset and returns its identifier.
    ///
    /// The identifier is read from a top-level `id` or from `data.id`, since the
    /// service wraps most responses in a `{"code", "data"}` envelope.
    pub async fn create_dataset(&self, request: &DatasetRequest) -> Result<String, ServiceError> {
        let url = format!("{}/api/v1/datasets", self.base_url);
        info!("Creating dataset '{}' at {url}", request.name);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .timeout(DATASET_CREATE_TIMEOUT)
            .json(request)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            error!("HTTP error {status}: {body}");
            return Err(ServiceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let json: Value = serde_json::from_str(&body)
            .map_err(|e| ServiceError::Deserialization(e.to_string()))?;
        let dataset_id = json
            .get("id")
            .or_else(|| json.pointer("/data/id"))
            .and_then(id_from_value)
            .ok_or_else(|| ServiceError::MissingIdentifier(body.clone()))?;

        info!("Dataset created: {dataset_id}");
        debug!(response = %body, "<-- RAGFlow dataset response");
        Ok(dataset_id)
    }
}

#[async_trait]
impl RemoteService for RagflowService {
    fn name(&self) -> &str {
        "ragflow"
    }

    async fn upload_one(&self, path: &Path) -> Result<UploadOutcome, ServiceError> {
        let form = file_form(path, None).await?;
        let mut request = self
            .client
            .post(self.dataset_url("documents"))
            .bearer_auth(&self.api_key)
            .multipart(form);
        if let Some(timeout) = self.upload_timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        debug!(status, body = %body, "<-- RAGFlow upload response");

        classify_upload(status, &body, |json| {
            json.pointer("/data/0/id").and_then(id_from_value)
        })
    }

    async fn register_one(&self, id: &str) -> Result<RegisterOutcome, ServiceError> {
        let response = self
            .client
            .post(self.dataset_url("chunks"))
            .bearer_auth(&self.api_key)
            .timeout(self.register_timeout)
            .json(&ChunkRequest { document_ids: [id] })
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        debug!(status, body = %body, "<-- RAGFlow chunk response");

        classify_registration(status, &body)
    }
}

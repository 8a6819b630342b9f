//! # Campaign Configuration
//!
//! This module defines the configuration of one upload campaign. Every setting
//! that drives discovery, the ledgers, the retry policy and the service
//! endpoints is carried here and passed explicitly into the uploader stages.

use crate::constants::*;
use crate::errors::UploadError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The remote knowledge-base service a campaign targets.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    /// The WebUI document store (`/api/v1/files/` + `/knowledge/{id}/file/add`).
    Webui,
    /// The RAGFlow dataset service (`/datasets/{id}/documents` + `/datasets/{id}/chunks`).
    Ragflow,
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceKind::Webui => write!(f, "webui"),
            ServiceKind::Ragflow => write!(f, "ragflow"),
        }
    }
}

/// The root configuration structure, mapping directly to `kbload.yml`.
#[derive(Debug, Deserialize, Clone)]
pub struct UploaderConfig {
    pub service: ServiceKind,
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    /// The collection (WebUI) or dataset (RAGFlow) files are registered into.
    #[serde(default)]
    pub target_id: String,
    /// A human-readable name for the target, used only in log lines.
    #[serde(default)]
    pub target_name: Option<String>,
    /// The directory scanned for work items on the first run of a campaign.
    #[serde(default)]
    pub source_dir: PathBuf,
    #[serde(default = "default_excluded_extension")]
    pub excluded_extension: String,
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

fn default_excluded_extension() -> String {
    DEFAULT_EXCLUDED_EXTENSION.to_string()
}

fn default_log_file() -> PathBuf {
    PathBuf::from(DEFAULT_LOG_FILE)
}

/// File names of the progress ledgers, resolved against `dir`.
#[derive(Debug, Deserialize, Clone)]
pub struct LedgerConfig {
    #[serde(default = "default_ledger_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_file_list")]
    pub file_list: String,
    #[serde(default = "default_uploaded")]
    pub uploaded: String,
    #[serde(default = "default_completed")]
    pub completed: String,
    #[serde(default = "default_errored")]
    pub errored: String,
}

fn default_ledger_dir() -> PathBuf {
    PathBuf::from(".")
}
fn default_file_list() -> String {
    DEFAULT_FILE_LIST.to_string()
}
fn default_uploaded() -> String {
    DEFAULT_UPLOADED.to_string()
}
fn default_completed() -> String {
    DEFAULT_COMPLETED.to_string()
}
fn default_errored() -> String {
    DEFAULT_ERRORED.to_string()
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            dir: default_ledger_dir(),
            file_list: default_file_list(),
            uploaded: default_uploaded(),
            completed: default_completed(),
            errored: default_errored(),
        }
    }
}

impl LedgerConfig {
    pub fn file_list_path(&self) -> PathBuf {
        self.dir.join(&self.file_list)
    }

    pub fn uploaded_path(&self) -> PathBuf {
        self.dir.join(&self.uploaded)
    }

    /// The companion log holding the source path of every uploaded identifier.
    pub fn uploaded_paths_path(&self) -> PathBuf {
        self.dir.join(format!("{}{PATH_LOG_SUFFIX}", self.uploaded))
    }

    pub fn completed_path(&self) -> PathBuf {
        self.dir.join(&self.completed)
    }

    pub fn errored_path(&self) -> PathBuf {
        self.dir.join(&self.errored)
    }
}

/// Failure accounting shared by the upload and registration stages.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct RetryPolicy {
    /// The run aborts once the failure counter exceeds this value.
    #[serde(default = "default_max_failures")]
    pub max_failures: u32,
    /// Time units slept per accumulated failure.
    #[serde(default = "default_backoff_units")]
    pub backoff_units: u64,
    /// Reset the failure counter after a successful call.
    #[serde(default = "default_true")]
    pub reset_on_success: bool,
    /// Count recognized-transient upload skips (stream timeouts) as failures.
    #[serde(default)]
    pub count_transient: bool,
}

fn default_max_failures() -> u32 {
    DEFAULT_MAX_FAILURES
}
fn default_backoff_units() -> u64 {
    DEFAULT_BACKOFF_UNITS
}
fn default_true() -> bool {
    true
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_failures: default_max_failures(),
            backoff_units: default_backoff_units(),
            reset_on_success: true,
            count_transient: false,
        }
    }
}

/// The length of a time unit and the fixed pause before each network call.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct TimingConfig {
    #[serde(default = "default_time_unit_ms")]
    pub time_unit_ms: u64,
    #[serde(default = "default_rate_limit_units")]
    pub rate_limit_units: u64,
}

fn default_time_unit_ms() -> u64 {
    DEFAULT_TIME_UNIT_MS
}
fn default_rate_limit_units() -> u64 {
    DEFAULT_RATE_LIMIT_UNITS
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            time_unit_ms: default_time_unit_ms(),
            rate_limit_units: default_rate_limit_units(),
        }
    }
}

impl TimingConfig {
    pub fn time_unit(&self) -> Duration {
        Duration::from_millis(self.time_unit_ms)
    }

    pub fn rate_limit_delay(&self) -> Duration {
        self.time_unit()
            .saturating_mul(u32::try_from(self.rate_limit_units).unwrap_or(u32::MAX))
    }
}

/// Network timeouts. The upload call has none unless one is configured.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct HttpConfig {
    #[serde(default)]
    pub upload_timeout_secs: Option<u64>,
    #[serde(default = "default_register_timeout_secs")]
    pub register_timeout_secs: u64,
}

fn default_register_timeout_secs() -> u64 {
    DEFAULT_REGISTER_TIMEOUT_SECS
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            upload_timeout_secs: None,
            register_timeout_secs: default_register_timeout_secs(),
        }
    }
}

impl HttpConfig {
    pub fn upload_timeout(&self) -> Option<Duration> {
        self.upload_timeout_secs.map(Duration::from_secs)
    }

    pub fn register_timeout(&self) -> Duration {
        Duration::from_secs(self.register_timeout_secs)
    }
}

impl UploaderConfig {
    /// Creates a configuration with default ledger, retry, timing and HTTP settings.
    pub fn new(
        service: ServiceKind,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        target_id: impl Into<String>,
        source_dir: impl AsRef<Path>,
    ) -> Self {
        Self {
            service,
            base_url: base_url.into(),
            api_key: api_key.into(),
            target_id: target_id.into(),
            target_name: None,
            source_dir: source_dir.as_ref().to_path_buf(),
            excluded_extension: default_excluded_extension(),
            log_file: default_log_file(),
            ledger: LedgerConfig::default(),
            retry: RetryPolicy::default(),
            timing: TimingConfig::default(),
            http: HttpConfig::default(),
        }
    }

    /// Checks that the settings every campaign depends on are present.
    pub fn validate(&self) -> Result<(), UploadError> {
        let required = [
            ("base_url", self.base_url.trim().is_empty()),
            ("api_key", self.api_key.trim().is_empty()),
            ("target_id", self.target_id.trim().is_empty()),
            ("source_dir", self.source_dir.as_os_str().is_empty()),
        ];
        if let Some((field, _)) = required.iter().find(|(_, missing)| *missing) {
            return Err(UploadError::Config(format!(
                "'{field}' must be set for a {} campaign",
                self.service
            )));
        }
        Ok(())
    }

    /// The target label used in log lines: the name when configured, otherwise the id.
    pub fn target_label(&self) -> &str {
        self.target_name.as_deref().unwrap_or(&self.target_id)
    }

    /// The base URL without a trailing slash, ready for path concatenation.
    pub fn trimmed_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

use anyhow::Result;
use async_trait::async_trait;
use kbload::{
    RegisterOutcome, RemoteService, ServiceError, ServiceKind, UploadOutcome, UploaderConfig,
};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::time::Instant;

// --- Test Setup ---

/// A helper struct holding an isolated source directory and ledger directory.
pub struct TestCampaign {
    pub dir: TempDir,
    pub source_dir: PathBuf,
    pub ledger_dir: PathBuf,
}

impl TestCampaign {
    /// Creates a fresh temporary campaign with empty `source/` and `ledger/` directories.
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir()?;
        let source_dir = dir.path().join("source");
        let ledger_dir = dir.path().join("ledger");
        fs::create_dir_all(&source_dir)?;
        fs::create_dir_all(&ledger_dir)?;
        Ok(Self {
            dir,
            source_dir,
            ledger_dir,
        })
    }

    /// Writes a file relative to the source directory, creating parent directories.
    pub fn add_file(&self, relative: &str, content: &str) -> Result<PathBuf> {
        let path = self.source_dir.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        Ok(path)
    }

    /// A configuration pointing at this campaign, with no rate-limit delay.
    pub fn config(&self, service: ServiceKind, base_url: &str) -> UploaderConfig {
        let mut config =
            UploaderConfig::new(service, base_url, "test-key", "target-1", &self.source_dir);
        config.ledger.dir = self.ledger_dir.clone();
        config.log_file = self.dir.path().join("kbload.log");
        config.timing.rate_limit_units = 0;
        config
    }

    /// Reads a ledger file as lines, returning an empty list when it does not exist.
    pub fn read_ledger(&self, name: &str) -> Vec<String> {
        read_lines(&self.ledger_dir.join(name))
    }
}

pub fn read_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .map(|s| s.lines().map(str::to_string).collect())
        .unwrap_or_default()
}

// --- Mock Remote Service ---

/// A scripted response for an upload call.
#[derive(Debug, Clone)]
pub enum MockUpload {
    Uploaded(String),
    Transient(String),
    Fail(String),
}

/// A scripted response for a registration call.
#[derive(Debug, Clone)]
pub enum MockRegister {
    Registered,
    Duplicate,
    Fail(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Upload,
    Register,
}

/// A recorded call made against the mock service.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub kind: CallKind,
    /// The uploaded path or registered identifier.
    pub target: String,
    pub at: Instant,
}

#[derive(Debug, Default)]
struct MockState {
    uploads: VecDeque<MockUpload>,
    registrations: VecDeque<MockRegister>,
    calls: Vec<MockCall>,
}

/// A `RemoteService` that replays scripted responses and records every call.
///
/// When a script runs out, uploads succeed with `id-<file name>` and
/// registrations succeed.
#[derive(Clone, Debug, Default)]
pub struct MockService {
    state: Arc<Mutex<MockState>>,
}

impl MockService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues responses for the next upload calls.
    pub fn script_uploads(&self, responses: impl IntoIterator<Item = MockUpload>) {
        self.state.lock().unwrap().uploads.extend(responses);
    }

    /// Queues responses for the next registration calls.
    pub fn script_registrations(&self, responses: impl IntoIterator<Item = MockRegister>) {
        self.state.lock().unwrap().registrations.extend(responses);
    }

    /// Retrieves the recorded calls for assertion.
    pub fn get_calls(&self) -> Vec<MockCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn calls_of(&self, kind: CallKind) -> Vec<MockCall> {
        self.get_calls()
            .into_iter()
            .filter(|c| c.kind == kind)
            .collect()
    }

    fn record(&self, kind: CallKind, target: String) {
        self.state.lock().unwrap().calls.push(MockCall {
            kind,
            target,
            at: Instant::now(),
        });
    }
}

fn scripted_failure(message: String) -> ServiceError {
    ServiceError::Status {
        status: 503,
        body: message,
    }
}

#[async_trait]
impl RemoteService for MockService {
    fn name(&self) -> &str {
        "mock"
    }

    async fn upload_one(&self, path: &Path) -> Result<UploadOutcome, ServiceError> {
        self.record(CallKind::Upload, path.to_string_lossy().into_owned());
        let next = self.state.lock().unwrap().uploads.pop_front();
        match next {
            Some(MockUpload::Uploaded(id)) => Ok(UploadOutcome::Uploaded(id)),
            Some(MockUpload::Transient(reason)) => Ok(UploadOutcome::Transient(reason)),
            Some(MockUpload::Fail(message)) => Err(scripted_failure(message)),
            None => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                Ok(UploadOutcome::Uploaded(format!("id-{name}")))
            }
        }
    }

    async fn register_one(&self, id: &str) -> Result<RegisterOutcome, ServiceError> {
        self.record(CallKind::Register, id.to_string());
        let next = self.state.lock().unwrap().registrations.pop_front();
        match next {
            Some(MockRegister::Registered) | None => Ok(RegisterOutcome::Registered),
            Some(MockRegister::Duplicate) => Ok(RegisterOutcome::Duplicate),
            Some(MockRegister::Fail(message)) => Err(scripted_failure(message)),
        }
    }
}

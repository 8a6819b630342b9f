//! # Resumable Batch Uploader
//!
//! Drives one campaign through its two stages against a [`RemoteService`]:
//!
//! 1.  **Upload:** every remaining work item is sent to the service and the returned
//!     identifier is journaled together with the source path.
//! 2.  **Registration:** every uploaded identifier that is not yet completed is
//!     attached to the target collection or dataset.
//!
//! Processing is strictly sequential. A shared [`RetryController`] counts failures
//! across both stages and aborts the run past its ceiling; whatever reached the
//! ledgers before that point is kept for the next run.

use crate::config::UploaderConfig;
use crate::discovery::load_work_set;
use crate::errors::UploadError;
use crate::ledger::{LedgerSummary, ProgressLedger};
use crate::retry::RetryController;
use crate::service::{RegisterOutcome, RemoteService, UploadOutcome};
use serde::Serialize;
use std::path::Path;
use tracing::{error, info, warn};

/// A summary of what one run accomplished.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CampaignReport {
    /// Files uploaded during this run.
    pub uploaded: usize,
    /// Identifiers newly registered during this run.
    pub registered: usize,
    /// Identifiers the service already held, counted as registered.
    pub duplicates: usize,
    /// Uploads skipped because the service reported a transient condition.
    pub transient: usize,
    /// Items recorded as errored after a counted failure.
    pub errored: usize,
    /// The work set was already fully uploaded, so the run did nothing.
    pub nothing_to_do: bool,
}

/// The batch uploader for one campaign.
pub struct BatchUploader {
    config: UploaderConfig,
    service: Box<dyn RemoteService>,
    ledger: ProgressLedger,
    retry: RetryController,
}

impl BatchUploader {
    /// Validates `config` and opens the campaign's ledgers.
    pub fn new(
        config: UploaderConfig,
        service: Box<dyn RemoteService>,
    ) -> Result<Self, UploadError> {
        config.validate()?;
        let ledger = ProgressLedger::open(&config.ledger)?;
        let retry = RetryController::new(config.retry, config.timing.time_unit());
        Ok(Self {
            config,
            service,
            ledger,
            retry,
        })
    }

    pub fn ledger(&self) -> &ProgressLedger {
        &self.ledger
    }

    pub fn summary(&self) -> LedgerSummary {
        self.ledger.summary()
    }

    /// Runs discovery, the upload stage and the registration stage.
    ///
    /// Returns early with `nothing_to_do` set when every discovered file has already
    /// been uploaded. Fatal conditions (a missing local file, the failure ceiling)
    /// are returned as errors.
    pub async fn run(&mut self) -> Result<CampaignReport, UploadError> {
        let mut report = CampaignReport::default();

        let work = load_work_set(
            &self.config.source_dir,
            &self.config.excluded_extension,
            &mut self.ledger,
        )?;
        if work.is_empty() {
            info!("No files to process.");
            report.nothing_to_do = true;
            return Ok(report);
        }

        let summary = self.ledger.summary();
        info!("Files to process: {}", work.len());
        info!("Files already processed: {}", summary.completed);
        info!("Files errored: {}", summary.errored);

        self.upload_stage(&work, &mut report).await?;
        self.registration_stage(&mut report).await?;

        info!("Upload and processing completed.");
        Ok(report)
    }

    /// Runs only the registration stage over the current ledgers.
    pub async fn register_pending(&mut self) -> Result<CampaignReport, UploadError> {
        let mut report = CampaignReport::default();
        self.registration_stage(&mut report).await?;
        Ok(report)
    }

    /// Uploads each item of `work` that the ledger does not already hold.
    pub async fn upload_stage(
        &mut self,
        work: &[String],
        report: &mut CampaignReport,
    ) -> Result<(), UploadError> {
        for path in work {
            if self.ledger.is_uploaded(path) {
                continue;
            }
            self.pause().await;

            let local = Path::new(path);
            if !local.is_file() {
                error!("Error: File not found at {path}");
                return Err(UploadError::MissingFile(local.to_path_buf()));
            }

            match self.service.upload_one(local).await {
                Ok(UploadOutcome::Uploaded(id)) => {
                    info!("File uploaded successfully: {path} (id: {id})");
                    self.ledger.record_upload(path, &id)?;
                    self.retry.record_success();
                    report.uploaded += 1;
                }
                Ok(UploadOutcome::Transient(reason)) => {
                    warn!("Upload of {path} hit a transient condition, skipping: {reason}");
                    self.ledger.record_error(path)?;
                    report.transient += 1;
                    if self.config.retry.count_transient {
                        self.retry.backoff_or_abort().await?;
                    }
                }
                Err(e) => {
                    error!("Request failed for {path}: {e}");
                    self.ledger.record_error(path)?;
                    report.errored += 1;
                    self.retry.backoff_or_abort().await?;
                }
            }
        }
        Ok(())
    }

    /// Registers every uploaded identifier that has not completed yet.
    pub async fn registration_stage(
        &mut self,
        report: &mut CampaignReport,
    ) -> Result<(), UploadError> {
        let pending = self.ledger.pending_registrations();
        info!("Files to add to knowledge base: {}", pending.len());
        if pending.is_empty() {
            info!("No files to add to knowledge base.");
            return Ok(());
        }

        let target = self.config.target_label().to_string();
        for id in &pending {
            self.pause().await;

            match self.service.register_one(id).await {
                Ok(RegisterOutcome::Registered) => {
                    info!("File ID {id} added to '{target}' on {}", self.service.name());
                    self.ledger.record_completed(id)?;
                    self.retry.record_success();
                    report.registered += 1;
                }
                Ok(RegisterOutcome::Duplicate) => {
                    info!("Duplicate content detected for file ID {id}. Skipping...");
                    self.ledger.record_completed(id)?;
                    self.retry.record_success();
                    report.duplicates += 1;
                }
                Err(e) => {
                    error!("Failed to add file ID {id} to '{target}': {e}");
                    self.ledger.record_error(id)?;
                    report.errored += 1;
                    self.retry.backoff_or_abort().await?;
                }
            }
        }
        Ok(())
    }

    /// The fixed rate-limit delay imposed before every network call.
    async fn pause(&self) {
        let delay = self.config.timing.rate_limit_delay();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

//! # kbload: Resumable Batch Uploads into Knowledge Bases
//!
//! This crate uploads a directory of files into a remote knowledge-base service and
//! registers each uploaded file into a target collection or dataset. Progress is
//! journaled to plain-text ledgers so an interrupted campaign resumes where it
//! stopped. Concrete services plug in through the [`RemoteService`] trait.

pub mod config;
pub mod constants;
pub mod discovery;
pub mod errors;
pub mod ledger;
pub mod retry;
pub mod service;
pub mod uploader;

pub use config::{ServiceKind, UploaderConfig};
pub use errors::{ServiceError, UploadError};
pub use ledger::{Ledger, LedgerSummary, ProgressLedger};
pub use retry::{RetryController, RetryDecision};
pub use service::{RegisterOutcome, RemoteService, UploadOutcome};
pub use uploader::{BatchUploader, CampaignReport};

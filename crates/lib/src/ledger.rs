//! # Progress Ledger
//!
//! This module handles the durable progress state of a campaign. Each ledger is an
//! append-only, newline-delimited journal on disk mirrored by an in-memory ordered
//! list and membership set, rebuilt when the journal is opened. The ledgers are the
//! only resume mechanism: a crashed run recomputes its remaining work from them.

use crate::config::LedgerConfig;
use crate::errors::UploadError;
use serde::Serialize;
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// A single append-only journal with set membership.
#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    entries: Vec<String>,
    index: HashSet<String>,
}

impl Ledger {
    /// Opens the journal at `path`, loading every non-blank line.
    ///
    /// A missing file is an empty ledger; it is created on the first append.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, UploadError> {
        let path = path.as_ref().to_path_buf();
        let mut entries = Vec::new();
        let mut index = HashSet::new();

        match File::open(&path) {
            Ok(file) => {
                for line in BufReader::new(file).lines() {
                    let line = line.map_err(|e| UploadError::ledger(&path, e))?;
                    let entry = line.trim_end_matches('\r');
                    if entry.trim().is_empty() {
                        continue;
                    }
                    index.insert(entry.to_string());
                    entries.push(entry.to_string());
                }
                debug!("Loaded {} entries from '{}'", entries.len(), path.display());
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(UploadError::ledger(&path, e)),
        }

        Ok(Self {
            path,
            entries,
            index,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the journal file is present on disk.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn contains(&self, entry: &str) -> bool {
        self.index.contains(entry)
    }

    /// Every entry in append order, repeats included.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Appends `entry` as one line and syncs it to disk before returning.
    pub fn append(&mut self, entry: &str) -> Result<(), UploadError> {
        check_entry(&self.path, entry)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| UploadError::ledger(&self.path, e))?;
        writeln!(file, "{entry}")
            .and_then(|_| file.sync_data())
            .map_err(|e| UploadError::ledger(&self.path, e))?;

        self.index.insert(entry.to_string());
        self.entries.push(entry.to_string());
        Ok(())
    }

    /// Appends `entry` unless it is already present. Returns whether it was written.
    pub fn insert(&mut self, entry: &str) -> Result<bool, UploadError> {
        if self.contains(entry) {
            return Ok(false);
        }
        self.append(entry)?;
        Ok(true)
    }

    /// Replaces the journal with `entries`, written to a sibling temp file and renamed
    /// into place so a crash never leaves a partial list behind.
    pub fn write_all(&mut self, entries: &[String]) -> Result<(), UploadError> {
        for entry in entries {
            check_entry(&self.path, entry)?;
        }

        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        let write = || -> io::Result<()> {
            let file = File::create(&tmp_path)?;
            let mut writer = BufWriter::new(file);
            for entry in entries {
                writeln!(writer, "{entry}")?;
            }
            let file = writer.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()?;
            fs::rename(&tmp_path, &self.path)
        };
        write().map_err(|e| UploadError::ledger(&self.path, e))?;

        self.entries = entries.to_vec();
        self.index = entries.iter().cloned().collect();
        Ok(())
    }
}

fn check_entry(path: &Path, entry: &str) -> Result<(), UploadError> {
    if entry.contains('\n') || entry.trim().is_empty() {
        return Err(UploadError::ledger(
            path,
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("ledger entries must be single non-blank lines: {entry:?}"),
            ),
        ));
    }
    Ok(())
}

/// Ledger counts reported at the start of a run and by the `status` command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LedgerSummary {
    pub work_set: usize,
    pub uploaded: usize,
    pub completed: usize,
    pub errored: usize,
    pub remaining_uploads: usize,
    pub pending_registrations: usize,
}

/// The journals of one campaign.
#[derive(Debug)]
pub struct ProgressLedger {
    /// The full enumerated work set, written once.
    pub file_list: Ledger,
    /// Remote identifiers that completed the upload stage.
    pub uploaded: Ledger,
    /// Source paths of `uploaded`, correlated by append order.
    pub uploaded_paths: Ledger,
    /// Remote identifiers that completed the registration stage.
    pub completed: Ledger,
    /// Paths and identifiers that failed within a run.
    pub errored: Ledger,
}

impl ProgressLedger {
    /// Opens every journal named by `config`, creating the ledger directory if needed.
    pub fn open(config: &LedgerConfig) -> Result<Self, UploadError> {
        if !config.dir.as_os_str().is_empty() {
            fs::create_dir_all(&config.dir).map_err(|e| UploadError::ledger(&config.dir, e))?;
        }
        Ok(Self {
            file_list: Ledger::open(config.file_list_path())?,
            uploaded: Ledger::open(config.uploaded_path())?,
            uploaded_paths: Ledger::open(config.uploaded_paths_path())?,
            completed: Ledger::open(config.completed_path())?,
            errored: Ledger::open(config.errored_path())?,
        })
    }

    /// Records a finished upload: the identifier first, then its source path.
    pub fn record_upload(&mut self, path: &str, id: &str) -> Result<(), UploadError> {
        self.uploaded.append(id)?;
        self.uploaded_paths.append(path)
    }

    pub fn record_completed(&mut self, id: &str) -> Result<(), UploadError> {
        self.completed.insert(id).map(|_| ())
    }

    pub fn record_error(&mut self, entry: &str) -> Result<(), UploadError> {
        self.errored.append(entry)
    }

    /// Whether `path` was uploaded by an earlier run.
    pub fn is_uploaded(&self, path: &str) -> bool {
        self.uploaded_paths.contains(path)
    }

    /// Identifiers in `uploaded` that are absent from `completed`, in upload order.
    pub fn pending_registrations(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.uploaded
            .entries()
            .iter()
            .filter(|id| !self.completed.contains(id) && seen.insert(id.as_str()))
            .cloned()
            .collect()
    }

    pub fn summary(&self) -> LedgerSummary {
        let remaining_uploads = self
            .file_list
            .entries()
            .iter()
            .filter(|path| !self.is_uploaded(path))
            .count();
        LedgerSummary {
            work_set: self.file_list.len(),
            uploaded: self.uploaded.len(),
            completed: self.completed.len(),
            errored: self.errored.len(),
            remaining_uploads,
            pending_registrations: self.pending_registrations().len(),
        }
    }
}

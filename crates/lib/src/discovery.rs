//! # Work Discovery
//!
//! Enumerates the files of a campaign. The first run scans the source directory and
//! persists the result to the `file_list` ledger; later runs load that ledger instead,
//! so a directory that changes mid-campaign does not change its work set.

use crate::errors::UploadError;
use crate::ledger::ProgressLedger;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

/// Walks `root` in directory order and returns every file whose name does not end
/// with `excluded_extension`.
pub fn scan_directory(root: &Path, excluded_extension: &str) -> Result<Vec<PathBuf>, UploadError> {
    if !root.is_dir() {
        return Err(UploadError::Discovery {
            path: root.to_path_buf(),
            message: "not a directory".to_string(),
        });
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|e| UploadError::Discovery {
            path: root.to_path_buf(),
            message: e.to_string(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let is_metadata = !excluded_extension.is_empty()
            && entry
                .file_name()
                .to_string_lossy()
                .ends_with(excluded_extension);
        if !is_metadata {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Returns the items still to upload: the persisted work set (scanned and written
/// on the first run) minus every path already present in the uploaded-path log.
pub fn load_work_set(
    root: &Path,
    excluded_extension: &str,
    ledger: &mut ProgressLedger,
) -> Result<Vec<String>, UploadError> {
    if ledger.file_list.exists() {
        info!(
            "Loaded work set of {} files from '{}'.",
            ledger.file_list.len(),
            ledger.file_list.path().display()
        );
    } else {
        let files: Vec<String> = scan_directory(root, excluded_extension)?
            .into_iter()
            .filter_map(ledger_entry)
            .collect();
        ledger.file_list.write_all(&files)?;
        info!(
            "Discovered {} files under '{}'; work set saved to '{}'.",
            files.len(),
            root.display(),
            ledger.file_list.path().display()
        );
    }

    Ok(ledger
        .file_list
        .entries()
        .iter()
        .filter(|path| !ledger.is_uploaded(path))
        .cloned()
        .collect())
}

/// Converts a discovered path into a ledger line. Names that are not valid UTF-8 or
/// that span several lines cannot round-trip through a line ledger, so they are
/// left out of the work set with a warning.
fn ledger_entry(path: PathBuf) -> Option<String> {
    match path.to_str() {
        Some(entry) if !entry.contains(['\n', '\r']) => Some(entry.to_string()),
        Some(_) => {
            warn!("Skipping '{}': file names with line breaks are not supported.", path.display());
            None
        }
        None => {
            warn!("Skipping '{}': file name is not valid UTF-8.", path.display());
            None
        }
    }
}

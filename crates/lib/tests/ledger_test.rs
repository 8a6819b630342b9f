//! # Ledger Tests
//!
//! Tests for the append-only journals and the campaign-level `ProgressLedger`.

use anyhow::Result;
use kbload::config::LedgerConfig;
use kbload::{Ledger, ProgressLedger, UploadError};
use std::fs;
use tempfile::tempdir;

#[test]
fn test_ledger_open_missing_file_is_empty() -> Result<()> {
    let dir = tempdir()?;
    let ledger = Ledger::open(dir.path().join("absent.txt"))?;

    assert!(ledger.is_empty());
    assert!(!ledger.exists());
    Ok(())
}

#[test]
fn test_ledger_append_survives_reopen() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("uploaded.txt");

    let mut ledger = Ledger::open(&path)?;
    ledger.append("abc")?;
    ledger.append("def")?;
    assert!(ledger.contains("abc"));

    let reopened = Ledger::open(&path)?;
    assert_eq!(reopened.entries(), ["abc", "def"]);
    assert_eq!(fs::read_to_string(&path)?, "abc\ndef\n");
    Ok(())
}

#[test]
fn test_ledger_skips_blank_lines_on_load() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("completed.txt");
    fs::write(&path, "one\n\n  \ntwo\r\n")?;

    let ledger = Ledger::open(&path)?;
    assert_eq!(ledger.entries(), ["one", "two"]);
    Ok(())
}

#[test]
fn test_ledger_insert_is_idempotent() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("completed.txt");

    let mut ledger = Ledger::open(&path)?;
    assert!(ledger.insert("x")?);
    assert!(!ledger.insert("x")?);
    assert_eq!(Ledger::open(&path)?.len(), 1);
    Ok(())
}

#[test]
fn test_ledger_rejects_multiline_entries() -> Result<()> {
    let dir = tempdir()?;
    let mut ledger = Ledger::open(dir.path().join("errored.txt"))?;

    let err = ledger.append("bad\nentry").unwrap_err();
    assert!(matches!(err, UploadError::Ledger { .. }));
    assert!(ledger.is_empty());
    Ok(())
}

#[test]
fn test_ledger_write_all_replaces_contents() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("filelist.txt");

    let mut ledger = Ledger::open(&path)?;
    ledger.write_all(&["a".to_string(), "b".to_string()])?;

    assert!(ledger.exists());
    assert_eq!(Ledger::open(&path)?.entries(), ["a", "b"]);
    assert!(!dir.path().join("filelist.txt.tmp").exists());
    Ok(())
}

#[test]
fn test_progress_ledger_records_upload_and_path_in_parallel() -> Result<()> {
    let dir = tempdir()?;
    let config = LedgerConfig {
        dir: dir.path().join("ledgers"),
        ..Default::default()
    };

    let mut ledger = ProgressLedger::open(&config)?;
    ledger.record_upload("docs/a.txt", "id-a")?;
    ledger.record_upload("docs/b.txt", "id-b")?;

    assert!(ledger.is_uploaded("docs/a.txt"));
    assert_eq!(
        fs::read_to_string(config.uploaded_path())?,
        "id-a\nid-b\n"
    );
    assert_eq!(
        fs::read_to_string(config.uploaded_paths_path())?,
        "docs/a.txt\ndocs/b.txt\n"
    );
    assert!(config
        .uploaded_paths_path()
        .to_string_lossy()
        .ends_with("uploaded.txt.path"));
    Ok(())
}

#[test]
fn test_pending_registrations_excludes_completed() -> Result<()> {
    let dir = tempdir()?;
    let config = LedgerConfig {
        dir: dir.path().to_path_buf(),
        ..Default::default()
    };

    let mut ledger = ProgressLedger::open(&config)?;
    ledger.record_upload("a", "id-a")?;
    ledger.record_upload("b", "id-b")?;
    ledger.record_upload("c", "id-c")?;
    ledger.record_completed("id-b")?;

    assert_eq!(ledger.pending_registrations(), ["id-a", "id-c"]);

    let summary = ProgressLedger::open(&config)?.summary();
    assert_eq!(summary.uploaded, 3);
    assert_eq!(summary.completed, 1);
    assert_eq!(summary.pending_registrations, 2);
    Ok(())
}

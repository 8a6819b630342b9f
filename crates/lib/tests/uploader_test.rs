//! # Batch Uploader Tests
//!
//! End-to-end tests of a campaign against the scripted `MockService`. Time is paused
//! so backoff waits complete instantly while their durations stay observable.

use anyhow::Result;
use kbload::{BatchUploader, ServiceKind, UploadError, UploaderConfig};
use kbload_test_utils::{CallKind, MockRegister, MockService, MockUpload, TestCampaign};
use std::time::Duration;

fn uploader(config: UploaderConfig, service: &MockService) -> Result<BatchUploader> {
    Ok(BatchUploader::new(config, Box::new(service.clone()))?)
}

fn webui_config(campaign: &TestCampaign) -> UploaderConfig {
    campaign.config(ServiceKind::Webui, "http://localhost")
}

#[tokio::test(start_paused = true)]
async fn test_three_files_all_succeed() -> Result<()> {
    let campaign = TestCampaign::new()?;
    for name in ["a.txt", "b.txt", "c.txt"] {
        campaign.add_file(name, name)?;
    }
    let service = MockService::new();

    let report = uploader(webui_config(&campaign), &service)?.run().await?;

    assert_eq!(report.uploaded, 3);
    assert_eq!(report.registered, 3);
    assert_eq!(campaign.read_ledger("uploaded.txt").len(), 3);
    assert_eq!(campaign.read_ledger("uploaded.txt.path").len(), 3);
    assert_eq!(campaign.read_ledger("completed.txt").len(), 3);
    assert!(campaign.read_ledger("errored.txt").is_empty());

    // The next run finds nothing left to upload.
    let rerun = uploader(webui_config(&campaign), &service)?.run().await?;
    assert!(rerun.nothing_to_do);
    assert_eq!(service.calls_of(CallKind::Upload).len(), 3);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_completed_ids_were_uploaded_first() -> Result<()> {
    let campaign = TestCampaign::new()?;
    campaign.add_file("a.txt", "a")?;
    campaign.add_file("b.txt", "b")?;
    let service = MockService::new();

    uploader(webui_config(&campaign), &service)?.run().await?;

    let uploaded = campaign.read_ledger("uploaded.txt");
    for id in campaign.read_ledger("completed.txt") {
        assert!(uploaded.contains(&id), "{id} completed without being uploaded");
    }
    let calls = service.get_calls();
    let last_upload = calls.iter().rposition(|c| c.kind == CallKind::Upload);
    let first_register = calls.iter().position(|c| c.kind == CallKind::Register);
    assert!(last_upload < first_register);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_registration_counts_as_completed() -> Result<()> {
    let campaign = TestCampaign::new()?;
    campaign.add_file("a.txt", "a")?;
    campaign.add_file("b.txt", "b")?;
    let service = MockService::new();
    service.script_uploads([
        MockUpload::Uploaded("X".to_string()),
        MockUpload::Uploaded("Y".to_string()),
    ]);
    service.script_registrations([MockRegister::Duplicate, MockRegister::Registered]);

    let report = uploader(webui_config(&campaign), &service)?.run().await?;

    assert_eq!(report.duplicates, 1);
    assert_eq!(report.registered, 1);
    assert_eq!(report.errored, 0);
    assert_eq!(campaign.read_ledger("completed.txt"), ["X", "Y"]);
    assert!(campaign.read_ledger("errored.txt").is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_six_consecutive_failures_abort_with_escalating_backoff() -> Result<()> {
    let campaign = TestCampaign::new()?;
    for i in 0..8 {
        campaign.add_file(&format!("f{i}.txt"), "x")?;
    }
    let mut config = webui_config(&campaign);
    config.timing.rate_limit_units = 1;
    let service = MockService::new();
    service.script_uploads((0..8).map(|_| MockUpload::Fail("connection refused".to_string())));

    let err = uploader(config, &service)?.run().await.unwrap_err();

    assert!(matches!(err, UploadError::TooManyFailures { failures: 6 }));
    let uploads = service.calls_of(CallKind::Upload);
    assert_eq!(uploads.len(), 6, "no calls after the ceiling is exceeded");
    assert!(service.calls_of(CallKind::Register).is_empty());

    // Each gap is one rate-limit unit plus the backoff for the preceding failure.
    let gaps: Vec<Duration> = uploads.windows(2).map(|w| w[1].at - w[0].at).collect();
    let expected: Vec<Duration> = [60, 120, 180, 240, 300]
        .into_iter()
        .map(|s| Duration::from_secs(s + 1))
        .collect();
    assert_eq!(gaps, expected);
    assert_eq!(campaign.read_ledger("errored.txt").len(), 6);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_failed_item_is_errored_and_run_continues() -> Result<()> {
    let campaign = TestCampaign::new()?;
    campaign.add_file("a.txt", "a")?;
    campaign.add_file("b.txt", "b")?;
    let service = MockService::new();
    service.script_uploads([MockUpload::Fail("boom".to_string())]);

    let report = uploader(webui_config(&campaign), &service)?.run().await?;

    assert_eq!(report.errored, 1);
    assert_eq!(report.uploaded, 1);
    assert_eq!(campaign.read_ledger("errored.txt").len(), 1);

    // The errored item is offered again on the next run.
    let rerun = uploader(webui_config(&campaign), &service)?.run().await?;
    assert_eq!(rerun.uploaded, 1);
    assert_eq!(campaign.read_ledger("uploaded.txt").len(), 2);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_transient_upload_is_skipped_without_backoff() -> Result<()> {
    let campaign = TestCampaign::new()?;
    campaign.add_file("a.txt", "a")?;
    campaign.add_file("b.txt", "b")?;
    let service = MockService::new();
    service.script_uploads([MockUpload::Transient("Stream timeout".to_string())]);

    let start = tokio::time::Instant::now();
    let report = uploader(webui_config(&campaign), &service)?.run().await?;

    assert_eq!(report.transient, 1);
    assert_eq!(report.errored, 0);
    assert_eq!(report.uploaded, 1);
    assert_eq!(campaign.read_ledger("errored.txt").len(), 1);
    assert!(start.elapsed() < Duration::from_secs(1));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_transient_upload_counts_when_configured() -> Result<()> {
    let campaign = TestCampaign::new()?;
    campaign.add_file("a.txt", "a")?;
    let mut config = webui_config(&campaign);
    config.retry.count_transient = true;
    config.retry.max_failures = 0;
    let service = MockService::new();
    service.script_uploads([MockUpload::Transient("Stream timeout".to_string())]);

    let err = uploader(config, &service)?.run().await.unwrap_err();
    assert!(matches!(err, UploadError::TooManyFailures { failures: 1 }));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_counter_ratchets_when_reset_disabled() -> Result<()> {
    let campaign = TestCampaign::new()?;
    for name in ["a.txt", "b.txt", "c.txt"] {
        campaign.add_file(name, name)?;
    }
    let mut config = webui_config(&campaign);
    config.retry.reset_on_success = false;
    let service = MockService::new();
    service.script_uploads([
        MockUpload::Fail("first".to_string()),
        MockUpload::Uploaded("id-b".to_string()),
        MockUpload::Fail("second".to_string()),
    ]);

    let start = tokio::time::Instant::now();
    uploader(config, &service)?.run().await?;

    // 60 after the first failure, 120 after the second: the success in between did not reset.
    assert_eq!(start.elapsed(), Duration::from_secs(180));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_missing_local_file_is_fatal() -> Result<()> {
    let campaign = TestCampaign::new()?;
    campaign.add_file("a.txt", "a")?;
    let gone = campaign.add_file("b.txt", "b")?;
    let config = webui_config(&campaign);

    // Persist the work set, then remove a file behind the ledger's back.
    let mut ledger = kbload::ProgressLedger::open(&config.ledger)?;
    kbload::discovery::load_work_set(&config.source_dir, ".json", &mut ledger)?;
    std::fs::remove_file(&gone)?;

    let service = MockService::new();
    let err = uploader(config, &service)?.run().await.unwrap_err();

    assert!(matches!(err, UploadError::MissingFile(_)));
    assert!(service.calls_of(CallKind::Register).is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_register_pending_resumes_registration_only() -> Result<()> {
    let campaign = TestCampaign::new()?;
    campaign.add_file("a.txt", "a")?;
    campaign.add_file("b.txt", "b")?;
    let service = MockService::new();
    service.script_registrations([MockRegister::Registered, MockRegister::Fail("down".into())]);

    let first = uploader(webui_config(&campaign), &service)?.run().await?;
    assert_eq!(first.registered, 1);
    assert_eq!(first.errored, 1);

    let second = uploader(webui_config(&campaign), &service)?
        .register_pending()
        .await?;
    assert_eq!(second.registered, 1);
    assert_eq!(campaign.read_ledger("completed.txt").len(), 2);
    assert_eq!(service.calls_of(CallKind::Upload).len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_invalid_config_is_rejected() -> Result<()> {
    let campaign = TestCampaign::new()?;
    let mut config = webui_config(&campaign);
    config.api_key = String::new();

    let err = BatchUploader::new(config, Box::new(MockService::new()))
        .err()
        .expect("missing api_key must be rejected");
    assert!(matches!(err, UploadError::Config(_)));
    Ok(())
}

#[cfg(unix)]
#[tokio::test(start_paused = true)]
async fn test_unrepresentable_names_do_not_block_campaign() -> Result<()> {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let campaign = TestCampaign::new()?;
    campaign.add_file("a.txt", "a")?;
    campaign.add_file("b\nc.txt", "split name")?;
    std::fs::write(
        campaign.source_dir.join(OsStr::from_bytes(b"caf\xe9.txt")),
        "latin-1 name",
    )?;
    let service = MockService::new();

    for _ in 0..2 {
        uploader(webui_config(&campaign), &service)?.run().await?;
    }

    assert_eq!(service.calls_of(CallKind::Upload).len(), 1);
    assert_eq!(service.calls_of(CallKind::Register).len(), 1);
    assert_eq!(campaign.read_ledger("completed.txt"), ["id-a.txt"]);
    Ok(())
}

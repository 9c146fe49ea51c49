//! Integration tests: curl engine against a local HTTP server.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::media_server::{self, MediaServerOptions};
use mdm_core::config::HttpConfig;
use mdm_core::engine::{
    part_path, spawn_fetch, CurlEngine, FetchRequest, TransferEngine, TransferError,
    TransferEvent, TransferOutcome,
};
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

fn body(len: usize) -> Vec<u8> {
    (0u8..251).cycle().take(len).collect()
}

fn engine() -> Arc<dyn TransferEngine> {
    let mut http = HttpConfig::default();
    http.connect_timeout_secs = 5;
    http.low_speed_time_secs = 10;
    Arc::new(CurlEngine::new(http, None))
}

#[tokio::test]
async fn full_body_lands_at_destination_with_monotonic_progress() {
    let payload = body(1000);
    let server = media_server::start(payload.clone());
    let dir = tempdir().unwrap();
    let dest = dir.path().join("videos/video_1_hd.mp4");

    let mut handle = spawn_fetch(
        engine(),
        FetchRequest::new(server.url("clip.mp4"), &dest),
        CancellationToken::new(),
    );
    let mut last = 0;
    let mut outcome = None;
    while let Some(event) = handle.next_event().await {
        match event {
            TransferEvent::Progress(p) => {
                assert!(p.bytes_transferred >= last, "progress went backwards");
                assert_eq!(p.bytes_total, Some(1000));
                last = p.bytes_transferred;
            }
            TransferEvent::Finished(o) => outcome = Some(o),
        }
    }
    assert!(matches!(
        outcome,
        Some(TransferOutcome::Done { bytes_written: 1000 })
    ));
    assert_eq!(last, 1000);
    assert_eq!(std::fs::read(&dest).unwrap(), payload);
    assert!(!part_path(&dest).exists());
}

#[tokio::test]
async fn connection_dropped_mid_body_fails_and_cleans_up() {
    let opts = MediaServerOptions {
        drop_after: Some(400),
        ..Default::default()
    };
    let server = media_server::start_with_options(body(1000), opts);
    let dir = tempdir().unwrap();
    let dest = dir.path().join("video_2_hd.mp4");

    let handle = spawn_fetch(
        engine(),
        FetchRequest::new(server.url("clip.mp4"), &dest),
        CancellationToken::new(),
    );
    match handle.wait().await {
        TransferOutcome::Failed(e) => assert!(e.is_transport(), "unexpected error: {e}"),
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(!dest.exists());
    assert!(!part_path(&dest).exists());
}

#[tokio::test]
async fn error_status_fails_without_writing_the_error_body() {
    let opts = MediaServerOptions {
        status: 404,
        ..Default::default()
    };
    let server = media_server::start_with_options(b"not here".to_vec(), opts);
    let dir = tempdir().unwrap();
    let dest = dir.path().join("video_3_hd.mp4");

    let handle = spawn_fetch(
        engine(),
        FetchRequest::new(server.url("missing.mp4"), &dest),
        CancellationToken::new(),
    );
    assert!(matches!(
        handle.wait().await,
        TransferOutcome::Failed(TransferError::Http(404))
    ));
    assert!(!dest.exists());
    assert!(!part_path(&dest).exists());
}

#[tokio::test]
async fn missing_content_length_reports_unknown_total() {
    let opts = MediaServerOptions {
        send_length: false,
        chunk: 256,
        ..Default::default()
    };
    let payload = body(4096);
    let server = media_server::start_with_options(payload.clone(), opts);
    let dir = tempdir().unwrap();
    let dest = dir.path().join("video_4_sd.mp4");

    let mut handle = spawn_fetch(
        engine(),
        FetchRequest::new(server.url("live.mp4"), &dest),
        CancellationToken::new(),
    );
    let mut saw_progress = false;
    let mut outcome = None;
    while let Some(event) = handle.next_event().await {
        match event {
            TransferEvent::Progress(p) => {
                assert_eq!(p.bytes_total, None);
                saw_progress = true;
            }
            TransferEvent::Finished(o) => outcome = Some(o),
        }
    }
    assert!(saw_progress);
    assert!(matches!(
        outcome,
        Some(TransferOutcome::Done { bytes_written: 4096 })
    ));
    assert_eq!(std::fs::read(&dest).unwrap(), payload);
}

#[tokio::test]
async fn cancel_mid_transfer_removes_partial_output() {
    let opts = MediaServerOptions {
        chunk: 8 * 1024,
        chunk_delay: Duration::from_millis(20),
        ..Default::default()
    };
    let server = media_server::start_with_options(body(2 * 1024 * 1024), opts);
    let dir = tempdir().unwrap();
    let dest = dir.path().join("video_5_hd.mp4");

    let cancel = CancellationToken::new();
    let mut handle = spawn_fetch(
        engine(),
        FetchRequest::new(server.url("big.mp4"), &dest),
        cancel.clone(),
    );
    match handle.next_event().await {
        Some(TransferEvent::Progress(_)) => cancel.cancel(),
        other => panic!("expected progress first, got {other:?}"),
    }
    let outcome = tokio::time::timeout(Duration::from_secs(10), handle.wait())
        .await
        .expect("cancel was not observed");
    assert!(matches!(outcome, TransferOutcome::Cancelled));
    assert!(!dest.exists());
    assert!(!part_path(&dest).exists());
}

#[tokio::test]
async fn authorization_header_is_sent() {
    let server = media_server::start(body(64));
    let dir = tempdir().unwrap();
    let dest = dir.path().join("video_6_hd.mp4");
    let engine: Arc<dyn TransferEngine> = Arc::new(CurlEngine::new(
        HttpConfig::default(),
        Some("Bearer secret-token".to_string()),
    ));

    let handle = spawn_fetch(
        engine,
        FetchRequest::new(server.url("private.mp4"), &dest),
        CancellationToken::new(),
    );
    assert!(matches!(
        handle.wait().await,
        TransferOutcome::Done { bytes_written: 64 }
    ));
    assert_eq!(
        server.last_authorization().as_deref(),
        Some("Bearer secret-token")
    );
}

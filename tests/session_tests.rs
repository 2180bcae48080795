// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the kiosk session

mod common;

use common::{FakeCamera, MemoryStore, RecordingView, ScriptedDecoder};
use image::RgbaImage;
use paxibox::capture::{CameraFrame, FrameScanner, NoLayout, StreamRequest};
use paxibox::constants::{messages, remote::SCANS_PATH};
use paxibox::decoder::DecoderAdapter;
use paxibox::errors::CaptureError;
use paxibox::intake::ScanSource;
use paxibox::remote::{RemoteLogger, StoreKind};
use paxibox::session::{
    Collaborators, DismissReason, Flow, Session, SessionEvent, SessionSettings, SessionView, Tab,
};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

struct Harness {
    session: Session,
    camera: Arc<FakeCamera>,
    decoder: Arc<ScriptedDecoder>,
    view: Arc<RecordingView>,
    store: Arc<MemoryStore>,
}

fn harness(codes: &[&str]) -> Harness {
    let camera = Arc::new(FakeCamera::default());
    let decoder = ScriptedDecoder::answering(codes);
    let view = Arc::new(RecordingView::default());
    let store = MemoryStore::new(StoreKind::Firestore);

    let parts = Collaborators {
        camera: camera.clone(),
        request: StreamRequest::default(),
        scanner: FrameScanner::new(DecoderAdapter::sampling_only(decoder.clone())).shared(),
        layout: Arc::new(NoLayout),
        logger: RemoteLogger::new(store.clone(), None),
        view: view.clone(),
    };
    Harness {
        session: Session::create(SessionSettings::default(), parts),
        camera,
        decoder,
        view,
        store,
    }
}

fn detected(code: &str) -> SessionEvent {
    SessionEvent::Detected {
        code: code.to_string(),
    }
}

#[tokio::test]
async fn test_begin_acquires_camera() {
    let mut h = harness(&[]);
    h.session.begin().await;

    assert_eq!(h.camera.opens(), 1);
    assert!(h.session.capture_active());
    assert_eq!(h.session.view(), SessionView::Scanning);
    assert_eq!(*h.view.cameras.lock().unwrap(), vec!["Fake Camera"]);
}

#[tokio::test]
async fn test_rapid_detections_yield_one_event() {
    let mut h = harness(&[]);
    h.session.begin().await;

    h.session.handle_event(detected("PKG123")).await;
    h.session.handle_event(detected("PKG999")).await;

    let confirmations = h.view.confirmations();
    assert_eq!(confirmations.len(), 1);
    assert_eq!(confirmations[0].payload, "PKG123");
    assert!(confirmations[0].success);
    assert!(h.session.is_processing());
    assert!(!h.session.capture_active());

    h.session.flush_logs().await;
    let writes = h.store.writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].path, SCANS_PATH);
    assert_eq!(writes[0].value["code"], "PKG123");
    assert_eq!(writes[0].value["source"], "camera");
}

#[tokio::test]
async fn test_short_code_is_confirmed_as_failure() {
    let mut h = harness(&[]);
    h.session.begin().await;
    h.session.handle_event(detected("  AB ")).await;

    let confirmation = &h.view.confirmations()[0];
    assert!(!confirmation.success);
    assert_eq!(confirmation.title, messages::FAILURE_TITLE);
    assert_eq!(confirmation.payload, "AB");
}

#[tokio::test(start_paused = true)]
async fn test_dismiss_restarts_camera_once_after_settle() {
    let mut h = harness(&[]);
    h.session.begin().await;
    h.session.handle_event(detected("PKG123")).await;
    assert_eq!(h.camera.stops(), 1);

    h.session
        .handle_event(SessionEvent::DismissConfirmation(DismissReason::CloseButton))
        .await;
    assert_eq!(h.session.view(), SessionView::Scanning);
    assert!(!h.session.is_processing());
    assert_eq!(h.camera.opens(), 1, "camera restarts only after the settle delay");

    assert_eq!(h.session.step().await, Some(Flow::Continue));
    assert_eq!(h.camera.opens(), 2);
    assert!(h.session.capture_active());

    let idle = tokio::time::timeout(Duration::from_secs(5), h.session.step()).await;
    assert!(idle.is_err(), "no further events expected");
    assert_eq!(h.camera.opens(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_tab_change_cancels_pending_restart() {
    let mut h = harness(&[]);
    h.session.begin().await;
    h.session.handle_event(detected("PKG123")).await;
    h.session
        .handle_event(SessionEvent::DismissConfirmation(DismissReason::Backdrop))
        .await;
    h.session.handle_event(SessionEvent::SelectTab(Tab::Manual)).await;

    // The stale settle timer still arrives but must not reopen the camera
    assert_eq!(h.session.step().await, Some(Flow::Continue));
    assert_eq!(h.camera.opens(), 1);
    assert_eq!(h.session.view(), SessionView::ManualEntry);
}

#[tokio::test]
async fn test_manual_entry_composes_code() {
    let mut h = harness(&[]);
    h.session.begin().await;
    h.session.handle_event(SessionEvent::SelectTab(Tab::Manual)).await;
    assert!(!h.session.capture_active());

    h.session
        .handle_event(SessionEvent::SubmitManual {
            tracking_id: "RESI1".into(),
            recipient: "Budi".into(),
        })
        .await;

    let confirmation = &h.view.confirmations()[0];
    assert!(confirmation.success);
    assert_eq!(confirmation.payload, "RESI1 | Budi");
    assert_eq!(confirmation.source, ScanSource::Manual);

    // Dismissing on the manual tab returns to the form without the camera
    h.session
        .handle_event(SessionEvent::DismissConfirmation(DismissReason::CancelKey))
        .await;
    assert_eq!(h.session.view(), SessionView::ManualEntry);
    assert_eq!(h.camera.opens(), 1);

    h.session.flush_logs().await;
    let writes = h.store.writes();
    assert_eq!(writes[0].value["meta"]["resi"], "RESI1");
    assert_eq!(writes[0].value["meta"]["recipient"], "Budi");
}

#[tokio::test]
async fn test_blank_tracking_id_only_notifies() {
    let mut h = harness(&[]);
    h.session.handle_event(SessionEvent::SelectTab(Tab::Manual)).await;
    h.session
        .handle_event(SessionEvent::SubmitManual {
            tracking_id: "   ".into(),
            recipient: "Budi".into(),
        })
        .await;

    assert!(h.view.confirmations().is_empty());
    assert_eq!(h.view.notices(), vec!["Mohon masukkan nomor resi"]);
    assert!(!h.session.is_processing());
    assert_eq!(h.session.view(), SessionView::ManualEntry);
}

#[tokio::test]
async fn test_tab_change_ignored_while_confirming() {
    let mut h = harness(&[]);
    h.session.begin().await;
    h.session.handle_event(detected("PKG123")).await;
    h.session.handle_event(SessionEvent::SelectTab(Tab::Manual)).await;

    assert_eq!(h.session.view(), SessionView::Confirming);
    assert_eq!(h.session.tab(), Tab::Scan);
}

#[tokio::test]
async fn test_detection_outside_scanning_is_discarded() {
    let mut h = harness(&[]);
    h.session.handle_event(SessionEvent::SelectTab(Tab::Manual)).await;
    h.session.handle_event(detected("PKG123")).await;

    assert!(h.view.confirmations().is_empty());
    assert!(!h.session.is_processing());
}

#[tokio::test]
async fn test_dispose_is_idempotent() {
    let mut h = harness(&[]);
    h.session.begin().await;

    h.session.dispose();
    h.session.dispose();
    assert_eq!(h.camera.stops(), 1);
    assert!(!h.session.capture_active());

    // Nothing restarts the camera after disposal
    h.session.handle_event(SessionEvent::RetryCamera).await;
    assert_eq!(h.camera.opens(), 1);
}

#[tokio::test]
async fn test_camera_failure_offers_retry() {
    let mut h = harness(&[]);
    h.camera.fail.store(true, Ordering::SeqCst);
    h.session.begin().await;

    assert!(!h.session.capture_active());
    assert_eq!(h.view.retries.lock().unwrap().len(), 1);

    h.camera.fail.store(false, Ordering::SeqCst);
    h.session.handle_event(SessionEvent::RetryCamera).await;
    assert!(h.session.capture_active());
    assert_eq!(h.camera.opens(), 2);
}

#[tokio::test]
async fn test_lost_stream_offers_retry() {
    let mut h = harness(&[]);
    h.session.begin().await;
    h.camera.end_stream();

    let flow = tokio::time::timeout(Duration::from_secs(5), h.session.step())
        .await
        .expect("stream loss should arrive");
    assert_eq!(flow, Some(Flow::Continue));
    assert!(!h.session.capture_active());
    assert_eq!(h.camera.stops(), 1);
    assert_eq!(
        *h.view.retries.lock().unwrap(),
        vec![CaptureError::StreamEnded]
    );

    h.session.handle_event(SessionEvent::RetryCamera).await;
    assert!(h.session.capture_active());
    assert_eq!(h.camera.opens(), 2);
}

#[tokio::test]
async fn test_capture_loss_ignored_while_stream_polls() {
    let mut h = harness(&[]);
    h.session.begin().await;
    h.session
        .handle_event(SessionEvent::CaptureLost(CaptureError::StreamEnded))
        .await;

    assert!(h.session.capture_active());
    assert_eq!(h.camera.stops(), 0);
    assert!(h.view.retries.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_poll_loop_detection_reaches_session() {
    let mut h = harness(&["PKG123"]);
    h.session.begin().await;

    let frame = CameraFrame::from_image(&RgbaImage::new(64, 48));
    assert!(h.camera.push_frame(frame));

    let flow = tokio::time::timeout(Duration::from_secs(5), h.session.step())
        .await
        .expect("detection should arrive");
    assert_eq!(flow, Some(Flow::Continue));
    assert_eq!(h.session.view(), SessionView::Confirming);
    assert_eq!(h.view.confirmations()[0].payload, "PKG123");
    assert!(!h.session.capture_active());
    assert_eq!(h.decoder.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_uploaded_image_is_confirmed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("label.png");
    RgbaImage::new(32, 32).save(&path).unwrap();

    let mut h = harness(&["PKG777"]);
    h.session.begin().await;
    h.session
        .handle_event(SessionEvent::UploadImage(path.clone()))
        .await;

    let confirmation = &h.view.confirmations()[0];
    assert_eq!(confirmation.payload, "PKG777");
    assert_eq!(confirmation.source, ScanSource::File);

    h.session.flush_logs().await;
    assert_eq!(h.store.writes()[0].value["meta"]["file"], "label.png");
}

#[tokio::test]
async fn test_upload_without_code_notifies() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("blank.png");
    RgbaImage::new(32, 32).save(&path).unwrap();

    let mut h = harness(&[]);
    h.session.begin().await;
    h.session.handle_event(SessionEvent::UploadImage(path)).await;

    assert!(h.view.confirmations().is_empty());
    assert_eq!(h.view.notices(), vec![messages::NO_CODE_IN_IMAGE]);
    assert!(h.session.capture_active());
}

#[tokio::test]
async fn test_upload_of_non_image_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.txt");
    std::fs::write(&path, "PKG777").unwrap();

    let mut h = harness(&["PKG777"]);
    h.session.begin().await;
    h.session.handle_event(SessionEvent::UploadImage(path)).await;

    assert!(h.view.confirmations().is_empty());
    assert_eq!(h.view.notices(), vec![messages::UNSUPPORTED_IMAGE]);
    assert_eq!(h.decoder.calls.load(Ordering::SeqCst), 0);
    assert!(h.session.capture_active());
}

#[tokio::test]
async fn test_shutdown_ends_run() {
    let h = harness(&[]);
    let handle = h.session.handle();
    let camera = Arc::clone(&h.camera);

    handle.shutdown();
    h.session.run().await;

    assert_eq!(camera.opens(), 1);
    assert_eq!(camera.stops(), 1);
    assert!(!handle.retry_camera(), "session is gone");
}

// SPDX-License-Identifier: GPL-3.0-only

//! In-memory stand-ins shared by the integration tests

#![allow(dead_code)]

use futures::channel::mpsc;
use futures::future::BoxFuture;
use image::RgbaImage;
use paxibox::capture::{
    CameraDevice, CameraFrame, CameraSource, CaptureResult, CaptureStream, StreamControl,
    StreamRequest,
};
use paxibox::decoder::PixelDecoder;
use paxibox::errors::{CaptureError, RemoteError};
use paxibox::intake::Confirmation;
use paxibox::remote::{ConnectionReport, IdentityProvider, RemoteStore, StoreKind};
use paxibox::session::{KioskView, SessionView, Tab};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Camera that hands out channel-backed streams and counts acquisitions
#[derive(Default)]
pub struct FakeCamera {
    pub opens: AtomicUsize,
    pub stops: Arc<AtomicUsize>,
    pub fail: AtomicBool,
    senders: Mutex<Vec<mpsc::Sender<CameraFrame>>>,
}

impl FakeCamera {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    /// Deliver a frame to the most recently opened stream
    pub fn push_frame(&self, frame: CameraFrame) -> bool {
        let mut senders = self.senders.lock().unwrap();
        match senders.last_mut() {
            Some(sender) => sender.try_send(frame).is_ok(),
            None => false,
        }
    }

    /// Close every open stream as an unplugged device would
    pub fn end_stream(&self) {
        self.senders.lock().unwrap().clear();
    }
}

struct FakeStream {
    stops: Arc<AtomicUsize>,
    stopped: bool,
}

impl StreamControl for FakeStream {
    fn label(&self) -> &str {
        "Fake Camera"
    }

    fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl CameraSource for FakeCamera {
    fn open(&self, _request: &StreamRequest) -> BoxFuture<'static, CaptureResult<CaptureStream>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Box::pin(async { Err(CaptureError::PermissionDenied("denied".into())) });
        }

        let (sender, frames) = mpsc::channel(4);
        self.senders.lock().unwrap().push(sender);
        let control = Box::new(FakeStream {
            stops: Arc::clone(&self.stops),
            stopped: false,
        });
        Box::pin(async move { Ok(CaptureStream { frames, control }) })
    }

    fn enumerate(&self) -> CaptureResult<Vec<CameraDevice>> {
        Ok(vec![CameraDevice {
            name: "Fake Camera".into(),
            path: "/dev/fake0".into(),
            location: Some("back".into()),
        }])
    }
}

/// Sampling decoder that answers whatever the test sets
#[derive(Default)]
pub struct ScriptedDecoder {
    answer: Mutex<Vec<String>>,
    pub calls: AtomicUsize,
}

impl ScriptedDecoder {
    pub fn answering(codes: &[&str]) -> Arc<Self> {
        let decoder = Self::default();
        decoder.set_answer(codes);
        Arc::new(decoder)
    }

    pub fn set_answer(&self, codes: &[&str]) {
        *self.answer.lock().unwrap() = codes.iter().map(|c| c.to_string()).collect();
    }
}

impl PixelDecoder for ScriptedDecoder {
    fn decode(&self, _image: &RgbaImage) -> Vec<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer.lock().unwrap().clone()
    }
}

/// Everything the session showed, in order
#[derive(Default)]
pub struct RecordingView {
    pub views: Mutex<Vec<SessionView>>,
    pub confirmations: Mutex<Vec<Confirmation>>,
    pub hidden: AtomicUsize,
    pub cameras: Mutex<Vec<String>>,
    pub retries: Mutex<Vec<CaptureError>>,
    pub notices: Mutex<Vec<String>>,
    pub reports: Mutex<Vec<ConnectionReport>>,
}

impl RecordingView {
    pub fn confirmations(&self) -> Vec<Confirmation> {
        self.confirmations.lock().unwrap().clone()
    }

    pub fn notices(&self) -> Vec<String> {
        self.notices.lock().unwrap().clone()
    }
}

impl KioskView for RecordingView {
    fn show_view(&self, view: SessionView, _tab: Tab) {
        self.views.lock().unwrap().push(view);
    }

    fn show_confirmation(&self, confirmation: &Confirmation) {
        self.confirmations.lock().unwrap().push(confirmation.clone());
    }

    fn hide_confirmation(&self) {
        self.hidden.fetch_add(1, Ordering::SeqCst);
    }

    fn camera_started(&self, device: &str) {
        self.cameras.lock().unwrap().push(device.to_string());
    }

    fn show_camera_retry(&self, error: &CaptureError) {
        self.retries.lock().unwrap().push(error.clone());
    }

    fn notify(&self, message: &str) {
        self.notices.lock().unwrap().push(message.to_string());
    }

    fn connection_report(&self, report: &ConnectionReport) {
        self.reports.lock().unwrap().push(report.clone());
    }
}

/// One recorded push
#[derive(Debug, Clone, PartialEq)]
pub struct Write {
    pub path: String,
    pub value: Value,
    pub auth: Option<String>,
}

/// Store keeping pushes in memory, optionally slow or failing
pub struct MemoryStore {
    kind: StoreKind,
    delay: Duration,
    reject: bool,
    writes: Arc<Mutex<Vec<Write>>>,
}

impl MemoryStore {
    pub fn new(kind: StoreKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            delay: Duration::ZERO,
            reject: false,
            writes: Arc::default(),
        })
    }

    pub fn slow(kind: StoreKind, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            kind,
            delay,
            reject: false,
            writes: Arc::default(),
        })
    }

    pub fn rejecting(kind: StoreKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            delay: Duration::ZERO,
            reject: true,
            writes: Arc::default(),
        })
    }

    pub fn writes(&self) -> Vec<Write> {
        self.writes.lock().unwrap().clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.writes().into_iter().map(|w| w.path).collect()
    }
}

impl RemoteStore for MemoryStore {
    fn kind(&self) -> StoreKind {
        self.kind
    }

    fn push(
        &self,
        path: &str,
        value: Value,
        auth: Option<String>,
    ) -> BoxFuture<'static, Result<String, RemoteError>> {
        let writes = Arc::clone(&self.writes);
        let delay = self.delay;
        let reject = self.reject;
        let path = path.to_string();
        Box::pin(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if reject {
                return Err(RemoteError::Rejected {
                    status: 401,
                    message: "Permission denied".into(),
                });
            }
            let mut writes = writes.lock().unwrap();
            writes.push(Write { path, value, auth });
            Ok(format!("-key{}", writes.len()))
        })
    }
}

/// Identity provider counting sign-ins
pub struct CountingIdentity {
    pub calls: AtomicUsize,
    pub fail: bool,
    /// Never answer
    pub hang: bool,
}

impl CountingIdentity {
    pub fn new(fail: bool) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail,
            hang: false,
        })
    }

    pub fn hanging() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            fail: false,
            hang: true,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl IdentityProvider for CountingIdentity {
    fn sign_in(&self) -> BoxFuture<'static, Result<String, RemoteError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let fail = self.fail;
        if self.hang {
            return Box::pin(futures::future::pending());
        }
        Box::pin(async move {
            if fail {
                Err(RemoteError::Rejected {
                    status: 400,
                    message: "ADMIN_ONLY_OPERATION".into(),
                })
            } else {
                Ok("token-1".to_string())
            }
        })
    }
}

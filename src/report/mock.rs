//! Deterministic fakes for the report pipeline
//!
//! These implement the pipeline's capability traits without touching the
//! network, a renderer or wall-clock time, and capture every interaction for
//! later assertions.
//!
//! # Example
//! ```no_run
//! use std::sync::Arc;
//! use snapreport::report::mock::{MockCapturer, MockClock, MockTransport};
//!
//! let clock = Arc::new(MockClock::new(0));
//! let transport = Arc::new(MockTransport::new().failing_with_status(500));
//! let capturer = Arc::new(MockCapturer::succeeding());
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::capture::{CaptureError, RenderMode, Screenshot, ScreenshotCapturer};
use crate::host::{Clock, ScrollPosition};

use super::error::TransportError;
use super::payload::SubmissionRequest;
use super::transport::{ProgressFn, ReportTransport};

/// Clock whose time only moves when slept on or advanced.
#[derive(Debug, Default)]
pub struct MockClock {
    now: AtomicU64,
    sleeps: Mutex<Vec<Duration>>,
}

impl MockClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: AtomicU64::new(start_ms),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }

    /// Every sleep requested so far, in order
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().clone()
    }

    pub fn sleep_count(&self) -> usize {
        self.sleeps.lock().len()
    }
}

#[async_trait]
impl Clock for MockClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().push(duration);
        self.advance(duration.as_millis() as u64);
        // Still a suspension point, so racing cancellation can win.
        tokio::task::yield_now().await;
    }
}

/// Hook run inside `submit`, after the request was handed over
pub type SubmitHook = Arc<dyn Fn(&SubmissionRequest) + Send + Sync>;

/// Transport that records submitted reports instead of sending them.
#[derive(Clone, Default)]
pub struct MockTransport {
    fail_status: Option<u16>,
    gate: Option<Arc<Notify>>,
    on_submit: Option<SubmitHook>,
    /// Captured reports, in submission order
    captured: Arc<Mutex<Vec<SubmissionRequest>>>,
    /// Every progress value reported
    progress: Arc<Mutex<Vec<u8>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every submission with a non-success status
    pub fn failing_with_status(mut self, status: u16) -> Self {
        self.fail_status = Some(status);
        self
    }

    /// Hold each submission until the returned handle is notified
    pub fn gated(mut self) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        self.gate = Some(gate.clone());
        (self, gate)
    }

    pub fn with_hook(mut self, hook: SubmitHook) -> Self {
        self.on_submit = Some(hook);
        self
    }

    pub fn submissions(&self) -> Vec<SubmissionRequest> {
        self.captured.lock().clone()
    }

    pub fn submission_count(&self) -> usize {
        self.captured.lock().len()
    }

    pub fn last_submission(&self) -> Option<SubmissionRequest> {
        self.captured.lock().last().cloned()
    }

    pub fn progress_reports(&self) -> Vec<u8> {
        self.progress.lock().clone()
    }
}

#[async_trait]
impl ReportTransport for MockTransport {
    async fn submit(
        &self,
        request: &SubmissionRequest,
        progress: ProgressFn,
    ) -> Result<(), TransportError> {
        self.captured.lock().push(request.clone());
        if let Some(hook) = &self.on_submit {
            hook(request);
        }
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        if let Some(status) = self.fail_status {
            return Err(TransportError::Status(status));
        }
        for percent in [50, 100] {
            self.progress.lock().push(percent);
            progress(percent);
        }
        Ok(())
    }
}

/// Screenshot capturer with a fixed outcome.
#[derive(Clone)]
pub struct MockCapturer {
    result: Result<Screenshot, CaptureError>,
    calls: Arc<Mutex<Vec<(ScrollPosition, RenderMode)>>>,
}

impl MockCapturer {
    pub fn succeeding() -> Self {
        Self::returning(Screenshot::Hosted {
            url: "https://cdn.test/screenshot.png".to_string(),
        })
    }

    pub fn returning(screenshot: Screenshot) -> Self {
        Self {
            result: Ok(screenshot),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing(error: CaptureError) -> Self {
        Self {
            result: Err(error),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Anchor and mode of every capture request
    pub fn calls(&self) -> Vec<(ScrollPosition, RenderMode)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ScreenshotCapturer for MockCapturer {
    async fn capture(
        &self,
        anchor: ScrollPosition,
        mode: RenderMode,
    ) -> Result<Screenshot, CaptureError> {
        self.calls.lock().push((anchor, mode));
        self.result.clone()
    }
}

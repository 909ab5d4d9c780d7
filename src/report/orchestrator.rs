//! Report orchestrator.
//!
//! Sequences one report at a time through
//! `Collecting → AwaitingReplay → CapturingScreenshot → Submitting` and
//! guarantees cleanup on every exit path, including a dropped future.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{broadcast, oneshot};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::capture::{
    CaptureError, ConsoleLog, LogPriority, NetworkRecorder, ReplayBuffer, ScreenshotCapturer,
};
use crate::config::Config;
use crate::host::{Clock, HostPage, PageState};

use super::error::{ReportError, TransportError};
use super::events::{EventBus, ReportEvent};
use super::payload::{CollectorSnapshot, Metadata, SubmissionRequest};
use super::session::{
    CrashInfo, CustomData, FormData, Priority, ReplayWait, ReportMode, ReportOptions,
    ReportOutcome, ReportSession, ReportStatus,
};
use super::transport::{ProgressFn, ReportTransport};

/// The collectors an orchestrator coordinates.
#[derive(Clone)]
pub struct Collectors {
    pub network: Arc<NetworkRecorder>,
    pub replay: Arc<ReplayBuffer>,
    pub console: Arc<ConsoleLog>,
    pub screenshot: Arc<dyn ScreenshotCapturer>,
}

impl Collectors {
    /// Build the buffered collectors from configuration
    pub fn from_config(
        config: &Config,
        clock: Arc<dyn Clock>,
        screenshot: Arc<dyn ScreenshotCapturer>,
    ) -> Self {
        Self {
            network: Arc::new(NetworkRecorder::from_config(&config.network, clock.clone())),
            replay: Arc::new(ReplayBuffer::from_config(&config.replay, clock)),
            console: Arc::new(ConsoleLog::new(config.console.max_entries)),
            screenshot,
        }
    }
}

/// Why a session stopped before reaching `Success`
enum Halt {
    Cancelled,
    Failed(ReportError),
}

impl From<CaptureError> for Halt {
    fn from(err: CaptureError) -> Self {
        Halt::Failed(err.into())
    }
}

impl From<TransportError> for Halt {
    fn from(err: TransportError) -> Self {
        Halt::Failed(err.into())
    }
}

/// Externally visible handle on the running session
struct ActiveSession {
    id: Uuid,
    mode: ReportMode,
    status: ReportStatus,
    cancel: CancellationToken,
    form_tx: Option<oneshot::Sender<FormData>>,
}

struct Shared {
    config: Config,
    collectors: Collectors,
    transport: Arc<dyn ReportTransport>,
    host: Arc<dyn HostPage>,
    clock: Arc<dyn Clock>,
    events: EventBus,
    /// Single-in-flight guard
    in_flight: AtomicBool,
    crash_reported: AtomicBool,
    active: Mutex<Option<ActiveSession>>,
    custom_data: Mutex<CustomData>,
    created_at_ms: u64,
}

/// Entry point for the report UI and the crash collaborator.
///
/// Cheap to clone; clones share the same guard and collectors.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Shared>,
}

impl Orchestrator {
    /// Create an orchestrator and start the collectors enabled in `config`
    pub fn new(
        config: Config,
        collectors: Collectors,
        transport: Arc<dyn ReportTransport>,
        host: Arc<dyn HostPage>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        if config.network.enabled {
            collectors.network.start();
        }
        if config.replay.enabled {
            collectors.replay.start();
        }

        let created_at_ms = clock.now_ms();
        Self {
            inner: Arc::new(Shared {
                config,
                collectors,
                transport,
                host,
                clock,
                events: EventBus::new(),
                in_flight: AtomicBool::new(false),
                crash_reported: AtomicBool::new(false),
                active: Mutex::new(None),
                custom_data: Mutex::new(CustomData::new()),
                created_at_ms,
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn collectors(&self) -> &Collectors {
        &self.inner.collectors
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReportEvent> {
        self.inner.events.subscribe()
    }

    pub fn is_report_in_progress(&self) -> bool {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    /// Status of the running session, `Idle` when there is none
    pub fn status(&self) -> ReportStatus {
        self.inner
            .active
            .lock()
            .as_ref()
            .map_or(ReportStatus::Idle, |active| active.status)
    }

    /// Run one report to completion.
    ///
    /// Returns `AlreadyInProgress` without doing anything if another report
    /// is in flight. Failures after the session started are returned as
    /// errors, after cleanup has run.
    pub async fn start_report(&self, options: ReportOptions) -> Result<ReportOutcome, ReportError> {
        if !self.inner.config.has_api_key() {
            return Err(ReportError::Configuration(
                "no API key configured".to_string(),
            ));
        }

        // Checked and set before the first await.
        if self
            .inner
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("Report already in progress, ignoring start");
            return Ok(ReportOutcome::AlreadyInProgress);
        }

        let host = &self.inner.host;
        let mut session = ReportSession::new(options, host.scroll_position());
        let mut guard = SessionGuard::new(self.inner.clone(), session.id);

        let cancel = CancellationToken::new();
        let needs_form =
            session.mode() == ReportMode::Interactive && session.options.form_data.is_none();
        let (form_tx, form_rx) = if needs_form {
            let (tx, rx) = oneshot::channel();
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };

        *self.inner.active.lock() = Some(ActiveSession {
            id: session.id,
            mode: session.mode(),
            status: ReportStatus::Collecting,
            cancel: cancel.clone(),
            form_tx,
        });

        if session.mode() == ReportMode::Interactive {
            guard.page_before = Some(host.page_state());
            host.lock_scroll();
            host.set_launcher_visible(false);
        }

        tracing::info!(
            report_id = %session.id,
            mode = ?session.mode(),
            priority = ?session.options.priority,
            "Report started"
        );
        self.emit(&session, || ReportEvent::Status {
            report_id: session.id,
            status: ReportStatus::Collecting,
        });

        let outcome = match self.run(&mut session, &cancel, form_rx).await {
            Ok(()) => {
                self.set_status(&mut session, ReportStatus::Success);
                Ok(ReportOutcome::Submitted {
                    report_id: session.id,
                })
            }
            Err(Halt::Cancelled) => {
                self.set_status(&mut session, ReportStatus::Cancelled);
                Ok(ReportOutcome::Cancelled)
            }
            Err(Halt::Failed(err)) => {
                tracing::warn!(report_id = %session.id, error = %err, "Report failed");
                self.set_status(&mut session, ReportStatus::Failed);
                self.emit(&session, || ReportEvent::Failed {
                    report_id: session.id,
                    reason: err.to_string(),
                    retryable: err.is_retryable(),
                });
                Err(err)
            }
        };

        drop(guard);
        outcome
    }

    async fn run(
        &self,
        session: &mut ReportSession,
        cancel: &CancellationToken,
        form_rx: Option<oneshot::Receiver<FormData>>,
    ) -> Result<(), Halt> {
        let inner = &self.inner;

        if let Some(form_rx) = form_rx {
            let form = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Halt::Cancelled),
                form = form_rx => form.map_err(|_| Halt::Cancelled)?,
            };
            session.form_data = form;
        }
        if session.mode() == ReportMode::Interactive {
            // Capture what the user saw when they opened the report.
            inner.host.scroll_to(session.snapshot_scroll);
        }

        if session.options.capture_replay && inner.config.replay.enabled {
            self.set_status(session, ReportStatus::AwaitingReplay);
            let wait = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Halt::Cancelled),
                wait = self.await_replay() => wait,
            };
            tracing::debug!(report_id = %session.id, ?wait, "Replay wait finished");
        }

        if session.options.capture_screenshot && inner.config.screenshot.enabled {
            self.set_status(session, ReportStatus::CapturingScreenshot);
            let capture = inner
                .collectors
                .screenshot
                .capture(session.snapshot_scroll, inner.config.screenshot.render_mode);
            let screenshot = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Halt::Cancelled),
                shot = capture => shot?,
            };
            session.screenshot = Some(screenshot);
        }

        if !self.enter_submitting(session.id, cancel) {
            return Err(Halt::Cancelled);
        }
        session.status = ReportStatus::Submitting;
        self.emit(session, || ReportEvent::Status {
            report_id: session.id,
            status: ReportStatus::Submitting,
        });

        let request = self.assemble(session);
        inner
            .transport
            .submit(&request, self.progress_fn(session))
            .await?;
        Ok(())
    }

    /// Poll replay readiness: one check, then up to `max_polls` sleep/check rounds
    async fn await_replay(&self) -> ReplayWait {
        let replay = &self.inner.collectors.replay;
        let config = &self.inner.config.replay;

        if replay.is_ready() {
            return ReplayWait::Ready { polls: 0 };
        }
        for poll in 1..=config.max_polls {
            self.inner.clock.sleep(config.poll_interval()).await;
            if replay.is_ready() {
                tracing::debug!(polls = poll, "Replay ready");
                return ReplayWait::Ready { polls: poll };
            }
        }

        tracing::info!(
            polls = config.max_polls,
            "Replay not ready, continuing with partial replay"
        );
        ReplayWait::TimedOut {
            polls: config.max_polls,
        }
    }

    /// Move to `Submitting` unless the session was cancelled. Shares the
    /// lock with `cancel_report`, so exactly one of them wins.
    fn enter_submitting(&self, id: Uuid, cancel: &CancellationToken) -> bool {
        let mut active = self.inner.active.lock();
        match active.as_mut() {
            Some(session) if session.id == id && !cancel.is_cancelled() => {
                session.status = ReportStatus::Submitting;
                true
            }
            _ => false,
        }
    }

    fn assemble(&self, session: &ReportSession) -> SubmissionRequest {
        let inner = &self.inner;
        let config = &inner.config;
        let collectors = &inner.collectors;

        let network_logs = if config.network.enabled {
            collectors.network.get_requests()
        } else {
            Vec::new()
        };
        let replay = if session.options.capture_replay && config.replay.enabled {
            collectors.replay.stop(true);
            collectors.replay.result()
        } else {
            None
        };
        let console_log = if config.console.enabled {
            collectors.console.snapshot()
        } else {
            Vec::new()
        };

        let snapshot = CollectorSnapshot {
            network_logs,
            replay,
            console_log,
            custom_data: inner.custom_data.lock().clone(),
        };
        let elapsed = inner.clock.now_ms().saturating_sub(inner.created_at_ms);
        let metadata = Metadata::collect(
            session.id,
            &inner.host.page_info(),
            config,
            Duration::from_millis(elapsed),
        );

        tracing::debug!(
            report_id = %session.id,
            network_logs = snapshot.network_logs.len(),
            console_logs = snapshot.console_log.len(),
            replay = snapshot.replay.is_some(),
            "Report assembled"
        );
        SubmissionRequest::assemble(session, snapshot, metadata)
    }

    fn progress_fn(&self, session: &ReportSession) -> ProgressFn {
        let events = self.inner.events.clone();
        let report_id = session.id;
        let interactive = session.mode() == ReportMode::Interactive;
        Arc::new(move |percent| {
            if interactive {
                events.emit(ReportEvent::Progress { report_id, percent });
            }
        })
    }

    fn set_status(&self, session: &mut ReportSession, status: ReportStatus) {
        session.status = status;
        if let Some(active) = self.inner.active.lock().as_mut() {
            if active.id == session.id {
                active.status = status;
            }
        }
        tracing::info!(report_id = %session.id, %status, "Report status changed");
        self.emit(session, || ReportEvent::Status {
            report_id: session.id,
            status,
        });
    }

    /// Silent sessions never notify the UI
    fn emit(&self, session: &ReportSession, event: impl FnOnce() -> ReportEvent) {
        if session.mode() == ReportMode::Interactive {
            self.inner.events.emit(event());
        }
    }

    /// Cancel the running session if it has not started submitting.
    /// Returns whether a session was cancelled.
    pub fn cancel_report(&self) -> bool {
        let active = self.inner.active.lock();
        match active.as_ref() {
            Some(session) if session.status.is_cancellable() => {
                tracing::info!(report_id = %session.id, "Report cancelled");
                session.cancel.cancel();
                true
            }
            _ => false,
        }
    }

    /// Hand the completed report form to the waiting session.
    /// Returns false when no session is waiting for one.
    pub fn submit_form(&self, form_data: FormData) -> bool {
        let form_tx = self
            .inner
            .active
            .lock()
            .as_mut()
            .and_then(|session| session.form_tx.take());
        match form_tx {
            Some(tx) => tx.send(form_data).is_ok(),
            None => false,
        }
    }

    /// Report an uncaught host error.
    ///
    /// The crash is always written to the console log. With `crash.silent`
    /// it is submitted as a high-priority report carrying the crash text;
    /// otherwise an interactive report is opened for the user to fill in.
    /// Only the first crash that actually starts a report is reported.
    pub async fn report_crash(&self, crash: CrashInfo) -> Result<ReportOutcome, ReportError> {
        let description = crash.description();
        self.inner
            .collectors
            .console
            .add(description.clone(), LogPriority::Error);

        if self.inner.crash_reported.swap(true, Ordering::SeqCst) {
            tracing::debug!("Crash already reported, skipping");
            return Ok(ReportOutcome::CrashAlreadyReported);
        }

        let options = if self.inner.config.crash.silent {
            let mut form = FormData::new();
            form.insert("description".to_string(), Value::String(description));
            ReportOptions::silent()
                .with_priority(Priority::High)
                .with_form_data(form)
        } else {
            ReportOptions::interactive()
        };

        let outcome = self.start_report(options).await;
        if matches!(outcome, Ok(ReportOutcome::AlreadyInProgress)) {
            // Another report held the guard; the next crash may still report.
            self.inner.crash_reported.store(false, Ordering::SeqCst);
        }
        outcome
    }

    pub fn attach_custom_data(&self, data: CustomData) {
        self.inner.custom_data.lock().extend(data);
    }

    pub fn set_custom_data(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.inner.custom_data.lock().insert(key.into(), value.into());
    }

    pub fn remove_custom_data(&self, key: &str) -> Option<Value> {
        self.inner.custom_data.lock().remove(key)
    }

    pub fn clear_custom_data(&self) {
        self.inner.custom_data.lock().clear();
    }

    pub fn custom_data(&self) -> CustomData {
        self.inner.custom_data.lock().clone()
    }
}

/// Restores collector and page state when a session ends, however it ends.
struct SessionGuard {
    inner: Arc<Shared>,
    report_id: Uuid,
    network_was_stopped: bool,
    /// Page state before an interactive session changed it
    page_before: Option<PageState>,
}

impl SessionGuard {
    fn new(inner: Arc<Shared>, report_id: Uuid) -> Self {
        let network_was_stopped = inner.collectors.network.is_stopped();
        Self {
            inner,
            report_id,
            network_was_stopped,
            page_before: None,
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let inner = &self.inner;
        inner
            .collectors
            .network
            .set_stopped(self.network_was_stopped);
        if inner.config.replay.enabled {
            inner.collectors.replay.start();
        }
        if let Some(before) = self.page_before {
            if !before.scroll_locked {
                inner.host.unlock_scroll();
            }
            inner.host.set_launcher_visible(before.launcher_visible);
        }

        let mode = inner.active.lock().take().map(|active| active.mode);
        inner.in_flight.store(false, Ordering::SeqCst);
        tracing::debug!(report_id = %self.report_id, ?mode, "Report session cleaned up");
    }
}

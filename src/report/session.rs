//! Report session types.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::capture::Screenshot;
use crate::host::ScrollPosition;

/// Form fields collected by the report UI
pub type FormData = BTreeMap<String, Value>;

/// Host-supplied key/value data attached to every report
pub type CustomData = BTreeMap<String, Value>;

/// How a report interacts with the page.
///
/// Interactive reports lock scrolling, hide the launcher and notify
/// subscribers. Silent reports (crashes, programmatic submissions) touch
/// nothing on the page and fail without notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportMode {
    Interactive,
    Silent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Idle,
    Collecting,
    AwaitingReplay,
    CapturingScreenshot,
    Submitting,
    Success,
    Failed,
    Cancelled,
}

impl ReportStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ReportStatus::Success | ReportStatus::Failed | ReportStatus::Cancelled
        )
    }

    /// Cancellation is honoured only before submission starts
    pub fn is_cancellable(self) -> bool {
        matches!(
            self,
            ReportStatus::Collecting
                | ReportStatus::AwaitingReplay
                | ReportStatus::CapturingScreenshot
        )
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReportStatus::Idle => "idle",
            ReportStatus::Collecting => "collecting",
            ReportStatus::AwaitingReplay => "awaiting_replay",
            ReportStatus::CapturingScreenshot => "capturing_screenshot",
            ReportStatus::Submitting => "submitting",
            ReportStatus::Success => "success",
            ReportStatus::Failed => "failed",
            ReportStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    #[default]
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeedbackType {
    #[default]
    Bug,
    Rating,
    FeatureRequest,
}

/// Options for one report session.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportOptions {
    pub mode: ReportMode,
    pub priority: Priority,
    pub feedback_type: FeedbackType,
    /// Pre-filled form data. Interactive reports without it wait for
    /// the UI to call `submit_form`.
    pub form_data: Option<FormData>,
    pub capture_screenshot: bool,
    pub capture_replay: bool,
}

impl ReportOptions {
    pub fn interactive() -> Self {
        Self {
            mode: ReportMode::Interactive,
            priority: Priority::default(),
            feedback_type: FeedbackType::default(),
            form_data: None,
            capture_screenshot: true,
            capture_replay: true,
        }
    }

    pub fn silent() -> Self {
        Self {
            mode: ReportMode::Silent,
            form_data: Some(FormData::new()),
            ..Self::interactive()
        }
    }

    /// Silent bug report with the usual email/description form
    pub fn silent_report(
        email: impl Into<String>,
        description: impl Into<String>,
        priority: Priority,
    ) -> Self {
        let mut form = FormData::new();
        form.insert("email".to_string(), Value::String(email.into()));
        form.insert("description".to_string(), Value::String(description.into()));
        Self::silent().with_priority(priority).with_form_data(form)
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_feedback_type(mut self, feedback_type: FeedbackType) -> Self {
        self.feedback_type = feedback_type;
        self
    }

    pub fn with_form_data(mut self, form_data: FormData) -> Self {
        self.form_data = Some(form_data);
        self
    }

    pub fn without_screenshot(mut self) -> Self {
        self.capture_screenshot = false;
        self
    }

    pub fn without_replay(mut self) -> Self {
        self.capture_replay = false;
        self
    }

    pub fn is_silent(&self) -> bool {
        self.mode == ReportMode::Silent
    }
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self::interactive()
    }
}

/// How the wait for replay data ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayWait {
    /// Replay was ready after `polls` sleeps
    Ready { polls: u32 },
    /// Poll ceiling reached; the report continues with what exists
    TimedOut { polls: u32 },
}

/// Working state for one report.
#[derive(Debug, Clone)]
pub struct ReportSession {
    pub id: Uuid,
    pub options: ReportOptions,
    pub status: ReportStatus,
    /// Scroll position when the report was started
    pub snapshot_scroll: ScrollPosition,
    pub form_data: FormData,
    pub screenshot: Option<Screenshot>,
}

impl ReportSession {
    pub fn new(options: ReportOptions, snapshot_scroll: ScrollPosition) -> Self {
        Self {
            id: Uuid::new_v4(),
            form_data: options.form_data.clone().unwrap_or_default(),
            options,
            status: ReportStatus::Collecting,
            snapshot_scroll,
            screenshot: None,
        }
    }

    pub fn mode(&self) -> ReportMode {
        self.options.mode
    }
}

/// Result of `start_report` that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    Submitted { report_id: Uuid },
    Cancelled,
    /// Another report was already in flight; nothing was done
    AlreadyInProgress,
    /// A crash was already reported by this orchestrator
    CrashAlreadyReported,
}

/// Uncaught host error reported by the crash collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrashInfo {
    pub message: String,
    pub url: String,
    pub line: u32,
    pub column: u32,
    pub error: Option<String>,
}

impl CrashInfo {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn at(mut self, url: impl Into<String>, line: u32, column: u32) -> Self {
        self.url = url.into();
        self.line = line;
        self.column = column;
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Description sent in the crash report's form data
    pub fn description(&self) -> String {
        format!(
            "Message: {}\nURL: {}\nLine: {}\nColumn: {}\nError object: {}",
            self.message,
            self.url,
            self.line,
            self.column,
            self.error.as_deref().unwrap_or("")
        )
    }
}

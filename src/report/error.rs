//! Report pipeline error types.

use crate::capture::CaptureError;

/// Submission to the collector failed.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The request never produced a response.
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The collector answered with something other than 200/201.
    #[error("Collector rejected report with status {0}")]
    Status(u16),

    /// Payload could not be serialized.
    #[error("Failed to encode report: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Error type for a report session.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// Reporting cannot start at all (e.g. no API key).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Screenshot could not be taken.
    #[error("Screenshot capture failed: {0}")]
    Capture(#[from] CaptureError),

    #[error("Submission failed: {0}")]
    Transport(#[from] TransportError),
}

impl ReportError {
    /// Whether the user may retry the same report
    pub fn is_retryable(&self) -> bool {
        matches!(self, ReportError::Capture(_) | ReportError::Transport(_))
    }
}

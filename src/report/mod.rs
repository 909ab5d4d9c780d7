//! Report sessions: orchestration, payload assembly and delivery.

pub mod error;
pub mod events;
pub mod mock;
pub mod orchestrator;
pub mod payload;
pub mod session;
pub mod transport;

pub use error::{ReportError, TransportError};
pub use events::{EventBus, ReportEvent};
pub use orchestrator::{Collectors, Orchestrator};
pub use payload::{CollectorSnapshot, Metadata, SubmissionRequest};
pub use session::{
    CrashInfo, CustomData, FeedbackType, FormData, Priority, ReplayWait, ReportMode,
    ReportOptions, ReportOutcome, ReportSession, ReportStatus,
};
pub use transport::{HttpReportTransport, ProgressFn, ReportTransport};

pub mod capture;
pub mod config;
pub mod host;
pub mod report;
pub mod util;

pub use capture::{
    CaptureError, ConsoleLog, NetworkRecorder, RecordingClient, ReplayBuffer, ScreenshotCapturer,
};
pub use config::Config;
pub use host::{Clock, HeadlessPage, HostPage, SystemClock};
pub use report::{
    Orchestrator, ReportError, ReportEvent, ReportOptions, ReportOutcome, ReportStatus,
};

//! Passive collectors feeding the report pipeline.

pub mod console;
pub mod network;
pub mod replay;
pub mod screenshot;
pub mod scrub;

pub use console::{ConsoleCaptureLayer, ConsoleLog, ConsoleLogEntry, LogPriority};
pub use network::{
    HttpClient, HttpError, HttpRequest, HttpResponse, NetworkLogEntry, NetworkRecorder,
    PendingCall, RecordingClient, ReqwestClient,
};
pub use replay::{ReplayBuffer, ReplayResult, ReplaySegment};
pub use screenshot::{
    CaptureError, PageCapturer, RenderMode, Screenshot, ScreenshotCapturer, StructuredSnapshot,
};
pub use scrub::Scrubber;

//! Notifications for the report UI.

use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::session::ReportStatus;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReportEvent {
    Status { report_id: Uuid, status: ReportStatus },
    /// Upload progress in percent
    Progress { report_id: Uuid, percent: u8 },
    Failed {
        report_id: Uuid,
        reason: String,
        /// The UI may offer to try again
        retryable: bool,
    },
}

/// Fan-out of [`ReportEvent`]s. Sends never block and never fail when
/// nobody is listening.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ReportEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReportEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: ReportEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

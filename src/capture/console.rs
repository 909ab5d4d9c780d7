//! Bounded console log shipped with each report as `consoleLog`.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

/// Events from this crate are pipeline noise, not host console output.
const OWN_TARGET: &str = "snapreport";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogPriority {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsoleLogEntry {
    pub log: String,
    pub date: DateTime<Utc>,
    pub priority: LogPriority,
}

#[derive(Debug)]
pub struct ConsoleLog {
    max_entries: usize,
    entries: Mutex<VecDeque<ConsoleLogEntry>>,
}

impl ConsoleLog {
    pub fn new(max_entries: usize) -> Self {
        Self {
            max_entries: max_entries.max(1),
            entries: Mutex::new(VecDeque::new()),
        }
    }

    pub fn add(&self, log: impl Into<String>, priority: LogPriority) {
        let mut entries = self.entries.lock();
        entries.push_back(ConsoleLogEntry {
            log: log.into(),
            date: Utc::now(),
            priority,
        });
        while entries.len() > self.max_entries {
            entries.pop_front();
        }
    }

    pub fn snapshot(&self) -> Vec<ConsoleLogEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

/// `tracing` layer that mirrors host log events into a [`ConsoleLog`].
///
/// `INFO`, `WARN` and `ERROR` events are kept; finer levels are ignored.
#[derive(Clone)]
pub struct ConsoleCaptureLayer {
    log: Arc<ConsoleLog>,
}

impl ConsoleCaptureLayer {
    pub fn new(log: Arc<ConsoleLog>) -> Self {
        Self { log }
    }
}

impl<S: Subscriber> Layer<S> for ConsoleCaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let target = metadata.target();
        if target == OWN_TARGET || target.starts_with("snapreport::") {
            return;
        }

        let priority = match *metadata.level() {
            Level::ERROR => LogPriority::Error,
            Level::WARN => LogPriority::Warning,
            Level::INFO => LogPriority::Info,
            _ => return,
        };

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        self.log.add(visitor.finish(), priority);
    }
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: Vec<String>,
}

impl MessageVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else if self.message.is_empty() {
            self.fields.join(" ")
        } else {
            format!("{} {}", self.message, self.fields.join(" "))
        }
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push(format!("{}={}", field.name(), value));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.fields.push(format!("{}={:?}", field.name(), value));
        }
    }
}

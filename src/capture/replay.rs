//! Session replay buffer.
//!
//! Segments are opaque to this crate; only their timestamps matter. The
//! buffer is bounded both by segment count and by the time span it covers,
//! and evicts from the front when either bound is exceeded.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::config::ReplayConfig;
use crate::host::Clock;

/// One recorded UI mutation or interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplaySegment {
    /// Milliseconds since the Unix epoch
    pub timestamp: u64,
    pub data: serde_json::Value,
}

impl ReplaySegment {
    pub fn new(timestamp: u64, data: serde_json::Value) -> Self {
        Self { timestamp, data }
    }
}

/// Materialized replay artifact shipped as `webReplay`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayResult {
    pub started_at: u64,
    pub ended_at: u64,
    pub events: Vec<ReplaySegment>,
}

#[derive(Debug, Default)]
struct ReplayState {
    recording: bool,
    started_at: Option<u64>,
    segments: VecDeque<ReplaySegment>,
    result: Option<Arc<ReplayResult>>,
}

pub struct ReplayBuffer {
    max_segments: usize,
    max_duration_ms: u64,
    clock: Arc<dyn Clock>,
    state: Mutex<ReplayState>,
}

impl ReplayBuffer {
    pub fn new(max_segments: usize, max_duration_ms: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            max_segments: max_segments.max(1),
            max_duration_ms: max_duration_ms.max(1),
            clock,
            state: Mutex::new(ReplayState::default()),
        }
    }

    pub fn from_config(config: &ReplayConfig, clock: Arc<dyn Clock>) -> Self {
        Self::new(config.max_segments, config.max_duration_ms, clock)
    }

    /// Begin a fresh recording window. Prior segments and result are dropped.
    pub fn start(&self) {
        let now = self.clock.now_ms();
        let mut state = self.state.lock();
        *state = ReplayState {
            recording: true,
            started_at: Some(now),
            segments: VecDeque::new(),
            result: None,
        };
        tracing::debug!(started_at = now, "Replay recording started");
    }

    /// Append a segment. Returns false when the buffer is not recording.
    pub fn record(&self, segment: ReplaySegment) -> bool {
        let mut state = self.state.lock();
        if !state.recording {
            return false;
        }

        let idx = state
            .segments
            .iter()
            .rposition(|s| s.timestamp <= segment.timestamp)
            .map_or(0, |i| i + 1);
        state.segments.insert(idx, segment);
        self.evict(&mut state.segments);
        true
    }

    fn evict(&self, segments: &mut VecDeque<ReplaySegment>) {
        while segments.len() > self.max_segments {
            segments.pop_front();
        }
        while let (Some(first), Some(last)) = (segments.front(), segments.back()) {
            if last.timestamp.saturating_sub(first.timestamp) <= self.max_duration_ms {
                break;
            }
            segments.pop_front();
        }
    }

    /// Whether the recording window has reached either ceiling
    pub fn is_full(&self) -> bool {
        let state = self.state.lock();
        if state.segments.len() >= self.max_segments {
            return true;
        }
        match state.started_at {
            Some(started) if state.recording => {
                self.clock.now_ms().saturating_sub(started) >= self.max_duration_ms
            }
            _ => false,
        }
    }

    /// Readiness signal polled while a report waits for replay data
    pub fn is_ready(&self) -> bool {
        let has_result = self.state.lock().result.is_some();
        has_result || self.is_full()
    }

    /// Stop recording. With `finalize` the current window is materialized
    /// into the result, unless one already exists.
    pub fn stop(&self, finalize: bool) {
        let now = self.clock.now_ms();
        let mut state = self.state.lock();
        let was_recording = std::mem::replace(&mut state.recording, false);

        if !finalize {
            state.segments.clear();
            tracing::debug!("Replay recording discarded");
            return;
        }
        if state.result.is_some() || (!was_recording && state.segments.is_empty()) {
            return;
        }

        let events: Vec<ReplaySegment> = state.segments.iter().cloned().collect();
        let started_at = events
            .first()
            .map(|s| s.timestamp)
            .or(state.started_at)
            .unwrap_or(now);
        tracing::debug!(segments = events.len(), "Replay result materialized");
        state.result = Some(Arc::new(ReplayResult {
            started_at,
            ended_at: now,
            events,
        }));
    }

    pub fn result(&self) -> Option<Arc<ReplayResult>> {
        self.state.lock().result.clone()
    }

    pub fn is_recording(&self) -> bool {
        self.state.lock().recording
    }

    pub fn len(&self) -> usize {
        self.state.lock().segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().segments.is_empty()
    }
}

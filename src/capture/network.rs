//! Network activity recorder.
//!
//! Host HTTP traffic is observed through a recording wrapper injected in
//! place of the host's client ([`RecordingClient`]), or through the manual
//! [`NetworkRecorder::begin`] / [`PendingCall::finish`] pair for hosts that
//! complete requests from callbacks. Either way the recorder keeps a bounded,
//! `startedAt`-ordered log and never alters what the caller sees.

use std::collections::{BTreeMap, VecDeque};
use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::capture::scrub::Scrubber;
use crate::config::NetworkConfig;
use crate::host::Clock;

/// Outbound HTTP request as seen by the host client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    pub fn post(url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self::new("POST", url).with_body(body)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HttpError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("request timed out")]
    Timeout,

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// The host's HTTP capability
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, HttpError>;
}

/// [`HttpClient`] backed by `reqwest`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|e| HttpError::InvalidRequest(e.to_string()))?;

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response.bytes().await.map_err(map_reqwest_error)?.to_vec();

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn map_reqwest_error(err: reqwest::Error) -> HttpError {
    if err.is_timeout() {
        HttpError::Timeout
    } else {
        HttpError::Request(err.to_string())
    }
}

/// Summary of one completed HTTP call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkLogEntry {
    pub method: String,
    pub url: String,
    pub request_headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub response_headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Milliseconds since the Unix epoch
    pub started_at: u64,
    pub duration_ms: u64,
}

/// Bounded log of observed HTTP calls.
pub struct NetworkRecorder {
    max_entries: usize,
    max_body_bytes: usize,
    scrubber: Scrubber,
    clock: Arc<dyn Clock>,
    enabled: AtomicBool,
    stopped: AtomicBool,
    entries: Mutex<VecDeque<Arc<NetworkLogEntry>>>,
}

impl NetworkRecorder {
    pub fn new(
        max_entries: usize,
        max_body_bytes: usize,
        scrubber: Scrubber,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let max_entries = max_entries.max(1);
        Self {
            max_entries,
            max_body_bytes,
            scrubber,
            clock,
            enabled: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            entries: Mutex::new(VecDeque::with_capacity(max_entries)),
        }
    }

    pub fn from_config(config: &NetworkConfig, clock: Arc<dyn Clock>) -> Self {
        Self::new(
            config.max_entries,
            config.max_body_bytes,
            Scrubber::with_extra_headers(&config.redact_headers),
            clock,
        )
    }

    /// Begin observing calls routed through this recorder
    pub fn start(&self) {
        self.enabled.store(true, Ordering::SeqCst);
    }

    /// Pause recording; already captured entries are kept
    pub fn stop(&self) {
        self.set_stopped(true);
    }

    pub fn set_stopped(&self, stopped: bool) {
        self.stopped.store(stopped, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn is_recording(&self) -> bool {
        self.enabled.load(Ordering::SeqCst) && !self.is_stopped()
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Snapshot of the current log. Later calls and evictions do not affect it.
    pub fn get_requests(&self) -> Vec<Arc<NetworkLogEntry>> {
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

    /// Start observing a call. The returned handle records the entry once
    /// the call is finished; dropping it unfinished records nothing.
    pub fn begin(self: &Arc<Self>, request: &HttpRequest) -> PendingCall {
        if !self.is_recording() {
            return PendingCall::inert();
        }

        PendingCall {
            recorder: Some(Arc::clone(self)),
            method: request.method.to_ascii_uppercase(),
            url: self.scrubber.scrub_string(&request.url),
            request_headers: self.capture_headers(&request.headers),
            request_body: request.body.as_deref().and_then(|b| self.capture_body(b)),
            started_at: self.clock.now_ms(),
        }
    }

    fn capture_headers(&self, headers: &[(String, String)]) -> BTreeMap<String, String> {
        headers
            .iter()
            .map(|(name, value)| {
                (
                    name.to_ascii_lowercase(),
                    self.scrubber.scrub_header(name, value),
                )
            })
            .collect()
    }

    fn capture_body(&self, body: &[u8]) -> Option<String> {
        if body.is_empty() {
            return None;
        }
        let text = truncate_body(body, self.max_body_bytes);
        Some(self.scrubber.scrub_string(&text))
    }

    fn push(&self, entry: NetworkLogEntry) {
        let mut entries = self.entries.lock();
        // Calls can finish out of order; keep the log sorted by start time.
        let idx = entries
            .iter()
            .rposition(|e| e.started_at <= entry.started_at)
            .map_or(0, |i| i + 1);
        entries.insert(idx, Arc::new(entry));
        while entries.len() > self.max_entries {
            entries.pop_front();
        }
    }
}

/// An observed call that has not completed yet.
#[must_use = "a pending call records nothing until it is finished"]
pub struct PendingCall {
    recorder: Option<Arc<NetworkRecorder>>,
    method: String,
    url: String,
    request_headers: BTreeMap<String, String>,
    request_body: Option<String>,
    started_at: u64,
}

impl PendingCall {
    fn inert() -> Self {
        Self {
            recorder: None,
            method: String::new(),
            url: String::new(),
            request_headers: BTreeMap::new(),
            request_body: None,
            started_at: 0,
        }
    }

    /// Whether finishing this call will produce a log entry
    pub fn is_recording(&self) -> bool {
        self.recorder.is_some()
    }

    pub fn finish(self, response: &HttpResponse) {
        let Some(recorder) = self.recorder.clone() else {
            return;
        };
        let response_headers = recorder.capture_headers(&response.headers);
        let response_body = recorder.capture_body(&response.body);
        self.complete(&recorder, Some(response.status), response_headers, response_body, None);
    }

    pub fn fail(self, error: &impl Display) {
        let Some(recorder) = self.recorder.clone() else {
            return;
        };
        let message = recorder.scrubber.scrub_string(&error.to_string());
        self.complete(&recorder, None, BTreeMap::new(), None, Some(message));
    }

    fn complete(
        self,
        recorder: &NetworkRecorder,
        status: Option<u16>,
        response_headers: BTreeMap<String, String>,
        response_body: Option<String>,
        error: Option<String>,
    ) {
        let duration_ms = recorder.clock.now_ms().saturating_sub(self.started_at);
        recorder.push(NetworkLogEntry {
            method: self.method,
            url: self.url,
            request_headers: self.request_headers,
            request_body: self.request_body,
            status,
            response_headers,
            response_body,
            error,
            started_at: self.started_at,
            duration_ms,
        });
    }
}

/// Decode a body lossily and cut it to at most `max` bytes on a char boundary
fn truncate_body(body: &[u8], max: usize) -> String {
    let text = String::from_utf8_lossy(body);
    if text.len() <= max {
        return text.into_owned();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &text[..end])
}

/// [`HttpClient`] wrapper that records every call through a [`NetworkRecorder`].
///
/// The inner client's result is returned untouched.
#[derive(Clone)]
pub struct RecordingClient {
    inner: Arc<dyn HttpClient>,
    recorder: Arc<NetworkRecorder>,
}

impl RecordingClient {
    pub fn new(inner: Arc<dyn HttpClient>, recorder: Arc<NetworkRecorder>) -> Self {
        Self { inner, recorder }
    }

    pub fn recorder(&self) -> &Arc<NetworkRecorder> {
        &self.recorder
    }
}

#[async_trait]
impl HttpClient for RecordingClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let call = self.recorder.begin(&request);
        let result = self.inner.execute(request).await;
        match &result {
            Ok(response) => call.finish(response),
            Err(err) => call.fail(err),
        }
        result
    }
}

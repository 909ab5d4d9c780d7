//! Delivery of assembled reports to the collector.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Body, Client};

use crate::config::Config;

use super::error::TransportError;
use super::payload::SubmissionRequest;

/// Upload progress callback, called with a percentage in `0..=100`
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

/// Bytes handed to the HTTP stack per progress tick
const UPLOAD_CHUNK: usize = 16 * 1024;

const JSON_CONTENT_TYPE: &str = "application/json;charset=UTF-8";

/// Sends one report. Called at most once per session; never retried here.
#[async_trait]
pub trait ReportTransport: Send + Sync {
    async fn submit(
        &self,
        request: &SubmissionRequest,
        progress: ProgressFn,
    ) -> Result<(), TransportError>;
}

/// Posts reports as JSON to `{api_url}/bugs`.
#[derive(Debug, Clone)]
pub struct HttpReportTransport {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl HttpReportTransport {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.submit_url(),
            config.api_key.clone().unwrap_or_default(),
        )
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ReportTransport for HttpReportTransport {
    async fn submit(
        &self,
        request: &SubmissionRequest,
        progress: ProgressFn,
    ) -> Result<(), TransportError> {
        let body = request.to_json()?;
        let total = body.len();
        tracing::info!(
            report_id = %request.report_id(),
            bytes = total,
            endpoint = %self.endpoint,
            "Submitting report"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .header(CONTENT_LENGTH, total)
            .header("Api-Token", &self.api_key)
            .body(progress_body(body, progress.clone()))
            .send()
            .await?;

        let status = response.status().as_u16();
        match status {
            200 | 201 => {
                progress(100);
                tracing::info!(report_id = %request.report_id(), status, "Report accepted");
                Ok(())
            }
            _ => {
                tracing::warn!(report_id = %request.report_id(), status, "Report rejected");
                Err(TransportError::Status(status))
            }
        }
    }
}

/// Stream `body` in chunks, reporting the share handed over so far
fn progress_body(body: Vec<u8>, progress: ProgressFn) -> Body {
    let total = body.len();
    let chunks: Vec<Vec<u8>> = body.chunks(UPLOAD_CHUNK).map(<[u8]>::to_vec).collect();
    let mut sent = 0usize;
    let stream = futures::stream::iter(chunks.into_iter().map(move |chunk| {
        sent += chunk.len();
        progress(upload_percent(sent, total));
        Ok::<_, std::io::Error>(chunk)
    }));
    Body::wrap_stream(stream)
}

fn upload_percent(sent: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((sent.min(total) * 100) / total) as u8
}

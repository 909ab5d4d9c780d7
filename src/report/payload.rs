//! Submission payload sent to the collector.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::capture::{
    ConsoleLogEntry, NetworkLogEntry, ReplayResult, Screenshot, StructuredSnapshot,
};
use crate::config::Config;
use crate::host::PageInfo;

use super::session::{CustomData, FeedbackType, FormData, Priority, ReportSession};

pub const SDK_NAME: &str = "snapreport";

/// Device and page facts sent as `metaData`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub report_id: Uuid,
    pub created_at: DateTime<Utc>,
    /// Seconds since the orchestrator was created
    pub session_duration: u64,
    pub sdk_version: String,
    pub app_version_code: String,
    pub app_build_number: String,
    pub current_url: String,
    pub user_agent: String,
    pub language: String,
    pub screen_width: u32,
    pub screen_height: u32,
    pub device_pixel_ratio: f64,
    pub mobile: bool,
}

impl Metadata {
    pub fn collect(
        report_id: Uuid,
        page: &PageInfo,
        config: &Config,
        session_duration: Duration,
    ) -> Self {
        Self {
            report_id,
            created_at: Utc::now(),
            session_duration: session_duration.as_secs(),
            sdk_version: format!("{SDK_NAME}/{}", env!("CARGO_PKG_VERSION")),
            app_version_code: config.app_version_code.clone(),
            app_build_number: config.app_build_number.clone(),
            current_url: page.url.clone(),
            user_agent: page.user_agent.clone(),
            language: page.language.clone(),
            screen_width: page.viewport_width,
            screen_height: page.viewport_height,
            device_pixel_ratio: page.device_pixel_ratio,
            mobile: page.is_mobile,
        }
    }
}

/// Collector contents read once at assembly time.
#[derive(Debug, Clone, Default)]
pub struct CollectorSnapshot {
    pub network_logs: Vec<Arc<NetworkLogEntry>>,
    pub replay: Option<Arc<ReplayResult>>,
    pub console_log: Vec<ConsoleLogEntry>,
    pub custom_data: CustomData,
}

/// The report as posted to `{api_url}/bugs`. Built once, never mutated.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRequest {
    pub priority: Priority,
    pub custom_data: CustomData,
    pub meta_data: Metadata,
    pub console_log: Vec<ConsoleLogEntry>,
    pub network_logs: Vec<Arc<NetworkLogEntry>>,
    #[serde(rename = "type")]
    pub feedback_type: FeedbackType,
    pub form_data: FormData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot_data: Option<StructuredSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_replay: Option<Arc<ReplayResult>>,
}

impl SubmissionRequest {
    pub fn assemble(
        session: &ReportSession,
        snapshot: CollectorSnapshot,
        meta_data: Metadata,
    ) -> Self {
        let (screenshot_url, screenshot_data) = match &session.screenshot {
            Some(Screenshot::Image { data_url, .. }) => (Some(data_url.clone()), None),
            Some(Screenshot::Hosted { url }) => (Some(url.clone()), None),
            Some(Screenshot::Structured(snapshot)) => (None, Some(snapshot.clone())),
            None => (None, None),
        };

        Self {
            priority: session.options.priority,
            custom_data: snapshot.custom_data,
            meta_data,
            console_log: snapshot.console_log,
            network_logs: snapshot.network_logs,
            feedback_type: session.options.feedback_type,
            form_data: session.form_data.clone(),
            screenshot_url,
            screenshot_data,
            web_replay: snapshot.replay,
        }
    }

    pub fn report_id(&self) -> Uuid {
        self.meta_data.report_id
    }

    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

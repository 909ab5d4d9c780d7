//! Orchestrator wired to deterministic fakes

use std::sync::Arc;
use std::time::Duration;

use snapreport::capture::CaptureError;
use snapreport::host::HeadlessPage;
use snapreport::report::mock::{MockCapturer, MockClock, MockTransport};
use snapreport::report::Collectors;
use snapreport::{Config, Orchestrator, ReportStatus};

/// Config with an API key and every other value at its default
pub fn test_config() -> Config {
    Config::default().with_api_key("test-key")
}

/// An orchestrator plus handles on every fake it was built with
pub struct Harness {
    pub orchestrator: Orchestrator,
    pub transport: Arc<MockTransport>,
    pub capturer: Arc<MockCapturer>,
    pub clock: Arc<MockClock>,
    pub page: Arc<HeadlessPage>,
}

impl Harness {
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> HarnessBuilder {
        HarnessBuilder::default()
    }
}

pub struct HarnessBuilder {
    config: Config,
    capturer: MockCapturer,
    transport: MockTransport,
    page: HeadlessPage,
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        Self {
            config: test_config(),
            capturer: MockCapturer::succeeding(),
            transport: MockTransport::new(),
            page: HeadlessPage::default(),
        }
    }
}

impl HarnessBuilder {
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Enable replay with a recording window of `max_duration_ms`
    pub fn replay_window(mut self, max_duration_ms: u64) -> Self {
        self.config.replay.enabled = true;
        self.config.replay.max_duration_ms = max_duration_ms;
        self
    }

    pub fn capture_error(mut self, error: CaptureError) -> Self {
        self.capturer = MockCapturer::failing(error);
        self
    }

    pub fn transport(mut self, transport: MockTransport) -> Self {
        self.transport = transport;
        self
    }

    pub fn page(mut self, page: HeadlessPage) -> Self {
        self.page = page;
        self
    }

    pub fn build(self) -> Harness {
        let clock = Arc::new(MockClock::new(0));
        let capturer = Arc::new(self.capturer);
        let transport = Arc::new(self.transport);
        let page = Arc::new(self.page);

        let collectors = Collectors::from_config(&self.config, clock.clone(), capturer.clone());
        let orchestrator = Orchestrator::new(
            self.config,
            collectors,
            transport.clone(),
            page.clone(),
            clock.clone(),
        );

        Harness {
            orchestrator,
            transport,
            capturer,
            clock,
            page,
        }
    }
}

/// Yield until the orchestrator reports `status`
pub async fn wait_for_status(orchestrator: &Orchestrator, status: ReportStatus) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while orchestrator.status() != status {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for status {status}"));
}

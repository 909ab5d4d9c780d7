use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize, Serializer};

use crate::capture::RenderMode;
use crate::util::paths::config_path;

/// Example configuration file contents (bundled with the binary)
pub const EXAMPLE_CONFIG: &str = include_str!("config.toml.example");

pub const DEFAULT_API_URL: &str = "https://api.snapreport.dev";

const API_KEY_ENV: &str = "SNAPREPORT_API_KEY";
const API_URL_ENV: &str = "SNAPREPORT_API_URL";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Reporting configuration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Config {
    /// Collector base URL; reports are posted to `{api_url}/bugs`
    pub api_url: String,
    /// Project API key sent as `Api-Token`
    #[serde(serialize_with = "redact_key")]
    pub api_key: Option<String>,
    pub app_version_code: String,
    pub app_build_number: String,
    pub network: NetworkConfig,
    pub replay: ReplayConfig,
    pub screenshot: ScreenshotConfig,
    pub console: ConsoleConfig,
    pub crash: CrashConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkConfig {
    pub enabled: bool,
    pub max_entries: usize,
    /// Request and response bodies are truncated to this many bytes
    pub max_body_bytes: usize,
    /// Extra header names whose values are never recorded
    pub redact_headers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayConfig {
    pub enabled: bool,
    pub max_segments: usize,
    pub max_duration_ms: u64,
    /// Delay between replay readiness checks while a report waits
    pub poll_interval_ms: u64,
    /// Readiness checks before the report proceeds without a full replay
    pub max_polls: u32,
}

impl ReplayConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScreenshotConfig {
    pub enabled: bool,
    pub render_mode: RenderMode,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsoleConfig {
    pub enabled: bool,
    pub max_entries: usize,
}

/// How `Orchestrator::report_crash` files a report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrashConfig {
    /// Submit crashes without asking the user. When false, a crash opens
    /// an interactive report and waits for the form.
    pub silent: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: None,
            app_version_code: String::new(),
            app_build_number: String::new(),
            network: NetworkConfig::default(),
            replay: ReplayConfig::default(),
            screenshot: ScreenshotConfig::default(),
            console: ConsoleConfig::default(),
            crash: CrashConfig::default(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 30,
            max_body_bytes: 5000,
            redact_headers: Vec::new(),
        }
    }
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_segments: 10_000,
            max_duration_ms: 60_000,
            poll_interval_ms: 1000,
            max_polls: 5,
        }
    }
}

impl Default for ScreenshotConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            render_mode: RenderMode::Raster,
        }
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 500,
        }
    }
}

impl Default for CrashConfig {
    fn default() -> Self {
        Self { silent: true }
    }
}

fn redact_key<S: Serializer>(key: &Option<String>, serializer: S) -> Result<S::Ok, S::Error> {
    match key {
        Some(_) => serializer.serialize_some("<set>"),
        None => serializer.serialize_none(),
    }
}

/// TOML representation of the config file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub app_version_code: Option<String>,
    pub app_build_number: Option<String>,
    pub network: Option<TomlNetworkConfig>,
    pub replay: Option<TomlReplayConfig>,
    pub screenshot: Option<TomlScreenshotConfig>,
    pub console: Option<TomlConsoleConfig>,
    pub crash: Option<TomlCrashConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlNetworkConfig {
    pub enabled: Option<bool>,
    pub max_entries: Option<usize>,
    pub max_body_bytes: Option<usize>,
    pub redact_headers: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlReplayConfig {
    pub enabled: Option<bool>,
    pub max_segments: Option<usize>,
    pub max_duration_ms: Option<u64>,
    pub poll_interval_ms: Option<u64>,
    pub max_polls: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlScreenshotConfig {
    pub enabled: Option<bool>,
    pub render_mode: Option<RenderMode>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConsoleConfig {
    pub enabled: Option<bool>,
    pub max_entries: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlCrashConfig {
    pub silent: Option<bool>,
}

impl Config {
    /// Load configuration from the default location, merging with defaults
    /// and environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        let config_file = config_path();

        // Create example config on first run
        if !config_file.exists() {
            Self::create_default_config(&config_file);
        }

        if config_file.exists() {
            Self::load_from(&config_file)
        } else {
            let mut config = Config::default();
            config.apply_env_overrides(|key| std::env::var(key).ok());
            config.validate()?;
            Ok(config)
        }
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::merge_toml(&contents)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Parse TOML on top of the defaults, without environment overrides
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config = Self::merge_toml(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn merge_toml(contents: &str) -> Result<Self, ConfigError> {
        let toml_config: TomlConfig = toml::from_str(contents)?;
        let mut config = Config::default();

        if let Some(api_url) = toml_config.api_url {
            config.api_url = api_url;
        }
        if let Some(api_key) = toml_config.api_key.filter(|k| !k.trim().is_empty()) {
            config.api_key = Some(api_key);
        }
        if let Some(code) = toml_config.app_version_code {
            config.app_version_code = code;
        }
        if let Some(build) = toml_config.app_build_number {
            config.app_build_number = build;
        }

        if let Some(network) = toml_config.network {
            if let Some(enabled) = network.enabled {
                config.network.enabled = enabled;
            }
            if let Some(max_entries) = network.max_entries {
                config.network.max_entries = max_entries;
            }
            if let Some(max_body_bytes) = network.max_body_bytes {
                config.network.max_body_bytes = max_body_bytes;
            }
            if let Some(headers) = network.redact_headers {
                config.network.redact_headers = headers;
            }
        }

        if let Some(replay) = toml_config.replay {
            if let Some(enabled) = replay.enabled {
                config.replay.enabled = enabled;
            }
            if let Some(max_segments) = replay.max_segments {
                config.replay.max_segments = max_segments;
            }
            if let Some(max_duration_ms) = replay.max_duration_ms {
                config.replay.max_duration_ms = max_duration_ms;
            }
            if let Some(poll_interval_ms) = replay.poll_interval_ms {
                config.replay.poll_interval_ms = poll_interval_ms;
            }
            if let Some(max_polls) = replay.max_polls {
                config.replay.max_polls = max_polls;
            }
        }

        if let Some(screenshot) = toml_config.screenshot {
            if let Some(enabled) = screenshot.enabled {
                config.screenshot.enabled = enabled;
            }
            if let Some(render_mode) = screenshot.render_mode {
                config.screenshot.render_mode = render_mode;
            }
        }

        if let Some(console) = toml_config.console {
            if let Some(enabled) = console.enabled {
                config.console.enabled = enabled;
            }
            if let Some(max_entries) = console.max_entries {
                config.console.max_entries = max_entries;
            }
        }

        if let Some(silent) = toml_config.crash.and_then(|crash| crash.silent) {
            config.crash.silent = silent;
        }

        Ok(config)
    }

    /// Apply `SNAPREPORT_API_KEY` / `SNAPREPORT_API_URL` from `lookup`
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup(API_KEY_ENV).filter(|k| !k.trim().is_empty()) {
            self.api_key = Some(key);
        }
        if let Some(url) = lookup(API_URL_ENV).filter(|u| !u.trim().is_empty()) {
            self.api_url = url;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.api_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "api_url must be an http(s) URL, got {:?}",
                self.api_url
            )));
        }

        let positive = [
            ("network.max_entries", self.network.max_entries as u64),
            ("network.max_body_bytes", self.network.max_body_bytes as u64),
            ("replay.max_segments", self.replay.max_segments as u64),
            ("replay.max_duration_ms", self.replay.max_duration_ms),
            ("replay.poll_interval_ms", self.replay.poll_interval_ms),
            ("replay.max_polls", u64::from(self.replay.max_polls)),
            ("console.max_entries", self.console.max_entries as u64),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{name} must be greater than 0")));
            }
        }
        Ok(())
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    /// Endpoint reports are posted to
    pub fn submit_url(&self) -> String {
        format!("{}/bugs", self.api_url.trim_end_matches('/'))
    }

    /// Create the default config file from the bundled example
    fn create_default_config(path: &Path) {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                if let Err(e) = fs::create_dir_all(parent) {
                    tracing::warn!(error = %e, "Failed to create config directory");
                    return;
                }
            }
        }

        if let Err(e) = fs::write(path, EXAMPLE_CONFIG) {
            tracing::warn!(error = %e, "Failed to write default config");
        }
    }
}

mod settings;

pub use settings::{
    Config, ConfigError, ConsoleConfig, CrashConfig, NetworkConfig, ReplayConfig, ScreenshotConfig,
    EXAMPLE_CONFIG,
};

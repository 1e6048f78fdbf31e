pub mod config;

pub use config::{
    AnnouncerConfig, AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat,
    LoggingConfig, ServerConfig, SlackConfig,
};

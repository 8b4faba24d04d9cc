//! Configuration Module
//!
//! Environment-driven settings for the REST adapters and the polling engine.

mod settings;

pub use settings::{
    ApiSettings, ConfigError, Credentials, DEFAULT_BASE_URL, SchedulerSettings, SdkConfig,
    StreamSettings,
};

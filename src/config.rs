//! Configuration module for the sonde collectors.
//!
//! Provides YAML-based configuration loading and validation for:
//! - Session output directory
//! - Polling collector definitions (command, period)
//! - Streaming trace collector definitions (feed command, event categories)
//! - Collector include directory

mod app;
mod collector;
mod validation;

pub use app::{AppConfig, DEFAULT_OUTPUT_DIR};
pub use collector::{CollectorsConfig, DEFAULT_EVENTS, DEFAULT_PERIOD, PollConfig, TraceConfig};
pub use validation::{ConfigError, expand_env_vars};

//! Configuration Module
//!
//! Environment-driven configuration for the binary. The library types take
//! plain config structs and never read the environment themselves.

mod settings;

pub use settings::{AppConfig, ChannelSpec, ConfigError, DEFAULT_METRICS_PORT};

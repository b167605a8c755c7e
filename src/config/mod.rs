//! Configuration module for the relay.
//!
//! Supports:
//! - JSON configuration files
//! - Environment variable overrides
//! - Stdin input
//! - Sensible defaults
//!
//! # Module Structure
//!
//! - [`crate::config::types`]: Root `Config` struct
//! - [`relay`]: Signaling route, fan-out queue and send timeout settings
//! - [`security`]: CORS and metrics authentication
//! - [`logging`]: Logging configuration
//! - [`crate::config::loader`]: Configuration loading functions
//! - [`crate::config::validation`]: Configuration validation functions
//! - [`crate::config::defaults`]: Default value functions

pub mod defaults;
pub mod loader;
pub mod logging;
pub mod relay;
pub mod security;
pub mod types;
pub mod validation;

pub use loader::load;

pub use logging::{LogFormat, LogLevel, LoggingConfig};

pub use relay::RelayConfig;

pub use security::SecurityConfig;

pub use types::Config;

pub use validation::validate_config;

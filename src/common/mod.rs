//! Common Infrastructure Module
//!
//! This module contains:
//! - Configuration loading from environment variables
//! - Structured logging setup
//! - The root error type

pub mod config;
pub mod error;
pub mod logging;

// Re-exports for convenience
pub use config::{ConfigError, Network, PodConfig};
pub use error::{PodProtocolError, Result};
pub use logging::{
    init_from_config, init_logging, log_deposit_event, log_pod_event, log_security_event,
    log_withdrawal_event, EventCategory, LogEvent, LogLevel, LoggingError,
};

//! Structured Logging for the Pod Manager
//!
//! Provides structured logging with:
//! - JSON output for log aggregation
//! - Pod ids as correlation ids, so one pod's history can be followed
//! - Security event logging for every refused call
//!
//! # Usage
//!
//! ```rust,ignore
//! use btcpod::common::logging::{init_logging, LogLevel};
//!
//! init_logging(LogLevel::Info, true)?; // JSON mode for production
//!
//! tracing::info!(target: "btcpod::pod", pod = %pod_id, "Pod locked");
//! ```

use serde::Serialize;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use super::config::{Network, PodConfig};

// ============================================================================
// Log Levels
// ============================================================================

/// Application log level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl From<&str> for LogLevel {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "trace" => LogLevel::Trace,
            "debug" => LogLevel::Debug,
            "info" => LogLevel::Info,
            "warn" | "warning" => LogLevel::Warn,
            "error" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }
}

impl LogLevel {
    fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

// ============================================================================
// Structured Event Types
// ============================================================================

/// Event categories for structured logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    /// Pod lifecycle (creation, delegation, lock, state)
    Pod,
    /// Deposit request and confirmation
    Deposit,
    /// Withdrawal request, signing, settlement, cancellation
    Withdrawal,
    /// Refused calls and pause switches
    Security,
    /// System events (startup, shutdown)
    System,
}

/// Structured log event
#[derive(Debug, Serialize)]
pub struct LogEvent {
    /// Event timestamp (ISO 8601)
    pub timestamp: String,
    pub level: String,
    pub category: EventCategory,
    /// Human-readable message
    pub message: String,
    /// Correlation ID (usually the pod id)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    /// Additional structured data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetails>,
}

/// Error details for failed operations
#[derive(Debug, Serialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
}

impl LogEvent {
    pub fn new(level: LogLevel, category: EventCategory, message: impl Into<String>) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            level: level.as_filter().to_uppercase(),
            category,
            message: message.into(),
            correlation_id: None,
            data: None,
            error: None,
        }
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_error(mut self, code: impl Into<String>, message: impl Into<String>) -> Self {
        self.error = Some(ErrorDetails {
            code: code.into(),
            message: message.into(),
        });
        self
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|_| format!("{{\"error\": \"failed to serialize log event\", \"message\": {:?}}}", self.message))
    }
}

// ============================================================================
// Logging Helpers
// ============================================================================

/// Log a security-relevant decision (refused call, pause switch)
pub fn log_security_event(
    event_type: &str,
    success: bool,
    details: serde_json::Value,
    correlation_id: Option<&str>,
) {
    let level = if success { LogLevel::Info } else { LogLevel::Warn };
    let event = LogEvent::new(level, EventCategory::Security, event_type).with_data(
        serde_json::json!({
            "success": success,
            "details": details
        }),
    );

    let event = match correlation_id {
        Some(id) => event.with_correlation_id(id),
        None => event,
    };

    if success {
        tracing::info!(target: "btcpod::security", "{}", event.to_json());
    } else {
        tracing::warn!(target: "btcpod::security", "{}", event.to_json());
    }
}

/// Log a pod lifecycle change
pub fn log_pod_event(event_type: &str, pod_id: &str, details: serde_json::Value) {
    let event = LogEvent::new(LogLevel::Info, EventCategory::Pod, event_type)
        .with_correlation_id(pod_id)
        .with_data(details);

    tracing::info!(target: "btcpod::pod", "{}", event.to_json());
}

/// Log a deposit event
pub fn log_deposit_event(
    event_type: &str,
    pod_id: &str,
    tx_id: &str,
    amount_sats: u64,
    success: bool,
    error: Option<&str>,
) {
    let level = if success { LogLevel::Info } else { LogLevel::Error };
    let mut event = LogEvent::new(level, EventCategory::Deposit, event_type)
        .with_correlation_id(pod_id)
        .with_data(serde_json::json!({
            "pod_id": pod_id,
            "tx_id": tx_id,
            "amount_sats": amount_sats,
            "success": success
        }));

    if let Some(err) = error {
        event = event.with_error("DEPOSIT_ERROR", err);
    }

    if success {
        tracing::info!(target: "btcpod::deposit", "{}", event.to_json());
    } else {
        tracing::error!(target: "btcpod::deposit", "{}", event.to_json());
    }
}

/// Log a withdrawal event
pub fn log_withdrawal_event(
    event_type: &str,
    pod_id: &str,
    amount_sats: u64,
    withdraw_address: &str,
    success: bool,
    error: Option<&str>,
) {
    let level = if success { LogLevel::Info } else { LogLevel::Error };
    let mut event = LogEvent::new(level, EventCategory::Withdrawal, event_type)
        .with_correlation_id(pod_id)
        .with_data(serde_json::json!({
            "pod_id": pod_id,
            "amount_sats": amount_sats,
            "withdraw_address": withdraw_address,
            "success": success
        }));

    if let Some(err) = error {
        event = event.with_error("WITHDRAWAL_ERROR", err);
    }

    if success {
        tracing::info!(target: "btcpod::withdrawal", "{}", event.to_json());
    } else {
        tracing::error!(target: "btcpod::withdrawal", "{}", event.to_json());
    }
}

// ============================================================================
// Initialization
// ============================================================================

/// Initialize the logging system
///
/// `RUST_LOG` overrides `level` when set.
pub fn init_logging(level: LogLevel, json_format: bool) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("btcpod={},btc_pod={}", level.as_filter(), level.as_filter())));

    if json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
            .map_err(|e| LoggingError::InitFailed(e.to_string()))?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .try_init()
            .map_err(|e| LoggingError::InitFailed(e.to_string()))?;
    }

    Ok(())
}

/// Initialize logging from PodConfig; JSON on mainnet
pub fn init_from_config(config: &PodConfig) -> Result<(), LoggingError> {
    let level = LogLevel::from(config.log_level.as_str());
    let json_format = config.network == Network::Mainnet;

    init_logging(level, json_format)
}

/// Logging errors
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("failed to initialize logging: {0}")]
    InitFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_event_serialization() {
        let event = LogEvent::new(LogLevel::Info, EventCategory::Deposit, "deposit_confirmed")
            .with_correlation_id("pod_abc")
            .with_data(serde_json::json!({"amount_sats": 500_000}));

        let json = event.to_json();
        assert!(json.contains("deposit_confirmed"));
        assert!(json.contains("pod_abc"));
        assert!(json.contains("500000"));
        assert!(json.contains("\"category\":\"deposit\""));
        assert!(json.contains("\"level\":\"INFO\""));
        assert!(!json.contains("\"error\""));
    }

    #[test]
    fn test_log_event_with_error() {
        let event = LogEvent::new(LogLevel::Warn, EventCategory::Security, "unauthorized")
            .with_error("UNAUTHORIZED", "caller is not the owner");

        let json = event.to_json();
        assert!(json.contains("UNAUTHORIZED"));
        assert!(json.contains("caller is not the owner"));
    }

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(LogLevel::from("debug"), LogLevel::Debug);
        assert_eq!(LogLevel::from("INFO"), LogLevel::Info);
        assert_eq!(LogLevel::from("warning"), LogLevel::Warn);
        assert_eq!(LogLevel::from("unknown"), LogLevel::Info);
        assert_eq!(Level::from(LogLevel::Error), Level::ERROR);
    }

    #[test]
    fn test_helpers_without_subscriber() {
        // no subscriber installed: helpers must not panic
        log_security_event("unauthorized", false, serde_json::json!({"caller": "mallory"}), None);
        log_pod_event("pod_locked", "pod_1", serde_json::json!({}));
        log_deposit_event("deposit_confirmed", "pod_1", "aa", 1, true, None);
        log_withdrawal_event("withdrawal_settled", "pod_1", 1, "bcrt1q", false, Some("boom"));
    }
}

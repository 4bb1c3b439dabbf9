//! Structured Logging for xbridge
//!
//! - JSON output for log aggregation on mainnet, pretty output elsewhere
//! - Correlation IDs tying every record of one transfer together
//! - Structured records for transfer, redemption and network-call events
//!
//! # Usage
//!
//! ```rust,ignore
//! use xbridge::common::logging::{init_logging, LogLevel};
//!
//! init_logging(LogLevel::Info, false)?;
//! tracing::info!(target: "xbridge::transfer", session = %id, "submitted");
//! ```

use serde::Serialize;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use super::config::{BridgeConfig, Network};

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
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Quote,
    /// Source-leg transfer events
    Transfer,
    /// Destination-leg completion events
    Redemption,
    /// Calls to the attestation network and chain RPCs
    Network,
    /// Signing and submission
    Wallet,
    System,
}

/// Structured log event
#[derive(Debug, Serialize)]
pub struct LogEvent {
    /// Event timestamp (ISO 8601)
    pub timestamp: String,
    pub level: String,
    pub category: EventCategory,
    pub message: String,
    /// Session or request this record belongs to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetails>,
}

/// Error details for error events
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
            duration_ms: None,
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

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
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
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                "{{\"error\": \"failed to serialize log\", \"message\": {:?}}}",
                self.message
            )
        })
    }
}

// ============================================================================
// Event Helpers
// ============================================================================

/// Log a source-leg transfer event
pub fn log_transfer_event(
    event_type: &str,
    session_id: &str,
    amount: u128,
    source_tx_id: Option<&str>,
    error: Option<(&str, &str)>,
) {
    let success = error.is_none();
    let level = if success { LogLevel::Info } else { LogLevel::Error };
    let mut event = LogEvent::new(level, EventCategory::Transfer, event_type)
        .with_correlation_id(session_id)
        .with_data(serde_json::json!({
            "amount": amount.to_string(),
            "source_tx_id": source_tx_id,
            "success": success
        }));

    if let Some((code, message)) = error {
        event = event.with_error(code, message);
    }

    if success {
        tracing::info!(target: "xbridge::transfer", "{}", event.to_json());
    } else {
        tracing::error!(target: "xbridge::transfer", "{}", event.to_json());
    }
}

/// Log a destination-leg redemption event
pub fn log_redemption_event(
    event_type: &str,
    source_tx_id: &str,
    destination_tx_id: Option<&str>,
    error: Option<(&str, &str)>,
) {
    let success = error.is_none();
    let level = if success { LogLevel::Info } else { LogLevel::Warn };
    let mut event = LogEvent::new(level, EventCategory::Redemption, event_type)
        .with_correlation_id(source_tx_id)
        .with_data(serde_json::json!({
            "source_tx_id": source_tx_id,
            "destination_tx_id": destination_tx_id,
            "success": success
        }));

    if let Some((code, message)) = error {
        event = event.with_error(code, message);
    }

    if success {
        tracing::info!(target: "xbridge::redemption", "{}", event.to_json());
    } else {
        tracing::warn!(target: "xbridge::redemption", "{}", event.to_json());
    }
}

/// Log one call to a remote collaborator
pub fn log_network_call(
    method: &str,
    url: &str,
    status: Option<u16>,
    duration_ms: u64,
    correlation_id: &str,
) {
    let failed = status.map_or(true, |s| s >= 400);
    let level = if failed { LogLevel::Warn } else { LogLevel::Debug };
    let outcome = status.map_or_else(|| "transport error".to_string(), |s| s.to_string());

    let event = LogEvent::new(
        level,
        EventCategory::Network,
        format!("{} {} -> {}", method, url, outcome),
    )
    .with_correlation_id(correlation_id)
    .with_duration(duration_ms)
    .with_data(serde_json::json!({
        "method": method,
        "url": url,
        "status": status
    }));

    if failed {
        tracing::warn!(target: "xbridge::network", "{}", event.to_json());
    } else {
        tracing::debug!(target: "xbridge::network", "{}", event.to_json());
    }
}

// ============================================================================
// Initialization
// ============================================================================

/// Initialize the logging system
///
/// `RUST_LOG` wins over `level` when set.
pub fn init_logging(level: LogLevel, json_format: bool) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("xbridge={}", level.as_filter())));

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
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init()
            .map_err(|e| LoggingError::InitFailed(e.to_string()))?;
    }

    Ok(())
}

/// Initialize logging from BridgeConfig
pub fn init_from_config(config: &BridgeConfig) -> Result<(), LoggingError> {
    let level = LogLevel::from(config.log_level.as_str());
    init_logging(level, config.network == Network::Mainnet)
}

/// Logging errors
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("failed to initialize logging: {0}")]
    InitFailed(String),
}

/// Generate a unique correlation ID
pub fn generate_correlation_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

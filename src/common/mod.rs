//! Common Infrastructure Module
//!
//! Configuration loading, structured logging and the root error type.

pub mod config;
pub mod error;
pub mod logging;

// Re-exports for convenience
pub use config::{BridgeConfig, ConfigError, Network};
pub use error::{BridgeError, Result};
pub use logging::{
    generate_correlation_id, init_from_config, init_logging, log_network_call,
    log_redemption_event, log_transfer_event, ErrorDetails, EventCategory, LogEvent, LogLevel,
    LoggingError,
};

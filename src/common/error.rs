//! Common Error Types for xbridge
//!
//! Every component converts its local error into `BridgeError` at its
//! boundary, so the presentation layer only ever sees one type with a
//! human-readable message.

use thiserror::Error;

/// Root error type for the bridge core
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(#[from] super::config::ConfigError),

    /// Logging errors
    #[error("logging error: {0}")]
    Logging(#[from] super::logging::LoggingError),

    /// Malformed address or non-positive amount, rejected before any network call
    #[error("invalid input: {0}")]
    Validation(String),

    /// The wallet signing prompt was rejected
    #[error("transaction rejected in wallet: {0}")]
    UserCancelled(String),

    /// Pricing unavailable or pair unsupported
    #[error("quote unavailable: {0}")]
    Quote(String),

    /// The source chain rejected the transaction (message passed through verbatim)
    #[error("{0}")]
    Submission(String),

    /// No terminal status after the confirmation wait and the fallback poll
    #[error("transaction {signature} was not confirmed in time; check a block explorer for its final status")]
    ConfirmationTimeout { signature: String },

    /// The attestation is not available yet
    #[error("transfer not ready for redemption: {0}")]
    RedemptionNotReady(String),

    /// The destination completion transaction failed
    #[error("redemption failed: {0}")]
    RedemptionFailure(String),

    /// Operation not allowed in the current session state
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// A transfer is already in flight on this surface
    #[error("a transfer is already in progress")]
    SessionInFlight,

    /// A collaborator returned a shape the id mapping table does not know
    #[error("unrecognized response shape: {0}")]
    UnmappedResponse(String),

    /// Transport errors talking to a collaborator
    #[error("network error: {0}")]
    Network(String),
}

impl BridgeError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a quote error
    pub fn quote(msg: impl Into<String>) -> Self {
        Self::Quote(msg.into())
    }

    /// Create a redemption-not-ready error
    pub fn not_ready(msg: impl Into<String>) -> Self {
        Self::RedemptionNotReady(msg.into())
    }

    /// Create a redemption failure
    pub fn redemption(msg: impl Into<String>) -> Self {
        Self::RedemptionFailure(msg.into())
    }

    /// Create an invalid-state error
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    /// Create a network error
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Whether the user may simply try the same operation again
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BridgeError::Quote(_)
                | BridgeError::Submission(_)
                | BridgeError::RedemptionNotReady(_)
                | BridgeError::Network(_)
        )
    }

    /// Whether the outcome on chain is unknown rather than failed
    pub fn is_uncertain(&self) -> bool {
        matches!(self, BridgeError::ConfirmationTimeout { .. })
    }

    /// Stable code for the presentation layer
    pub fn error_code(&self) -> &'static str {
        match self {
            BridgeError::Config(_) => "CONFIG_ERROR",
            BridgeError::Logging(_) => "LOGGING_ERROR",
            BridgeError::Validation(_) => "VALIDATION_ERROR",
            BridgeError::UserCancelled(_) => "USER_CANCELLED",
            BridgeError::Quote(_) => "QUOTE_ERROR",
            BridgeError::Submission(_) => "SUBMISSION_ERROR",
            BridgeError::ConfirmationTimeout { .. } => "CONFIRMATION_TIMEOUT",
            BridgeError::RedemptionNotReady(_) => "REDEMPTION_NOT_READY",
            BridgeError::RedemptionFailure(_) => "REDEMPTION_FAILURE",
            BridgeError::InvalidState(_) => "INVALID_STATE",
            BridgeError::SessionInFlight => "SESSION_IN_FLIGHT",
            BridgeError::UnmappedResponse(_) => "UNMAPPED_RESPONSE",
            BridgeError::Network(_) => "NETWORK_ERROR",
        }
    }
}

/// Result type alias using BridgeError
pub type Result<T> = std::result::Result<T, BridgeError>;

//! Transfer Session Types
//!
//! The single mutable session behind one UI surface, and the progress
//! records derived from it.

use serde::{Deserialize, Serialize};

use super::transfer::{Quote, TransferRequest};
use super::txid::TxId;

/// Status of the transfer session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    /// Nothing in progress
    Idle,
    /// Waiting for a quote
    Quoting,
    /// Quote shown, transfer can start
    Ready,
    /// Waiting for the wallet signature
    Confirming,
    /// Submitted, waiting for the source chain to confirm
    Bridging,
    /// Source leg done, attestation and relay outstanding
    Relaying,
    /// Provisional success (source leg confirmed)
    Success,
    /// Failed
    Error,
}

impl Default for TransferStatus {
    fn default() -> Self {
        Self::Idle
    }
}

impl TransferStatus {
    /// Success and error only leave through `reset()`
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }

    /// A bridge call owns the session
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Confirming | Self::Bridging | Self::Relaying)
    }

    /// Step index shown by the progress surface
    pub fn step_index(&self) -> u8 {
        match self {
            Self::Idle | Self::Quoting | Self::Ready => 0,
            Self::Confirming => 1,
            Self::Bridging => 2,
            Self::Relaying => 3,
            Self::Success => 4,
            // Error keeps the step it failed on; see TransferSession::fail
            Self::Error => 0,
        }
    }

    /// Forward transitions of the state machine (reset is not one of them)
    pub fn can_transition_to(&self, next: TransferStatus) -> bool {
        use TransferStatus::*;
        match (self, next) {
            (Idle, Quoting) => true,
            (Quoting, Quoting | Ready | Idle) => true,
            (Ready, Quoting | Idle | Confirming) => true,
            (Confirming, Bridging) => true,
            (Bridging, Relaying) => true,
            (Relaying, Success) => true,
            (from, Error) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl std::fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Quoting => write!(f, "quoting"),
            Self::Ready => write!(f, "ready"),
            Self::Confirming => write!(f, "confirming"),
            Self::Bridging => write!(f, "bridging"),
            Self::Relaying => write!(f, "relaying"),
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// The transfer session of one UI surface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferSession {
    /// Changes on every bridge() and reset(); writes carrying an old id are dropped
    pub id: String,
    pub status: TransferStatus,
    pub current_step: u8,
    pub quote: Option<Quote>,
    pub request: Option<TransferRequest>,
    pub source_tx_id: Option<TxId>,
    pub destination_tx_id: Option<TxId>,
    pub explorer_url: Option<String>,
    pub progress_message: String,
    pub error_message: String,
    pub elapsed_seconds: u64,
}

impl Default for TransferSession {
    fn default() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            status: TransferStatus::Idle,
            current_step: 0,
            quote: None,
            request: None,
            source_tx_id: None,
            destination_tx_id: None,
            explorer_url: None,
            progress_message: String::new(),
            error_message: String::new(),
            elapsed_seconds: 0,
        }
    }
}

impl TransferSession {
    /// Move forward, refusing anything the state machine does not allow
    pub fn transition(&mut self, next: TransferStatus, message: impl Into<String>) -> Result<(), String> {
        if !self.status.can_transition_to(next) {
            return Err(format!("cannot go from {} to {}", self.status, next));
        }
        self.status = next;
        if next != TransferStatus::Error {
            self.current_step = next.step_index();
        }
        self.progress_message = message.into();
        Ok(())
    }

    /// Enter the error state, keeping the step that failed
    pub fn fail(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.status = TransferStatus::Error;
        self.progress_message = message.clone();
        self.error_message = message;
    }

    /// Start a new bridge attempt from `ready`
    pub fn begin(&mut self, request: TransferRequest, message: impl Into<String>) -> Result<(), String> {
        self.transition(TransferStatus::Confirming, message)?;
        self.id = uuid::Uuid::new_v4().to_string();
        self.request = Some(request);
        self.source_tx_id = None;
        self.destination_tx_id = None;
        self.explorer_url = None;
        self.error_message.clear();
        self.elapsed_seconds = 0;
        Ok(())
    }
}

/// Emitted on every session transition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEvent {
    pub session_id: String,
    pub status: TransferStatus,
    pub step: u8,
    pub message: String,
    pub source_tx_id: Option<TxId>,
    pub explorer_url: Option<String>,
}

impl ProgressEvent {
    pub fn from_session(session: &TransferSession) -> Self {
        Self {
            session_id: session.id.clone(),
            status: session.status,
            step: session.current_step,
            message: session.progress_message.clone(),
            source_tx_id: session.source_tx_id.clone(),
            explorer_url: session.explorer_url.clone(),
        }
    }
}

/// Read model for the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    pub status: TransferStatus,
    pub current_step: u8,
    pub progress_message: String,
    pub elapsed_seconds: u64,
    pub estimated_seconds: u64,
    pub quote: Option<Quote>,
    pub source_tx_id: Option<TxId>,
    pub destination_tx_id: Option<TxId>,
    pub explorer_url: Option<String>,
    pub error_message: String,
}

impl ProgressSnapshot {
    pub fn from_session(session: &TransferSession, estimated_seconds: u64) -> Self {
        Self {
            status: session.status,
            current_step: session.current_step,
            progress_message: session.progress_message.clone(),
            elapsed_seconds: session.elapsed_seconds,
            estimated_seconds,
            quote: session.quote.clone(),
            source_tx_id: session.source_tx_id.clone(),
            destination_tx_id: session.destination_tx_id.clone(),
            explorer_url: session.explorer_url.clone(),
            error_message: session.error_message.clone(),
        }
    }
}

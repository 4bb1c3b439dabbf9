//! Attestation Network Boundary
//!
//! Everything the bridge core consumes from the third-party attestation
//! network goes through [`AttestationNetwork`]. [`AttestationClient`] is the
//! HTTP implementation; tests substitute an in-memory one.

pub mod client;
pub mod interceptor;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::common::BridgeError;
use crate::types::{Chain, TransferDescription};
use crate::wallet::{
    CompletionSigner, DestinationError, SignerError, SourceTransaction, SourceTxError,
    TransactionSender, UnsignedTransaction,
};

pub use client::AttestationClient;
pub use interceptor::{Interceptor, RequestInfo, TracingInterceptor};

/// Errors talking to the attestation network
#[derive(Debug, Error)]
pub enum AttestationError {
    #[error("attestation client used before init()")]
    NotInitialized,

    #[error("chain {0} is not supported by the attestation network")]
    UnsupportedChain(Chain),

    #[error("attestation network is on {actual}, expected {expected}")]
    WrongNetwork { expected: String, actual: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("attestation network returned {status}: {message}")]
    Http { status: u16, message: String },

    #[error("attestation network unreachable: {0}")]
    Transport(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Transaction(#[from] SourceTxError),

    #[error(transparent)]
    Signer(#[from] SignerError),

    #[error(transparent)]
    Destination(#[from] DestinationError),
}

impl From<AttestationError> for BridgeError {
    fn from(e: AttestationError) -> Self {
        match e {
            AttestationError::Signer(e) => e.into(),
            AttestationError::Destination(e) => e.into(),
            AttestationError::Transaction(e) => BridgeError::Submission(e.to_string()),
            AttestationError::InvalidResponse(msg) => BridgeError::UnmappedResponse(msg),
            AttestationError::NotInitialized => {
                BridgeError::invalid_state("attestation client used before init()")
            }
            other => BridgeError::network(other.to_string()),
        }
    }
}

/// Network handshake result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInfo {
    /// "Mainnet", "Testnet" or "Devnet"
    pub network: String,
    pub chains: Vec<Chain>,
}

/// A source transaction as the network ships it
///
/// A `version` field marks the versioned encoding; without it the payload
/// is legacy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireTransaction {
    /// base64 wire bytes
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Value>,
    /// base58 auxiliary keypairs that must co-sign
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub signers: Vec<String>,
}

impl WireTransaction {
    pub fn decode(&self) -> Result<UnsignedTransaction, SourceTxError> {
        let transaction = SourceTransaction::decode(&self.data, self.version.is_some())?;
        UnsignedTransaction::new(transaction).with_encoded_signers(&self.signers)
    }
}

/// One entry of an address's transfer history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexedTransfer {
    pub message_id: String,
    /// Chain names are kept raw; unknown chains simply match no route
    pub source_chain: String,
    pub destination_chain: String,
    /// Atomic amount as a decimal string
    pub amount: String,
    /// Source transaction id in whatever shape the indexer uses
    pub source_tx: Value,
    /// e.g. "pending", "attested", "completed", "finalized"
    pub destination_status: String,
    pub timestamp: DateTime<Utc>,
}

impl IndexedTransfer {
    /// Destination leg observed done
    pub fn is_complete(&self) -> bool {
        matches!(
            self.destination_status.to_ascii_lowercase().as_str(),
            "completed" | "finalized"
        )
    }
}

/// A transfer reconstructed from its source transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferHandle {
    pub message_id: String,
    pub source_chain: Chain,
    pub destination_chain: Chain,
    pub amount: String,
    /// Set once the destination leg has been completed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_tx: Option<Value>,
}

/// Signed approval authorizing the destination completion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attestation {
    pub message_id: String,
    /// base64 attestation bytes
    pub payload: String,
}

/// Operations consumed from the attestation network
#[async_trait]
pub trait AttestationNetwork: Send + Sync {
    /// Price a prospective transfer; the raw response is mapped by the caller
    async fn quote_transfer(&self, transfer: &TransferDescription) -> Result<Value, AttestationError>;

    /// Build the source-chain transactions and hand them to `sender`;
    /// returns one receipt per submitted transaction
    async fn initiate_transfer(
        &self,
        transfer: &TransferDescription,
        sender: &dyn TransactionSender,
    ) -> Result<Vec<Value>, AttestationError>;

    /// Most recent `limit` transfers touching `address`
    async fn list_transactions(
        &self,
        address: &str,
        limit: usize,
    ) -> Result<Vec<IndexedTransfer>, AttestationError>;

    async fn reconstruct_transfer(
        &self,
        chain: Chain,
        source_tx_id: &str,
    ) -> Result<TransferHandle, AttestationError>;

    /// `None` when the attestation has not appeared within `timeout`
    async fn fetch_attestation(
        &self,
        transfer: &TransferHandle,
        timeout: Duration,
    ) -> Result<Option<Attestation>, AttestationError>;

    /// Submit the destination completion through `signer`; returns the
    /// signer's responses in submission order
    async fn complete_transfer(
        &self,
        transfer: &TransferHandle,
        attestation: &Attestation,
        signer: &dyn CompletionSigner,
    ) -> Result<Vec<Value>, AttestationError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_transaction_version_field() {
        let legacy: WireTransaction = serde_json::from_value(json!({"data": "AA=="})).unwrap();
        assert!(legacy.version.is_none());
        assert!(legacy.signers.is_empty());

        let versioned: WireTransaction =
            serde_json::from_value(json!({"data": "AA==", "version": 0})).unwrap();
        assert!(versioned.version.is_some());
    }

    #[test]
    fn test_indexed_transfer_completion() {
        let entry: IndexedTransfer = serde_json::from_value(json!({
            "messageId": "1/abc/7",
            "sourceChain": "Solana",
            "destinationChain": "Sepolia",
            "amount": "100000000",
            "sourceTx": {"txid": "5sig"},
            "destinationStatus": "Completed",
            "timestamp": "2026-10-01T12:00:00Z"
        }))
        .unwrap();
        assert!(entry.is_complete());
    }

    #[test]
    fn test_signer_errors_keep_their_kind() {
        let err: BridgeError =
            AttestationError::Signer(SignerError::Rejected("User rejected".into())).into();
        assert_eq!(err.error_code(), "USER_CANCELLED");

        let err: BridgeError = AttestationError::Transport("connection refused".into()).into();
        assert!(err.is_retryable());
    }
}

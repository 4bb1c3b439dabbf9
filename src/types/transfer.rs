//! Transfer Types
//!
//! Requests, quotes and pending-transfer projections.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::chain::Chain;
use super::txid::TxId;
use super::units::format_atomic;

/// A prospective transfer, validated before it reaches any collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub source_chain: Chain,
    pub destination_chain: Chain,
    /// Token address on the source chain
    pub token_id: String,
    /// Atomic amount, always positive
    pub amount: u128,
    pub sender_address: String,
    pub recipient_address: String,
}

impl TransferRequest {
    /// Check the request invariants
    pub fn validate(&self) -> Result<(), String> {
        if self.amount == 0 {
            return Err("amount must be greater than zero".to_string());
        }
        if self.source_chain == self.destination_chain {
            return Err("source and destination chains must differ".to_string());
        }
        self.source_chain
            .validate_address(&self.sender_address)
            .map_err(|e| format!("sender: {}", e))?;
        self.destination_chain
            .validate_address(&self.recipient_address)
            .map_err(|e| format!("recipient: {}", e))?;
        Ok(())
    }

    /// Wire description handed to the attestation network
    pub fn description(&self) -> TransferDescription {
        TransferDescription {
            token: ChainAddress {
                chain: self.source_chain,
                address: self.token_id.clone(),
            },
            amount: self.amount.to_string(),
            source: ChainAddress {
                chain: self.source_chain,
                address: self.sender_address.clone(),
            },
            destination: ChainAddress {
                chain: self.destination_chain,
                address: self.recipient_address.clone(),
            },
            automatic: false,
        }
    }
}

/// An address qualified by its chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainAddress {
    pub chain: Chain,
    pub address: String,
}

/// Logical token transfer as the attestation network describes it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferDescription {
    pub token: ChainAddress,
    /// Atomic amount as a decimal string (u128 does not fit JSON numbers)
    pub amount: String,
    pub source: ChainAddress,
    pub destination: ChainAddress,
    /// Whether a relayer completes the destination leg
    pub automatic: bool,
}

/// Fee and receive-amount estimate for a prospective transfer
///
/// Ephemeral: superseded by any newer quote and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub relayer_fee: u128,
    pub destination_amount: u128,
    pub source_amount: u128,
    /// Response as the network returned it
    pub raw: serde_json::Value,
}

impl Quote {
    /// Destination amount as a decimal string
    pub fn display_destination_amount(&self, decimals: u8) -> String {
        format_atomic(self.destination_amount, decimals)
    }
}

/// A transfer whose destination leg has not been observed complete
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTransfer {
    pub message_id: String,
    /// Atomic amount
    pub amount: u128,
    pub source_tx_id: TxId,
    pub timestamp: DateTime<Utc>,
}

impl PendingTransfer {
    pub fn display_amount(&self, decimals: u8) -> String {
        format_atomic(self.amount, decimals)
    }
}

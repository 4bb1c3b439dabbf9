//! Source-chain wallet and RPC seams
//!
//! `SourceWallet` is the user's signing capability; `SourceRpc` is the
//! chain access the adapter needs around it. Both are borrowed for the
//! duration of one bridge call and never owned by the core.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use solana_client::{nonblocking::rpc_client::RpcClient, rpc_request::RpcRequest};
use solana_sdk::{
    commitment_config::CommitmentConfig,
    hash::Hash,
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    signer::Signer,
};
use thiserror::Error;
use tracing::{debug, warn};

use super::transaction::SourceTransaction;

/// Wallet-side failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WalletError {
    /// The user declined the signing prompt
    #[error("{0}")]
    Rejected(String),

    #[error("wallet unavailable: {0}")]
    Unavailable(String),
}

/// RPC transport or node-side failure
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct RpcError(pub String);

/// Why a confirmation wait ended without a confirmed status
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfirmError {
    /// The recency anchor's validity window passed
    #[error("blockhash expired before confirmation")]
    Expired,

    /// The transaction landed and failed
    #[error("transaction failed: {0}")]
    Failed(String),

    #[error("confirmation wait failed: {0}")]
    Rpc(String),
}

/// How long a submitted transaction can still land
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidityWindow {
    /// Fresh anchor: valid until this block height
    UntilHeight(u64),
    /// Anchor carried by the transaction: valid while the node accepts it
    WhileValid(Hash),
}

/// Terminal status of a transaction the node knows about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LandedStatus {
    Succeeded,
    Failed(String),
}

/// The connected source-chain wallet
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SourceWallet: Send + Sync {
    fn pubkey(&self) -> Pubkey;

    /// Add the wallet's signature; may suspend on a user prompt
    async fn sign_transaction(
        &self,
        transaction: SourceTransaction,
    ) -> Result<SourceTransaction, WalletError>;
}

/// Source-chain node access
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SourceRpc: Send + Sync {
    /// Latest blockhash and the last block height it stays valid for
    async fn latest_blockhash(&self) -> Result<(Hash, u64), RpcError>;

    /// Submit a serialized transaction; node rejections carry the node's message
    async fn send_raw_transaction(&self, wire: Vec<u8>) -> Result<Signature, RpcError>;

    /// Wait for a confirmed status until `window` closes
    async fn confirm_transaction(
        &self,
        signature: Signature,
        window: ValidityWindow,
    ) -> Result<(), ConfirmError>;

    /// One status lookup including transaction history
    async fn signature_status(&self, signature: Signature)
        -> Result<Option<LandedStatus>, RpcError>;
}

// =============================================================================
// Local keypair wallet
// =============================================================================

/// Wallet backed by a local keypair, for headless integrations
pub struct KeypairWallet {
    keypair: Keypair,
}

impl KeypairWallet {
    pub fn new(keypair: Keypair) -> Self {
        Self { keypair }
    }
}

#[async_trait]
impl SourceWallet for KeypairWallet {
    fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    async fn sign_transaction(
        &self,
        mut transaction: SourceTransaction,
    ) -> Result<SourceTransaction, WalletError> {
        if !transaction.sign_with(&self.keypair) {
            return Err(WalletError::Unavailable(format!(
                "{} is not a signer of this transaction",
                self.keypair.pubkey()
            )));
        }
        Ok(transaction)
    }
}

// =============================================================================
// Solana RPC
// =============================================================================

/// Poll interval while waiting for confirmation
const CONFIRM_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// `SourceRpc` over the nonblocking Solana RPC client
pub struct SolanaRpc {
    client: RpcClient,
    commitment: CommitmentConfig,
}

impl SolanaRpc {
    pub fn new(rpc_url: &str) -> Self {
        let commitment = CommitmentConfig::confirmed();
        Self {
            client: RpcClient::new_with_commitment(rpc_url.to_string(), commitment),
            commitment,
        }
    }
}

impl SolanaRpc {
    async fn window_closed(&self, window: ValidityWindow) -> Result<bool, ConfirmError> {
        match window {
            ValidityWindow::UntilHeight(last_valid_block_height) => {
                let height = self
                    .client
                    .get_block_height()
                    .await
                    .map_err(|e| ConfirmError::Rpc(e.to_string()))?;
                Ok(height > last_valid_block_height)
            }
            ValidityWindow::WhileValid(blockhash) => self
                .client
                .is_blockhash_valid(&blockhash, self.commitment)
                .await
                .map(|valid| !valid)
                .map_err(|e| ConfirmError::Rpc(e.to_string())),
        }
    }
}

#[async_trait]
impl SourceRpc for SolanaRpc {
    async fn latest_blockhash(&self) -> Result<(Hash, u64), RpcError> {
        self.client
            .get_latest_blockhash_with_commitment(self.commitment)
            .await
            .map_err(|e| RpcError(e.to_string()))
    }

    async fn send_raw_transaction(&self, wire: Vec<u8>) -> Result<Signature, RpcError> {
        let params = serde_json::json!([
            BASE64.encode(&wire),
            {
                "encoding": "base64",
                "preflightCommitment": self.commitment.commitment,
            }
        ]);

        let signature: String = self
            .client
            .send(RpcRequest::SendTransaction, params)
            .await
            .map_err(|e| RpcError(e.to_string()))?;

        Signature::from_str(&signature)
            .map_err(|e| RpcError(format!("node returned invalid signature {}: {}", signature, e)))
    }

    async fn confirm_transaction(
        &self,
        signature: Signature,
        window: ValidityWindow,
    ) -> Result<(), ConfirmError> {
        loop {
            let statuses = self
                .client
                .get_signature_statuses(&[signature])
                .await
                .map_err(|e| ConfirmError::Rpc(e.to_string()))?;

            if let Some(Some(status)) = statuses.value.first() {
                if let Some(err) = &status.err {
                    return Err(ConfirmError::Failed(err.to_string()));
                }
                if status.satisfies_commitment(self.commitment) {
                    debug!(target: "xbridge::wallet", %signature, slot = status.slot, "confirmed");
                    return Ok(());
                }
            }

            if self.window_closed(window).await? {
                warn!(
                    target: "xbridge::wallet",
                    %signature,
                    ?window,
                    "blockhash expired while waiting for confirmation"
                );
                return Err(ConfirmError::Expired);
            }

            tokio::time::sleep(CONFIRM_POLL_INTERVAL).await;
        }
    }

    async fn signature_status(
        &self,
        signature: Signature,
    ) -> Result<Option<LandedStatus>, RpcError> {
        let status = self
            .client
            .get_signature_status_with_commitment_and_history(&signature, self.commitment, true)
            .await
            .map_err(|e| RpcError(e.to_string()))?;

        Ok(status.map(|result| match result {
            Ok(()) => LandedStatus::Succeeded,
            Err(e) => LandedStatus::Failed(e.to_string()),
        }))
    }
}

//! SignerAdapter
//!
//! Repairs, signs, submits and confirms a batch of source-chain
//! transactions through a borrowed wallet, one at a time and in order.
//!
//! Per transaction:
//! 1. merge embedded auxiliary signers with the caller's
//! 2. size signature slots, install the fee payer, set the recency anchor
//! 3. apply auxiliary co-signatures, then the wallet signature
//! 4. submit, then wait for confirmation bounded by the anchor's validity
//! 5. on an expiry-class failure, check the status once more before giving up
//!
//! There is no retry here; retrying is the caller's decision.

use std::sync::Arc;

use async_trait::async_trait;
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    signer::Signer,
};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::source::{
    ConfirmError, LandedStatus, SourceRpc, SourceWallet, ValidityWindow, WalletError,
};
use super::transaction::{SourceTxError, UnsignedTransaction};
use crate::common::BridgeError;
use crate::types::TxId;

/// SignerAdapter errors
#[derive(Debug, Error)]
pub enum SignerError {
    /// The user declined the signing prompt (original message kept)
    #[error("{0}")]
    Rejected(String),

    /// The node refused the transaction, or it landed and failed
    #[error("{0}")]
    Submission(String),

    /// Outcome unknown after the wait and the fallback poll
    #[error("transaction {signature} was not confirmed in time")]
    ConfirmationTimeout { signature: String },

    #[error("malformed transaction: {0}")]
    Malformed(#[from] SourceTxError),

    #[error("wallet unavailable: {0}")]
    Wallet(String),

    #[error("rpc error: {0}")]
    Rpc(String),
}

impl From<WalletError> for SignerError {
    fn from(e: WalletError) -> Self {
        match e {
            WalletError::Rejected(msg) => SignerError::Rejected(msg),
            WalletError::Unavailable(msg) => SignerError::Wallet(msg),
        }
    }
}

impl From<SignerError> for BridgeError {
    fn from(e: SignerError) -> Self {
        match e {
            SignerError::Rejected(msg) => BridgeError::UserCancelled(msg),
            SignerError::Submission(msg) => BridgeError::Submission(msg),
            SignerError::ConfirmationTimeout { signature } => {
                BridgeError::ConfirmationTimeout { signature }
            }
            SignerError::Malformed(e) => BridgeError::Submission(e.to_string()),
            SignerError::Wallet(msg) | SignerError::Rpc(msg) => BridgeError::Network(msg),
        }
    }
}

/// Progress of one transaction through the adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignerEvent {
    Signed { index: usize },
    Submitted { index: usize, signature: Signature },
    Confirmed { index: usize, signature: Signature },
}

/// Something that can sign and submit source transactions for the
/// attestation network
#[async_trait]
pub trait TransactionSender: Send + Sync {
    /// Fee payer and primary signer
    fn address(&self) -> Pubkey;

    /// One id per input, in submission order
    async fn sign_and_send(
        &self,
        transactions: Vec<UnsignedTransaction>,
    ) -> Result<Vec<TxId>, SignerError>;
}

/// Signs and submits through a borrowed wallet
pub struct SignerAdapter<'a> {
    wallet: &'a dyn SourceWallet,
    rpc: &'a dyn SourceRpc,
    auxiliary: Vec<Arc<Keypair>>,
    events: Option<mpsc::UnboundedSender<SignerEvent>>,
}

impl<'a> SignerAdapter<'a> {
    pub fn new(wallet: &'a dyn SourceWallet, rpc: &'a dyn SourceRpc) -> Self {
        Self {
            wallet,
            rpc,
            auxiliary: Vec::new(),
            events: None,
        }
    }

    /// Co-signers applied to every transaction in addition to embedded ones
    pub fn with_auxiliary_signers(mut self, signers: Vec<Arc<Keypair>>) -> Self {
        self.auxiliary = signers;
        self
    }

    /// Publish progress to `events`
    pub fn with_events(mut self, events: mpsc::UnboundedSender<SignerEvent>) -> Self {
        self.events = Some(events);
        self
    }

    fn emit(&self, event: SignerEvent) {
        if let Some(events) = &self.events {
            // A dropped observer is not an error for the submission
            let _ = events.send(event);
        }
    }

    async fn send_one(
        &self,
        index: usize,
        unsigned: UnsignedTransaction,
    ) -> Result<Signature, SignerError> {
        let UnsignedTransaction {
            mut transaction,
            signers,
        } = unsigned;
        let co_signers: Vec<Arc<Keypair>> = signers
            .into_iter()
            .chain(self.auxiliary.iter().cloned())
            .collect();

        transaction.ensure_signature_slots();
        if transaction.ensure_fee_payer(self.wallet.pubkey())? {
            debug!(target: "xbridge::wallet", index, "installed wallet as fee payer");
        }

        let window = if transaction.has_recent_blockhash() {
            ValidityWindow::WhileValid(transaction.recent_blockhash())
        } else {
            let (blockhash, last_valid_block_height) = self
                .rpc
                .latest_blockhash()
                .await
                .map_err(|e| SignerError::Rpc(e.to_string()))?;
            transaction.set_recent_blockhash(blockhash);
            ValidityWindow::UntilHeight(last_valid_block_height)
        };

        for signer in &co_signers {
            if !transaction.sign_with(signer.as_ref()) {
                debug!(
                    target: "xbridge::wallet",
                    index,
                    signer = %signer.pubkey(),
                    "auxiliary signer not required, skipped"
                );
            }
        }

        let signed = self.wallet.sign_transaction(transaction).await?;
        self.emit(SignerEvent::Signed { index });

        let wire = signed.serialize()?;
        let signature = self
            .rpc
            .send_raw_transaction(wire)
            .await
            .map_err(|e| SignerError::Submission(e.to_string()))?;
        info!(target: "xbridge::wallet", index, %signature, "transaction submitted");
        self.emit(SignerEvent::Submitted { index, signature });

        match self
            .rpc
            .confirm_transaction(signature, window)
            .await
        {
            Ok(()) => {}
            Err(ConfirmError::Failed(reason)) => return Err(SignerError::Submission(reason)),
            Err(e) => {
                warn!(
                    target: "xbridge::wallet",
                    %signature,
                    error = %e,
                    "confirmation wait ended without a status, checking once more"
                );
                self.fallback_status(signature).await?;
            }
        }

        self.emit(SignerEvent::Confirmed { index, signature });
        Ok(signature)
    }

    /// One status lookup after an expiry-class failure
    async fn fallback_status(&self, signature: Signature) -> Result<(), SignerError> {
        match self.rpc.signature_status(signature).await {
            Ok(Some(LandedStatus::Succeeded)) => {
                info!(target: "xbridge::wallet", %signature, "transaction landed after expiry report");
                Ok(())
            }
            Ok(Some(LandedStatus::Failed(reason))) => Err(SignerError::Submission(reason)),
            Ok(None) => Err(SignerError::ConfirmationTimeout {
                signature: signature.to_string(),
            }),
            Err(e) => {
                warn!(target: "xbridge::wallet", %signature, error = %e, "fallback status lookup failed");
                Err(SignerError::ConfirmationTimeout {
                    signature: signature.to_string(),
                })
            }
        }
    }
}

#[async_trait]
impl<'a> TransactionSender for SignerAdapter<'a> {
    fn address(&self) -> Pubkey {
        self.wallet.pubkey()
    }

    async fn sign_and_send(
        &self,
        transactions: Vec<UnsignedTransaction>,
    ) -> Result<Vec<TxId>, SignerError> {
        let mut ids = Vec::with_capacity(transactions.len());
        for (index, unsigned) in transactions.into_iter().enumerate() {
            let signature = self.send_one(index, unsigned).await?;
            ids.push(TxId::from(signature));
        }
        Ok(ids)
    }
}

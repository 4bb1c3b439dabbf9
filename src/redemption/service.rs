//! Redemption Service

use std::str::FromStr;
use std::sync::Arc;

use solana_sdk::signature::Signature;
use tracing::{info, warn};

use crate::attestation::{AttestationError, AttestationNetwork};
use crate::common::{log_redemption_event, BridgeConfig, BridgeError, Result};
use crate::pending::PendingTransferRegistry;
use crate::types::TxId;
use crate::wallet::{DestinationWallet, ForwardingSigner};

/// Completes destination legs with the user's destination wallet
pub struct RedemptionService {
    config: Arc<BridgeConfig>,
    network: Arc<dyn AttestationNetwork>,
    /// Refreshed after a successful redemption
    registry: Option<PendingTransferRegistry>,
}

impl RedemptionService {
    pub fn new(config: Arc<BridgeConfig>, network: Arc<dyn AttestationNetwork>) -> Self {
        Self {
            config,
            network,
            registry: None,
        }
    }

    pub fn with_registry(mut self, registry: PendingTransferRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Redeem the transfer started by `source_tx_id`
    ///
    /// Returns the destination transaction id. Safe to call again for a
    /// transfer that is already complete.
    pub async fn redeem(&self, source_tx_id: &str, wallet: &dyn DestinationWallet) -> Result<TxId> {
        let source_tx_id = source_tx_id.trim();
        let result = self.run(source_tx_id, wallet).await;

        match &result {
            Ok(destination_tx) => log_redemption_event(
                "redemption_completed",
                source_tx_id,
                Some(destination_tx.as_str()),
                None,
            ),
            Err(e) => {
                let message = e.to_string();
                log_redemption_event(
                    "redemption_failed",
                    source_tx_id,
                    None,
                    Some((e.error_code(), message.as_str())),
                )
            }
        }
        result
    }

    async fn run(&self, source_tx_id: &str, wallet: &dyn DestinationWallet) -> Result<TxId> {
        Signature::from_str(source_tx_id).map_err(|_| {
            BridgeError::validation(format!(
                "{} is not a {} transaction signature",
                source_tx_id, self.config.source_chain
            ))
        })?;
        if wallet.chain() != self.config.destination_chain {
            return Err(BridgeError::validation(format!(
                "wallet is on {}, transfer settles on {}",
                wallet.chain(),
                self.config.destination_chain
            )));
        }

        let handle = match self
            .network
            .reconstruct_transfer(self.config.source_chain, source_tx_id)
            .await
        {
            Ok(handle) => handle,
            Err(AttestationError::NotFound(_)) => {
                return Err(BridgeError::not_ready(format!(
                    "transfer for {} is not indexed yet",
                    source_tx_id
                )))
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(existing) = &handle.destination_tx {
            let destination_tx = TxId::from_sdk_value(existing)?;
            info!(target: "xbridge::redemption", message_id = %handle.message_id, tx = %destination_tx, "already redeemed");
            return Ok(destination_tx);
        }

        let wait = self.config.attestation_timeout();
        let attestation = match tokio::time::timeout(wait, self.network.fetch_attestation(&handle, wait)).await {
            Ok(Ok(Some(attestation))) => attestation,
            Ok(Ok(None)) | Err(_) => {
                warn!(target: "xbridge::redemption", message_id = %handle.message_id, wait_secs = wait.as_secs(), "attestation not available");
                return Err(BridgeError::not_ready(format!(
                    "attestation for {} not available after {}s; try again later",
                    handle.message_id,
                    wait.as_secs()
                )));
            }
            Ok(Err(e)) => return Err(e.into()),
        };

        let signer = ForwardingSigner::new(wallet);
        let responses = self
            .network
            .complete_transfer(&handle, &attestation, &signer)
            .await?;
        let last = responses
            .last()
            .ok_or_else(|| BridgeError::UnmappedResponse("no completion transaction returned".to_string()))?;
        let destination_tx = TxId::from_sdk_value(last)?;
        info!(target: "xbridge::redemption", message_id = %handle.message_id, tx = %destination_tx, "completion submitted");

        let receipt = wallet
            .wait_for_receipt(&destination_tx, self.config.receipt_timeout())
            .await?;
        if !receipt.success {
            return Err(BridgeError::redemption(format!(
                "destination transaction {} reverted",
                destination_tx
            )));
        }

        if let Some(registry) = &self.registry {
            // Failures are recorded in the registry
            let _ = registry.refresh().await;
        }
        Ok(destination_tx)
    }
}

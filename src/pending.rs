//! PendingTransferRegistry
//!
//! Transfers for an address whose destination leg has not been observed
//! complete, read from the attestation network's indexer. This is the
//! recovery path after the orchestrator's session is gone: nothing here is
//! persisted locally.

use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::attestation::{AttestationNetwork, IndexedTransfer};
use crate::common::{BridgeConfig, BridgeError, Result};
use crate::types::{Chain, PendingTransfer, TxId};

#[derive(Debug, Default)]
struct RegistryState {
    address: Option<String>,
    pending: Vec<PendingTransfer>,
    last_error: Option<String>,
    /// Bumped when a refresh starts; only the latest one may write
    generation: u64,
}

/// Cheap to clone; clones share the same list
#[derive(Clone)]
pub struct PendingTransferRegistry {
    config: Arc<BridgeConfig>,
    network: Arc<dyn AttestationNetwork>,
    state: Arc<RwLock<RegistryState>>,
}

impl PendingTransferRegistry {
    pub fn new(config: Arc<BridgeConfig>, network: Arc<dyn AttestationNetwork>) -> Self {
        Self {
            config,
            network,
            state: Arc::new(RwLock::new(RegistryState::default())),
        }
    }

    /// Track `address` and load its pending transfers
    pub async fn list(&self, address: &str) -> Result<Vec<PendingTransfer>> {
        let address = address.trim();
        self.config
            .source_chain
            .validate_address(address)
            .map_err(BridgeError::validation)?;
        {
            let mut state = self.state.write().await;
            if state.address.as_deref() != Some(address) {
                state.address = Some(address.to_string());
                state.pending.clear();
                state.last_error = None;
            }
        }
        self.refresh().await
    }

    /// Reload the tracked address
    ///
    /// On failure the previous list is kept and the error recorded.
    pub async fn refresh(&self) -> Result<Vec<PendingTransfer>> {
        let (address, generation) = {
            let mut state = self.state.write().await;
            let address = state
                .address
                .clone()
                .ok_or_else(|| BridgeError::invalid_state("no address to list transfers for"))?;
            state.generation += 1;
            (address, state.generation)
        };

        match self
            .network
            .list_transactions(&address, self.config.pending_limit)
            .await
        {
            Ok(history) => {
                let pending = self.select_pending(history);
                let mut state = self.state.write().await;
                if state.generation != generation {
                    debug!(target: "xbridge::pending", %address, generation, "discarding superseded refresh");
                    return Ok(state.pending.clone());
                }
                debug!(target: "xbridge::pending", %address, count = pending.len(), "pending transfers refreshed");
                state.pending = pending.clone();
                state.last_error = None;
                Ok(pending)
            }
            Err(e) => {
                let e = BridgeError::from(e);
                warn!(target: "xbridge::pending", %address, error = %e, "refresh failed, keeping previous list");
                let mut state = self.state.write().await;
                if state.generation == generation {
                    state.last_error = Some(e.to_string());
                }
                Err(e)
            }
        }
    }

    /// Current list, newest first
    pub async fn pending(&self) -> Vec<PendingTransfer> {
        self.state.read().await.pending.clone()
    }

    pub async fn last_error(&self) -> Option<String> {
        self.state.read().await.last_error.clone()
    }

    /// Refresh every `pending_refresh_secs` until the handle is dropped
    pub fn spawn_auto_refresh(&self) -> AutoRefreshHandle {
        let registry = self.clone();
        let period = self.config.pending_refresh_interval();
        info!(target: "xbridge::pending", interval_secs = period.as_secs(), "auto refresh started");

        let handle = tokio::spawn(async move {
            let mut ticks = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticks.tick().await;
                if registry.state.read().await.address.is_none() {
                    continue;
                }
                // Failures are recorded in the registry state
                let _ = registry.refresh().await;
            }
        });

        AutoRefreshHandle { handle }
    }

    fn select_pending(&self, history: Vec<IndexedTransfer>) -> Vec<PendingTransfer> {
        let mut pending: Vec<PendingTransfer> = history
            .into_iter()
            .filter(|t| self.on_route(t) && !t.is_complete())
            .filter_map(|t| match to_pending(&t) {
                Ok(pending) => Some(pending),
                Err(reason) => {
                    warn!(target: "xbridge::pending", message_id = %t.message_id, %reason, "skipping indexer entry");
                    None
                }
            })
            .collect();

        pending.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        pending
    }

    fn on_route(&self, transfer: &IndexedTransfer) -> bool {
        let chain = |name: &str| name.parse::<Chain>().ok();
        chain(&transfer.source_chain) == Some(self.config.source_chain)
            && chain(&transfer.destination_chain) == Some(self.config.destination_chain)
    }
}

fn to_pending(transfer: &IndexedTransfer) -> std::result::Result<PendingTransfer, String> {
    let amount = transfer
        .amount
        .parse::<u128>()
        .map_err(|_| format!("amount is not an integer: {}", transfer.amount))?;
    let source_tx_id = TxId::from_sdk_value(&transfer.source_tx).map_err(|e| e.to_string())?;

    Ok(PendingTransfer {
        message_id: transfer.message_id.clone(),
        amount,
        source_tx_id,
        timestamp: transfer.timestamp,
    })
}

/// Aborts the auto-refresh task when dropped
pub struct AutoRefreshHandle {
    handle: JoinHandle<()>,
}

impl AutoRefreshHandle {
    pub fn stop(self) {
        self.handle.abort();
    }
}

impl Drop for AutoRefreshHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

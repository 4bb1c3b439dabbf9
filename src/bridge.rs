//! Bridge client context
//!
//! Built once at startup and passed by reference to the presentation layer.
//! Every component it hands out shares the same configuration, attestation
//! client and source-chain RPC.
//!
//! ```rust,ignore
//! let client = BridgeClient::init(BridgeConfig::from_env()?).await?;
//! let orchestrator = client.orchestrator();
//! let quote = orchestrator.fetch_quote("100", "0x742d...", &wallet).await?;
//! ```

use std::sync::Arc;

use tracing::info;

use crate::attestation::{AttestationClient, AttestationNetwork, TracingInterceptor};
use crate::common::{BridgeConfig, BridgeError, Result};
use crate::orchestrator::TransferOrchestrator;
use crate::pending::PendingTransferRegistry;
use crate::redemption::RedemptionService;
use crate::wallet::{DestinationError, EvmRpcWallet, SolanaRpc, SourceRpc};

pub struct BridgeClient {
    config: Arc<BridgeConfig>,
    network: Arc<dyn AttestationNetwork>,
    rpc: Arc<dyn SourceRpc>,
    registry: PendingTransferRegistry,
}

impl BridgeClient {
    /// Validate `config`, connect and initialize the attestation client
    pub async fn init(config: BridgeConfig) -> Result<Self> {
        config.validate()?;
        config.log_summary();

        let mut client = AttestationClient::new(&config)?;
        if config.debug_http {
            client = client.with_interceptor(Arc::new(TracingInterceptor));
        }
        client.init().await?;

        let rpc = SolanaRpc::new(&config.source_rpc);
        info!(target: "xbridge::system", network = config.network.as_str(), "bridge client ready");
        Ok(Self::from_parts(config, Arc::new(client), Arc::new(rpc)))
    }

    /// Assemble from collaborators that are already initialized
    pub fn from_parts(
        config: BridgeConfig,
        network: Arc<dyn AttestationNetwork>,
        rpc: Arc<dyn SourceRpc>,
    ) -> Self {
        let config = Arc::new(config);
        let registry = PendingTransferRegistry::new(config.clone(), network.clone());
        Self {
            config,
            network,
            rpc,
            registry,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// A new orchestrator; one per UI surface
    pub fn orchestrator(&self) -> TransferOrchestrator {
        TransferOrchestrator::new(self.config.clone(), self.network.clone(), self.rpc.clone())
    }

    /// The shared registry; clones see the same list
    pub fn pending_registry(&self) -> PendingTransferRegistry {
        self.registry.clone()
    }

    pub fn redemption_service(&self) -> RedemptionService {
        RedemptionService::new(self.config.clone(), self.network.clone()).with_registry(self.registry.clone())
    }

    /// Destination wallet for `address` over the configured destination RPC
    pub fn destination_wallet(&self, address: &str) -> Result<EvmRpcWallet> {
        EvmRpcWallet::new(&self.config.destination_rpc, address, self.config.destination_chain).map_err(|e| match e {
            DestinationError::InvalidAddress(reason) => BridgeError::validation(reason),
            other => other.into(),
        })
    }
}

//! xbridge - Cross-Chain Token Transfer Core
//!
//! Moves a token from an SVM source chain to an EVM destination chain over a
//! third-party attestation network. The crate is a library consumed by a
//! presentation layer; it persists nothing of its own.
//!
//! ## Components
//!
//! 1. **QuoteService** - Debounced fee and receive-amount estimates
//! 2. **TransferOrchestrator** - Session state machine with progress events
//! 3. **SignerAdapter** - Repairs, signs, submits and confirms source transactions
//! 4. **PendingTransferRegistry** - Transfers whose destination leg is outstanding
//! 5. **RedemptionService** - Manual destination completion
//!
//! All of them are handed out by an explicitly initialized [`BridgeClient`].

pub mod attestation;
pub mod bridge;
pub mod common;
pub mod orchestrator;
pub mod pending;
pub mod quote;
pub mod redemption;
pub mod types;
pub mod wallet;

#[cfg(test)]
mod testing;

// Re-exports: client context
pub use bridge::BridgeClient;

// Re-exports: infrastructure
pub use common::{init_from_config, init_logging, BridgeConfig, BridgeError, Network, Result};

// Re-exports: components
pub use orchestrator::TransferOrchestrator;
pub use pending::{AutoRefreshHandle, PendingTransferRegistry};
pub use quote::{QuoteOutcome, QuoteService};
pub use redemption::RedemptionService;

// Re-exports: attestation network
pub use attestation::{AttestationClient, AttestationNetwork, Interceptor, TracingInterceptor};

// Re-exports: wallets
pub use wallet::{
    DestinationWallet, EvmRpcWallet, KeypairWallet, SignerAdapter, SolanaRpc, SourceRpc,
    SourceTransaction, SourceWallet,
};

// Re-exports: types
pub use types::{
    Chain, PendingTransfer, ProgressEvent, ProgressSnapshot, Quote, TransferRequest,
    TransferStatus, TxId,
};

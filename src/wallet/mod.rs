//! Wallet Module
//!
//! Source-chain signing and submission (`SignerAdapter`) and the
//! destination-chain wallet used by redemption.

pub mod adapter;
pub mod destination;
pub mod source;
pub mod transaction;

pub use adapter::{SignerAdapter, SignerError, SignerEvent, TransactionSender};
pub use destination::{
    CompletionSigner, DestinationError, DestinationWallet, EvmRpcWallet, EvmTransactionRequest,
    ForwardingSigner, TransactionReceipt,
};
pub use source::{
    ConfirmError, KeypairWallet, LandedStatus, RpcError, SolanaRpc, SourceRpc, SourceWallet,
    ValidityWindow, WalletError,
};
pub use transaction::{SourceTransaction, SourceTxError, UnsignedTransaction};

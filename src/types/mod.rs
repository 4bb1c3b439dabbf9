//! Shared Types Module
//!
//! Data types shared across the bridge core.

pub mod chain;
pub mod session;
pub mod transfer;
pub mod txid;
pub mod units;

// Re-exports for convenience
pub use chain::{Chain, Platform};
pub use session::{ProgressEvent, ProgressSnapshot, TransferSession, TransferStatus};
pub use transfer::{ChainAddress, PendingTransfer, Quote, TransferDescription, TransferRequest};
pub use txid::{TxId, UnmappedShape};
pub use units::{format_atomic, to_atomic, UnitsError};

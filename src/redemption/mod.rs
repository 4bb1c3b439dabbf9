//! Redemption
//!
//! Manual completion of a transfer's destination leg.
//!
//! # Flow
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    REDEMPTION FLOW                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  1. Reconstruct the transfer from its source transaction        │
//! │     └── Unknown to the network: RedemptionNotReady              │
//! │     └── Already completed: return the destination tx id         │
//! │                                                                 │
//! │  2. Fetch the attestation (bounded wait)                        │
//! │     └── Not there in time: RedemptionNotReady                   │
//! │                                                                 │
//! │  3. Submit the completion through ForwardingSigner              │
//! │     └── address() + send_transaction() only                     │
//! │                                                                 │
//! │  4. Wait for the destination receipt                            │
//! │     └── Reverted: RedemptionFailure                             │
//! │                                                                 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! let service = client.redemption_service();
//! let wallet = client.destination_wallet("0x742d...")?;
//! let destination_tx = service.redeem(&source_tx_id, &wallet).await?;
//! ```

pub mod service;

pub use service::RedemptionService;

//! QuoteService
//!
//! Debounced fee and receive-amount estimation. Every call takes a new
//! generation number; a call whose generation is no longer the latest when
//! its debounce or its network call finishes reports `Superseded` instead
//! of a result, so only the newest input ever lands.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::Value;
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, info, warn};

use crate::attestation::AttestationNetwork;
use crate::common::{BridgeConfig, BridgeError, Result};
use crate::types::{to_atomic, Quote, TransferRequest};

/// Result of a debounced quote call
#[derive(Debug, Clone, PartialEq)]
pub enum QuoteOutcome {
    Fresh { quote: Quote, generation: u64 },
    /// A newer call replaced this one
    Superseded,
}

pub struct QuoteService {
    config: Arc<BridgeConfig>,
    network: Arc<dyn AttestationNetwork>,
    generation: AtomicU64,
}

impl QuoteService {
    pub fn new(config: Arc<BridgeConfig>, network: Arc<dyn AttestationNetwork>) -> Self {
        Self {
            config,
            network,
            generation: AtomicU64::new(0),
        }
    }

    /// Build and validate a transfer request; no network access
    pub fn prepare(&self, amount: &str, destination: &str, sender: &Pubkey) -> Result<TransferRequest> {
        let atomic = to_atomic(amount, self.config.token_decimals)
            .map_err(|e| BridgeError::validation(e.to_string()))?;

        let request = TransferRequest {
            source_chain: self.config.source_chain,
            destination_chain: self.config.destination_chain,
            token_id: self.config.token_id.clone(),
            amount: atomic,
            sender_address: sender.to_string(),
            recipient_address: destination.trim().to_string(),
        };
        request.validate().map_err(BridgeError::validation)?;
        Ok(request)
    }

    /// Debounce, then price `request`
    pub async fn fetch(&self, request: &TransferRequest) -> Result<QuoteOutcome> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        tokio::time::sleep(self.config.quote_debounce()).await;
        if !self.is_current(generation) {
            debug!(target: "xbridge::quote", generation, "superseded during debounce");
            return Ok(QuoteOutcome::Superseded);
        }

        let description = request.description();
        let response =
            tokio::time::timeout(self.config.quote_timeout(), self.network.quote_transfer(&description)).await;

        if !self.is_current(generation) {
            debug!(target: "xbridge::quote", generation, "superseded while pricing");
            return Ok(QuoteOutcome::Superseded);
        }

        let raw = match response {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                warn!(target: "xbridge::quote", error = %e, "quote request failed");
                return Err(BridgeError::quote(e.to_string()));
            }
            Err(_) => {
                warn!(target: "xbridge::quote", timeout_secs = self.config.quote_timeout_secs, "quote timed out");
                return Err(BridgeError::quote("pricing service did not respond in time"));
            }
        };

        let quote = quote_from_response(raw).map_err(BridgeError::quote)?;
        info!(
            target: "xbridge::quote",
            amount = %request.amount,
            destination_amount = %quote.destination_amount,
            relayer_fee = %quote.relayer_fee,
            "quote received"
        );
        Ok(QuoteOutcome::Fresh { quote, generation })
    }

    /// Invalidate every call in flight
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }
}

/// Map a pricing response onto a `Quote`
///
/// Amounts may be decimal strings or JSON integers. A missing relayer fee
/// means no fee.
fn quote_from_response(raw: Value) -> std::result::Result<Quote, String> {
    let amount = |field: &str| -> std::result::Result<Option<u128>, String> {
        match raw.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => s
                .parse::<u128>()
                .map(Some)
                .map_err(|_| format!("{} is not an integer amount: {}", field, s)),
            Some(Value::Number(n)) => n
                .as_u64()
                .map(|n| Some(n as u128))
                .ok_or_else(|| format!("{} is not an integer amount: {}", field, n)),
            Some(other) => Err(format!("{} has unexpected shape: {}", field, other)),
        }
    };

    let destination_amount =
        amount("destinationAmount")?.ok_or_else(|| "quote has no destinationAmount".to_string())?;
    let source_amount =
        amount("sourceAmount")?.ok_or_else(|| "quote has no sourceAmount".to_string())?;
    let relayer_fee = amount("relayerFee")?.unwrap_or(0);

    if destination_amount > source_amount {
        return Err(format!(
            "destination amount {} exceeds source amount {}",
            destination_amount, source_amount
        ));
    }

    Ok(Quote {
        relayer_fee,
        destination_amount,
        source_amount,
        raw,
    })
}

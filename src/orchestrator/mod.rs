//! TransferOrchestrator
//!
//! Drives the transfer session of one UI surface:
//!
//! ```text
//! idle -> quoting -> ready -> confirming -> bridging -> relaying -> success
//!   any non-terminal state -> error;   reset(): any state -> idle
//! ```
//!
//! Success is reported once the source-chain transaction is confirmed; the
//! attestation and destination relay continue without the orchestrator.
//! Unfinished destination legs show up in the `PendingTransferRegistry`.

pub mod timer;

use std::sync::Arc;

use solana_sdk::signature::Signature;
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::attestation::AttestationNetwork;
use crate::common::{log_transfer_event, BridgeConfig, BridgeError, Result};
use crate::quote::{QuoteOutcome, QuoteService};
use crate::types::{
    ProgressEvent, ProgressSnapshot, Quote, TransferRequest, TransferSession, TransferStatus, TxId,
};
use crate::wallet::{SignerAdapter, SignerEvent, SourceRpc, SourceWallet};

pub use timer::ElapsedTimer;

/// Buffered progress events per subscriber
const EVENT_CAPACITY: usize = 64;

/// Move `session` to `next`, logging instead of failing on a refused transition
fn advance(session: &mut TransferSession, next: TransferStatus, message: &str) {
    if let Err(e) = session.transition(next, message) {
        warn!(target: "xbridge::transfer", session = %session.id, error = %e, "transition refused");
    }
}

pub struct TransferOrchestrator {
    config: Arc<BridgeConfig>,
    network: Arc<dyn AttestationNetwork>,
    rpc: Arc<dyn SourceRpc>,
    quotes: QuoteService,
    session: Arc<RwLock<TransferSession>>,
    timer: Mutex<Option<ElapsedTimer>>,
    events: broadcast::Sender<ProgressEvent>,
}

impl TransferOrchestrator {
    pub fn new(
        config: Arc<BridgeConfig>,
        network: Arc<dyn AttestationNetwork>,
        rpc: Arc<dyn SourceRpc>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            quotes: QuoteService::new(config.clone(), network.clone()),
            config,
            network,
            rpc,
            session: Arc::new(RwLock::new(TransferSession::default())),
            timer: Mutex::new(None),
            events,
        }
    }

    /// Progress events for every session transition
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> ProgressSnapshot {
        let session = self.session.read().await;
        ProgressSnapshot::from_session(&session, self.config.estimated_transfer_secs)
    }

    pub async fn status(&self) -> TransferStatus {
        self.session.read().await.status
    }

    /// Apply `change` if `session_id` is still the live session; publish
    /// the result when `change` reports that it did something
    async fn update<F>(&self, session_id: &str, change: F) -> bool
    where
        F: FnOnce(&mut TransferSession) -> bool,
    {
        let mut session = self.session.write().await;
        if session.id != session_id {
            debug!(target: "xbridge::transfer", stale = %session_id, "update for a discarded session dropped");
            return false;
        }
        if !change(&mut session) {
            return false;
        }
        let event = ProgressEvent::from_session(&session);
        drop(session);

        // No subscribers is fine
        let _ = self.events.send(event);
        true
    }

    // =========================================================================
    // Quoting
    // =========================================================================

    /// Debounced quote for `amount` (decimal token units) to `destination`
    ///
    /// Returns `Ok(None)` when a newer call superseded this one.
    pub async fn fetch_quote(
        &self,
        amount: &str,
        destination: &str,
        wallet: &dyn SourceWallet,
    ) -> Result<Option<Quote>> {
        let session_id = {
            let session = self.session.read().await;
            if session.status.is_in_flight() || session.status.is_terminal() {
                return Err(BridgeError::invalid_state(format!(
                    "cannot quote while the transfer is {}",
                    session.status
                )));
            }
            session.id.clone()
        };

        let request = match self.quotes.prepare(amount, destination, &wallet.pubkey()) {
            Ok(request) => request,
            Err(e) => {
                self.quotes.cancel();
                self.update(&session_id, |s| {
                    s.quote = None;
                    if s.status != TransferStatus::Idle {
                        advance(s, TransferStatus::Idle, "");
                    }
                    true
                })
                .await;
                return Err(e);
            }
        };

        self.update(&session_id, |s| {
            s.quote = None;
            s.error_message.clear();
            advance(s, TransferStatus::Quoting, "Fetching quote");
            true
        })
        .await;

        match self.quotes.fetch(&request).await {
            Ok(QuoteOutcome::Fresh { quote, generation }) => {
                let applied = self
                    .update(&session_id, |s| {
                        if s.status != TransferStatus::Quoting || !self.quotes.is_current(generation) {
                            return false;
                        }
                        s.quote = Some(quote.clone());
                        s.request = Some(request);
                        advance(s, TransferStatus::Ready, "Ready to bridge");
                        true
                    })
                    .await;
                Ok(applied.then_some(quote))
            }
            Ok(QuoteOutcome::Superseded) => Ok(None),
            Err(e) => {
                let message = e.to_string();
                self.update(&session_id, |s| {
                    if s.status != TransferStatus::Quoting {
                        return false;
                    }
                    s.quote = None;
                    advance(s, TransferStatus::Idle, "");
                    s.error_message = message;
                    true
                })
                .await;
                Err(e)
            }
        }
    }

    // =========================================================================
    // Bridging
    // =========================================================================

    /// Start a transfer from `ready`
    ///
    /// `wallet` is borrowed for the duration of the call. Returns the source
    /// transaction id once it is confirmed; the destination leg is not
    /// awaited.
    pub async fn bridge(
        &self,
        amount: &str,
        destination: &str,
        wallet: &dyn SourceWallet,
    ) -> Result<TxId> {
        let request = self.quotes.prepare(amount, destination, &wallet.pubkey())?;

        let session_id = {
            let mut session = self.session.write().await;
            match session.status {
                TransferStatus::Ready => {}
                status if status.is_in_flight() => return Err(BridgeError::SessionInFlight),
                status => {
                    return Err(BridgeError::invalid_state(format!(
                        "cannot bridge while the transfer is {}",
                        status
                    )))
                }
            }
            if session.request.as_ref() != Some(&request) {
                return Err(BridgeError::invalid_state(
                    "amount, recipient or sender differ from the quoted transfer; re-quote required",
                ));
            }
            session
                .begin(request.clone(), "Confirm the transaction in your wallet")
                .map_err(BridgeError::invalid_state)?;
            let event = ProgressEvent::from_session(&session);
            let id = session.id.clone();
            drop(session);
            let _ = self.events.send(event);
            id
        };
        self.quotes.cancel();
        log_transfer_event("transfer_started", &session_id, request.amount, None, None);

        let result = self.run_transfer(&session_id, &request, wallet).await;
        self.stop_timer(&session_id).await;

        match result {
            Ok(tx_id) => {
                let explorer_url = self.config.explorer_tx_url(tx_id.as_str());
                self.update(&session_id, |s| {
                    if s.status == TransferStatus::Confirming {
                        advance(s, TransferStatus::Bridging, "Submitted to the source chain");
                    }
                    s.source_tx_id = Some(tx_id.clone());
                    s.explorer_url = Some(explorer_url);
                    advance(s, TransferStatus::Relaying, "Waiting for the attestation network to relay");
                    true
                })
                .await;
                self.update(&session_id, |s| {
                    advance(s, TransferStatus::Success, "Transfer submitted; the destination will be credited once relayed");
                    true
                })
                .await;

                info!(target: "xbridge::transfer", session = %session_id, tx = %tx_id, "transfer submitted");
                log_transfer_event(
                    "transfer_submitted",
                    &session_id,
                    request.amount,
                    Some(tx_id.as_str()),
                    None,
                );
                Ok(tx_id)
            }
            Err(e) => {
                let message = e.to_string();
                self.update(&session_id, |s| {
                    s.fail(message.clone());
                    true
                })
                .await;
                log_transfer_event(
                    "transfer_failed",
                    &session_id,
                    request.amount,
                    None,
                    Some((e.error_code(), message.as_str())),
                );
                Err(e)
            }
        }
    }

    /// Initiate through the network while following the adapter's progress
    async fn run_transfer(
        &self,
        session_id: &str,
        request: &TransferRequest,
        wallet: &dyn SourceWallet,
    ) -> Result<TxId> {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let description = request.description();

        let initiate = async move {
            // The adapter owns the sender; dropping it ends the listener
            let adapter = SignerAdapter::new(wallet, self.rpc.as_ref()).with_events(events_tx);
            self.network.initiate_transfer(&description, &adapter).await
        };

        let listen = async {
            let mut submitted = false;
            while let Some(event) = events_rx.recv().await {
                if let SignerEvent::Submitted { signature, .. } = event {
                    if !submitted {
                        submitted = true;
                        self.on_submitted(session_id, signature).await;
                    }
                }
            }
        };

        let (receipts, ()) = tokio::join!(initiate, listen);
        let receipts = receipts?;

        let last = receipts
            .last()
            .ok_or_else(|| BridgeError::UnmappedResponse("no transaction receipts returned".to_string()))?;
        Ok(TxId::from_sdk_value(last)?)
    }

    /// First submission observed: enter `bridging` and start the timer
    async fn on_submitted(&self, session_id: &str, signature: Signature) {
        let tx_id = TxId::from(signature);
        let explorer_url = self.config.explorer_tx_url(tx_id.as_str());
        let entered = self
            .update(session_id, |s| {
                if s.status != TransferStatus::Confirming {
                    return false;
                }
                s.source_tx_id = Some(tx_id);
                s.explorer_url = Some(explorer_url);
                advance(s, TransferStatus::Bridging, "Submitted to the source chain, waiting for confirmation");
                true
            })
            .await;

        if entered {
            let timer = ElapsedTimer::start(self.session.clone(), session_id.to_string());
            if let Some(previous) = self.timer.lock().await.replace(timer) {
                previous.stop();
            }
        }
    }

    async fn stop_timer(&self, session_id: &str) {
        let mut timer = self.timer.lock().await;
        if timer.as_ref().map(|t| t.session_id() == session_id).unwrap_or(false) {
            if let Some(timer) = timer.take() {
                timer.stop();
            }
        }
    }

    /// Discard the session and return to `idle`
    ///
    /// A transaction already broadcast is not affected; late results from it
    /// are ignored.
    pub async fn reset(&self) {
        if let Some(timer) = self.timer.lock().await.take() {
            timer.stop();
        }
        self.quotes.cancel();

        let mut session = self.session.write().await;
        *session = TransferSession::default();
        let event = ProgressEvent::from_session(&session);
        drop(session);

        debug!(target: "xbridge::transfer", "session reset");
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, FakeNetwork, ScriptedRpc, RECIPIENT};
    use crate::wallet::source::MockSourceWallet;
    use crate::wallet::{KeypairWallet, WalletError};
    use serde_json::json;
    use solana_sdk::{pubkey::Pubkey, signature::Keypair};
    use std::time::Duration;

    fn orchestrator(network: Arc<FakeNetwork>, rpc: Arc<ScriptedRpc>) -> TransferOrchestrator {
        TransferOrchestrator::new(Arc::new(testing::config()), network, rpc)
    }

    fn wallet() -> KeypairWallet {
        KeypairWallet::new(Keypair::new())
    }

    fn rejecting_wallet() -> MockSourceWallet {
        let mut wallet = MockSourceWallet::new();
        wallet.expect_pubkey().return_const(Pubkey::new_unique());
        wallet
            .expect_sign_transaction()
            .returning(|_| Err(WalletError::Rejected("User rejected the request.".into())));
        wallet
    }

    fn drain(events: &mut broadcast::Receiver<ProgressEvent>) -> Vec<TransferStatus> {
        let mut statuses = Vec::new();
        while let Ok(event) = events.try_recv() {
            statuses.push(event.status);
        }
        statuses
    }

    #[tokio::test(start_paused = true)]
    async fn test_quote_path_idle_quoting_ready() {
        let orchestrator = orchestrator(FakeNetwork::new(), Arc::new(ScriptedRpc::default()));
        let mut events = orchestrator.subscribe();

        let quote = orchestrator
            .fetch_quote("100", RECIPIENT, &wallet())
            .await
            .unwrap()
            .expect("fresh quote");

        assert_eq!(quote.destination_amount, 99_000_000);
        assert_eq!(drain(&mut events), vec![TransferStatus::Quoting, TransferStatus::Ready]);

        let snapshot = orchestrator.snapshot().await;
        assert_eq!(snapshot.status, TransferStatus::Ready);
        assert_eq!(snapshot.quote, Some(quote));
        assert_eq!(snapshot.estimated_seconds, 1200);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_input_returns_to_idle_without_network() {
        let network = FakeNetwork::new();
        let orchestrator = orchestrator(network.clone(), Arc::new(ScriptedRpc::default()));
        let wallet = wallet();
        orchestrator.fetch_quote("100", RECIPIENT, &wallet).await.unwrap();

        let err = orchestrator.fetch_quote("100", "0xnothex", &wallet).await.unwrap_err();
        assert!(matches!(err, BridgeError::Validation(_)));
        assert_eq!(network.quote_call_count(), 1);

        let snapshot = orchestrator.snapshot().await;
        assert_eq!(snapshot.status, TransferStatus::Idle);
        assert_eq!(snapshot.quote, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_quote_failure_returns_to_idle() {
        let network = FakeNetwork::new();
        *network.quote.lock().unwrap() = Some(Err("pricing unavailable".to_string()));
        let orchestrator = orchestrator(network, Arc::new(ScriptedRpc::default()));

        let err = orchestrator.fetch_quote("100", RECIPIENT, &wallet()).await.unwrap_err();
        assert!(matches!(err, BridgeError::Quote(_)));

        let snapshot = orchestrator.snapshot().await;
        assert_eq!(snapshot.status, TransferStatus::Idle);
        assert_eq!(snapshot.quote, None);
        assert!(snapshot.error_message.contains("pricing unavailable"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bridge_reports_provisional_success() {
        let rpc = ScriptedRpc::with_confirm_delay(Duration::from_secs(3));
        let orchestrator = orchestrator(FakeNetwork::new(), rpc.clone());
        let wallet = wallet();
        orchestrator.fetch_quote("100", RECIPIENT, &wallet).await.unwrap();
        let mut events = orchestrator.subscribe();

        let tx_id = orchestrator.bridge("100", RECIPIENT, &wallet).await.unwrap();

        assert_eq!(
            drain(&mut events),
            vec![
                TransferStatus::Confirming,
                TransferStatus::Bridging,
                TransferStatus::Relaying,
                TransferStatus::Success,
            ]
        );
        let snapshot = orchestrator.snapshot().await;
        assert_eq!(snapshot.current_step, 4);
        assert_eq!(snapshot.source_tx_id, Some(tx_id.clone()));
        assert!(snapshot.explorer_url.unwrap().contains(tx_id.as_str()));
        assert!((2..=3).contains(&snapshot.elapsed_seconds));
        assert_eq!(rpc.sent.load(std::sync::atomic::Ordering::SeqCst), 1);

        // Timer stopped at success
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(orchestrator.snapshot().await.elapsed_seconds, snapshot.elapsed_seconds);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wallet_rejection_ends_in_error_and_reset_clears() {
        let orchestrator = orchestrator(FakeNetwork::new(), Arc::new(ScriptedRpc::default()));
        let wallet = rejecting_wallet();
        orchestrator.fetch_quote("100", RECIPIENT, &wallet).await.unwrap();
        let mut events = orchestrator.subscribe();

        let err = orchestrator.bridge("100", RECIPIENT, &wallet).await.unwrap_err();
        assert!(matches!(err, BridgeError::UserCancelled(_)));
        assert_eq!(
            drain(&mut events),
            vec![TransferStatus::Confirming, TransferStatus::Error]
        );

        let snapshot = orchestrator.snapshot().await;
        assert!(snapshot.error_message.contains("rejected"));
        assert!(orchestrator.timer.lock().await.is_none());

        orchestrator.reset().await;
        let snapshot = orchestrator.snapshot().await;
        assert_eq!(snapshot.status, TransferStatus::Idle);
        assert_eq!(snapshot.current_step, 0);
        assert_eq!(snapshot.quote, None);
        assert_eq!(snapshot.error_message, "");
        assert_eq!(snapshot.elapsed_seconds, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_bridge_while_in_flight_is_rejected() {
        let rpc = ScriptedRpc::with_confirm_delay(Duration::from_secs(5));
        let orchestrator = orchestrator(FakeNetwork::new(), rpc.clone());
        let wallet = wallet();
        orchestrator.fetch_quote("100", RECIPIENT, &wallet).await.unwrap();

        let (first, second) = tokio::join!(orchestrator.bridge("100", RECIPIENT, &wallet), async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            orchestrator.bridge("100", RECIPIENT, &wallet).await
        });

        assert!(first.is_ok());
        assert!(matches!(second, Err(BridgeError::SessionInFlight)));
        assert_eq!(rpc.sent.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bridge_requires_ready() {
        let orchestrator = orchestrator(FakeNetwork::new(), Arc::new(ScriptedRpc::default()));
        let err = orchestrator.bridge("100", RECIPIENT, &wallet()).await.unwrap_err();
        assert!(matches!(err, BridgeError::InvalidState(_)));
        assert_eq!(orchestrator.status().await, TransferStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bridge_must_match_quoted_transfer() {
        let rpc = Arc::new(ScriptedRpc::default());
        let orchestrator = orchestrator(FakeNetwork::new(), rpc.clone());
        let wallet = wallet();
        let quote = orchestrator
            .fetch_quote("100", RECIPIENT, &wallet)
            .await
            .unwrap()
            .expect("fresh quote");
        let mut events = orchestrator.subscribe();

        let other_recipient = "0x0000000000000000000000000000000000000001";
        for (amount, recipient, signer) in [
            ("5000", RECIPIENT, &wallet),
            ("100", other_recipient, &wallet),
            ("100", RECIPIENT, &self::wallet()),
        ] {
            let err = orchestrator.bridge(amount, recipient, signer).await.unwrap_err();
            assert!(matches!(err, BridgeError::InvalidState(msg) if msg.contains("re-quote")));
        }

        assert!(drain(&mut events).is_empty());
        assert_eq!(rpc.sent.load(std::sync::atomic::Ordering::SeqCst), 0);
        let snapshot = orchestrator.snapshot().await;
        assert_eq!(snapshot.status, TransferStatus::Ready);
        assert_eq!(snapshot.quote, Some(quote));

        // The quoted transfer still goes through
        orchestrator.bridge("100.0", RECIPIENT, &wallet).await.unwrap();
        assert_eq!(orchestrator.status().await, TransferStatus::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_during_flight_discards_late_results() {
        let rpc = ScriptedRpc::with_confirm_delay(Duration::from_secs(5));
        let orchestrator = orchestrator(FakeNetwork::new(), rpc);
        let wallet = wallet();
        orchestrator.fetch_quote("100", RECIPIENT, &wallet).await.unwrap();

        let (result, ()) = tokio::join!(orchestrator.bridge("100", RECIPIENT, &wallet), async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            orchestrator.reset().await;
        });

        // The broadcast transaction still completes for the caller
        assert!(result.is_ok());
        let snapshot = orchestrator.snapshot().await;
        assert_eq!(snapshot.status, TransferStatus::Idle);
        assert_eq!(snapshot.source_tx_id, None);
        assert_eq!(snapshot.elapsed_seconds, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_receipt_id_shapes() {
        let network = FakeNetwork::new();
        *network.receipts.lock().unwrap() = Some(vec![json!({"signature": "abc123"})]);
        let orchestrator = orchestrator(network.clone(), Arc::new(ScriptedRpc::default()));
        let wallet = wallet();
        orchestrator.fetch_quote("100", RECIPIENT, &wallet).await.unwrap();

        let tx_id = orchestrator.bridge("100", RECIPIENT, &wallet).await.unwrap();
        assert_eq!(tx_id.as_str(), "abc123");

        orchestrator.reset().await;
        *network.receipts.lock().unwrap() = Some(vec![json!({"chain": "Solana"})]);
        orchestrator.fetch_quote("100", RECIPIENT, &wallet).await.unwrap();

        let err = orchestrator.bridge("100", RECIPIENT, &wallet).await.unwrap_err();
        assert!(matches!(err, BridgeError::UnmappedResponse(_)));
        assert_eq!(orchestrator.status().await, TransferStatus::Error);
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_session_rejects_quotes() {
        let orchestrator = orchestrator(FakeNetwork::new(), Arc::new(ScriptedRpc::default()));
        let wallet = rejecting_wallet();
        orchestrator.fetch_quote("100", RECIPIENT, &wallet).await.unwrap();
        let _ = orchestrator.bridge("100", RECIPIENT, &wallet).await;

        let err = orchestrator.fetch_quote("5", RECIPIENT, &wallet).await.unwrap_err();
        assert!(matches!(err, BridgeError::InvalidState(_)));
    }
}

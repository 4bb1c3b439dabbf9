//! In-memory collaborators shared by the component tests

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use solana_sdk::{
    hash::Hash, message::Message, pubkey::Pubkey, signature::Signature, system_instruction,
    transaction::{Transaction, VersionedTransaction},
};

use crate::attestation::{
    Attestation, AttestationError, AttestationNetwork, IndexedTransfer, TransferHandle,
};
use crate::common::config::{BridgeConfig, Network};
use crate::types::{Chain, TransferDescription, TransferRequest, TxId};
use crate::wallet::{
    CompletionSigner, ConfirmError, DestinationError, DestinationWallet, EvmTransactionRequest,
    LandedStatus, RpcError, SourceRpc, SourceTransaction, TransactionReceipt, TransactionSender,
    UnsignedTransaction, ValidityWindow,
};

pub(crate) const SENDER: &str = "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM";
pub(crate) const RECIPIENT: &str = "0x742d35Cc6634C0532925a3b844Bc454e4438f44e";

/// A well-formed source transaction signature
pub(crate) fn source_tx() -> String {
    Signature::from([7u8; 64]).to_string()
}

pub(crate) fn config() -> BridgeConfig {
    BridgeConfig::for_network(Network::Devnet)
}

pub(crate) fn request() -> TransferRequest {
    let config = config();
    TransferRequest {
        source_chain: config.source_chain,
        destination_chain: config.destination_chain,
        token_id: config.token_id,
        amount: 100_000_000,
        sender_address: SENDER.to_string(),
        recipient_address: RECIPIENT.to_string(),
    }
}

/// Pricing with a flat 1% relayer fee
pub(crate) fn one_percent_quote(amount: u128) -> Value {
    let fee = amount / 100;
    json!({
        "relayerFee": fee.to_string(),
        "destinationAmount": (amount - fee).to_string(),
        "sourceAmount": amount.to_string(),
    })
}

pub(crate) fn indexed(
    message_id: &str,
    destination_chain: Chain,
    status: &str,
    timestamp: &str,
) -> IndexedTransfer {
    IndexedTransfer {
        message_id: message_id.to_string(),
        source_chain: Chain::Solana.to_string(),
        destination_chain: destination_chain.to_string(),
        amount: "25000000".to_string(),
        source_tx: json!({ "txid": format!("sig-{}", message_id) }),
        destination_status: status.to_string(),
        timestamp: timestamp.parse().unwrap(),
    }
}

pub(crate) fn handle(destination_tx: Option<Value>) -> TransferHandle {
    TransferHandle {
        message_id: "msg-1".to_string(),
        source_chain: Chain::Solana,
        destination_chain: Chain::Sepolia,
        amount: "25000000".to_string(),
        destination_tx,
    }
}

/// Scriptable `AttestationNetwork`
#[derive(Default)]
pub(crate) struct FakeNetwork {
    /// Overrides the 1% pricing
    pub quote: Mutex<Option<Result<Value, String>>>,
    pub quote_delay: Mutex<Duration>,
    pub quote_calls: Mutex<Vec<TransferDescription>>,
    /// Returned instead of `{chain, txid}` receipts
    pub receipts: Mutex<Option<Vec<Value>>>,
    pub initiate_error: Mutex<Option<String>>,
    pub history: Mutex<Vec<IndexedTransfer>>,
    pub history_error: Mutex<Option<String>>,
    pub history_calls: AtomicUsize,
    /// Per-call delays, consumed in order; the history is read before sleeping
    pub history_delays: Mutex<VecDeque<Duration>>,
    pub handles: Mutex<HashMap<String, TransferHandle>>,
    /// `None` never arrives
    pub attestation: Mutex<Option<Attestation>>,
    pub complete_calls: AtomicUsize,
}

impl FakeNetwork {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn quote_call_count(&self) -> usize {
        self.quote_calls.lock().unwrap().len()
    }
}

#[async_trait]
impl AttestationNetwork for FakeNetwork {
    async fn quote_transfer(&self, transfer: &TransferDescription) -> Result<Value, AttestationError> {
        self.quote_calls.lock().unwrap().push(transfer.clone());
        let delay = *self.quote_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.quote.lock().unwrap().clone();
        match scripted {
            Some(Ok(value)) => Ok(value),
            Some(Err(message)) => Err(AttestationError::Http {
                status: 400,
                message,
            }),
            None => {
                let amount: u128 = transfer.amount.parse().unwrap();
                Ok(one_percent_quote(amount))
            }
        }
    }

    async fn initiate_transfer(
        &self,
        transfer: &TransferDescription,
        sender: &dyn TransactionSender,
    ) -> Result<Vec<Value>, AttestationError> {
        if let Some(message) = self.initiate_error.lock().unwrap().clone() {
            return Err(AttestationError::Http {
                status: 500,
                message,
            });
        }

        let payer = sender.address();
        let ix = system_instruction::transfer(&payer, &Pubkey::new_unique(), 1);
        let tx = Transaction::new_unsigned(Message::new(&[ix], Some(&payer)));
        let ids = sender
            .sign_and_send(vec![UnsignedTransaction::new(SourceTransaction::Legacy(tx))])
            .await?;

        let scripted = self.receipts.lock().unwrap().clone();
        Ok(scripted.unwrap_or_else(|| {
            ids.into_iter()
                .map(|id| json!({"chain": transfer.source.chain, "txid": id}))
                .collect()
        }))
    }

    async fn list_transactions(
        &self,
        _address: &str,
        limit: usize,
    ) -> Result<Vec<IndexedTransfer>, AttestationError> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        let error = self.history_error.lock().unwrap().clone();
        let history: Vec<IndexedTransfer> =
            self.history.lock().unwrap().iter().take(limit).cloned().collect();
        let delay = self.history_delays.lock().unwrap().pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match error {
            Some(message) => Err(AttestationError::Transport(message)),
            None => Ok(history),
        }
    }

    async fn reconstruct_transfer(
        &self,
        _chain: Chain,
        source_tx_id: &str,
    ) -> Result<TransferHandle, AttestationError> {
        self.handles
            .lock()
            .unwrap()
            .get(source_tx_id)
            .cloned()
            .ok_or_else(|| AttestationError::NotFound(source_tx_id.to_string()))
    }

    async fn fetch_attestation(
        &self,
        _transfer: &TransferHandle,
        timeout: Duration,
    ) -> Result<Option<Attestation>, AttestationError> {
        let attestation = self.attestation.lock().unwrap().clone();
        match attestation {
            Some(attestation) => Ok(Some(attestation)),
            None => {
                tokio::time::sleep(timeout).await;
                Ok(None)
            }
        }
    }

    async fn complete_transfer(
        &self,
        _transfer: &TransferHandle,
        attestation: &Attestation,
        signer: &dyn CompletionSigner,
    ) -> Result<Vec<Value>, AttestationError> {
        self.complete_calls.fetch_add(1, Ordering::SeqCst);
        let request = EvmTransactionRequest {
            from: None,
            to: "0x3ee18B2214AFF97000D974cf647E7C347E8fa585".to_string(),
            data: format!("0x{}", hex::encode(attestation.payload.as_bytes())),
            value: None,
            gas: None,
        };
        Ok(vec![signer.send_transaction(request).await?])
    }
}

/// `SourceRpc` that accepts everything, optionally slowly
#[derive(Default)]
pub(crate) struct ScriptedRpc {
    pub confirm_delay: Duration,
    pub reject: Option<String>,
    pub sent: AtomicUsize,
}

impl ScriptedRpc {
    pub(crate) fn with_confirm_delay(confirm_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            confirm_delay,
            ..Self::default()
        })
    }
}

#[async_trait]
impl SourceRpc for ScriptedRpc {
    async fn latest_blockhash(&self) -> Result<(Hash, u64), RpcError> {
        Ok((Hash::new_unique(), 1_000))
    }

    async fn send_raw_transaction(&self, wire: Vec<u8>) -> Result<Signature, RpcError> {
        if let Some(message) = &self.reject {
            return Err(RpcError(message.clone()));
        }
        let tx: VersionedTransaction =
            bincode::deserialize(&wire).map_err(|e| RpcError(e.to_string()))?;
        self.sent.fetch_add(1, Ordering::SeqCst);
        Ok(tx.signatures[0])
    }

    async fn confirm_transaction(
        &self,
        _signature: Signature,
        _window: ValidityWindow,
    ) -> Result<(), ConfirmError> {
        if !self.confirm_delay.is_zero() {
            tokio::time::sleep(self.confirm_delay).await;
        }
        Ok(())
    }

    async fn signature_status(
        &self,
        _signature: Signature,
    ) -> Result<Option<LandedStatus>, RpcError> {
        Ok(Some(LandedStatus::Succeeded))
    }
}

pub(crate) const DESTINATION_TX: &str =
    "0x88df016429689c079f3b2f6ad39fa052532c56795b733da78a91ebe6a713944b";

/// Destination wallet that records sends and mines instantly
pub(crate) struct FakeDestinationWallet {
    pub reverts: bool,
    pub sent: AtomicUsize,
}

impl FakeDestinationWallet {
    pub(crate) fn new(reverts: bool) -> Self {
        Self {
            reverts,
            sent: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl DestinationWallet for FakeDestinationWallet {
    fn address(&self) -> String {
        RECIPIENT.to_string()
    }

    fn chain(&self) -> Chain {
        Chain::Sepolia
    }

    async fn send_transaction(&self, request: EvmTransactionRequest) -> Result<Value, DestinationError> {
        assert_eq!(request.from.as_deref(), Some(RECIPIENT));
        self.sent.fetch_add(1, Ordering::SeqCst);
        Ok(json!({ "hash": DESTINATION_TX }))
    }

    async fn wait_for_receipt(
        &self,
        tx_id: &TxId,
        _timeout: Duration,
    ) -> Result<TransactionReceipt, DestinationError> {
        Ok(TransactionReceipt {
            tx_id: tx_id.clone(),
            block_number: Some(42),
            success: !self.reverts,
        })
    }
}

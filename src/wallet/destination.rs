//! Destination-chain wallet
//!
//! The redemption path submits the completion transaction through
//! [`ForwardingSigner`], which exposes only an address and a direct
//! `send_transaction` call. Wallets that cannot negotiate destination-side
//! signing still work because nothing else is asked of them.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::common::BridgeError;
use crate::types::{Chain, TxId};

/// Destination wallet errors
#[derive(Debug, Error)]
pub enum DestinationError {
    /// The user declined in the wallet
    #[error("{0}")]
    Rejected(String),

    #[error("destination rpc error: {0}")]
    Rpc(String),

    #[error("invalid rpc response: {0}")]
    InvalidResponse(String),

    #[error("invalid destination address: {0}")]
    InvalidAddress(String),

    #[error("transaction {tx_id} was not mined within {waited_secs}s")]
    ReceiptTimeout { tx_id: String, waited_secs: u64 },
}

impl From<DestinationError> for BridgeError {
    fn from(e: DestinationError) -> Self {
        match e {
            DestinationError::Rejected(msg) => BridgeError::UserCancelled(msg),
            DestinationError::ReceiptTimeout { tx_id, .. } => {
                BridgeError::ConfirmationTimeout { signature: tx_id }
            }
            other => BridgeError::RedemptionFailure(other.to_string()),
        }
    }
}

/// Unsigned EVM transaction as the attestation network builds it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvmTransactionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    pub to: String,
    /// 0x-prefixed calldata
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas: Option<String>,
}

/// Mined transaction summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionReceipt {
    pub tx_id: TxId,
    pub block_number: Option<u64>,
    /// False when the transaction reverted
    pub success: bool,
}

/// The connected destination-chain wallet
#[async_trait]
pub trait DestinationWallet: Send + Sync {
    fn address(&self) -> String;

    fn chain(&self) -> Chain;

    /// Send a transaction; the response shape is whatever the wallet returns
    async fn send_transaction(&self, request: EvmTransactionRequest) -> Result<Value, DestinationError>;

    /// Wait until the transaction is mined or `timeout` passes
    async fn wait_for_receipt(
        &self,
        tx_id: &TxId,
        timeout: Duration,
    ) -> Result<TransactionReceipt, DestinationError>;
}

/// What the attestation network needs to submit a completion transaction
#[async_trait]
pub trait CompletionSigner: Send + Sync {
    fn address(&self) -> String;

    async fn send_transaction(&self, request: EvmTransactionRequest) -> Result<Value, DestinationError>;
}

/// Shim forwarding completion transactions straight to a destination wallet
pub struct ForwardingSigner<'a> {
    wallet: &'a dyn DestinationWallet,
}

impl<'a> ForwardingSigner<'a> {
    pub fn new(wallet: &'a dyn DestinationWallet) -> Self {
        Self { wallet }
    }
}

#[async_trait]
impl<'a> CompletionSigner for ForwardingSigner<'a> {
    fn address(&self) -> String {
        self.wallet.address()
    }

    async fn send_transaction(&self, mut request: EvmTransactionRequest) -> Result<Value, DestinationError> {
        if request.from.is_none() {
            request.from = Some(self.wallet.address());
        }
        self.wallet.send_transaction(request).await
    }
}

// =============================================================================
// JSON-RPC wallet
// =============================================================================

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Value,
    id: u64,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// EIP-1193 code for a request the user rejected
const USER_REJECTED_CODE: i64 = 4001;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: String,
    block_number: Option<String>,
    status: Option<String>,
}

/// Destination wallet backed by a node or wallet that accepts
/// `eth_sendTransaction` for an unlocked account
pub struct EvmRpcWallet {
    client: Client,
    rpc_url: String,
    address: String,
    chain: Chain,
    poll_interval: Duration,
}

impl EvmRpcWallet {
    pub fn new(rpc_url: &str, address: &str, chain: Chain) -> Result<Self, DestinationError> {
        chain
            .validate_address(address)
            .map_err(DestinationError::InvalidAddress)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DestinationError::Rpc(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            rpc_url: rpc_url.to_string(),
            address: address.to_string(),
            chain,
            poll_interval: Duration::from_secs(2),
        })
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<Option<T>, DestinationError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: 1,
        };

        let response: JsonRpcResponse<T> = self
            .client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| DestinationError::Rpc(format!("{} request failed: {}", method, e)))?
            .json()
            .await
            .map_err(|e| DestinationError::InvalidResponse(format!("{}: {}", method, e)))?;

        if let Some(error) = response.error {
            if error.code == USER_REJECTED_CODE {
                return Err(DestinationError::Rejected(error.message));
            }
            return Err(DestinationError::Rpc(format!("{} ({})", error.message, error.code)));
        }

        Ok(response.result)
    }
}

fn parse_hex_u64(value: &str) -> Option<u64> {
    u64::from_str_radix(value.strip_prefix("0x").unwrap_or(value), 16).ok()
}

#[async_trait]
impl DestinationWallet for EvmRpcWallet {
    fn address(&self) -> String {
        self.address.clone()
    }

    fn chain(&self) -> Chain {
        self.chain
    }

    async fn send_transaction(&self, request: EvmTransactionRequest) -> Result<Value, DestinationError> {
        let tx = serde_json::to_value(&request)
            .map_err(|e| DestinationError::InvalidResponse(e.to_string()))?;

        let hash: String = self
            .call("eth_sendTransaction", Value::Array(vec![tx]))
            .await?
            .ok_or_else(|| DestinationError::InvalidResponse("eth_sendTransaction returned no hash".to_string()))?;

        info!(target: "xbridge::wallet", chain = %self.chain, tx = %hash, "destination transaction sent");
        Ok(Value::String(hash))
    }

    async fn wait_for_receipt(
        &self,
        tx_id: &TxId,
        timeout: Duration,
    ) -> Result<TransactionReceipt, DestinationError> {
        tokio::time::timeout(timeout, self.poll_receipt(tx_id))
            .await
            .map_err(|_| DestinationError::ReceiptTimeout {
                tx_id: tx_id.to_string(),
                waited_secs: timeout.as_secs(),
            })?
    }
}

impl EvmRpcWallet {
    async fn poll_receipt(&self, tx_id: &TxId) -> Result<TransactionReceipt, DestinationError> {
        loop {
            let receipt: Option<RpcReceipt> = self
                .call(
                    "eth_getTransactionReceipt",
                    Value::Array(vec![Value::String(tx_id.to_string())]),
                )
                .await?;

            if let Some(receipt) = receipt {
                let mined = TxId::new(receipt.transaction_hash)
                    .map_err(|e| DestinationError::InvalidResponse(e.to_string()))?;
                return Ok(TransactionReceipt {
                    tx_id: mined,
                    block_number: receipt.block_number.as_deref().and_then(parse_hex_u64),
                    success: receipt.status.as_deref() != Some("0x0"),
                });
            }

            debug!(target: "xbridge::wallet", tx = %tx_id, "receipt not available yet");
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ADDRESS: &str = "0x742d35Cc6634C0532925a3b844Bc454e4438f44e";
    const TX_HASH: &str = "0x88df016429689c079f3b2f6ad39fa052532c56795b733da78a91ebe6a713944b";

    fn request() -> EvmTransactionRequest {
        EvmTransactionRequest {
            from: None,
            to: "0x3ee18B2214AFF97000D974cf647E7C347E8fa585".to_string(),
            data: "0xc6878519".to_string(),
            value: None,
            gas: None,
        }
    }

    async fn wallet(server: &MockServer) -> EvmRpcWallet {
        EvmRpcWallet::new(&server.uri(), ADDRESS, Chain::Sepolia)
            .unwrap()
            .with_poll_interval(Duration::from_millis(10))
    }

    #[tokio::test]
    async fn test_forwarding_signer_fills_sender_and_returns_hash() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "eth_sendTransaction"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0", "id": 1, "result": TX_HASH
            })))
            .expect(1)
            .mount(&server)
            .await;

        let wallet = wallet(&server).await;
        let signer = ForwardingSigner::new(&wallet);
        assert_eq!(signer.address(), ADDRESS);

        let sent = signer.send_transaction(request()).await.unwrap();
        assert_eq!(sent, json!(TX_HASH));

        let requests = server.received_requests().await.unwrap();
        let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["params"][0]["from"], ADDRESS);
    }

    #[tokio::test]
    async fn test_user_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0", "id": 1,
                "error": {"code": 4001, "message": "User denied transaction signature"}
            })))
            .mount(&server)
            .await;

        let wallet = wallet(&server).await;
        let err = wallet.send_transaction(request()).await.unwrap_err();
        assert!(matches!(err, DestinationError::Rejected(_)));
    }

    #[tokio::test]
    async fn test_receipt_success_and_revert() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"method": "eth_getTransactionReceipt"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0", "id": 1,
                "result": {"transactionHash": TX_HASH, "blockNumber": "0x10", "status": "0x0"}
            })))
            .mount(&server)
            .await;

        let wallet = wallet(&server).await;
        let receipt = wallet
            .wait_for_receipt(&TxId::new(TX_HASH).unwrap(), Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(receipt.block_number, Some(16));
        assert!(!receipt.success);
    }

    #[tokio::test]
    async fn test_receipt_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0", "id": 1, "result": null
            })))
            .mount(&server)
            .await;

        let wallet = wallet(&server).await;
        let err = wallet
            .wait_for_receipt(&TxId::new(TX_HASH).unwrap(), Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, DestinationError::ReceiptTimeout { .. }));
    }

    #[test]
    fn test_rejects_non_evm_address() {
        assert!(EvmRpcWallet::new("http://localhost:8545", "not-an-address", Chain::Sepolia).is_err());
    }
}

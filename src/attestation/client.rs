//! HTTP client for the attestation network
//!
//! Lifecycle: `new` builds the client, `with_interceptor` registers
//! observers, `init` performs the handshake. Every other call fails with
//! `NotInitialized` until `init` has succeeded.

use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use super::interceptor::{Interceptor, RequestInfo};
use super::{
    Attestation, AttestationError, AttestationNetwork, IndexedTransfer, NetworkInfo,
    TransferHandle, WireTransaction,
};
use crate::common::config::{BridgeConfig, Network};
use crate::types::{Chain, TransferDescription};
use crate::wallet::{CompletionSigner, EvmTransactionRequest, TransactionSender};

/// Default HTTP timeout for a single call
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Pause between attestation polls
const ATTESTATION_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Deserialize)]
struct TransactionsResponse<T> {
    transactions: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct TransfersResponse {
    transfers: Vec<IndexedTransfer>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// `AttestationNetwork` over the network's JSON API
pub struct AttestationClient {
    http: Client,
    base_url: String,
    network: Network,
    required_chains: Vec<Chain>,
    interceptors: Vec<Arc<dyn Interceptor>>,
    poll_interval: Duration,
    info: OnceLock<NetworkInfo>,
}

impl AttestationClient {
    pub fn new(config: &BridgeConfig) -> Result<Self, AttestationError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AttestationError::Transport(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.attestation_api.trim_end_matches('/').to_string(),
            network: config.network,
            required_chains: vec![config.source_chain, config.destination_chain],
            interceptors: Vec::new(),
            poll_interval: ATTESTATION_POLL_INTERVAL,
            info: OnceLock::new(),
        })
    }

    pub fn with_interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Handshake: confirm the network and that both route chains are served
    pub async fn init(&self) -> Result<&NetworkInfo, AttestationError> {
        if let Some(info) = self.info.get() {
            return Ok(info);
        }

        let info: NetworkInfo = self.send(Method::GET, "/v1/network", None).await?;

        if !info.network.eq_ignore_ascii_case(self.network.as_str()) {
            return Err(AttestationError::WrongNetwork {
                expected: self.network.as_str().to_string(),
                actual: info.network,
            });
        }
        if let Some(missing) = self
            .required_chains
            .iter()
            .find(|chain| !info.chains.contains(chain))
        {
            return Err(AttestationError::UnsupportedChain(*missing));
        }

        info!(
            target: "xbridge::network",
            network = %info.network,
            chains = info.chains.len(),
            "attestation network initialized"
        );
        Ok(self.info.get_or_init(|| info))
    }

    pub fn is_initialized(&self) -> bool {
        self.info.get().is_some()
    }

    fn ensure_initialized(&self) -> Result<(), AttestationError> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(AttestationError::NotInitialized)
        }
    }

    /// One JSON call with interceptors around it
    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<T, AttestationError> {
        let url = format!("{}{}", self.base_url, path);
        let request_info = RequestInfo::new(method.as_str(), url.as_str());
        for interceptor in &self.interceptors {
            interceptor.before_request(&request_info);
        }

        let started = Instant::now();
        let mut request = self.http.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let result = request.send().await;

        let status = result.as_ref().ok().map(|response| response.status().as_u16());
        for interceptor in &self.interceptors {
            interceptor.after_response(&request_info, status, started.elapsed());
        }

        let response = result.map_err(|e| AttestationError::Transport(e.to_string()))?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(AttestationError::NotFound(path.to_string()));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&text)
                .map(|body| body.error)
                .unwrap_or(text);
            return Err(AttestationError::Http {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| AttestationError::InvalidResponse(format!("{}: {}", path, e)))
    }
}

#[async_trait]
impl AttestationNetwork for AttestationClient {
    async fn quote_transfer(&self, transfer: &TransferDescription) -> Result<Value, AttestationError> {
        self.ensure_initialized()?;
        let body = serde_json::to_value(transfer)
            .map_err(|e| AttestationError::InvalidResponse(e.to_string()))?;
        self.send(Method::POST, "/v1/quotes", Some(body)).await
    }

    async fn initiate_transfer(
        &self,
        transfer: &TransferDescription,
        sender: &dyn TransactionSender,
    ) -> Result<Vec<Value>, AttestationError> {
        self.ensure_initialized()?;
        let mut body = serde_json::to_value(transfer)
            .map_err(|e| AttestationError::InvalidResponse(e.to_string()))?;
        body["payer"] = json!(sender.address().to_string());

        let built: TransactionsResponse<WireTransaction> =
            self.send(Method::POST, "/v1/transfers", Some(body)).await?;
        let transactions = built
            .transactions
            .iter()
            .map(WireTransaction::decode)
            .collect::<Result<Vec<_>, _>>()?;
        debug!(target: "xbridge::network", count = transactions.len(), "source transactions built");

        let ids = sender.sign_and_send(transactions).await?;
        let chain = transfer.source.chain;
        Ok(ids
            .into_iter()
            .map(|id| json!({"chain": chain, "txid": id}))
            .collect())
    }

    async fn list_transactions(
        &self,
        address: &str,
        limit: usize,
    ) -> Result<Vec<IndexedTransfer>, AttestationError> {
        self.ensure_initialized()?;
        let path = format!("/v1/addresses/{}/transfers?limit={}", address, limit);
        let response: TransfersResponse = self.send(Method::GET, &path, None).await?;
        Ok(response.transfers)
    }

    async fn reconstruct_transfer(
        &self,
        chain: Chain,
        source_tx_id: &str,
    ) -> Result<TransferHandle, AttestationError> {
        self.ensure_initialized()?;
        let path = format!("/v1/transfers/{}/{}", chain.as_str(), source_tx_id);
        self.send(Method::GET, &path, None).await
    }

    async fn fetch_attestation(
        &self,
        transfer: &TransferHandle,
        timeout: Duration,
    ) -> Result<Option<Attestation>, AttestationError> {
        self.ensure_initialized()?;
        let path = format!("/v1/transfers/{}/attestation", transfer.message_id);

        let poll = async {
            loop {
                match self.send::<Attestation>(Method::GET, &path, None).await {
                    Ok(attestation) => return Ok(attestation),
                    Err(AttestationError::NotFound(_)) => {
                        debug!(
                            target: "xbridge::network",
                            message_id = %transfer.message_id,
                            "attestation not available yet"
                        );
                        tokio::time::sleep(self.poll_interval).await;
                    }
                    Err(e) => return Err(e),
                }
            }
        };

        match tokio::time::timeout(timeout, poll).await {
            Ok(result) => result.map(Some),
            Err(_) => Ok(None),
        }
    }

    async fn complete_transfer(
        &self,
        transfer: &TransferHandle,
        attestation: &Attestation,
        signer: &dyn CompletionSigner,
    ) -> Result<Vec<Value>, AttestationError> {
        self.ensure_initialized()?;
        let path = format!("/v1/transfers/{}/complete", transfer.message_id);
        let body = json!({
            "attestation": attestation.payload,
            "recipient": signer.address(),
        });

        let built: TransactionsResponse<EvmTransactionRequest> =
            self.send(Method::POST, &path, Some(body)).await?;

        let mut responses = Vec::with_capacity(built.transactions.len());
        for request in built.transactions {
            responses.push(signer.send_transaction(request).await?);
        }
        Ok(responses)
    }
}

//! Environment-based Configuration for xbridge
//!
//! Values come from environment variables (a local `.env` file is loaded
//! first when present). Devnet has defaults for everything; testnet and
//! mainnet must name their token, destination RPC and attestation API
//! explicitly.
//!
//! # Environment Variables
//!
//! ## Network
//! - `BRIDGE_NETWORK` - "mainnet", "testnet", or "devnet" (default: "devnet")
//! - `BRIDGE_SOURCE_CHAIN` - Source chain name (default: "Solana")
//! - `BRIDGE_DESTINATION_CHAIN` - Destination chain name
//! - `BRIDGE_SOURCE_RPC` - Source chain RPC endpoint
//! - `BRIDGE_DESTINATION_RPC` - Destination chain RPC endpoint
//! - `BRIDGE_ATTESTATION_API` - Attestation network API base URL
//! - `BRIDGE_EXPLORER_URL` - Source chain explorer base URL
//!
//! ## Token
//! - `BRIDGE_TOKEN_ID` - Source chain token (mint) address
//! - `BRIDGE_TOKEN_DECIMALS` - Token decimals (default: 6)
//!
//! ## Timing
//! - `BRIDGE_QUOTE_DEBOUNCE_MS` (800), `BRIDGE_QUOTE_TIMEOUT_SECS` (20)
//! - `BRIDGE_PENDING_LIMIT` (50), `BRIDGE_PENDING_REFRESH_SECS` (15)
//! - `BRIDGE_ATTESTATION_TIMEOUT_SECS` (60), `BRIDGE_RECEIPT_TIMEOUT_SECS` (120)
//! - `BRIDGE_ESTIMATED_TRANSFER_SECS` (1200)
//!
//! ## Diagnostics
//! - `BRIDGE_LOG_LEVEL` - Logging level (debug, info, warn, error)
//! - `BRIDGE_DEBUG_HTTP` - Set to "1" to log every attestation API call

use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::types::units::MAX_DECIMALS;
use crate::types::{Chain, Platform};

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),

    #[error("unsupported route {0} -> {1}: {2}")]
    UnsupportedRoute(String, String, String),
}

/// Network environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Mainnet,
    Testnet,
    Devnet,
}

impl FromStr for Network {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mainnet" | "main" => Ok(Network::Mainnet),
            "testnet" | "test" => Ok(Network::Testnet),
            "devnet" | "dev" => Ok(Network::Devnet),
            _ => Err(ConfigError::InvalidValue(
                "BRIDGE_NETWORK".to_string(),
                format!("unknown network: {}", s),
            )),
        }
    }
}

impl Network {
    /// Name the attestation network uses for this environment
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Mainnet => "Mainnet",
            Network::Testnet => "Testnet",
            Network::Devnet => "Devnet",
        }
    }

    /// Default Solana RPC for this network
    pub fn default_source_rpc(&self) -> &'static str {
        match self {
            Network::Mainnet => "https://api.mainnet-beta.solana.com",
            Network::Testnet => "https://api.testnet.solana.com",
            Network::Devnet => "https://api.devnet.solana.com",
        }
    }

    /// Default destination chain for this network
    pub fn default_destination_chain(&self) -> Chain {
        match self {
            Network::Mainnet => Chain::Ethereum,
            Network::Testnet | Network::Devnet => Chain::Sepolia,
        }
    }

    /// Default source explorer base
    pub fn default_explorer_url(&self) -> &'static str {
        "https://explorer.solana.com"
    }

    /// Explorer cluster query parameter, if any
    fn explorer_cluster(&self) -> Option<&'static str> {
        match self {
            Network::Mainnet => None,
            Network::Testnet => Some("testnet"),
            Network::Devnet => Some("devnet"),
        }
    }
}

/// Devnet defaults for values that must be explicit elsewhere
const DEVNET_TOKEN_ID: &str = "4zMMC9srt5Ri5X14GAgXhaHii3GnPAEERYPJgZJDncDU";
const DEVNET_DESTINATION_RPC: &str = "http://127.0.0.1:8545";
const DEVNET_ATTESTATION_API: &str = "http://127.0.0.1:7071";

/// Main configuration struct
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Network environment
    pub network: Network,

    /// Source chain (SVM)
    pub source_chain: Chain,

    /// Destination chain (EVM)
    pub destination_chain: Chain,

    /// Token address on the source chain
    pub token_id: String,

    /// Token decimals
    pub token_decimals: u8,

    /// Source chain RPC endpoint
    pub source_rpc: String,

    /// Destination chain RPC endpoint
    pub destination_rpc: String,

    /// Attestation network API base URL
    pub attestation_api: String,

    /// Source chain explorer base URL
    pub explorer_url: String,

    pub quote_debounce_ms: u64,
    pub quote_timeout_secs: u64,
    pub pending_limit: usize,
    pub pending_refresh_secs: u64,
    pub attestation_timeout_secs: u64,
    pub receipt_timeout_secs: u64,

    /// Shown next to the elapsed timer
    pub estimated_transfer_secs: u64,

    /// Log level
    pub log_level: String,

    /// Log every attestation API call
    pub debug_http: bool,
}

impl BridgeConfig {
    /// Defaults for a network, without reading the environment
    pub fn for_network(network: Network) -> Self {
        Self {
            network,
            source_chain: Chain::Solana,
            destination_chain: network.default_destination_chain(),
            token_id: DEVNET_TOKEN_ID.to_string(),
            token_decimals: 6,
            source_rpc: network.default_source_rpc().to_string(),
            destination_rpc: DEVNET_DESTINATION_RPC.to_string(),
            attestation_api: DEVNET_ATTESTATION_API.to_string(),
            explorer_url: network.default_explorer_url().to_string(),
            quote_debounce_ms: 800,
            quote_timeout_secs: 20,
            pending_limit: 50,
            pending_refresh_secs: 15,
            attestation_timeout_secs: 60,
            receipt_timeout_secs: 120,
            estimated_transfer_secs: 1200,
            log_level: "info".to_string(),
            debug_http: false,
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let network: Network = env::var("BRIDGE_NETWORK")
            .unwrap_or_else(|_| "devnet".to_string())
            .parse()?;

        let mut config = Self::for_network(network);

        if let Ok(chain) = env::var("BRIDGE_SOURCE_CHAIN") {
            config.source_chain = parse_chain("BRIDGE_SOURCE_CHAIN", &chain)?;
        }
        if let Ok(chain) = env::var("BRIDGE_DESTINATION_CHAIN") {
            config.destination_chain = parse_chain("BRIDGE_DESTINATION_CHAIN", &chain)?;
        }

        config.token_id = get_required_or_devnet_default("BRIDGE_TOKEN_ID", DEVNET_TOKEN_ID, network)?;
        config.destination_rpc = get_required_or_devnet_default(
            "BRIDGE_DESTINATION_RPC",
            DEVNET_DESTINATION_RPC,
            network,
        )?;
        config.attestation_api = get_required_or_devnet_default(
            "BRIDGE_ATTESTATION_API",
            DEVNET_ATTESTATION_API,
            network,
        )?;

        if let Ok(rpc) = env::var("BRIDGE_SOURCE_RPC") {
            config.source_rpc = rpc;
        }
        if let Ok(url) = env::var("BRIDGE_EXPLORER_URL") {
            config.explorer_url = url;
        }

        config.token_decimals = parse_or("BRIDGE_TOKEN_DECIMALS", config.token_decimals)?;
        config.quote_debounce_ms = parse_or("BRIDGE_QUOTE_DEBOUNCE_MS", config.quote_debounce_ms)?;
        config.quote_timeout_secs = parse_or("BRIDGE_QUOTE_TIMEOUT_SECS", config.quote_timeout_secs)?;
        config.pending_limit = parse_or("BRIDGE_PENDING_LIMIT", config.pending_limit)?;
        config.pending_refresh_secs =
            parse_or("BRIDGE_PENDING_REFRESH_SECS", config.pending_refresh_secs)?;
        config.attestation_timeout_secs =
            parse_or("BRIDGE_ATTESTATION_TIMEOUT_SECS", config.attestation_timeout_secs)?;
        config.receipt_timeout_secs =
            parse_or("BRIDGE_RECEIPT_TIMEOUT_SECS", config.receipt_timeout_secs)?;
        config.estimated_transfer_secs =
            parse_or("BRIDGE_ESTIMATED_TRANSFER_SECS", config.estimated_transfer_secs)?;

        config.log_level = env::var("BRIDGE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        config.debug_http = env::var("BRIDGE_DEBUG_HTTP").map(|v| v == "1").unwrap_or(false);

        config.validate()?;
        Ok(config)
    }

    /// Check route support and numeric ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        let route_error = |reason: &str| {
            ConfigError::UnsupportedRoute(
                self.source_chain.to_string(),
                self.destination_chain.to_string(),
                reason.to_string(),
            )
        };

        if self.source_chain == self.destination_chain {
            return Err(route_error("source and destination must differ"));
        }
        if self.source_chain.platform() != Platform::Svm {
            return Err(route_error("source chain must be an SVM chain"));
        }
        if self.destination_chain.platform() != Platform::Evm {
            return Err(route_error("destination chain must be an EVM chain"));
        }

        self.source_chain
            .validate_address(&self.token_id)
            .map_err(|e| ConfigError::InvalidValue("BRIDGE_TOKEN_ID".to_string(), e))?;

        if self.token_decimals > MAX_DECIMALS {
            return Err(ConfigError::InvalidValue(
                "BRIDGE_TOKEN_DECIMALS".to_string(),
                format!("must be at most {}", MAX_DECIMALS),
            ));
        }

        for (name, value) in [
            ("BRIDGE_QUOTE_TIMEOUT_SECS", self.quote_timeout_secs),
            ("BRIDGE_PENDING_LIMIT", self.pending_limit as u64),
            ("BRIDGE_PENDING_REFRESH_SECS", self.pending_refresh_secs),
            ("BRIDGE_ATTESTATION_TIMEOUT_SECS", self.attestation_timeout_secs),
            ("BRIDGE_RECEIPT_TIMEOUT_SECS", self.receipt_timeout_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue(
                    name.to_string(),
                    "must be greater than zero".to_string(),
                ));
            }
        }

        Ok(())
    }

    pub fn quote_debounce(&self) -> Duration {
        Duration::from_millis(self.quote_debounce_ms)
    }

    pub fn quote_timeout(&self) -> Duration {
        Duration::from_secs(self.quote_timeout_secs)
    }

    pub fn pending_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.pending_refresh_secs)
    }

    pub fn attestation_timeout(&self) -> Duration {
        Duration::from_secs(self.attestation_timeout_secs)
    }

    pub fn receipt_timeout(&self) -> Duration {
        Duration::from_secs(self.receipt_timeout_secs)
    }

    /// Tracking URL for a source-chain transaction
    pub fn explorer_tx_url(&self, tx_id: &str) -> String {
        let base = self.explorer_url.trim_end_matches('/');
        match self.network.explorer_cluster() {
            Some(cluster) => format!("{}/tx/{}?cluster={}", base, tx_id, cluster),
            None => format!("{}/tx/{}", base, tx_id),
        }
    }

    /// Print configuration summary
    pub fn log_summary(&self) {
        tracing::info!(
            target: "xbridge::system",
            network = ?self.network,
            route = %format!("{} -> {}", self.source_chain, self.destination_chain),
            token = %self.token_id,
            decimals = self.token_decimals,
            source_rpc = %self.source_rpc,
            destination_rpc = %self.destination_rpc,
            attestation_api = %self.attestation_api,
            "bridge configuration loaded"
        );
    }
}

/// Get required env var, or use default for devnet only
fn get_required_or_devnet_default(
    var_name: &str,
    devnet_default: &str,
    network: Network,
) -> Result<String, ConfigError> {
    match env::var(var_name) {
        Ok(value) => Ok(value),
        Err(_) => {
            if network == Network::Devnet {
                Ok(devnet_default.to_string())
            } else {
                Err(ConfigError::MissingEnvVar(var_name.to_string()))
            }
        }
    }
}

fn parse_chain(var_name: &str, value: &str) -> Result<Chain, ConfigError> {
    value
        .parse()
        .map_err(|e: String| ConfigError::InvalidValue(var_name.to_string(), e))
}

/// Parse an optional numeric env var, keeping `default` when unset
fn parse_or<T: FromStr>(var_name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(var_name) {
        Ok(value) => value.trim().parse().map_err(|_| {
            ConfigError::InvalidValue(var_name.to_string(), format!("not a number: {}", value))
        }),
        Err(_) => Ok(default),
    }
}

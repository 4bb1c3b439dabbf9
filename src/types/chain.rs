//! Chains and address shapes

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;

/// Execution platform of a chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// Solana-style ledger (base58 keys, blockhash recency anchor)
    Svm,
    /// EVM-style ledger (0x-prefixed 20-byte addresses)
    Evm,
}

/// Chains known to the bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Chain {
    Solana,
    Ethereum,
    Sepolia,
    Base,
    BaseSepolia,
    Arbitrum,
    Optimism,
    Polygon,
    Bsc,
}

impl Chain {
    /// Name used on the attestation network wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Chain::Solana => "Solana",
            Chain::Ethereum => "Ethereum",
            Chain::Sepolia => "Sepolia",
            Chain::Base => "Base",
            Chain::BaseSepolia => "BaseSepolia",
            Chain::Arbitrum => "Arbitrum",
            Chain::Optimism => "Optimism",
            Chain::Polygon => "Polygon",
            Chain::Bsc => "Bsc",
        }
    }

    pub fn platform(&self) -> Platform {
        match self {
            Chain::Solana => Platform::Svm,
            _ => Platform::Evm,
        }
    }

    /// Check that `address` has this chain's address shape
    pub fn validate_address(&self, address: &str) -> Result<(), String> {
        match self.platform() {
            Platform::Evm => validate_evm_address(address),
            Platform::Svm => Pubkey::from_str(address)
                .map(|_| ())
                .map_err(|e| format!("not a valid {} address: {}", self.as_str(), e)),
        }
    }
}

impl std::fmt::Display for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Chain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "solana" | "sol" => Ok(Chain::Solana),
            "ethereum" | "eth" => Ok(Chain::Ethereum),
            "sepolia" => Ok(Chain::Sepolia),
            "base" => Ok(Chain::Base),
            "basesepolia" => Ok(Chain::BaseSepolia),
            "arbitrum" => Ok(Chain::Arbitrum),
            "optimism" => Ok(Chain::Optimism),
            "polygon" => Ok(Chain::Polygon),
            "bsc" => Ok(Chain::Bsc),
            _ => Err(format!("unknown chain: {}", s)),
        }
    }
}

/// `0x` followed by exactly 40 hex characters
fn validate_evm_address(address: &str) -> Result<(), String> {
    let body = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .ok_or_else(|| "address must start with 0x".to_string())?;

    if body.len() != 40 {
        return Err(format!(
            "address must have 40 hex characters after 0x, got {}",
            body.len()
        ));
    }

    if !body.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err("address contains non-hex characters".to_string());
    }

    Ok(())
}

//! Token and contract addresses
//!
//! Includes:
//! - `TokenAddress`, a validated 20-byte address
//! - Well-known Ethereum mainnet contracts (WETH, Uniswap V2 router/factory)

use alloy_primitives::{address, Address};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{EngineError, Result};

// ============================================
// MAINNET CONTRACTS
// ============================================

/// Wrapped Ether - the base asset of every trade on mainnet
pub const WETH: Address = address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2");

/// Uniswap V2 Router02
pub const UNISWAP_V2_ROUTER: Address = address!("7a250d5630B4cF539739dF2C5dAcb4c659F2488D");

/// Uniswap V2 Factory
pub const UNISWAP_V2_FACTORY: Address = address!("5C69bEe701ef814a2B6a3EDD4B1652CB9cc5aA6f");

// ============================================
// VALIDATED ADDRESS
// ============================================

/// A chain address that passed format and checksum validation
///
/// All-lowercase and all-uppercase hex is accepted as-is; mixed case must
/// match the EIP-55 checksum exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TokenAddress(Address);

impl TokenAddress {
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let hex_part = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| EngineError::InvalidAddress(input.to_string()))?;

        if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(EngineError::InvalidAddress(input.to_string()));
        }

        let address = Address::from_str(hex_part)
            .map_err(|_| EngineError::InvalidAddress(input.to_string()))?;

        let has_lower = hex_part.chars().any(|c| c.is_ascii_lowercase());
        let has_upper = hex_part.chars().any(|c| c.is_ascii_uppercase());
        if has_lower && has_upper && address.to_checksum(None)[2..] != *hex_part {
            return Err(EngineError::InvalidAddress(input.to_string()));
        }

        Ok(Self(address))
    }

    pub fn address(&self) -> Address {
        self.0
    }

    /// Short form for log lines: 0x1234...abcd
    pub fn short(&self) -> String {
        let full = self.0.to_checksum(None);
        format!("{}...{}", &full[..6], &full[full.len() - 4..])
    }
}

impl From<Address> for TokenAddress {
    fn from(address: Address) -> Self {
        Self(address)
    }
}

impl TryFrom<String> for TokenAddress {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<TokenAddress> for String {
    fn from(value: TokenAddress) -> Self {
        value.0.to_checksum(None)
    }
}

impl std::fmt::Display for TokenAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_checksum(None))
    }
}

// ============================================
// TESTS
// ============================================

//! Gas Price Oracle - Fee Fields + Gas Limit Policy
//!
//! Reads the current network price from the node and turns it into the fee
//! fields of the transaction type in use:
//! - legacy: `eth_gasPrice`
//! - EIP-1559: latest base fee * 1.125 + configured priority fee
//!
//! Every quote is checked against the configured ceiling before a
//! transaction is signed.

use tracing::{debug, warn};

use crate::chain::ChainReader;
use crate::config::{Config, GasMode};
use crate::error::{EngineError, Result};
use crate::executor::signer::FeeFields;

// ============================================
// CONSTANTS
// ============================================

const WEI_PER_GWEI: f64 = 1e9;

/// One full base-fee step of headroom (12.5%)
const BASE_FEE_HEADROOM_NUM: u128 = 1_125;
const BASE_FEE_HEADROOM_DEN: u128 = 1_000;

/// Gas multiplier precision (1/1000)
const MULTIPLIER_SCALE: u64 = 1_000;

// ============================================
// GAS QUOTE
// ============================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GasQuote {
    pub fees: FeeFields,

    /// Highest price per gas the transaction can pay, in gwei
    pub effective_gwei: f64,

    pub source: GasSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GasSource {
    /// `eth_gasPrice`
    NetworkGasPrice,
    /// Latest block base fee
    BaseFee,
}

impl std::fmt::Display for GasSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GasSource::NetworkGasPrice => write!(f, "eth_gasPrice"),
            GasSource::BaseFee => write!(f, "base fee"),
        }
    }
}

// ============================================
// GAS ORACLE
// ============================================

#[derive(Debug, Clone)]
pub struct GasOracle {
    mode: GasMode,
    priority_fee_wei: u128,
    max_gas_gwei: u64,
    multiplier_milli: u64,
}

impl GasOracle {
    pub fn new(
        mode: GasMode,
        priority_fee_gwei: f64,
        max_gas_gwei: u64,
        gas_multiplier: f64,
    ) -> Self {
        Self {
            mode,
            priority_fee_wei: (priority_fee_gwei.max(0.0) * WEI_PER_GWEI).round() as u128,
            max_gas_gwei,
            multiplier_milli: (gas_multiplier.max(1.0) * MULTIPLIER_SCALE as f64).round() as u64,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.gas_mode,
            config.priority_fee_gwei,
            config.max_gas_gwei,
            config.gas_multiplier,
        )
    }

    /// Fee fields for a transaction sent now. Fails with `GasPriceTooHigh`
    /// when the network is above the configured ceiling
    pub async fn current_fees(&self, chain: &dyn ChainReader) -> Result<GasQuote> {
        let quote = match self.mode {
            GasMode::Legacy => self.legacy_quote(chain.gas_price().await?),
            GasMode::Eip1559 => match chain.latest_block().await?.base_fee_per_gas {
                Some(base_fee) => self.eip1559_quote(base_fee),
                None => {
                    warn!("Latest block has no base fee - falling back to legacy pricing");
                    self.legacy_quote(chain.gas_price().await?)
                }
            },
        };

        debug!(
            "⛽ Gas from {}: {:.2} gwei (max fee)",
            quote.source, quote.effective_gwei
        );

        self.check_ceiling(&quote)?;
        Ok(quote)
    }

    fn legacy_quote(&self, gas_price: u128) -> GasQuote {
        GasQuote {
            fees: FeeFields::Legacy { gas_price },
            effective_gwei: gas_price as f64 / WEI_PER_GWEI,
            source: GasSource::NetworkGasPrice,
        }
    }

    fn eip1559_quote(&self, base_fee: u64) -> GasQuote {
        let max_fee_per_gas = (base_fee as u128) * BASE_FEE_HEADROOM_NUM / BASE_FEE_HEADROOM_DEN
            + self.priority_fee_wei;

        GasQuote {
            fees: FeeFields::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas: self.priority_fee_wei,
            },
            effective_gwei: max_fee_per_gas as f64 / WEI_PER_GWEI,
            source: GasSource::BaseFee,
        }
    }

    fn check_ceiling(&self, quote: &GasQuote) -> Result<()> {
        let ceiling_wei = self.max_gas_gwei as u128 * 1_000_000_000;
        if quote.fees.max_price_per_gas() > ceiling_wei {
            return Err(EngineError::GasPriceTooHigh {
                gwei: quote.effective_gwei,
                max_gwei: self.max_gas_gwei,
            });
        }
        Ok(())
    }

    /// Estimated gas scaled by the safety multiplier, rounded up
    pub fn gas_limit(&self, estimate: u64) -> u64 {
        let scaled = estimate as u128 * self.multiplier_milli as u128;
        let limit = scaled.div_ceil(MULTIPLIER_SCALE as u128);
        u64::try_from(limit).unwrap_or(u64::MAX)
    }
}

// ============================================
// TESTS
// ============================================

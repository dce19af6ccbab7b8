//! Price Oracle - Uniswap V2 spot price + pool depth
//!
//! Locates the token/base-asset pair through the factory, reads reserves and
//! returns price and liquidity together. Pair address, token ordering and
//! token decimals never change for a deployed pair, so they are resolved once
//! per token.

use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::contracts::ContractDirectory;
use crate::error::{EngineError, Result};
use crate::tokens::TokenAddress;

/// One price sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricePoint {
    /// Base-asset wei for one whole token
    pub price: U256,

    /// Base-asset reserve of the pool, in wei
    pub liquidity: U256,

    pub token_decimals: u8,
    pub sampled_at: DateTime<Utc>,
}

impl PricePoint {
    /// Base-asset value (wei) of `amount` token units at this price
    pub fn notional(&self, amount: U256) -> U256 {
        let scale = U256::from(10u64).saturating_pow(U256::from(self.token_decimals));
        amount.saturating_mul(self.price) / scale
    }
}

/// Anything that can produce a spot price for a token
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn spot_price(&self, token: TokenAddress) -> Result<PricePoint>;
}

/// Spot price from reserves: `reserve_base * 10^decimals / reserve_token`.
/// `None` when the token reserve is empty or the result does not fit
pub fn spot_price_from_reserves(
    reserve_base: U256,
    reserve_token: U256,
    decimals: u8,
) -> Option<U256> {
    if reserve_token.is_zero() {
        return None;
    }
    let scale = U256::from(10u64).checked_pow(U256::from(decimals))?;
    reserve_base.checked_mul(scale).map(|scaled| scaled / reserve_token)
}

#[derive(Debug, Clone, Copy)]
struct Market {
    pair: Address,
    token_is_token0: bool,
    decimals: u8,
}

pub struct PriceOracle {
    directory: Arc<ContractDirectory>,
    base_asset: Address,
    markets: RwLock<HashMap<Address, Market>>,
}

impl PriceOracle {
    pub fn new(directory: Arc<ContractDirectory>, base_asset: Address) -> Self {
        Self {
            directory,
            base_asset,
            markets: RwLock::new(HashMap::new()),
        }
    }

    /// Pair address for `token` (CACHED)
    pub async fn pair_for(&self, token: TokenAddress) -> Result<Address> {
        Ok(self.market(token.address()).await?.pair)
    }

    async fn market(&self, token: Address) -> Result<Market> {
        if let Some(market) = self.markets.read().await.get(&token) {
            return Ok(*market);
        }

        let factory = self.directory.factory_contract().await?;
        let pair = factory
            .get_pair(token, self.base_asset)
            .await?
            .ok_or(EngineError::PairNotFound {
                token,
                base: self.base_asset,
            })?;

        let pair_contract = self.directory.pair_contract(pair).await?;
        let token_contract = self.directory.token_contract(token).await?;
        let (token0, decimals) =
            futures::future::try_join(pair_contract.token0(), token_contract.decimals()).await?;

        let market = Market {
            pair,
            token_is_token0: token0 == token,
            decimals,
        };

        info!(
            "Resolved pair {:?} for token {:?} ({} decimals)",
            pair, token, decimals
        );
        self.markets.write().await.insert(token, market);
        Ok(market)
    }

    /// Current spot price and pool depth for `token`
    pub async fn get_spot_price(&self, token: TokenAddress) -> Result<PricePoint> {
        let market = self.market(token.address()).await?;
        let (reserve0, reserve1) = self
            .directory
            .pair_contract(market.pair)
            .await?
            .get_reserves()
            .await?;

        let (reserve_token, reserve_base) = if market.token_is_token0 {
            (reserve0, reserve1)
        } else {
            (reserve1, reserve0)
        };

        if reserve_token.is_zero() {
            return Err(EngineError::EmptyReserves { pair: market.pair });
        }

        let price = spot_price_from_reserves(reserve_base, reserve_token, market.decimals)
            .ok_or_else(|| EngineError::chain("getReserves", "price does not fit in 256 bits"))?;

        debug!(
            "Spot {}: {} wei/token, liquidity {} wei",
            token, price, reserve_base
        );

        Ok(PricePoint {
            price,
            liquidity: reserve_base,
            token_decimals: market.decimals,
            sampled_at: Utc::now(),
        })
    }
}

#[async_trait]
impl PriceSource for PriceOracle {
    async fn spot_price(&self, token: TokenAddress) -> Result<PricePoint> {
        self.get_spot_price(token).await
    }
}

// ============================================
// TESTS
// ============================================

//! Simulated market - scripted price path, no chain access
//!
//! The path exercises every rule of the default strategy on a short run:
//! - tick 5: +10%
//! - tick 10: -15% (dip-buy)
//! - tick 12: 2x (take-profit)
//! - otherwise: anchor × uniform(0.8, 1.2)

use alloy_primitives::U256;
use async_trait::async_trait;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::Mutex;

use crate::cartographer::{PricePoint, PriceSource};
use crate::error::Result;
use crate::tokens::TokenAddress;

/// 0.0001 ETH per token
pub const DEFAULT_SIMULATED_PRICE_WEI: u64 = 100_000_000_000_000;

/// Factor precision (1/10_000)
const FACTOR_SCALE: u64 = 10_000;

struct MarketState {
    tick: u64,
    rng: StdRng,
}

pub struct SimulatedMarket {
    initial: U256,
    liquidity: U256,
    state: Mutex<MarketState>,
}

impl SimulatedMarket {
    pub fn new(initial: U256, seed: u64) -> Self {
        Self {
            initial,
            // Deep enough that no simulated trade trips the liquidity check
            liquidity: U256::from(1_000u64) * U256::from(10u64).pow(U256::from(18u64)),
            state: Mutex::new(MarketState {
                tick: 0,
                rng: StdRng::seed_from_u64(seed),
            }),
        }
    }

    /// Price multiplier for a tick (1-based)
    fn factor_for(tick: u64, rng: &mut StdRng) -> f64 {
        match tick {
            5 => 1.1,
            10 => 0.85,
            12 => 2.0,
            _ => rng.gen_range(0.8..1.2),
        }
    }

    fn scaled(&self, factor: f64) -> U256 {
        let factor = (factor * FACTOR_SCALE as f64).round() as u64;
        self.initial * U256::from(factor) / U256::from(FACTOR_SCALE)
    }
}

#[async_trait]
impl PriceSource for SimulatedMarket {
    async fn spot_price(&self, _token: TokenAddress) -> Result<PricePoint> {
        let mut state = self.state.lock().await;
        state.tick += 1;
        let tick = state.tick;
        let factor = Self::factor_for(tick, &mut state.rng);

        Ok(PricePoint {
            price: self.scaled(factor),
            liquidity: self.liquidity,
            token_decimals: 18,
            sampled_at: Utc::now(),
        })
    }
}

//! Paper executor - fills trades against an in-memory account
//!
//! Used by simulation and dry-run modes. Fills happen at the sampled price
//! with the same balance and liquidity checks as the real pipeline, minus
//! slippage and gas.

use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::info;

use crate::brain::TradeAction;
use crate::cartographer::PricePoint;
use crate::error::{EngineError, Result, Stage};
use crate::executor::{TradeExecutor, TradeOutcome};

/// 1 ETH starting balance
pub const DEFAULT_PAPER_BALANCE_WEI: u64 = 1_000_000_000_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaperAccount {
    pub native: U256,
    pub tokens: U256,
    pub fills: u64,
}

pub struct PaperExecutor {
    account: Mutex<PaperAccount>,
}

impl PaperExecutor {
    pub fn new(native: U256) -> Self {
        Self {
            account: Mutex::new(PaperAccount {
                native,
                tokens: U256::ZERO,
                fills: 0,
            }),
        }
    }

    pub async fn account(&self) -> PaperAccount {
        *self.account.lock().await
    }

    fn fill(account: &mut PaperAccount, action: &TradeAction, point: &PricePoint) -> Result<U256> {
        match action {
            TradeAction::Buy { amount_in } => {
                if account.native < *amount_in {
                    return Err(EngineError::InsufficientFunds {
                        required: *amount_in,
                        available: account.native,
                    });
                }
                if *amount_in > point.liquidity {
                    return Err(EngineError::InsufficientLiquidity {
                        required: *amount_in,
                        available: point.liquidity,
                    });
                }
                if point.price.is_zero() {
                    return Err(EngineError::InsufficientLiquidity {
                        required: *amount_in,
                        available: U256::ZERO,
                    });
                }

                let scale = U256::from(10u64).pow(U256::from(point.token_decimals));
                let tokens_out = *amount_in * scale / point.price;
                account.native -= *amount_in;
                account.tokens += tokens_out;
                Ok(tokens_out)
            }
            TradeAction::Sell { amount_in, .. } => {
                if account.tokens < *amount_in {
                    return Err(EngineError::InsufficientFunds {
                        required: *amount_in,
                        available: account.tokens,
                    });
                }
                let base_out = point.notional(*amount_in);
                if base_out > point.liquidity {
                    return Err(EngineError::InsufficientLiquidity {
                        required: base_out,
                        available: point.liquidity,
                    });
                }

                account.tokens -= *amount_in;
                account.native += base_out;
                Ok(base_out)
            }
            TradeAction::Hold => Ok(U256::ZERO),
        }
    }
}

#[async_trait]
impl TradeExecutor for PaperExecutor {
    async fn token_balance(&self, _token: Address) -> Result<U256> {
        Ok(self.account.lock().await.tokens)
    }

    async fn execute_action(
        &self,
        _token: Address,
        action: &TradeAction,
        point: &PricePoint,
    ) -> Result<TradeOutcome> {
        let mut account = self.account.lock().await;
        let out = Self::fill(&mut account, action, point).map_err(|e| e.at(Stage::Preflight))?;
        account.fills += 1;

        info!(
            "📋 Paper fill: {} → {} out (native {}, tokens {})",
            action, out, account.native, account.tokens
        );

        Ok(TradeOutcome {
            tx_hash: None,
            amount_in: action.amount_in(),
            expected_out: out,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brain::SellReason;
    use crate::testing::TOKEN;
    use chrono::Utc;

    const ETH: u128 = 1_000_000_000_000_000_000;

    fn point(price: u128) -> PricePoint {
        PricePoint {
            price: U256::from(price),
            liquidity: U256::from(100 * ETH),
            token_decimals: 18,
            sampled_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_buy_then_sell_round_trip() {
        let paper = PaperExecutor::new(U256::from(ETH));

        // 0.1 ETH at 0.001 ETH/token → 100 tokens
        let buy = TradeAction::Buy { amount_in: U256::from(ETH / 10) };
        let outcome = paper.execute_action(TOKEN, &buy, &point(ETH / 1_000)).await.unwrap();
        assert_eq!(outcome.expected_out, U256::from(100 * ETH));
        assert!(outcome.tx_hash.is_none());

        // Price doubles, sell half
        let sell = TradeAction::Sell {
            amount_in: U256::from(50 * ETH),
            reason: SellReason::TakeProfit,
        };
        paper.execute_action(TOKEN, &sell, &point(ETH / 500)).await.unwrap();

        let account = paper.account().await;
        assert_eq!(account.tokens, U256::from(50 * ETH));
        assert_eq!(account.native, U256::from(ETH));
        assert_eq!(account.fills, 2);
    }

    #[tokio::test]
    async fn test_overspend_rejected() {
        let paper = PaperExecutor::new(U256::from(1_000u64));
        let buy = TradeAction::Buy { amount_in: U256::from(ETH) };

        let err = paper.execute_action(TOKEN, &buy, &point(ETH)).await.unwrap_err();
        assert!(err.to_string().contains("Insufficient funds"));
        assert_eq!(paper.account().await.fills, 0);
    }
}

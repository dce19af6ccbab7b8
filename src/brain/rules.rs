//! Decision rules over the price ratio `current / initial`
//!
//! All thresholds are basis points (10_000 = 1.0x) and every comparison is
//! an exact integer cross-multiplication, so there is no rounding at the
//! boundaries.

use alloy_primitives::U256;
use serde::Serialize;

use crate::config::StrategyKind;

// ============================================
// THRESHOLDS (basis points of the initial price)
// ============================================

pub const BPS: u64 = 10_000;

/// ratio <= 0.70 → sell everything
pub const STOP_LOSS_BPS: u64 = 7_000;

/// ratio < 0.90 → buy the fixed notional
pub const DIP_BUY_BPS: u64 = 9_000;

/// ratio >= 2.00 → sell half
pub const TAKE_PROFIT_BPS: u64 = 20_000;

/// ratio >= m for these multipliers (ascending) → sell a tenth
pub const SCALE_OUT_MULTIPLIERS: [u64; 5] = [5, 10, 25, 50, 100];

/// Quick-exit strategy: ratio >= 1.02 → sell everything
pub const QUICK_EXIT_BPS: u64 = 10_200;

const FULL_POSITION_BPS: u64 = 10_000;
const HALF_POSITION_BPS: u64 = 5_000;
const SCALE_OUT_POSITION_BPS: u64 = 1_000;

// ============================================
// ACTIONS
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SellReason {
    StopLoss,
    TakeProfit,
    ScaleOut { multiplier: u64 },
    QuickExit,
}

impl std::fmt::Display for SellReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SellReason::StopLoss => write!(f, "stop-loss"),
            SellReason::TakeProfit => write!(f, "take-profit"),
            SellReason::ScaleOut { multiplier } => write!(f, "scale-out {multiplier}x"),
            SellReason::QuickExit => write!(f, "quick-exit"),
        }
    }
}

/// What to do this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeAction {
    Hold,

    /// Spend `amount_in` base-asset wei on the token
    Buy { amount_in: U256 },

    /// Sell `amount_in` token units for the base asset
    Sell { amount_in: U256, reason: SellReason },
}

impl TradeAction {
    pub fn is_hold(&self) -> bool {
        matches!(self, TradeAction::Hold)
    }

    pub fn amount_in(&self) -> U256 {
        match self {
            TradeAction::Hold => U256::ZERO,
            TradeAction::Buy { amount_in } | TradeAction::Sell { amount_in, .. } => *amount_in,
        }
    }
}

impl std::fmt::Display for TradeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeAction::Hold => write!(f, "HOLD"),
            TradeAction::Buy { amount_in } => write!(f, "BUY {amount_in} wei"),
            TradeAction::Sell { amount_in, reason } => write!(f, "SELL {amount_in} ({reason})"),
        }
    }
}

// ============================================
// RATIO HELPERS
// ============================================

/// `current / initial >= threshold_bps / 10_000`
fn ratio_at_least(current: U256, initial: U256, threshold_bps: u64) -> bool {
    current.saturating_mul(U256::from(BPS)) >= initial.saturating_mul(U256::from(threshold_bps))
}

/// `current / initial <= threshold_bps / 10_000`
fn ratio_at_most(current: U256, initial: U256, threshold_bps: u64) -> bool {
    current.saturating_mul(U256::from(BPS)) <= initial.saturating_mul(U256::from(threshold_bps))
}

/// `current / initial < threshold_bps / 10_000`
fn ratio_below(current: U256, initial: U256, threshold_bps: u64) -> bool {
    !ratio_at_least(current, initial, threshold_bps)
}

/// `current / initial` in basis points, truncated. `None` for a zero anchor
pub fn ratio_bps(current: U256, initial: U256) -> Option<U256> {
    if initial.is_zero() {
        return None;
    }
    Some(current.saturating_mul(U256::from(BPS)) / initial)
}

/// Percent change vs. the anchor at basis-point precision
pub fn change_percent(current: U256, initial: U256) -> Option<f64> {
    let bps = ratio_bps(current, initial)?;
    let bps = u128::try_from(bps).unwrap_or(u128::MAX);
    Some((bps as f64 - BPS as f64) / 100.0)
}

fn fraction_of(balance: U256, fraction_bps: u64) -> U256 {
    balance.saturating_mul(U256::from(fraction_bps)) / U256::from(BPS)
}

// ============================================
// DECISION ENGINE
// ============================================

/// Pure mapping (current price, anchor price, token balance) → action
#[derive(Debug, Clone)]
pub struct DecisionEngine {
    strategy: StrategyKind,
    buy_amount: U256,
}

impl DecisionEngine {
    pub fn new(strategy: StrategyKind, buy_amount: U256) -> Self {
        Self { strategy, buy_amount }
    }

    pub fn strategy(&self) -> StrategyKind {
        self.strategy
    }

    /// First matching rule wins. Total: every input maps to exactly one
    /// action, and a sell of nothing is a hold.
    pub fn decide(&self, current: U256, initial: U256, token_balance: U256) -> TradeAction {
        if initial.is_zero() {
            return TradeAction::Hold;
        }

        let action = match self.strategy {
            StrategyKind::Default => self.default_rules(current, initial, token_balance),
            StrategyKind::QuickExit => quick_exit_rules(current, initial, token_balance),
        };

        match action {
            TradeAction::Sell { amount_in, .. } if amount_in.is_zero() => TradeAction::Hold,
            TradeAction::Buy { amount_in } if amount_in.is_zero() => TradeAction::Hold,
            other => other,
        }
    }

    fn default_rules(&self, current: U256, initial: U256, balance: U256) -> TradeAction {
        if ratio_at_most(current, initial, STOP_LOSS_BPS) {
            return TradeAction::Sell {
                amount_in: fraction_of(balance, FULL_POSITION_BPS),
                reason: SellReason::StopLoss,
            };
        }

        if ratio_below(current, initial, DIP_BUY_BPS) {
            return TradeAction::Buy {
                amount_in: self.buy_amount,
            };
        }

        if let Some(multiplier) = SCALE_OUT_MULTIPLIERS
            .iter()
            .copied()
            .find(|m| ratio_at_least(current, initial, m * BPS))
        {
            return TradeAction::Sell {
                amount_in: fraction_of(balance, SCALE_OUT_POSITION_BPS),
                reason: SellReason::ScaleOut { multiplier },
            };
        }

        if ratio_at_least(current, initial, TAKE_PROFIT_BPS) {
            return TradeAction::Sell {
                amount_in: fraction_of(balance, HALF_POSITION_BPS),
                reason: SellReason::TakeProfit,
            };
        }

        TradeAction::Hold
    }
}

fn quick_exit_rules(current: U256, initial: U256, balance: U256) -> TradeAction {
    if ratio_at_least(current, initial, QUICK_EXIT_BPS) {
        TradeAction::Sell {
            amount_in: balance,
            reason: SellReason::QuickExit,
        }
    } else {
        TradeAction::Hold
    }
}

// ============================================
// TESTS
// ============================================

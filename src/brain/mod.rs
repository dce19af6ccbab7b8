//! The Brain
//!
//! Responsible for:
//! - Mapping the price ratio against the anchor price to a trade action
//! - Sizing sells as a fraction of the current token balance

mod rules;

pub use rules::{change_percent, ratio_bps, DecisionEngine, SellReason, TradeAction};

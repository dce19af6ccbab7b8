//! The Simulator
//!
//! Responsible for:
//! - A scripted price feed for chain-free runs
//! - Paper fills for simulation and dry-run modes

mod market;
mod paper;

pub use market::{SimulatedMarket, DEFAULT_SIMULATED_PRICE_WEI};
pub use paper::{PaperAccount, PaperExecutor, DEFAULT_PAPER_BALANCE_WEI};

//! Limoncello - single-token Uniswap V2 trading engine
//!
//! Phases per tick:
//! - cartographer: ABI registry, contract handles, spot price oracle
//! - brain: rule-based decisions against the anchor price
//! - executor: approval, quote, slippage bound, signing, confirmation
//! - engine: the trading loop and its trade events
//!
//! `simulator` swaps the chain-facing parts for a scripted market and paper
//! fills.

pub mod brain;
pub mod cartographer;
pub mod chain;
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod gas_oracle;
pub mod price_feed;
pub mod simulator;
pub mod tokens;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{EngineError, ErrorClass, Result, Stage};

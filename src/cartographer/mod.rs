//! The Cartographer (Market Data)
//!
//! ABI registry lookups, typed contract handles and the spot price oracle.

pub mod abi_registry;
pub mod contracts;
mod oracle;

pub use abi_registry::{AbiLookupError, AbiSource, EtherscanAbiSource};
pub use contracts::{
    ContractDirectory, FactoryContract, PairContract, RouterContract, TokenContract,
};
pub use oracle::{spot_price_from_reserves, PriceOracle, PricePoint, PriceSource};

//! Contract Directory - ABI cache + typed contract handles
//!
//! Resolves each contract's ABI once through the registry, keeps it for the
//! process lifetime, and hands out handles for the Uniswap V2 router,
//! factory, pairs and ERC-20 tokens. Calls are encoded with `sol!` bindings;
//! the registry ABI is used to check the contract actually exposes them.
//!
//! OPTIMIZATIONS:
//! - ABIs are immutable per address - cache forever
//! - Failed lookups are counted so an unverified contract stops being retried

use alloy_json_abi::JsonAbi;
use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{sol, SolCall};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use super::abi_registry::AbiSource;
use crate::chain::ChainReader;
use crate::error::{EngineError, Result};

// ============================================
// SOLIDITY INTERFACES
// ============================================

sol! {
    /// Uniswap V2 Router02 (swap entry points + quoting)
    #[derive(Debug)]
    interface IUniswapV2Router02 {
        function getAmountsOut(uint256 amountIn, address[] calldata path)
            external view returns (uint256[] memory amounts);

        function swapExactETHForTokens(
            uint256 amountOutMin,
            address[] calldata path,
            address to,
            uint256 deadline
        ) external payable returns (uint256[] memory amounts);

        function swapExactTokensForETH(
            uint256 amountIn,
            uint256 amountOutMin,
            address[] calldata path,
            address to,
            uint256 deadline
        ) external returns (uint256[] memory amounts);
    }

    /// Uniswap V2 Factory (pair lookup)
    #[derive(Debug)]
    interface IUniswapV2Factory {
        function getPair(address tokenA, address tokenB) external view returns (address pair);
    }

    /// Uniswap V2 Pair interface
    #[derive(Debug)]
    interface IUniswapV2Pair {
        function getReserves() external view returns (
            uint112 reserve0,
            uint112 reserve1,
            uint32 blockTimestampLast
        );
        function token0() external view returns (address);
    }

    /// ERC-20 subset the engine needs
    #[derive(Debug)]
    interface IERC20 {
        function balanceOf(address owner) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
        function decimals() external view returns (uint8);
    }
}

const ROUTER_FUNCTIONS: &[&str] =
    &["getAmountsOut", "swapExactETHForTokens", "swapExactTokensForETH"];
const FACTORY_FUNCTIONS: &[&str] = &["getPair"];
const PAIR_FUNCTIONS: &[&str] = &["getReserves", "token0"];
const TOKEN_FUNCTIONS: &[&str] = &["balanceOf", "allowance", "approve", "decimals"];

/// `eth_call` a typed function and decode its return value
async fn read<C: SolCall>(chain: &dyn ChainReader, to: Address, call: C) -> Result<C::Return> {
    let output = chain.call(to, Bytes::from(call.abi_encode())).await?;

    C::abi_decode_returns(&output).map_err(|e| {
        EngineError::chain(C::SIGNATURE, format!("undecodable response from {to:?}: {e}"))
    })
}

fn missing_functions<'a>(abi: &JsonAbi, required: &[&'a str]) -> Vec<&'a str> {
    required
        .iter()
        .copied()
        .filter(|name| abi.function(name).is_none())
        .collect()
}

// ============================================
// DIRECTORY
// ============================================

pub struct ContractDirectory {
    chain: Arc<dyn ChainReader>,
    source: Arc<dyn AbiSource>,
    router: Address,
    factory: Address,
    max_attempts: u32,
    cache: RwLock<HashMap<Address, Arc<JsonAbi>>>,
    failures: Mutex<HashMap<Address, u32>>,
}

impl ContractDirectory {
    pub fn new(
        chain: Arc<dyn ChainReader>,
        source: Arc<dyn AbiSource>,
        router: Address,
        factory: Address,
        max_attempts: u32,
    ) -> Self {
        Self {
            chain,
            source,
            router,
            factory,
            max_attempts: max_attempts.max(1),
            cache: RwLock::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// ABI for `address` (CACHED - immutable per address)
    pub async fn get_abi(&self, address: Address) -> Result<Arc<JsonAbi>> {
        if let Some(abi) = self.cache.read().await.get(&address) {
            return Ok(abi.clone());
        }

        let previous_failures = self.failures.lock().await.get(&address).copied().unwrap_or(0);
        if previous_failures >= self.max_attempts {
            return Err(EngineError::AbiUnavailable {
                address,
                reason: "lookup attempts exhausted".into(),
                attempts: previous_failures,
                exhausted: true,
            });
        }

        match self.source.fetch_abi(address).await {
            Ok(abi) => {
                let abi = Arc::new(abi);
                self.cache.write().await.insert(address, abi.clone());
                self.failures.lock().await.remove(&address);
                debug!("Cached ABI for {:?}", address);
                Ok(abi)
            }
            Err(e) => {
                let mut failures = self.failures.lock().await;
                let attempts = failures.entry(address).or_insert(0);
                *attempts += 1;
                warn!("ABI lookup for {:?} failed (attempt {}): {}", address, attempts, e);

                Err(EngineError::AbiUnavailable {
                    address,
                    reason: e.to_string(),
                    attempts: *attempts,
                    exhausted: *attempts >= self.max_attempts,
                })
            }
        }
    }

    /// Resolve an ABI and insist it exposes `required`
    async fn strict_abi(&self, address: Address, required: &[&str]) -> Result<()> {
        let abi = self.get_abi(address).await?;
        let missing = missing_functions(&abi, required);
        if !missing.is_empty() {
            return Err(EngineError::AbiUnavailable {
                address,
                reason: format!("ABI lacks {}", missing.join(", ")),
                attempts: 0,
                exhausted: true,
            });
        }
        Ok(())
    }

    /// Resolve an ABI; proxies expose a different ABI, so only warn
    async fn lenient_abi(&self, address: Address, required: &[&str]) -> Result<()> {
        let abi = self.get_abi(address).await?;
        let missing = missing_functions(&abi, required);
        if !missing.is_empty() {
            warn!(
                "ABI for {:?} lacks {} (proxy?) - using the canonical interface",
                address,
                missing.join(", ")
            );
        }
        Ok(())
    }

    pub async fn router_contract(&self) -> Result<RouterContract> {
        self.strict_abi(self.router, ROUTER_FUNCTIONS).await?;
        Ok(RouterContract {
            address: self.router,
            chain: self.chain.clone(),
        })
    }

    pub async fn factory_contract(&self) -> Result<FactoryContract> {
        self.strict_abi(self.factory, FACTORY_FUNCTIONS).await?;
        Ok(FactoryContract {
            address: self.factory,
            chain: self.chain.clone(),
        })
    }

    pub async fn pair_contract(&self, address: Address) -> Result<PairContract> {
        self.lenient_abi(address, PAIR_FUNCTIONS).await?;
        Ok(PairContract {
            address,
            chain: self.chain.clone(),
        })
    }

    pub async fn token_contract(&self, address: Address) -> Result<TokenContract> {
        self.lenient_abi(address, TOKEN_FUNCTIONS).await?;
        Ok(TokenContract {
            address,
            chain: self.chain.clone(),
        })
    }

    pub fn router_address(&self) -> Address {
        self.router
    }

    /// Number of cached ABIs, for monitoring
    pub async fn cache_len(&self) -> usize {
        self.cache.read().await.len()
    }
}

// ============================================
// CONTRACT HANDLES
// ============================================

#[derive(Clone)]
pub struct RouterContract {
    address: Address,
    chain: Arc<dyn ChainReader>,
}

impl RouterContract {
    pub fn address(&self) -> Address {
        self.address
    }

    /// Expected output amounts along `path`; the last entry is the final output
    pub async fn get_amounts_out(&self, amount_in: U256, path: &[Address]) -> Result<Vec<U256>> {
        let call = IUniswapV2Router02::getAmountsOutCall {
            amountIn: amount_in,
            path: path.to_vec(),
        };
        read(self.chain.as_ref(), self.address, call).await
    }

    pub fn encode_swap_exact_eth_for_tokens(
        &self,
        amount_out_min: U256,
        path: &[Address],
        to: Address,
        deadline: u64,
    ) -> Bytes {
        IUniswapV2Router02::swapExactETHForTokensCall {
            amountOutMin: amount_out_min,
            path: path.to_vec(),
            to,
            deadline: U256::from(deadline),
        }
        .abi_encode()
        .into()
    }

    pub fn encode_swap_exact_tokens_for_eth(
        &self,
        amount_in: U256,
        amount_out_min: U256,
        path: &[Address],
        to: Address,
        deadline: u64,
    ) -> Bytes {
        IUniswapV2Router02::swapExactTokensForETHCall {
            amountIn: amount_in,
            amountOutMin: amount_out_min,
            path: path.to_vec(),
            to,
            deadline: U256::from(deadline),
        }
        .abi_encode()
        .into()
    }
}

#[derive(Clone)]
pub struct FactoryContract {
    address: Address,
    chain: Arc<dyn ChainReader>,
}

impl FactoryContract {
    /// Pair contract for (a, b); `None` when the factory returns the zero address
    pub async fn get_pair(&self, token_a: Address, token_b: Address) -> Result<Option<Address>> {
        let call = IUniswapV2Factory::getPairCall {
            tokenA: token_a,
            tokenB: token_b,
        };
        let pair = read(self.chain.as_ref(), self.address, call).await?;
        Ok((!pair.is_zero()).then_some(pair))
    }
}

#[derive(Clone)]
pub struct PairContract {
    address: Address,
    chain: Arc<dyn ChainReader>,
}

impl PairContract {
    /// (reserve0, reserve1)
    pub async fn get_reserves(&self) -> Result<(U256, U256)> {
        let reserves =
            read(self.chain.as_ref(), self.address, IUniswapV2Pair::getReservesCall {}).await?;
        let r0: u128 = reserves.reserve0.to();
        let r1: u128 = reserves.reserve1.to();
        Ok((U256::from(r0), U256::from(r1)))
    }

    pub async fn token0(&self) -> Result<Address> {
        read(self.chain.as_ref(), self.address, IUniswapV2Pair::token0Call {}).await
    }
}

#[derive(Clone)]
pub struct TokenContract {
    address: Address,
    chain: Arc<dyn ChainReader>,
}

impl TokenContract {
    pub async fn balance_of(&self, owner: Address) -> Result<U256> {
        read(self.chain.as_ref(), self.address, IERC20::balanceOfCall { owner }).await
    }

    pub async fn allowance(&self, owner: Address, spender: Address) -> Result<U256> {
        read(self.chain.as_ref(), self.address, IERC20::allowanceCall { owner, spender }).await
    }

    pub async fn decimals(&self) -> Result<u8> {
        read(self.chain.as_ref(), self.address, IERC20::decimalsCall {}).await
    }

    pub fn encode_approve(&self, spender: Address, amount: U256) -> Bytes {
        IERC20::approveCall { spender, amount }.abi_encode().into()
    }
}

// ============================================
// TESTS
// ============================================

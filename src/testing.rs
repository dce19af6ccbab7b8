//! In-memory chain, registry and collaborators for unit tests
//!
//! `MockChain` answers `eth_call` by function selector from a mutable
//! [`MockState`], decodes every raw transaction it receives, and hands out
//! receipts according to the configured outcome.

use alloy_consensus::{Transaction, TxEnvelope};
use alloy_eips::eip2718::Decodable2718;
use alloy_json_abi::JsonAbi;
use alloy_primitives::{address, aliases::U112, Address, Bytes, B256, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use crate::brain::TradeAction;
use crate::cartographer::abi_registry::{AbiLookupError, AbiSource};
use crate::cartographer::contracts::{IUniswapV2Factory, IUniswapV2Pair, IUniswapV2Router02, IERC20};
use crate::cartographer::{PricePoint, PriceSource};
use crate::chain::{BlockInfo, CallRequest, ChainReader, Receipt, TxSubmitter};
use crate::engine::{EventSink, TradeEvent};
use crate::error::{EngineError, Result};
use crate::executor::{TradeExecutor, TradeOutcome};
use crate::tokens::{TokenAddress, UNISWAP_V2_FACTORY, UNISWAP_V2_ROUTER, WETH};

pub const ROUTER: Address = UNISWAP_V2_ROUTER;
pub const FACTORY: Address = UNISWAP_V2_FACTORY;
pub const PAIR: Address = address!("A43fe16908251ee70EF74718545e4FE6C5cCEc9f");
pub const TOKEN: Address = address!("6982508145454Ce325dDbE47a25d4ec3d2311933");

const ETH: u128 = 1_000_000_000_000_000_000;

// ============================================
// MOCK CHAIN
// ============================================

/// Decoded view of a transaction the mock received
#[derive(Debug, Clone)]
pub struct SentTx {
    pub hash: B256,
    pub nonce: u64,
    pub to: Address,
    pub value: U256,
    pub selector: [u8; 4],
    pub input: Bytes,
}

#[derive(Debug, Clone)]
pub struct MockState {
    pub chain_id: u64,
    pub pair: Option<Address>,
    pub token0: Address,
    pub reserve_token: U256,
    pub reserve_base: U256,
    pub decimals: u8,
    pub native_balance: U256,
    pub token_balance: U256,
    pub allowance: U256,
    /// Fixed router quote; `None` prices against the reserves
    pub quote_out: Option<U256>,
    pub gas_price: u128,
    pub base_fee: Option<u64>,
    pub gas_estimate: u64,
    pub nonce: u64,
    pub calls_fail: bool,
    pub approval_succeeds: bool,
    pub swap_succeeds: bool,
    pub receipts_available: bool,
    pub sent: Vec<SentTx>,
    outcomes: HashMap<B256, bool>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            chain_id: 1,
            pair: Some(PAIR),
            token0: TOKEN,
            reserve_token: U256::from(1_000_000 * ETH),
            reserve_base: U256::from(100 * ETH),
            decimals: 18,
            native_balance: U256::from(10 * ETH),
            token_balance: U256::ZERO,
            allowance: U256::ZERO,
            quote_out: Some(U256::from(1_000_000u64)),
            gas_price: 20_000_000_000,
            base_fee: Some(20_000_000_000),
            gas_estimate: 150_000,
            nonce: 0,
            calls_fail: false,
            approval_succeeds: true,
            swap_succeeds: true,
            receipts_available: true,
            sent: Vec::new(),
            outcomes: HashMap::new(),
        }
    }
}

#[derive(Default)]
pub struct MockChain {
    state: Mutex<MockState>,
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&self, f: impl FnOnce(&mut MockState)) {
        f(&mut self.state.lock().unwrap());
    }

    pub fn sent(&self) -> Vec<SentTx> {
        self.state.lock().unwrap().sent.clone()
    }

    fn answer(state: &MockState, data: &[u8]) -> Result<Vec<u8>> {
        let selector: [u8; 4] = data
            .get(..4)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| EngineError::chain("eth_call", "empty calldata"))?;

        let (reserve0, reserve1) = if state.token0 == TOKEN {
            (state.reserve_token, state.reserve_base)
        } else {
            (state.reserve_base, state.reserve_token)
        };

        let encoded = if selector == IUniswapV2Factory::getPairCall::SELECTOR {
            IUniswapV2Factory::getPairCall::abi_encode_returns(&state.pair.unwrap_or(Address::ZERO))
        } else if selector == IUniswapV2Pair::token0Call::SELECTOR {
            IUniswapV2Pair::token0Call::abi_encode_returns(&state.token0)
        } else if selector == IUniswapV2Pair::getReservesCall::SELECTOR {
            IUniswapV2Pair::getReservesCall::abi_encode_returns(&IUniswapV2Pair::getReservesReturn {
                reserve0: U112::from(reserve0),
                reserve1: U112::from(reserve1),
                blockTimestampLast: 0,
            })
        } else if selector == IERC20::decimalsCall::SELECTOR {
            IERC20::decimalsCall::abi_encode_returns(&state.decimals)
        } else if selector == IERC20::balanceOfCall::SELECTOR {
            IERC20::balanceOfCall::abi_encode_returns(&state.token_balance)
        } else if selector == IERC20::allowanceCall::SELECTOR {
            IERC20::allowanceCall::abi_encode_returns(&state.allowance)
        } else if selector == IUniswapV2Router02::getAmountsOutCall::SELECTOR {
            let call = IUniswapV2Router02::getAmountsOutCall::abi_decode(data)
                .map_err(|e| EngineError::chain("eth_call", e))?;
            let out = state.quote_out.unwrap_or_else(|| {
                let (reserve_in, reserve_out) = if call.path.first() == Some(&WETH) {
                    (state.reserve_base, state.reserve_token)
                } else {
                    (state.reserve_token, state.reserve_base)
                };
                let with_fee = call.amountIn * U256::from(997u64);
                with_fee * reserve_out / (reserve_in * U256::from(1_000u64) + with_fee)
            });
            IUniswapV2Router02::getAmountsOutCall::abi_encode_returns(&vec![call.amountIn, out])
        } else {
            return Err(EngineError::chain("eth_call", "execution reverted"));
        };

        Ok(encoded)
    }
}

#[async_trait]
impl ChainReader for MockChain {
    async fn chain_id(&self) -> Result<u64> {
        Ok(self.state.lock().unwrap().chain_id)
    }

    async fn balance(&self, _account: Address) -> Result<U256> {
        Ok(self.state.lock().unwrap().native_balance)
    }

    async fn transaction_count(&self, _account: Address) -> Result<u64> {
        Ok(self.state.lock().unwrap().nonce)
    }

    async fn gas_price(&self) -> Result<u128> {
        Ok(self.state.lock().unwrap().gas_price)
    }

    async fn latest_block(&self) -> Result<BlockInfo> {
        let state = self.state.lock().unwrap();
        Ok(BlockInfo {
            base_fee_per_gas: state.base_fee,
        })
    }

    async fn call(&self, _to: Address, data: Bytes) -> Result<Bytes> {
        let state = self.state.lock().unwrap();
        if state.calls_fail {
            return Err(EngineError::chain("eth_call", "connection refused"));
        }
        Self::answer(&state, &data).map(Bytes::from)
    }

    async fn estimate_gas(&self, _request: CallRequest) -> Result<u64> {
        Ok(self.state.lock().unwrap().gas_estimate)
    }
}

#[async_trait]
impl TxSubmitter for MockChain {
    async fn send_raw(&self, raw: Bytes) -> Result<B256> {
        let envelope = TxEnvelope::decode_2718(&mut raw.as_ref())
            .map_err(|e| EngineError::chain("eth_sendRawTransaction", e))?;

        let hash = *envelope.tx_hash();
        let input = envelope.input().clone();
        let selector: [u8; 4] = input.get(..4).and_then(|s| s.try_into().ok()).unwrap_or_default();

        let mut state = self.state.lock().unwrap();
        let success = if selector == IERC20::approveCall::SELECTOR {
            if state.approval_succeeds {
                let call = IERC20::approveCall::abi_decode(&input)
                    .map_err(|e| EngineError::chain("eth_sendRawTransaction", e))?;
                state.allowance = call.amount;
            }
            state.approval_succeeds
        } else {
            state.swap_succeeds
        };

        state.nonce = envelope.nonce() + 1;
        state.outcomes.insert(hash, success);
        state.sent.push(SentTx {
            hash,
            nonce: envelope.nonce(),
            to: envelope.to().unwrap_or_default(),
            value: envelope.value(),
            selector,
            input,
        });

        Ok(hash)
    }

    async fn receipt(&self, hash: B256) -> Result<Option<Receipt>> {
        let state = self.state.lock().unwrap();
        if !state.receipts_available {
            return Ok(None);
        }
        Ok(state.outcomes.get(&hash).map(|success| Receipt {
            hash,
            success: *success,
            block_number: Some(19_000_001),
            gas_used: 120_000,
        }))
    }
}

// ============================================
// ABI REGISTRY
// ============================================

const CANONICAL_ABI: &str = r#"[
  {"type":"function","name":"getAmountsOut","stateMutability":"view",
   "inputs":[{"name":"amountIn","type":"uint256"},{"name":"path","type":"address[]"}],
   "outputs":[{"name":"amounts","type":"uint256[]"}]},
  {"type":"function","name":"swapExactETHForTokens","stateMutability":"payable",
   "inputs":[{"name":"amountOutMin","type":"uint256"},{"name":"path","type":"address[]"},{"name":"to","type":"address"},{"name":"deadline","type":"uint256"}],
   "outputs":[{"name":"amounts","type":"uint256[]"}]},
  {"type":"function","name":"swapExactTokensForETH","stateMutability":"nonpayable",
   "inputs":[{"name":"amountIn","type":"uint256"},{"name":"amountOutMin","type":"uint256"},{"name":"path","type":"address[]"},{"name":"to","type":"address"},{"name":"deadline","type":"uint256"}],
   "outputs":[{"name":"amounts","type":"uint256[]"}]},
  {"type":"function","name":"getPair","stateMutability":"view",
   "inputs":[{"name":"tokenA","type":"address"},{"name":"tokenB","type":"address"}],
   "outputs":[{"name":"pair","type":"address"}]},
  {"type":"function","name":"getReserves","stateMutability":"view","inputs":[],
   "outputs":[{"name":"reserve0","type":"uint112"},{"name":"reserve1","type":"uint112"},{"name":"blockTimestampLast","type":"uint32"}]},
  {"type":"function","name":"token0","stateMutability":"view","inputs":[],
   "outputs":[{"name":"","type":"address"}]},
  {"type":"function","name":"balanceOf","stateMutability":"view",
   "inputs":[{"name":"owner","type":"address"}],"outputs":[{"name":"","type":"uint256"}]},
  {"type":"function","name":"allowance","stateMutability":"view",
   "inputs":[{"name":"owner","type":"address"},{"name":"spender","type":"address"}],
   "outputs":[{"name":"","type":"uint256"}]},
  {"type":"function","name":"approve","stateMutability":"nonpayable",
   "inputs":[{"name":"spender","type":"address"},{"name":"amount","type":"uint256"}],
   "outputs":[{"name":"","type":"bool"}]},
  {"type":"function","name":"decimals","stateMutability":"view","inputs":[],
   "outputs":[{"name":"","type":"uint8"}]}
]"#;

/// Registry that serves one fixed ABI for every address
pub struct StaticAbiSource {
    abi: JsonAbi,
    lookups: AtomicU32,
    failing: Mutex<HashSet<Address>>,
}

impl StaticAbiSource {
    pub fn canonical() -> Self {
        Self::from_json(CANONICAL_ABI)
    }

    pub fn from_json(json: &str) -> Self {
        Self {
            abi: serde_json::from_str(json).unwrap(),
            lookups: AtomicU32::new(0),
            failing: Mutex::new(HashSet::new()),
        }
    }

    pub fn fail_for(&self, address: Address) {
        self.failing.lock().unwrap().insert(address);
    }

    pub fn lookups(&self) -> u32 {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AbiSource for StaticAbiSource {
    async fn fetch_abi(&self, address: Address) -> std::result::Result<JsonAbi, AbiLookupError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(&address) {
            return Err(AbiLookupError("Contract source code not verified".into()));
        }
        Ok(self.abi.clone())
    }
}

// ============================================
// LOOP COLLABORATORS
// ============================================

/// Price feed replaying a fixed script of prices and failures
pub struct ScriptedPrices {
    script: Mutex<VecDeque<Result<U256>>>,
}

impl ScriptedPrices {
    pub fn new(script: Vec<Result<U256>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
        }
    }
}

#[async_trait]
impl PriceSource for ScriptedPrices {
    async fn spot_price(&self, _token: TokenAddress) -> Result<PricePoint> {
        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(EngineError::chain("getReserves", "script exhausted")));

        next.map(|price| PricePoint {
            price,
            liquidity: U256::from(100 * ETH),
            token_decimals: 18,
            sampled_at: chrono::Utc::now(),
        })
    }
}

/// Executor that records every action and fails on demand
#[derive(Default)]
pub struct RecordingExecutor {
    pub actions: Mutex<Vec<TradeAction>>,
    pub balance: Mutex<U256>,
    pub fail_with_revert: Mutex<bool>,
}

#[async_trait]
impl TradeExecutor for RecordingExecutor {
    async fn token_balance(&self, _token: Address) -> Result<U256> {
        Ok(*self.balance.lock().unwrap())
    }

    async fn execute_action(
        &self,
        _token: Address,
        action: &TradeAction,
        _point: &PricePoint,
    ) -> Result<TradeOutcome> {
        self.actions.lock().unwrap().push(*action);
        if *self.fail_with_revert.lock().unwrap() {
            return Err(EngineError::TransactionFailed {
                hash: B256::repeat_byte(0xee),
            }
            .at(crate::error::Stage::Confirm));
        }
        Ok(TradeOutcome {
            tx_hash: Some(B256::repeat_byte(0x11)),
            amount_in: action.amount_in(),
            expected_out: U256::from(1u64),
        })
    }
}

/// Sink that keeps every event in memory
#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<TradeEvent>>,
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &TradeEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

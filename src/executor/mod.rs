//! The Executor
//!
//! Turns a trade action into a confirmed Uniswap V2 swap:
//! - Pre-flight balance and liquidity checks
//! - ERC-20 approval for sells (confirmed before the swap is built)
//! - Router quote → slippage bound → deadline
//! - Gas policy, local signing, broadcast and receipt wait
//!
//! ⚠️  WARNING: In production this module moves real funds!

pub mod signer;
pub mod slippage;

use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::brain::TradeAction;
use crate::cartographer::{ContractDirectory, PricePoint};
use crate::chain::{CallRequest, ChainReader, Receipt, TxSubmitter};
use crate::config::Config;
use crate::error::{EngineError, Result, Stage};
use crate::gas_oracle::GasOracle;
use signer::{TransactionSigner, UnsignedTx};

// ============================================
// TRADE EXECUTION CAPABILITY
// ============================================

/// Result of a filled trade
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeOutcome {
    /// Swap transaction hash, `None` for paper fills
    pub tx_hash: Option<B256>,
    pub amount_in: U256,

    /// Quoted output the slippage bound was computed from
    pub expected_out: U256,
}

/// Anything that can fill trades for the trading loop
#[async_trait]
pub trait TradeExecutor: Send + Sync {
    /// Token units the trading account currently holds
    async fn token_balance(&self, token: Address) -> Result<U256>;

    /// Fill a non-HOLD action at the sampled price
    async fn execute_action(
        &self,
        token: Address,
        action: &TradeAction,
        point: &PricePoint,
    ) -> Result<TradeOutcome>;
}

// ============================================
// SWAP INTENT
// ============================================

/// A fully-bounded swap, ready to be signed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapIntent {
    pub action: TradeAction,

    /// [input, output]
    pub path: Vec<Address>,

    pub min_out: U256,

    /// Unix seconds
    pub deadline: u64,
}

// ============================================
// PIPELINE
// ============================================

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub chain_id: u64,
    pub base_asset: Address,
    pub slippage_percent: f64,
    pub confirmation_timeout: Duration,
    pub receipt_poll_interval: Duration,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            chain_id: config.chain_id,
            base_asset: config.base_asset()?,
            slippage_percent: config.slippage_percent,
            confirmation_timeout: config.confirmation_timeout(),
            receipt_poll_interval: config.receipt_poll_interval(),
        })
    }
}

/// Signed swap pipeline against a Uniswap V2 router
pub struct TransactionPipeline {
    chain: Arc<dyn ChainReader>,
    submitter: Arc<dyn TxSubmitter>,
    signer: Arc<dyn TransactionSigner>,
    directory: Arc<ContractDirectory>,
    gas: GasOracle,
    settings: PipelineSettings,
}

impl TransactionPipeline {
    pub fn new(
        chain: Arc<dyn ChainReader>,
        submitter: Arc<dyn TxSubmitter>,
        signer: Arc<dyn TransactionSigner>,
        directory: Arc<ContractDirectory>,
        gas: GasOracle,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            chain,
            submitter,
            signer,
            directory,
            gas,
            settings,
        }
    }

    pub fn wallet(&self) -> Address {
        self.signer.address()
    }

    /// Pre-flight, approval, quote and bounds for `action`, then [`execute`](Self::execute)
    pub async fn execute_trade(
        &self,
        token: Address,
        action: &TradeAction,
        point: &PricePoint,
    ) -> Result<TradeOutcome> {
        let path = self.path_for(token, action)?;
        let amount_in = action.amount_in();

        self.preflight(token, action, point).await.map_err(|e| e.at(Stage::Preflight))?;

        if let TradeAction::Sell { .. } = action {
            self.ensure_allowance(token, amount_in)
                .await
                .map_err(|e| e.at(Stage::Approval))?;
        }

        let expected_out = self.quote(amount_in, &path).await.map_err(|e| e.at(Stage::Quote))?;
        let intent = SwapIntent {
            action: *action,
            path,
            min_out: slippage::min_amount_out(expected_out, self.settings.slippage_percent),
            deadline: slippage::deadline_from(slippage::unix_now()),
        };

        info!(
            "Swap intent: {} | quote {} | min out {} | deadline {}",
            action, expected_out, intent.min_out, intent.deadline
        );

        let receipt = self.execute(&intent).await?;

        Ok(TradeOutcome {
            tx_hash: Some(receipt.hash),
            amount_in,
            expected_out,
        })
    }

    /// Sign, submit and confirm a bounded swap
    pub async fn execute(&self, intent: &SwapIntent) -> Result<Receipt> {
        let router = self.directory.router_contract().await.map_err(|e| e.at(Stage::Quote))?;
        let wallet = self.wallet();

        let (value, input) = match intent.action {
            TradeAction::Buy { amount_in } => (
                amount_in,
                router.encode_swap_exact_eth_for_tokens(
                    intent.min_out,
                    &intent.path,
                    wallet,
                    intent.deadline,
                ),
            ),
            TradeAction::Sell { amount_in, .. } => {
                let token = intent.path.first().copied().unwrap_or_default();
                let allowance = self
                    .directory
                    .token_contract(token)
                    .await
                    .map_err(|e| e.at(Stage::Approval))?
                    .allowance(wallet, router.address())
                    .await
                    .map_err(|e| e.at(Stage::Approval))?;

                if allowance < amount_in {
                    return Err(EngineError::ApprovalSkipped {
                        token,
                        required: amount_in,
                    }
                    .at(Stage::Approval));
                }

                (
                    U256::ZERO,
                    router.encode_swap_exact_tokens_for_eth(
                        amount_in,
                        intent.min_out,
                        &intent.path,
                        wallet,
                        intent.deadline,
                    ),
                )
            }
            TradeAction::Hold => {
                return Err(
                    EngineError::Config("HOLD has no swap to execute".into()).at(Stage::Preflight)
                )
            }
        };

        let receipt = self
            .send_transaction(router.address(), value, input, Some(intent.deadline))
            .await?;

        if !receipt.success {
            return Err(EngineError::TransactionFailed { hash: receipt.hash }.at(Stage::Confirm));
        }

        info!(
            "✅ Swap confirmed: {:?} (block {:?}, gas {})",
            receipt.hash, receipt.block_number, receipt.gas_used
        );
        Ok(receipt)
    }

    fn path_for(&self, token: Address, action: &TradeAction) -> Result<Vec<Address>> {
        let base = self.settings.base_asset;
        match action {
            TradeAction::Buy { .. } => Ok(vec![base, token]),
            TradeAction::Sell { .. } => Ok(vec![token, base]),
            TradeAction::Hold => Err(EngineError::Config("HOLD has no swap path".into())),
        }
    }

    async fn preflight(
        &self,
        token: Address,
        action: &TradeAction,
        point: &PricePoint,
    ) -> Result<()> {
        match action {
            TradeAction::Buy { amount_in } => {
                let available = self.chain.balance(self.wallet()).await?;
                if available < *amount_in {
                    return Err(EngineError::InsufficientFunds {
                        required: *amount_in,
                        available,
                    });
                }
                if *amount_in > point.liquidity {
                    return Err(EngineError::InsufficientLiquidity {
                        required: *amount_in,
                        available: point.liquidity,
                    });
                }
            }
            TradeAction::Sell { amount_in, .. } => {
                let available = self.token_balance(token).await?;
                if available < *amount_in {
                    return Err(EngineError::InsufficientFunds {
                        required: *amount_in,
                        available,
                    });
                }
                let notional = point.notional(*amount_in);
                if notional > point.liquidity {
                    return Err(EngineError::InsufficientLiquidity {
                        required: notional,
                        available: point.liquidity,
                    });
                }
            }
            TradeAction::Hold => {}
        }
        Ok(())
    }

    /// Approve the router for exactly `amount` when the allowance is short,
    /// and wait for that approval to confirm
    async fn ensure_allowance(&self, token: Address, amount: U256) -> Result<()> {
        let router = self.directory.router_address();
        let contract = self.directory.token_contract(token).await?;
        let allowance = contract.allowance(self.wallet(), router).await?;

        if allowance >= amount {
            debug!("Router allowance {} covers {}", allowance, amount);
            return Ok(());
        }

        info!("Approving router for {} units of {:?}", amount, token);
        let receipt = self
            .send_transaction(token, U256::ZERO, contract.encode_approve(router, amount), None)
            .await?;

        if !receipt.success {
            return Err(EngineError::ApprovalFailed { hash: receipt.hash });
        }
        info!("Approval confirmed: {:?}", receipt.hash);
        Ok(())
    }

    async fn quote(&self, amount_in: U256, path: &[Address]) -> Result<U256> {
        let router = self.directory.router_contract().await?;
        let amounts = router.get_amounts_out(amount_in, path).await?;
        let out = amounts.last().copied().unwrap_or_default();

        if out.is_zero() {
            return Err(EngineError::InsufficientLiquidity {
                required: U256::from(1u64),
                available: U256::ZERO,
            });
        }
        Ok(out)
    }

    /// Gas → nonce → sign → submit → confirm for one transaction
    async fn send_transaction(
        &self,
        to: Address,
        value: U256,
        input: Bytes,
        deadline: Option<u64>,
    ) -> Result<Receipt> {
        let from = self.wallet();

        let gas = self
            .gas
            .current_fees(self.chain.as_ref())
            .await
            .map_err(|e| e.at(Stage::Gas))?;
        let estimate = self
            .chain
            .estimate_gas(CallRequest {
                from: Some(from),
                to,
                value,
                data: input.clone(),
            })
            .await
            .map_err(|e| e.at(Stage::Gas))?;
        let gas_limit = self.gas.gas_limit(estimate);

        // Single nonce source: pending count, read right before signing
        let nonce = self
            .chain
            .transaction_count(from)
            .await
            .map_err(|e| e.at(Stage::Sign))?;

        let signed = self
            .signer
            .sign(UnsignedTx {
                chain_id: self.settings.chain_id,
                nonce,
                to,
                value,
                input,
                gas_limit,
                fees: gas.fees,
            })
            .map_err(|e| e.at(Stage::Sign))?;

        if let Some(deadline) = deadline {
            let now = slippage::unix_now();
            if now >= deadline {
                return Err(EngineError::DeadlineExpired { deadline, now }.at(Stage::Submit));
            }
        }

        let hash = self
            .submitter
            .send_raw(signed.raw)
            .await
            .map_err(|e| e.at(Stage::Submit))?;
        info!(
            "📤 Submitted {:?} (nonce {}, gas limit {}, {:.2} gwei)",
            hash, nonce, gas_limit, gas.effective_gwei
        );

        self.wait_for_receipt(hash).await.map_err(|e| e.at(Stage::Confirm))
    }

    /// Poll for the receipt until the confirmation timeout. A timeout is not
    /// a failure and the transaction is never resubmitted
    async fn wait_for_receipt(&self, hash: B256) -> Result<Receipt> {
        let started = tokio::time::Instant::now();
        let timeout = self.settings.confirmation_timeout;

        loop {
            match self.submitter.receipt(hash).await {
                Ok(Some(receipt)) => return Ok(receipt),
                Ok(None) => {}
                Err(e) => debug!("Receipt poll for {:?} failed: {}", hash, e),
            }

            if started.elapsed() >= timeout {
                warn!("No receipt for {:?} after {:?}", hash, timeout);
                return Err(EngineError::ReceiptTimeout {
                    hash,
                    waited_secs: timeout.as_secs(),
                });
            }

            tokio::time::sleep(self.settings.receipt_poll_interval).await;
        }
    }
}

#[async_trait]
impl TradeExecutor for TransactionPipeline {
    async fn token_balance(&self, token: Address) -> Result<U256> {
        self.directory
            .token_contract(token)
            .await?
            .balance_of(self.wallet())
            .await
    }

    async fn execute_action(
        &self,
        token: Address,
        action: &TradeAction,
        point: &PricePoint,
    ) -> Result<TradeOutcome> {
        self.execute_trade(token, action, point).await
    }
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brain::SellReason;
    use crate::cartographer::contracts::{IUniswapV2Router02, IERC20};
    use crate::config::{GasMode, PrivateKey};
    use crate::error::ErrorClass;
    use crate::testing::{MockChain, StaticAbiSource, FACTORY, ROUTER, TOKEN};
    use crate::tokens::WETH;
    use alloy_sol_types::SolCall;
    use chrono::Utc;
    use signer::LocalSigner;
    use tokio_test::assert_err;

    const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn pipeline(chain: Arc<MockChain>) -> TransactionPipeline {
        let directory = ContractDirectory::new(
            chain.clone(),
            Arc::new(StaticAbiSource::canonical()),
            ROUTER,
            FACTORY,
            3,
        );
        TransactionPipeline::new(
            chain.clone(),
            chain,
            Arc::new(LocalSigner::new(&PrivateKey::new(TEST_KEY)).unwrap()),
            Arc::new(directory),
            GasOracle::new(GasMode::Eip1559, 1.5, 100, 1.2),
            PipelineSettings {
                chain_id: 1,
                base_asset: WETH,
                slippage_percent: 0.05,
                confirmation_timeout: Duration::from_millis(50),
                receipt_poll_interval: Duration::from_millis(5),
            },
        )
    }

    fn point() -> PricePoint {
        PricePoint {
            price: U256::from(1_000_000_000_000u64),
            liquidity: U256::from(100_000_000_000_000_000_000u128),
            token_decimals: 18,
            sampled_at: Utc::now(),
        }
    }

    fn buy() -> TradeAction {
        TradeAction::Buy {
            amount_in: U256::from(10_000_000_000_000_000u64),
        }
    }

    fn sell(amount: u64) -> TradeAction {
        TradeAction::Sell {
            amount_in: U256::from(amount),
            reason: SellReason::TakeProfit,
        }
    }

    #[tokio::test]
    async fn test_buy_signs_with_bounds() {
        let chain = Arc::new(MockChain::new());
        chain.update(|s| {
            s.quote_out = Some(U256::from(1_000_000u64));
            s.nonce = 4;
        });

        let outcome = pipeline(chain.clone()).execute_trade(TOKEN, &buy(), &point()).await.unwrap();
        assert_eq!(outcome.expected_out, U256::from(1_000_000u64));

        let sent = chain.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].nonce, 4);
        assert_eq!(sent[0].to, ROUTER);
        assert_eq!(sent[0].selector, IUniswapV2Router02::swapExactETHForTokensCall::SELECTOR);
        assert_eq!(outcome.tx_hash, Some(sent[0].hash));

        let call =
            IUniswapV2Router02::swapExactETHForTokensCall::abi_decode(&sent[0].input).unwrap();
        assert_eq!(call.amountOutMin, U256::from(999_500u64));
        assert_eq!(call.path, vec![WETH, TOKEN]);
        assert!(call.deadline > U256::from(slippage::unix_now()));
    }

    #[tokio::test]
    async fn test_sell_approves_before_swap() {
        let chain = Arc::new(MockChain::new());
        chain.update(|s| {
            s.token_balance = U256::from(5_000u64);
            s.allowance = U256::ZERO;
        });

        pipeline(chain.clone()).execute_trade(TOKEN, &sell(5_000), &point()).await.unwrap();

        let sent = chain.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].selector, IERC20::approveCall::SELECTOR);
        assert_eq!(sent[0].to, TOKEN);
        assert_eq!(sent[1].selector, IUniswapV2Router02::swapExactTokensForETHCall::SELECTOR);
        // Nonce re-read after the approval confirmed
        assert_eq!(sent[1].nonce, sent[0].nonce + 1);
    }

    #[tokio::test]
    async fn test_sell_with_allowance_skips_approval() {
        let chain = Arc::new(MockChain::new());
        chain.update(|s| {
            s.token_balance = U256::from(5_000u64);
            s.allowance = U256::from(1_000_000u64);
        });

        pipeline(chain.clone()).execute_trade(TOKEN, &sell(5_000), &point()).await.unwrap();
        assert_eq!(chain.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_reverted_approval_stops_sell() {
        let chain = Arc::new(MockChain::new());
        chain.update(|s| {
            s.token_balance = U256::from(5_000u64);
            s.approval_succeeds = false;
        });

        let err = pipeline(chain.clone())
            .execute_trade(TOKEN, &sell(5_000), &point())
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Some(Stage::Approval));
        assert!(matches!(
            err,
            EngineError::Pipeline { ref source, .. }
                if matches!(**source, EngineError::ApprovalFailed { .. })
        ));
        assert_eq!(chain.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_sell_without_approval_is_logic_error() {
        let chain = Arc::new(MockChain::new());
        let intent = SwapIntent {
            action: sell(5_000),
            path: vec![TOKEN, WETH],
            min_out: U256::from(1u64),
            deadline: slippage::deadline_from(slippage::unix_now()),
        };

        let err = pipeline(chain.clone()).execute(&intent).await.unwrap_err();
        assert!(err.to_string().contains("approval stage was skipped"));
        assert!(chain.sent().is_empty());
    }

    #[tokio::test]
    async fn test_reverted_swap_is_transaction_failed() {
        let chain = Arc::new(MockChain::new());
        chain.update(|s| s.swap_succeeds = false);

        let err = pipeline(chain.clone()).execute_trade(TOKEN, &buy(), &point()).await.unwrap_err();

        assert_eq!(err.class(), ErrorClass::Execution);
        assert_eq!(err.stage(), Some(Stage::Confirm));
        assert_eq!(err.tx_hash(), Some(chain.sent()[0].hash));
        assert!(err.to_string().contains("Transaction failed"));
    }

    #[tokio::test]
    async fn test_receipt_timeout_is_transient_and_not_resent() {
        let chain = Arc::new(MockChain::new());
        chain.update(|s| s.receipts_available = false);

        let err = pipeline(chain.clone()).execute_trade(TOKEN, &buy(), &point()).await.unwrap_err();

        assert_eq!(err.class(), ErrorClass::Transient);
        assert!(err.to_string().contains("not available"));
        assert_eq!(chain.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_insufficient_funds_sends_nothing() {
        let chain = Arc::new(MockChain::new());
        chain.update(|s| s.native_balance = U256::from(1u64));

        let err = assert_err!(pipeline(chain.clone()).execute_trade(TOKEN, &buy(), &point()).await);
        assert_eq!(err.stage(), Some(Stage::Preflight));
        assert!(err.to_string().contains("Insufficient funds"));
        assert!(chain.sent().is_empty());
    }

    #[tokio::test]
    async fn test_buy_larger_than_pool_rejected() {
        let chain = Arc::new(MockChain::new());
        let mut shallow = point();
        shallow.liquidity = U256::from(1_000u64);

        let err = pipeline(chain).execute_trade(TOKEN, &buy(), &shallow).await.unwrap_err();
        assert!(err.to_string().contains("Insufficient liquidity"));
    }

    #[tokio::test]
    async fn test_sell_over_balance_rejected() {
        let chain = Arc::new(MockChain::new());
        chain.update(|s| s.token_balance = U256::from(10u64));

        let err = assert_err!(
            pipeline(chain.clone())
                .execute_trade(TOKEN, &sell(11), &point())
                .await
        );
        assert_eq!(err.stage(), Some(Stage::Preflight));
        assert!(err
            .to_string()
            .contains("Insufficient funds. Required: 11, Available: 10"));
        assert!(chain.sent().is_empty());
    }

    #[tokio::test]
    async fn test_sell_deeper_than_pool_rejected() {
        let chain = Arc::new(MockChain::new());
        let ten_tokens = 10_000_000_000_000_000_000u64;
        chain.update(|s| s.token_balance = U256::from(ten_tokens));

        // 10 whole tokens at 1 ETH each against a 5 wei base reserve
        let shallow = PricePoint {
            price: U256::from(1_000_000_000_000_000_000u64),
            liquidity: U256::from(5u64),
            ..point()
        };

        let err = assert_err!(
            pipeline(chain.clone())
                .execute_trade(TOKEN, &sell(ten_tokens), &shallow)
                .await
        );
        assert_eq!(err.stage(), Some(Stage::Preflight));
        assert!(err.to_string().contains("Insufficient liquidity"));
        assert!(err.to_string().contains("Available: 5"));
        assert!(chain.sent().is_empty());
    }

    #[tokio::test]
    async fn test_zero_quote_rejected() {
        let chain = Arc::new(MockChain::new());
        chain.update(|s| s.quote_out = Some(U256::ZERO));

        let err = pipeline(chain.clone()).execute_trade(TOKEN, &buy(), &point()).await.unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Quote));
        assert!(chain.sent().is_empty());
    }

    #[tokio::test]
    async fn test_expired_deadline_not_submitted() {
        let chain = Arc::new(MockChain::new());
        let intent = SwapIntent {
            action: buy(),
            path: vec![WETH, TOKEN],
            min_out: U256::from(1u64),
            deadline: 1,
        };

        let err = pipeline(chain.clone()).execute(&intent).await.unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Submit));
        assert!(err.to_string().contains("deadline"));
        assert!(chain.sent().is_empty());
    }

    #[tokio::test]
    async fn test_gas_ceiling_blocks_trade() {
        let chain = Arc::new(MockChain::new());
        chain.update(|s| s.base_fee = Some(500_000_000_000));

        let err = pipeline(chain.clone()).execute_trade(TOKEN, &buy(), &point()).await.unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Gas));
        assert!(chain.sent().is_empty());
    }
}

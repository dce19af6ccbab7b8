//! Engine configuration
//!
//! All inputs the engine needs (RPC endpoint, wallet key, token, AMM
//! contracts, trading policy) are collected here once at startup, validated,
//! and passed by reference into each component.

use alloy_primitives::{utils::parse_ether, Address, U256};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{EngineError, Result};
use crate::tokens::{TokenAddress, UNISWAP_V2_FACTORY, UNISWAP_V2_ROUTER, WETH};

// ============================================
// EXECUTION MODE
// ============================================

/// Execution mode determines where prices come from and whether trades hit the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Scripted price path, paper fills. No chain access at all
    #[default]
    Simulation,

    /// Real on-chain prices, paper fills
    DryRun,

    /// Real prices, real signed swaps
    /// CAUTION: This uses real funds!
    Production,
}

impl FromStr for ExecutionMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "simulation" | "sim" => Ok(ExecutionMode::Simulation),
            "dry_run" | "dryrun" | "dry-run" => Ok(ExecutionMode::DryRun),
            "production" | "prod" => Ok(ExecutionMode::Production),
            other => Err(EngineError::Config(format!("unknown EXECUTION_MODE '{other}'"))),
        }
    }
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionMode::Simulation => write!(f, "SIMULATION"),
            ExecutionMode::DryRun => write!(f, "DRY_RUN"),
            ExecutionMode::Production => write!(f, "PRODUCTION"),
        }
    }
}

// ============================================
// STRATEGY / GAS MODE
// ============================================

/// Which decision rule table to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Dip-buy, stop-loss, take-profit and scale-out tiers
    #[default]
    Default,

    /// Sell everything at +2%
    QuickExit,
}

impl FromStr for StrategyKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "default" => Ok(StrategyKind::Default),
            "quick_exit" | "quick-exit" | "test" => Ok(StrategyKind::QuickExit),
            other => Err(EngineError::Config(format!("unknown STRATEGY '{other}'"))),
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyKind::Default => write!(f, "default"),
            StrategyKind::QuickExit => write!(f, "quick_exit"),
        }
    }
}

/// Transaction fee model of the target chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GasMode {
    /// Single gas price
    Legacy,

    /// Base fee + priority fee
    #[default]
    Eip1559,
}

impl FromStr for GasMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "legacy" => Ok(GasMode::Legacy),
            "eip1559" | "eip-1559" | "1559" => Ok(GasMode::Eip1559),
            other => Err(EngineError::Config(format!("unknown GAS_MODE '{other}'"))),
        }
    }
}

impl std::fmt::Display for GasMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GasMode::Legacy => write!(f, "legacy"),
            GasMode::Eip1559 => write!(f, "eip1559"),
        }
    }
}

// ============================================
// PRIVATE KEY
// ============================================

/// Wallet private key as configured. Debug output is redacted
#[derive(Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrivateKey(String);

impl PrivateKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub(crate) fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PrivateKey([REDACTED])")
    }
}

// ============================================
// MAIN CONFIGURATION
// ============================================

/// Main configuration struct for the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // ========== Network Settings ==========
    /// JSON-RPC endpoint of the chain node
    pub rpc_url: String,

    /// Chain ID (1 = Ethereum Mainnet)
    pub chain_id: u64,

    // ========== Execution Settings ==========
    pub execution_mode: ExecutionMode,
    pub strategy: StrategyKind,

    /// Token to monitor and trade
    pub token_address: Option<String>,

    /// Trading wallet key (KEEP SECRET!)
    #[serde(skip_serializing)]
    pub wallet_private_key: Option<PrivateKey>,

    /// Reference price to anchor decisions on, in base-asset wei per whole token.
    /// Sampled from the oracle at loop start when unset
    pub initial_price_wei: Option<String>,

    // ========== AMM Contracts ==========
    pub base_asset_address: String,
    pub router_address: String,
    pub factory_address: String,

    // ========== ABI Registry ==========
    pub etherscan_api_key: Option<String>,
    pub abi_api_url: String,

    /// Failed lookups per address before the contract is treated as unresolvable
    pub max_abi_attempts: u32,

    // ========== Trade Policy ==========
    /// Fixed notional of a dip-buy, in ETH
    pub buy_amount_eth: f64,

    /// Slippage tolerance in percent (0.05 = 0.05%)
    pub slippage_percent: f64,

    // ========== Gas Policy ==========
    pub gas_mode: GasMode,

    /// Safety factor applied to the estimated gas limit
    pub gas_multiplier: f64,

    /// Tip on top of the base fee (EIP-1559 only)
    pub priority_fee_gwei: f64,

    /// Abort trades if the effective gas price exceeds this
    pub max_gas_gwei: u64,

    // ========== Timing ==========
    /// Seconds between ticks in dry-run and production
    pub poll_interval_secs: u64,

    /// Milliseconds between ticks in simulation
    pub simulation_interval_millis: u64,

    /// Number of simulated ticks before the run ends
    pub simulation_ticks: u64,

    /// Upper bound for every single RPC call
    pub rpc_timeout_secs: u64,

    /// How long to wait for a receipt before reporting a timeout
    pub confirmation_timeout_secs: u64,
    pub receipt_poll_millis: u64,

    // ========== Telemetry ==========
    /// Append every trade event as JSON to this file
    pub event_log_path: Option<String>,

    pub fiat_price_enabled: bool,
    pub fiat_price_url: String,
}

impl Config {
    /// Load configuration from environment variables and .env file
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        Ok(Self {
            // Network
            rpc_url: env::var("RPC_URL").unwrap_or(defaults.rpc_url),
            chain_id: env_parse("CHAIN_ID", defaults.chain_id)?,

            // Execution
            execution_mode: env_parse("EXECUTION_MODE", defaults.execution_mode)?,
            strategy: env_parse("STRATEGY", defaults.strategy)?,
            token_address: env::var("TOKEN_ADDRESS").ok(),
            wallet_private_key: env::var("WALLET_PRIVATE_KEY").ok().map(PrivateKey::new),
            initial_price_wei: env::var("INITIAL_PRICE_WEI").ok(),

            // Contracts
            base_asset_address: env::var("BASE_ASSET_ADDRESS")
                .unwrap_or(defaults.base_asset_address),
            router_address: env::var("ROUTER_ADDRESS").unwrap_or(defaults.router_address),
            factory_address: env::var("FACTORY_ADDRESS").unwrap_or(defaults.factory_address),

            // ABI registry
            etherscan_api_key: env::var("ETHERSCAN_API_KEY").ok(),
            abi_api_url: env::var("ABI_API_URL").unwrap_or(defaults.abi_api_url),
            max_abi_attempts: env_parse("MAX_ABI_ATTEMPTS", defaults.max_abi_attempts)?,

            // Trade policy
            buy_amount_eth: env_parse("BUY_AMOUNT_ETH", defaults.buy_amount_eth)?,
            slippage_percent: env_parse("SLIPPAGE_PERCENT", defaults.slippage_percent)?,

            // Gas
            gas_mode: env_parse("GAS_MODE", defaults.gas_mode)?,
            gas_multiplier: env_parse("GAS_MULTIPLIER", defaults.gas_multiplier)?,
            priority_fee_gwei: env_parse("PRIORITY_FEE_GWEI", defaults.priority_fee_gwei)?,
            max_gas_gwei: env_parse("MAX_GAS_GWEI", defaults.max_gas_gwei)?,

            // Timing
            poll_interval_secs: env_parse("POLL_INTERVAL_SECS", defaults.poll_interval_secs)?,
            simulation_interval_millis: env_parse(
                "SIMULATION_INTERVAL_MILLIS",
                defaults.simulation_interval_millis,
            )?,
            simulation_ticks: env_parse("SIMULATION_TICKS", defaults.simulation_ticks)?,
            rpc_timeout_secs: env_parse("RPC_TIMEOUT_SECS", defaults.rpc_timeout_secs)?,
            confirmation_timeout_secs: env_parse(
                "CONFIRMATION_TIMEOUT_SECS",
                defaults.confirmation_timeout_secs,
            )?,
            receipt_poll_millis: env_parse("RECEIPT_POLL_MILLIS", defaults.receipt_poll_millis)?,

            // Telemetry
            event_log_path: env::var("EVENT_LOG_PATH").ok().or(defaults.event_log_path),
            fiat_price_enabled: env_parse("FIAT_PRICE_ENABLED", defaults.fiat_price_enabled)?,
            fiat_price_url: env::var("FIAT_PRICE_URL").unwrap_or(defaults.fiat_price_url),
        })
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("cannot read {}: {e}", path.display())))?;
        toml::from_str(&content)
            .map_err(|e| EngineError::Config(format!("cannot parse {}: {e}", path.display())))
    }

    /// Save configuration to a TOML file (the wallet key is never written)
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| EngineError::Config(format!("cannot serialize config: {e}")))?;
        fs::write(path, content).map_err(|e| EngineError::Config(e.to_string()))
    }

    /// Validate configuration. Any error here is fatal at startup
    pub fn validate(&self) -> Result<()> {
        let mode = self.execution_mode;

        if mode != ExecutionMode::Simulation
            && (self.rpc_url.is_empty() || self.rpc_url.contains("YOUR_API_KEY"))
        {
            return Err(EngineError::Config(
                "Invalid RPC_URL - please set a valid node endpoint".into(),
            ));
        }

        self.token()?;
        self.base_asset()?;
        self.router()?;
        self.factory()?;

        if mode == ExecutionMode::Production && self.wallet_private_key.is_none() {
            return Err(EngineError::Config(
                "Production mode requires WALLET_PRIVATE_KEY".into(),
            ));
        }

        if mode != ExecutionMode::Simulation && self.etherscan_api_key.is_none() {
            return Err(EngineError::Config(format!(
                "{mode} mode requires ETHERSCAN_API_KEY for ABI lookups"
            )));
        }

        if let Some(initial) = self.initial_price()? {
            if initial.is_zero() {
                return Err(EngineError::Config("INITIAL_PRICE_WEI must be > 0".into()));
            }
        }

        if self.buy_amount_wei()?.is_zero() {
            return Err(EngineError::Config("BUY_AMOUNT_ETH must be > 0".into()));
        }

        // Sanity checks
        if !(0.0..50.0).contains(&self.slippage_percent) {
            return Err(EngineError::Config(format!(
                "SLIPPAGE_PERCENT should be between 0 and 50 (currently {:.3})",
                self.slippage_percent
            )));
        }
        if !(1.0..=5.0).contains(&self.gas_multiplier) {
            return Err(EngineError::Config(format!(
                "GAS_MULTIPLIER should be between 1.0 and 5.0 (currently {:.2})",
                self.gas_multiplier
            )));
        }
        if self.priority_fee_gwei < 0.0 {
            return Err(EngineError::Config("PRIORITY_FEE_GWEI must be >= 0".into()));
        }
        if self.max_abi_attempts == 0 {
            return Err(EngineError::Config("MAX_ABI_ATTEMPTS must be >= 1".into()));
        }
        if self.rpc_timeout_secs == 0 || self.confirmation_timeout_secs == 0 {
            return Err(EngineError::Config("timeouts must be > 0".into()));
        }

        Ok(())
    }

    // ========== Typed accessors ==========

    pub fn token(&self) -> Result<TokenAddress> {
        let raw = self
            .token_address
            .as_deref()
            .ok_or_else(|| EngineError::Config("TOKEN_ADDRESS is not set".into()))?;
        TokenAddress::parse(raw)
    }

    pub fn base_asset(&self) -> Result<Address> {
        TokenAddress::parse(&self.base_asset_address).map(|t| t.address())
    }

    pub fn router(&self) -> Result<Address> {
        TokenAddress::parse(&self.router_address).map(|t| t.address())
    }

    pub fn factory(&self) -> Result<Address> {
        TokenAddress::parse(&self.factory_address).map(|t| t.address())
    }

    pub fn initial_price(&self) -> Result<Option<U256>> {
        self.initial_price_wei
            .as_deref()
            .map(|raw| {
                U256::from_str(raw.trim())
                    .map_err(|e| EngineError::Config(format!("INITIAL_PRICE_WEI '{raw}': {e}")))
            })
            .transpose()
    }

    pub fn buy_amount_wei(&self) -> Result<U256> {
        parse_ether(&self.buy_amount_eth.to_string())
            .map_err(|e| {
                EngineError::Config(format!("BUY_AMOUNT_ETH {}: {e}", self.buy_amount_eth))
            })
    }

    /// Polling interval for the configured mode
    pub fn tick_interval(&self) -> Duration {
        match self.execution_mode {
            ExecutionMode::Simulation => Duration::from_millis(self.simulation_interval_millis),
            _ => Duration::from_secs(self.poll_interval_secs),
        }
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }

    pub fn receipt_poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_millis)
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        let token = self
            .token()
            .map(|t| t.short())
            .unwrap_or_else(|_| "✗ Not Set".to_string());

        println!("╔════════════════════════════════════════════════════════════╗");
        println!("║              LIMONCELLO - CONFIGURATION                    ║");
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ Execution Mode:    {:^40} ║", self.execution_mode);
        println!("║ Strategy:          {:^40} ║", self.strategy);
        println!("║ Chain ID:          {:^40} ║", self.chain_id);
        println!("║ Token:             {:^40} ║", token);
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ TRADE POLICY                                               ║");
        println!("║ • Buy Amount:      {:>36.4} ETH ║", self.buy_amount_eth);
        println!("║ • Slippage:        {:>39.3}% ║", self.slippage_percent);
        println!(
            "║ • Initial Price:   {:^40} ║",
            self.initial_price_wei.as_deref().unwrap_or("sampled at start")
        );
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ GAS                                                        ║");
        println!("║ • Mode:            {:^40} ║", self.gas_mode);
        println!("║ • Limit Factor:    {:>39.2}x ║", self.gas_multiplier);
        println!("║ • Priority Fee:    {:>35.2} gwei ║", self.priority_fee_gwei);
        println!("║ • Max Gas:         {:>35} gwei ║", self.max_gas_gwei);
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ TIMING                                                     ║");
        println!(
            "║ • Tick Interval:   {:^40} ║",
            format!("{:?}", self.tick_interval())
        );
        println!("║ • Confirm Timeout: {:>38}s ║", self.confirmation_timeout_secs);
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ CREDENTIALS                                                ║");
        println!(
            "║ • Wallet Key:      {:^40} ║",
            configured(self.wallet_private_key.is_some())
        );
        println!(
            "║ • Etherscan API:   {:^40} ║",
            configured(self.etherscan_api_key.is_some())
        );
        println!(
            "║ • Event Log:       {:^40} ║",
            self.event_log_path.as_deref().unwrap_or("✗ Disabled")
        );
        println!("╚════════════════════════════════════════════════════════════╝");
    }
}

fn configured(set: bool) -> &'static str {
    if set {
        "✓ Configured"
    } else {
        "✗ Not Set"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_url: "https://eth.llamarpc.com".to_string(),
            chain_id: 1,
            execution_mode: ExecutionMode::Simulation,
            strategy: StrategyKind::Default,
            token_address: None,
            wallet_private_key: None,
            initial_price_wei: None,
            base_asset_address: WETH.to_checksum(None),
            router_address: UNISWAP_V2_ROUTER.to_checksum(None),
            factory_address: UNISWAP_V2_FACTORY.to_checksum(None),
            etherscan_api_key: None,
            abi_api_url: "https://api.etherscan.io/v2/api".to_string(),
            max_abi_attempts: 3,
            buy_amount_eth: 0.01,
            slippage_percent: 0.05,
            gas_mode: GasMode::Eip1559,
            gas_multiplier: 1.2,
            priority_fee_gwei: 1.5,
            max_gas_gwei: 100,
            poll_interval_secs: 60,
            simulation_interval_millis: 500,
            simulation_ticks: 100,
            rpc_timeout_secs: 10,
            confirmation_timeout_secs: 180,
            receipt_poll_millis: 2_000,
            event_log_path: Some("./logs/trade_events.jsonl".to_string()),
            fiat_price_enabled: false,
            fiat_price_url: "https://api.coingecko.com/api/v3/simple/price".to_string(),
        }
    }
}

/// Parse an env var, falling back to a default when unset. A value that is
/// set but unparsable is a configuration error
fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| EngineError::Config(format!("{key}='{raw}': {e}"))),
        Err(_) => Ok(default),
    }
}

// ============================================
// TESTS
// ============================================

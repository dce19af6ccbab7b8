//! Limoncello - Single-Token AMM Trading Engine
//!
//! Run with: cargo run -- --token 0x... --mode simulation
//!
//! Modes:
//! - simulation: scripted market, paper fills, no chain access
//! - dry_run: real on-chain prices, paper fills
//! - production: real prices, signed swaps (REAL FUNDS)

use alloy_primitives::{utils::format_ether, U256};
use clap::Parser;
use color_eyre::eyre::{eyre, Result};
use console::style;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use limoncello::brain::DecisionEngine;
use limoncello::cartographer::{ContractDirectory, EtherscanAbiSource, PriceOracle, PriceSource};
use limoncello::chain::{ChainReader, RpcChainClient};
use limoncello::config::{Config, ExecutionMode, StrategyKind};
use limoncello::engine::{
    spawn_shutdown_listener, ConsoleSink, EventSink, FanoutSink, JsonlFileSink, StopReason,
    TracingSink, TradingLoop,
};
use limoncello::executor::signer::{LocalSigner, TransactionSigner};
use limoncello::executor::{PipelineSettings, TradeExecutor, TransactionPipeline};
use limoncello::gas_oracle::GasOracle;
use limoncello::price_feed::FiatPriceFeed;
use limoncello::simulator::{
    PaperExecutor, SimulatedMarket, DEFAULT_PAPER_BALANCE_WEI, DEFAULT_SIMULATED_PRICE_WEI,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Limoncello - single-token AMM trading engine")]
struct Cli {
    /// TOML config file (default: environment / .env)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Token to trade (overrides TOKEN_ADDRESS)
    #[arg(long)]
    token: Option<String>,

    /// simulation | dry_run | production (overrides EXECUTION_MODE)
    #[arg(long)]
    mode: Option<ExecutionMode>,

    /// default | quick_exit (overrides STRATEGY)
    #[arg(long)]
    strategy: Option<StrategyKind>,
}

fn print_banner() {
    println!();
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").yellow()
    );
    println!(
        "{}",
        style(" 🍋 LIMONCELLO - Single-Token AMM Trading Engine").yellow().bold()
    );
    println!(
        "{}",
        style("    Uniswap V2 | Rule-Based Exits | Local Signing").yellow()
    );
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").yellow()
    );
    println!();
}

fn init_tracing() -> Result<()> {
    let filter =
        tracing_subscriber::EnvFilter::from_default_env().add_directive("limoncello=info".parse()?);

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer())
            .with(filter)
            .init();
    }
    Ok(())
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            let mut config = Config::from_file(path)?;
            // The key is never written to config files
            if config.wallet_private_key.is_none() {
                config.wallet_private_key = Config::from_env()?.wallet_private_key;
            }
            config
        }
        None => Config::from_env()?,
    };

    if let Some(token) = &cli.token {
        config.token_address = Some(token.clone());
    }
    if let Some(mode) = cli.mode {
        config.execution_mode = mode;
    }
    if let Some(strategy) = cli.strategy {
        config.strategy = strategy;
    }
    Ok(config)
}

fn build_sink(config: &Config) -> Arc<dyn EventSink> {
    let mut sink = FanoutSink::new()
        .with(Arc::new(TracingSink))
        .with(Arc::new(ConsoleSink));

    if let Some(path) = &config.event_log_path {
        info!("📝 Trade events appended to {}", path);
        sink = sink.with(Arc::new(JsonlFileSink::new(path)));
    }
    Arc::new(sink)
}

/// Connect to the node and make sure it serves the configured chain
async fn connect(config: &Config) -> Result<Arc<RpcChainClient>> {
    let client = RpcChainClient::connect(&config.rpc_url, config.rpc_timeout())?;
    let chain_id = client.chain_id().await?;
    if chain_id != config.chain_id {
        return Err(eyre!(
            "RPC endpoint serves chain {} but CHAIN_ID is {}",
            chain_id,
            config.chain_id
        ));
    }
    println!("{} Connected to chain {}", style("✓").green(), chain_id);
    Ok(Arc::new(client))
}

fn build_directory(config: &Config, chain: Arc<RpcChainClient>) -> Result<Arc<ContractDirectory>> {
    let api_key = config
        .etherscan_api_key
        .clone()
        .ok_or_else(|| eyre!("ETHERSCAN_API_KEY is required outside simulation"))?;
    let registry = EtherscanAbiSource::new(config.abi_api_url.clone(), api_key, config.chain_id)?;

    Ok(Arc::new(ContractDirectory::new(
        chain,
        Arc::new(registry),
        config.router()?,
        config.factory()?,
        config.max_abi_attempts,
    )))
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();
    init_tracing()?;

    let cli = Cli::parse();
    print_banner();

    // Load configuration
    let config = load_config(&cli)?;

    // Validate configuration
    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        error!("Please check your .env file or --config");
        return Err(e.into());
    }

    // Print configuration summary
    config.print_summary();
    println!();

    let token = config.token()?;
    let decisions = DecisionEngine::new(config.strategy, config.buy_amount_wei()?);
    let sink = build_sink(&config);
    let fiat = if config.fiat_price_enabled {
        Some(Arc::new(FiatPriceFeed::new(config.fiat_price_url.clone())?))
    } else {
        None
    };

    let (prices, executor, initial_price, max_ticks): (
        Arc<dyn PriceSource>,
        Arc<dyn TradeExecutor>,
        Option<U256>,
        Option<u64>,
    ) = match config.execution_mode {
        ExecutionMode::Simulation => {
            let initial = config
                .initial_price()?
                .unwrap_or(U256::from(DEFAULT_SIMULATED_PRICE_WEI));
            let seed = rand::random::<u64>();

            println!(
                "{} Mode: {} - scripted market (seed {}), paper fills",
                style("📋").cyan(),
                style("SIMULATION").cyan().bold(),
                seed
            );

            (
                Arc::new(SimulatedMarket::new(initial, seed)),
                Arc::new(PaperExecutor::new(U256::from(DEFAULT_PAPER_BALANCE_WEI))),
                Some(initial),
                Some(config.simulation_ticks),
            )
        }

        ExecutionMode::DryRun => {
            println!(
                "{} Mode: {} - live prices, paper fills",
                style("🔬").yellow(),
                style("DRY RUN").yellow().bold()
            );

            let chain = connect(&config).await?;
            let directory = build_directory(&config, chain)?;

            (
                Arc::new(PriceOracle::new(directory, config.base_asset()?)),
                Arc::new(PaperExecutor::new(U256::from(DEFAULT_PAPER_BALANCE_WEI))),
                config.initial_price()?,
                None,
            )
        }

        ExecutionMode::Production => {
            println!(
                "{} Mode: {} - LIVE EXECUTION",
                style("🚀").red(),
                style("PRODUCTION").red().bold()
            );
            warn!("⚠️  This mode uses real funds!");

            let key = config
                .wallet_private_key
                .as_ref()
                .ok_or_else(|| eyre!("Production mode requires WALLET_PRIVATE_KEY"))?;
            let signer = Arc::new(LocalSigner::new(key)?);

            let chain = connect(&config).await?;
            let balance = chain.balance(signer.address()).await?;
            println!(
                "{} Wallet {:?} holds {} ETH",
                style("✓").green(),
                signer.address(),
                format_ether(balance)
            );

            let directory = build_directory(&config, chain.clone())?;
            let pipeline = TransactionPipeline::new(
                chain.clone(),
                chain,
                signer,
                directory.clone(),
                GasOracle::from_config(&config),
                PipelineSettings::from_config(&config)?,
            );

            (
                Arc::new(PriceOracle::new(directory, config.base_asset()?)),
                Arc::new(pipeline),
                config.initial_price()?,
                None,
            )
        }
    };

    // Ctrl-C or SIGTERM stops the loop at its next sleep, never mid-trade
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    spawn_shutdown_listener(shutdown_tx);

    let report = TradingLoop::new(token, prices, executor, decisions, sink, config.tick_interval())
        .with_initial_price(initial_price)
        .with_max_ticks(max_ticks)
        .with_fiat_feed(fiat)
        .run(shutdown_rx)
        .await;

    // =============================================
    // SUMMARY
    // =============================================
    println!();
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").green()
    );
    println!("{}", style(format!(" 🍋 RUN COMPLETE ({})", report.reason)).green().bold());
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").green()
    );
    println!();
    println!("Summary:");
    println!("  • Ticks: {}", report.stats.ticks);
    println!("  • Trades: {}", report.stats.trades);
    println!("  • Holds: {}", report.stats.holds);
    println!("  • Failed trades: {}", report.stats.errors);
    println!("  • Skipped ticks: {}", report.stats.skipped);
    println!("  • Execution mode: {}", config.execution_mode);
    println!();

    match report.reason {
        StopReason::Fatal(reason) => Err(eyre!("trading loop stopped: {reason}")),
        _ => Ok(()),
    }
}

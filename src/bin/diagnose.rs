//! Diagnostic tool - Check system status
//!
//! Run with: cargo run --bin diagnose
//!
//! Loads the same configuration the engine would, validates it and, outside
//! simulation, checks the RPC endpoint and wallet.

use alloy_primitives::utils::format_ether;
use color_eyre::eyre::Result;
use console::style;
use std::env;

use limoncello::chain::{ChainReader, RpcChainClient};
use limoncello::config::{Config, ExecutionMode};
use limoncello::executor::signer::{LocalSigner, TransactionSigner};

fn section(title: &str) {
    println!("\n═══════════════════════════════════════════════════");
    println!("  {}", title);
    println!("═══════════════════════════════════════════════════\n");
}

fn mark(ok: bool) -> console::StyledObject<&'static str> {
    if ok {
        style("✅ Set").green()
    } else {
        style("❌ Not set").red()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();

    println!("🔍 LIMONCELLO DIAGNOSTIC CHECK");

    let config = Config::from_env()?;

    section("CONFIGURATION");
    config.print_summary();

    let rpc_display = if config.rpc_url.len() > 50 {
        format!(
            "{}...{}",
            &config.rpc_url[..30],
            &config.rpc_url[config.rpc_url.len() - 15..]
        )
    } else {
        config.rpc_url.clone()
    };
    println!("\n  RPC_URL: {}", rpc_display);
    println!(
        "  LOG_FORMAT: {}",
        env::var("LOG_FORMAT").unwrap_or_else(|_| "text (default)".to_string())
    );

    section("VALIDATION");
    let valid = match config.validate() {
        Ok(()) => {
            println!("  {} Configuration is valid", style("✓").green());
            true
        }
        Err(e) => {
            println!("  {} {}", style("✗").red(), e);
            false
        }
    };

    section("PRODUCTION READINESS");
    println!("  WALLET_PRIVATE_KEY: {}", mark(config.wallet_private_key.is_some()));
    println!("  ETHERSCAN_API_KEY:  {}", mark(config.etherscan_api_key.is_some()));
    println!("  TOKEN_ADDRESS:      {}", mark(config.token_address.is_some()));

    section("STATUS");
    match config.execution_mode {
        ExecutionMode::Simulation => {
            println!("  📋 SIMULATION MODE");
            println!("     → Scripted market, {} ticks", config.simulation_ticks);
            println!("     → Paper fills only, no RPC access");
            println!("     → Your money: SAFE");
        }
        ExecutionMode::DryRun => {
            println!("  🔬 DRY RUN MODE");
            println!("     → Real on-chain prices");
            println!("     → Paper fills, nothing is signed");
            println!("     → Your money: SAFE");
        }
        ExecutionMode::Production => {
            println!("  🚀 PRODUCTION MODE");
            println!("     → Engine WILL sign and broadcast swaps!");
            println!("     → Your money: AT RISK");
        }
    }

    if valid && config.execution_mode != ExecutionMode::Simulation {
        section("CONNECTIVITY");
        let client = RpcChainClient::connect(&config.rpc_url, config.rpc_timeout())?;
        match client.chain_id().await {
            Ok(id) if id == config.chain_id => {
                println!("  {} RPC serves chain {}", style("✓").green(), id)
            }
            Ok(id) => println!(
                "  {} RPC serves chain {} but CHAIN_ID is {}",
                style("✗").red(),
                id,
                config.chain_id
            ),
            Err(e) => println!("  {} RPC unreachable: {}", style("✗").red(), e),
        }

        if let Some(key) = &config.wallet_private_key {
            let signer = LocalSigner::new(key)?;
            match client.balance(signer.address()).await {
                Ok(balance) => println!(
                    "  {} Wallet {:?}: {} ETH",
                    style("✓").green(),
                    signer.address(),
                    format_ether(balance)
                ),
                Err(e) => println!("  {} Balance lookup failed: {}", style("✗").red(), e),
            }
        }
    }

    if valid {
        println!("\n✅ Diagnostic complete!\n");
    } else {
        println!("\n⚠️  Fix the configuration errors above before running the engine.\n");
    }
    Ok(())
}

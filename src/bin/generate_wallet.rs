//! Wallet Generation Utility
//!
//! Run with: cargo run --bin generate-wallet
//!
//! Generates a fresh trading wallet for production mode. Fund it with only
//! what the engine is allowed to trade.

use limoncello::executor::signer::generate_new_wallet;

fn main() {
    println!();
    println!("╔════════════════════════════════════════════════════════════╗");
    println!("║          LIMONCELLO WALLET GENERATOR                       ║");
    println!("╚════════════════════════════════════════════════════════════╝");
    println!();

    let (private_key, address) = generate_new_wallet();

    println!("🔑 NEW WALLET GENERATED");
    println!();
    println!("   Address:     {:?}", address);
    println!("   Private Key: {}", private_key);
    println!();
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();
    println!("⚠️  SECURITY WARNINGS:");
    println!();
    println!("   1. NEVER share your private key with anyone");
    println!("   2. NEVER commit it to git or put it in a TOML config file");
    println!("   3. Store it securely (password manager, encrypted file)");
    println!();
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();
    println!("📝 TO USE THIS WALLET (add to .env):");
    println!();
    println!("   WALLET_PRIVATE_KEY={}", private_key);
    println!("   EXECUTION_MODE=production");
    println!();
    println!("💡 The wallet needs ETH for dip-buys and for gas on approvals and swaps.");
    println!("   Run `cargo run --bin diagnose` before the first production run.");
    println!();
}

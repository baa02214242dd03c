//! Closest-guess market example
//!
//! This example walks one market through its whole lifecycle: three bettors commit to hidden
//! guesses, the owner declares the result, everyone reveals, and the pool is split among the
//! closest guesses.

use anyhow::Result;
use guessr_core::{
    commitment::{sign_guess, signing_message},
    utils::*,
    Identity, ManualClock, Market, MarketConfig, MarketEngine,
};
use secp256k1::SecretKey;

const ONE_DAY: u64 = 24 * 60 * 60;
const STAKE: u64 = 100_000;

fn main() -> Result<()> {
    println!("🎯 Closest-Guess Market Example");
    println!("═══════════════════════════════\n");

    let start = 1_735_689_600;
    let clock = ManualClock::new(start);

    let owner_key = SecretKey::from_slice(&[0x11; 32])?;
    let owner = Identity::from_secret_key(&owner_key);
    let bettors = [("Alice", 96_250), ("Bob", 97_750), ("Charlie", 97_750)]
        .iter()
        .enumerate()
        .map(|(i, (name, guess))| -> Result<(&str, SecretKey, Identity, i64)> {
            let key = SecretKey::from_slice(&[0x21 + i as u8; 32])?;
            Ok((*name, key, Identity::from_secret_key(&key), *guess))
        })
        .collect::<Result<Vec<_>>>()?;

    // 1. Open the market
    println!("1. Opening the market...");
    let mut engine =
        MarketEngine::with_clock(Market::new(owner, MarketConfig::default()), clock.clone());
    let market_id = engine.open_market(
        &owner,
        start + ONE_DAY,
        STAKE,
        "BTC price in USD in 24 hours".to_string(),
    )?;
    println!("   Market ID: {}", market_id);
    println!("   Betting closes: {}", format_timestamp(start + ONE_DAY));
    println!("   Stake: {} sats ({} BTC)", STAKE, satoshi_to_btc(STAKE));
    println!();

    // 2. Bettors commit to hidden guesses
    println!("2. Placing sealed bets...");
    let nonce = engine.market().nonce();
    let mut signatures = Vec::new();
    for (name, key, identity, guess) in &bettors {
        let (signature, commitment) = sign_guess(key, *guess, nonce);
        engine.bet(identity, commitment, STAKE)?;
        signatures.push(signature);
        println!("   {} signed {}", name, signing_message(*guess, nonce));
        println!("   {} committed {}", name, commitment);
    }
    println!("   Pool: {} sats", engine.market().betting_pool());
    println!();

    // 3. Declare the result once betting is over
    println!("3. Declaring the result...");
    clock.advance(ONE_DAY);
    let result = 97_500;
    engine.declare_result(&owner, result)?;
    println!("   Result: {}", result);
    println!("   Status: {}", engine.status());
    println!();

    // 4. Reveal
    println!("4. Revealing guesses...");
    for ((name, _, identity, guess), signature) in bettors.iter().zip(&signatures) {
        engine.reveal(identity, *guess, signature)?;
        println!(
            "   {} revealed {} (distance {})",
            name,
            guess,
            guess.abs_diff(result)
        );
    }
    println!();

    // 5. Close and settle
    println!("5. Closing the reveal window...");
    clock.advance(ONE_DAY);
    let settlement = engine.close_revealing(&owner)?;
    for payout in &settlement.payouts {
        let name = bettors
            .iter()
            .find(|(_, _, identity, _)| *identity == payout.recipient)
            .map(|(name, ..)| *name)
            .unwrap_or("unknown");
        println!(
            "   {} receives {} sats ({} BTC)",
            name,
            payout.amount,
            satoshi_to_btc(payout.amount)
        );
    }
    println!("   Next nonce: {}", engine.market().nonce());
    println!();

    println!("✅ Example completed successfully!");
    Ok(())
}

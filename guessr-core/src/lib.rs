//! # Guessr Core
//!
//! Core Rust library for commit-reveal closest-guess betting markets.
//!
//! This library provides a single, sequentially reusable market where:
//! - The owner opens a market with a betting deadline and a fixed stake
//! - Bettors commit to a hidden numeric guess by signing it with a Bitcoin key
//! - The owner declares the true outcome after betting closes
//! - Bettors reveal; the closest guesses split the pool
//!
//! ## Features
//!
//! - **Market Lifecycle**: `Closed -> Open -> ResultDeclared -> Closed` state machine
//! - **Commit-Reveal**: Commitments are hashes of recoverable signatures over `(guess, nonce)`
//! - **Replay Protection**: The nonce advances every lifecycle, invalidating old signatures
//! - **Winner Selection**: Minimal absolute distance, ties split the pool evenly
//! - **Serialized Access**: `SharedEngine` guards the market with a single lock
//!
//! ## Examples
//!
//! ```rust
//! use guessr_core::{commitment::sign_guess, Market, MarketConfig, Identity};
//! use secp256k1::SecretKey;
//!
//! let owner_key = SecretKey::from_slice(&[7u8; 32])?;
//! let bettor_key = SecretKey::from_slice(&[9u8; 32])?;
//! let owner = Identity::from_secret_key(&owner_key);
//! let bettor = Identity::from_secret_key(&bettor_key);
//!
//! let now = 1_735_689_600;
//! let mut market = Market::new(owner, MarketConfig::default());
//! market.open_market(&owner, now, now + 86_400, 100_000, "BTC/USD tomorrow".to_string())?;
//!
//! // The bettor keeps the signature secret and bets with its hash.
//! let (signature, commitment) = sign_guess(&bettor_key, 97_000, market.nonce());
//! market.bet(&bettor, now, commitment, 100_000)?;
//!
//! market.declare_result(&owner, now + 86_400, 96_500)?;
//! market.reveal(&bettor, now + 86_400, 97_000, &signature)?;
//!
//! let settlement = market.close_revealing(&owner, now + 2 * 86_400)?;
//! assert_eq!(settlement.payouts[0].amount, 100_000);
//! Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod clock;
pub mod commitment;
pub mod config;
pub mod engine;
pub mod error;
pub mod identity;
pub mod market;
pub mod utils;
pub mod winners;

#[cfg(test)]
mod test_utils;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::MarketConfig;
pub use engine::{MarketEngine, SharedEngine};
pub use error::{MarketError, Result};
pub use identity::Identity;
pub use market::{Commitment, Market, MarketPhase, Settlement};
pub use utils::*;
pub use winners::{closest_guesses, split_pool, Payout};

/// Default time bettors have to reveal once the result is declared (1 day)
pub const DEFAULT_REVEAL_PERIOD: u64 = 86_400;

/// Default minimum stake (1 satoshi)
pub const DEFAULT_MIN_STAKE: u64 = 1;

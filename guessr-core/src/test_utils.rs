//! Common test utilities for guessr-core tests.
//!
//! Deterministic keys, identities and an opened market fixture shared across modules.

use crate::{
    commitment::sign_guess, config::MarketConfig, identity::Identity, market::Market,
};
use bitcoin::{hashes::sha256, sign_message::MessageSignature};
use secp256k1::SecretKey;

/// A participant with a deterministic key.
#[derive(Clone, Debug)]
pub struct Bettor {
    pub secret_key: SecretKey,
    pub identity: Identity,
}

impl Bettor {
    /// Uses deterministic key generation based on the index for reproducible tests.
    pub fn new(index: u8) -> Self {
        let mut secret_bytes = [0u8; 32];
        secret_bytes[0] = index;
        secret_bytes[31] = index;
        let secret_key = SecretKey::from_slice(&secret_bytes).unwrap();
        let identity = Identity::from_secret_key(&secret_key);
        Self {
            secret_key,
            identity,
        }
    }

    /// Signature and commitment hash for `guess` at `nonce`.
    pub fn commit(&self, guess: i64, nonce: u64) -> (MessageSignature, sha256::Hash) {
        sign_guess(&self.secret_key, guess, nonce)
    }
}

/// `count` distinct identities, starting at key index 1.
pub fn identities(count: u8) -> Vec<Identity> {
    (1..=count).map(|i| Bettor::new(i).identity).collect()
}

/// The market owner used by fixtures
pub fn owner() -> Bettor {
    Bettor::new(200)
}

/// A closed market owned by [`owner`] with default configuration.
pub fn create_test_market() -> Market {
    Market::new(owner().identity, MarketConfig::default())
}

/// A market opened at [`constants::START`], betting until one day later.
pub fn create_open_test_market() -> Market {
    let mut market = create_test_market();
    market
        .open_market(
            &owner().identity,
            constants::START,
            constants::START + constants::ONE_DAY,
            constants::STAKE,
            constants::DESCRIPTION.to_string(),
        )
        .unwrap();
    market
}

/// Common test constants
pub mod constants {
    /// Jan 1, 2025
    pub const START: u64 = 1_735_689_600;

    pub const ONE_DAY: u64 = 24 * 60 * 60;

    /// Stake per bet in satoshis
    pub const STAKE: u64 = 100_000;

    pub const DESCRIPTION: &str = "BTC price in USD in 24 hours";
}

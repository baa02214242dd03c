//! # Market Engine
//!
//! [`MarketEngine`] pairs a [`Market`] with a [`Clock`]. Each operation reads the clock once and
//! forwards to the market, so deadlines within one call are judged against a single instant.
//!
//! [`SharedEngine`] puts the engine behind one exclusive lock for multi-threaded hosts. The lock
//! is held for the whole transition, which gives every call the same serialized view a
//! single-threaded event loop would.

use crate::{
    clock::{Clock, SystemClock},
    config::MarketConfig,
    error::Result,
    identity::Identity,
    market::{Market, Settlement},
};
use bitcoin::{hashes::sha256, sign_message::MessageSignature};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

/// A market driven by a time source.
#[derive(Debug)]
pub struct MarketEngine<C: Clock = SystemClock> {
    market: Market,
    clock: C,
}

impl MarketEngine<SystemClock> {
    /// Creates a closed market owned by `owner`, using the wall clock.
    pub fn new(owner: Identity, config: MarketConfig) -> Self {
        Self::with_clock(Market::new(owner, config), SystemClock)
    }
}

impl<C: Clock> MarketEngine<C> {
    /// Drive an existing market (for example one restored from a snapshot) with `clock`.
    pub fn with_clock(market: Market, clock: C) -> Self {
        Self { market, clock }
    }

    pub fn market(&self) -> &Market {
        &self.market
    }

    pub fn into_market(self) -> Market {
        self.market
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    pub fn open_market(
        &mut self,
        caller: &Identity,
        close_time: u64,
        stake_amount: u64,
        description: String,
    ) -> Result<Uuid> {
        let now = self.clock.now();
        self.market
            .open_market(caller, now, close_time, stake_amount, description)
    }

    pub fn bet(
        &mut self,
        caller: &Identity,
        commitment_hash: sha256::Hash,
        stake: u64,
    ) -> Result<()> {
        let now = self.clock.now();
        self.market.bet(caller, now, commitment_hash, stake)
    }

    pub fn declare_result(&mut self, caller: &Identity, result: i64) -> Result<()> {
        let now = self.clock.now();
        self.market.declare_result(caller, now, result)
    }

    pub fn reveal(
        &mut self,
        caller: &Identity,
        guess: i64,
        signature: &MessageSignature,
    ) -> Result<()> {
        let now = self.clock.now();
        self.market.reveal(caller, now, guess, signature)
    }

    pub fn close_revealing(&mut self, caller: &Identity) -> Result<Settlement> {
        let now = self.clock.now();
        self.market.close_revealing(caller, now)
    }

    pub fn transfer_ownership(&mut self, caller: &Identity, new_owner: Identity) -> Result<()> {
        self.market.transfer_ownership(caller, new_owner)
    }

    /// Get market status summary
    pub fn status(&self) -> String {
        self.market.status(self.clock.now())
    }
}

/// Cloneable, thread-safe handle to one engine.
#[derive(Debug)]
pub struct SharedEngine<C: Clock = SystemClock> {
    inner: Arc<Mutex<MarketEngine<C>>>,
}

impl<C: Clock> Clone for SharedEngine<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Clock> SharedEngine<C> {
    pub fn new(engine: MarketEngine<C>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    /// Lock the engine for the duration of one operation.
    ///
    /// Operations never leave a half-applied transition, so a poisoned lock still guards a
    /// consistent market and is recovered.
    pub fn lock(&self) -> MutexGuard<'_, MarketEngine<C>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn open_market(
        &self,
        caller: &Identity,
        close_time: u64,
        stake_amount: u64,
        description: String,
    ) -> Result<Uuid> {
        self.lock()
            .open_market(caller, close_time, stake_amount, description)
    }

    pub fn bet(&self, caller: &Identity, commitment_hash: sha256::Hash, stake: u64) -> Result<()> {
        self.lock().bet(caller, commitment_hash, stake)
    }

    pub fn declare_result(&self, caller: &Identity, result: i64) -> Result<()> {
        self.lock().declare_result(caller, result)
    }

    pub fn reveal(&self, caller: &Identity, guess: i64, signature: &MessageSignature) -> Result<()> {
        self.lock().reveal(caller, guess, signature)
    }

    pub fn close_revealing(&self, caller: &Identity) -> Result<Settlement> {
        self.lock().close_revealing(caller)
    }

    /// Copy of the market as it is between operations.
    pub fn snapshot(&self) -> Market {
        self.lock().market().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::ManualClock,
        test_utils::{constants::*, *},
        MarketError,
    };
    use std::thread;

    fn engine_at(clock: &ManualClock) -> MarketEngine<ManualClock> {
        MarketEngine::with_clock(create_test_market(), clock.clone())
    }

    #[test]
    fn test_engine_lifecycle_with_clock() {
        let clock = ManualClock::new(START);
        let mut engine = engine_at(&clock);
        let owner = owner().identity;
        let alice = Bettor::new(1);

        engine
            .open_market(&owner, START + ONE_DAY, STAKE, DESCRIPTION.to_string())
            .unwrap();
        let (signature, commitment) = alice.commit(299, engine.market().nonce());
        engine.bet(&alice.identity, commitment, STAKE).unwrap();

        // Result cannot be declared while betting is still open.
        assert!(matches!(
            engine.declare_result(&owner, 300),
            Err(MarketError::TooEarly { .. })
        ));

        clock.advance(ONE_DAY);
        assert!(matches!(
            engine.bet(&Bettor::new(2).identity, commitment, STAKE),
            Err(MarketError::TooLate { .. })
        ));
        engine.declare_result(&owner, 300).unwrap();
        engine.reveal(&alice.identity, 299, &signature).unwrap();

        assert!(matches!(
            engine.close_revealing(&owner),
            Err(MarketError::TooEarly { .. })
        ));
        clock.advance(ONE_DAY);
        let settlement = engine.close_revealing(&owner).unwrap();

        assert_eq!(settlement.winners, vec![alice.identity]);
        assert_eq!(settlement.payouts[0].amount, STAKE);
        assert_eq!(engine.market().nonce(), 1);
        assert_eq!(engine.status(), "Closed - No market running");
    }

    #[test]
    fn test_shared_engine_serializes_concurrent_bets() {
        let clock = ManualClock::new(START);
        let shared = SharedEngine::new(engine_at(&clock));
        shared
            .open_market(&owner().identity, START + ONE_DAY, STAKE, String::new())
            .unwrap();

        let handles: Vec<_> = (1..=8u8)
            .map(|i| {
                let shared = shared.clone();
                thread::spawn(move || {
                    let bettor = Bettor::new(i);
                    let (_, commitment) = bettor.commit(i as i64, 0);
                    // Every bettor tries twice; only the first may land.
                    let first = shared.bet(&bettor.identity, commitment, STAKE);
                    let second = shared.bet(&bettor.identity, commitment, STAKE);
                    (first.is_ok(), second.is_err())
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), (true, true));
        }

        let market = shared.snapshot();
        assert_eq!(market.bettor_count(), 8);
        assert_eq!(market.betting_pool(), 8 * STAKE);
    }

    #[test]
    fn test_shared_engine_full_cycle() {
        let clock = ManualClock::new(START);
        let shared = SharedEngine::new(engine_at(&clock));
        let owner = owner().identity;
        let alice = Bettor::new(1);
        let bob = Bettor::new(2);

        shared
            .open_market(&owner, START + ONE_DAY, STAKE, String::new())
            .unwrap();
        let (sig_alice, commit_alice) = alice.commit(305, 0);
        let (sig_bob, commit_bob) = bob.commit(295, 0);
        shared.bet(&alice.identity, commit_alice, STAKE).unwrap();
        shared.bet(&bob.identity, commit_bob, STAKE).unwrap();

        clock.advance(ONE_DAY);
        shared.declare_result(&owner, 300).unwrap();
        shared.reveal(&bob.identity, 295, &sig_bob).unwrap();
        shared.reveal(&alice.identity, 305, &sig_alice).unwrap();

        clock.advance(ONE_DAY);
        let settlement = shared.close_revealing(&alice.identity).unwrap();
        assert_eq!(settlement.winners, vec![bob.identity, alice.identity]);
        assert_eq!(
            settlement.payouts.iter().map(|p| p.amount).sum::<u64>(),
            2 * STAKE
        );
    }
}

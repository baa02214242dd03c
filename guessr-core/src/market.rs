//! # Closest-Guess Market
//!
//! This module implements the market state machine. A market cycles through
//!
//! ```text
//! Closed --open_market--> Open --declare_result--> ResultDeclared --close_revealing--> Closed
//! ```
//!
//! Bets are accepted while `Open`, reveals while `ResultDeclared`. Every operation validates all
//! of its preconditions before touching any field, so a rejected call leaves the market exactly
//! as it was.
//!
//! Operations take the caller identity and the current time explicitly; see
//! [`MarketEngine`](crate::engine::MarketEngine) for the variant that reads a [`Clock`](crate::Clock).

use crate::{
    commitment::{commitment_hash, recover_signer},
    config::MarketConfig,
    error::Result,
    identity::Identity,
    winners::{distance, refund_stakes, split_pool, Payout, WinnerTracker},
    MarketError,
};
use bitcoin::{hashes::sha256, sign_message::MessageSignature};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Lifecycle phase of the market.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MarketPhase {
    /// No market running; initial state and end of every cycle
    #[default]
    Closed,
    /// Accepting bets until the close time
    Open,
    /// Result known, accepting reveals until the reveal deadline
    ResultDeclared,
}

impl fmt::Display for MarketPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MarketPhase::Closed => "Closed",
            MarketPhase::Open => "Open",
            MarketPhase::ResultDeclared => "ResultDeclared",
        };
        f.write_str(name)
    }
}

/// A bettor's sealed guess
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Commitment {
    /// SHA-256 of the bettor's reveal signature
    pub commitment_hash: sha256::Hash,

    /// Set once the commitment has been revealed successfully
    pub revealed: bool,
}

/// Outcome of a closed reveal phase. The host executes `payouts` against its ledger.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Settlement {
    /// Market the settlement belongs to
    pub market_id: Option<Uuid>,

    /// Nonce of the lifecycle that was settled
    pub nonce: u64,

    /// Declared result
    pub result: i64,

    /// Closest revealers, in reveal order
    pub winners: Vec<Identity>,

    /// Transfers out of the pool; they always sum to the pool
    pub payouts: Vec<Payout>,

    /// True when nobody revealed and stakes were returned
    pub refunded: bool,
}

/// The single commit-reveal betting market.
///
/// The owner opens a market with a close time and a fixed stake. Bettors submit commitments
/// (hashes of signatures over their guess) together with the stake. After the close time the
/// owner declares the result, bettors reveal, and once the reveal period is over the pool is
/// split among the closest guesses.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Market {
    /// Identity allowed to open markets and declare results
    owner: Identity,

    /// Engine parameters
    config: MarketConfig,

    /// Current lifecycle phase
    phase: MarketPhase,

    /// Id of the current (or last) lifecycle
    market_id: Option<Uuid>,

    /// Betting deadline (Unix timestamp)
    close_time: u64,

    /// Exact stake required per bet (in satoshis)
    stake_amount: u64,

    /// What the market is about
    description: String,

    /// Declared result, once set
    declared_result: Option<i64>,

    /// End of the reveal window (Unix timestamp), once the result is declared
    reveal_deadline: Option<u64>,

    /// Accumulated stakes (in satoshis)
    pool: u64,

    /// Lifecycle counter bound into every signed guess
    nonce: u64,

    /// Sealed guesses by bettor
    commitments: BTreeMap<Identity, Commitment>,

    /// Closest revealers so far
    tracker: WinnerTracker,
}

impl Market {
    /// Creates a closed market controlled by `owner`.
    pub fn new(owner: Identity, config: MarketConfig) -> Self {
        Self {
            owner,
            config,
            phase: MarketPhase::Closed,
            market_id: None,
            close_time: 0,
            stake_amount: 0,
            description: String::new(),
            declared_result: None,
            reveal_deadline: None,
            pool: 0,
            nonce: 0,
            commitments: BTreeMap::new(),
            tracker: WinnerTracker::new(),
        }
    }

    fn ensure_owner(&self, caller: &Identity) -> Result<()> {
        if *caller != self.owner {
            return Err(MarketError::Unauthorized { caller: *caller });
        }
        Ok(())
    }

    fn ensure_phase(&self, expected: MarketPhase) -> Result<()> {
        if self.phase != expected {
            return Err(MarketError::WrongState {
                expected,
                actual: self.phase,
            });
        }
        Ok(())
    }

    fn invalid_proof(&self, caller: &Identity, reason: String) -> MarketError {
        warn!(
            market_id = ?self.market_id,
            nonce = self.nonce,
            %caller,
            %reason,
            "reveal rejected"
        );
        MarketError::InvalidProof(reason)
    }

    /// Open a new market.
    ///
    /// # Arguments
    /// * `close_time` - Betting deadline, strictly after `now`
    /// * `stake_amount` - Exact amount every bet must attach
    /// * `description` - Free-form text describing what is being guessed
    ///
    /// # Returns
    /// The id of the new market lifecycle
    pub fn open_market(
        &mut self,
        caller: &Identity,
        now: u64,
        close_time: u64,
        stake_amount: u64,
        description: String,
    ) -> Result<Uuid> {
        self.ensure_owner(caller)?;
        self.ensure_phase(MarketPhase::Closed)?;
        if close_time <= now {
            return Err(MarketError::TooLate {
                deadline: close_time,
                now,
            });
        }
        if stake_amount < self.config.min_stake {
            return Err(MarketError::InvalidAmount {
                expected: self.config.min_stake,
                got: stake_amount,
            });
        }

        let market_id = Uuid::new_v4();
        self.phase = MarketPhase::Open;
        self.market_id = Some(market_id);
        self.close_time = close_time;
        self.stake_amount = stake_amount;
        self.description = description;
        self.declared_result = None;
        self.reveal_deadline = None;
        self.pool = 0;
        self.commitments.clear();
        self.tracker.clear();

        info!(
            %market_id,
            nonce = self.nonce,
            close_time,
            stake_amount,
            "market opened"
        );
        Ok(market_id)
    }

    /// Place a sealed bet.
    ///
    /// `stake` is the amount the caller attached and must equal the market stake exactly.
    pub fn bet(
        &mut self,
        caller: &Identity,
        now: u64,
        commitment_hash: sha256::Hash,
        stake: u64,
    ) -> Result<()> {
        // Once a market has run, a late bet reports the passed deadline whatever the phase.
        if self.market_id.is_some() && now >= self.close_time {
            return Err(MarketError::TooLate {
                deadline: self.close_time,
                now,
            });
        }
        self.ensure_phase(MarketPhase::Open)?;
        if self.commitments.contains_key(caller) {
            return Err(MarketError::DuplicateAction {
                identity: *caller,
                action: "bet",
            });
        }
        if stake != self.stake_amount {
            return Err(MarketError::InvalidAmount {
                expected: self.stake_amount,
                got: stake,
            });
        }
        let pool = self
            .pool
            .checked_add(stake)
            .ok_or(MarketError::PoolOverflow {
                pool: self.pool,
                stake,
            })?;

        self.commitments.insert(
            *caller,
            Commitment {
                commitment_hash,
                revealed: false,
            },
        );
        self.pool = pool;

        debug!(
            market_id = ?self.market_id,
            bettor = %caller,
            pool = self.pool,
            "bet placed"
        );
        Ok(())
    }

    /// Declare the outcome, closing betting and opening the reveal window.
    pub fn declare_result(&mut self, caller: &Identity, now: u64, result: i64) -> Result<()> {
        self.ensure_owner(caller)?;
        self.ensure_phase(MarketPhase::Open)?;
        if now < self.close_time {
            return Err(MarketError::TooEarly {
                not_before: self.close_time,
                now,
            });
        }

        let reveal_deadline = now.saturating_add(self.config.reveal_period);
        self.declared_result = Some(result);
        self.reveal_deadline = Some(reveal_deadline);
        self.phase = MarketPhase::ResultDeclared;

        info!(
            market_id = ?self.market_id,
            result,
            reveal_deadline,
            bettors = self.commitments.len(),
            "result declared"
        );
        Ok(())
    }

    /// Reveal a guess.
    ///
    /// The signer recovered from `signature` over `(guess, nonce)` must be the caller, and the
    /// caller's commitment must be the hash of `signature`.
    pub fn reveal(
        &mut self,
        caller: &Identity,
        now: u64,
        guess: i64,
        signature: &MessageSignature,
    ) -> Result<()> {
        self.ensure_phase(MarketPhase::ResultDeclared)?;
        let (Some(result), Some(reveal_deadline)) = (self.declared_result, self.reveal_deadline)
        else {
            return Err(MarketError::WrongState {
                expected: MarketPhase::ResultDeclared,
                actual: self.phase,
            });
        };
        if now >= reveal_deadline {
            return Err(MarketError::TooLate {
                deadline: reveal_deadline,
                now,
            });
        }

        let signer = recover_signer(guess, self.nonce, signature)
            .map_err(|e| self.invalid_proof(caller, e.to_string()))?;
        if signer != *caller {
            return Err(self.invalid_proof(
                caller,
                format!("signature recovers {signer}, not the caller"),
            ));
        }
        let Some(commitment) = self.commitments.get(&signer) else {
            return Err(self.invalid_proof(caller, format!("{signer} has no commitment")));
        };
        if commitment.revealed {
            return Err(MarketError::DuplicateAction {
                identity: signer,
                action: "revealed",
            });
        }
        if commitment.commitment_hash != commitment_hash(signature) {
            return Err(self.invalid_proof(
                caller,
                "signature does not match the commitment".to_string(),
            ));
        }

        let distance = distance(guess, result);
        if let Some(commitment) = self.commitments.get_mut(&signer) {
            commitment.revealed = true;
        }
        self.tracker.record(signer, distance);

        debug!(
            market_id = ?self.market_id,
            revealer = %signer,
            guess,
            distance,
            winners = self.tracker.winners().len(),
            "guess revealed"
        );
        Ok(())
    }

    /// Close the reveal window and settle the pool.
    ///
    /// Anyone may close once the reveal deadline has passed. The pool is split evenly among the
    /// closest revealers (remainder to the first); if nobody revealed, every bettor gets their
    /// stake back. The market returns to `Closed` with the nonce advanced.
    pub fn close_revealing(&mut self, caller: &Identity, now: u64) -> Result<Settlement> {
        self.ensure_phase(MarketPhase::ResultDeclared)?;
        let (Some(result), Some(reveal_deadline)) = (self.declared_result, self.reveal_deadline)
        else {
            return Err(MarketError::WrongState {
                expected: MarketPhase::ResultDeclared,
                actual: self.phase,
            });
        };
        if now < reveal_deadline {
            return Err(MarketError::TooEarly {
                not_before: reveal_deadline,
                now,
            });
        }

        let winners = self.tracker.winners().to_vec();
        let refunded = winners.is_empty();
        let payouts = if refunded {
            refund_stakes(self.commitments.keys(), self.stake_amount)
        } else {
            split_pool(self.pool, &winners)
        };
        let settlement = Settlement {
            market_id: self.market_id,
            nonce: self.nonce,
            result,
            winners,
            payouts,
            refunded,
        };

        self.phase = MarketPhase::Closed;
        self.nonce += 1;
        self.pool = 0;
        self.reveal_deadline = None;
        self.commitments.clear();
        self.tracker.clear();

        info!(
            market_id = ?settlement.market_id,
            closed_by = %caller,
            winners = settlement.winners.len(),
            refunded,
            next_nonce = self.nonce,
            "reveal closed"
        );
        Ok(settlement)
    }

    /// Hand the owner capability to `new_owner`.
    pub fn transfer_ownership(&mut self, caller: &Identity, new_owner: Identity) -> Result<()> {
        self.ensure_owner(caller)?;
        info!(previous = %self.owner, new = %new_owner, "ownership transferred");
        self.owner = new_owner;
        Ok(())
    }

    pub fn owner(&self) -> &Identity {
        &self.owner
    }

    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    pub fn phase(&self) -> MarketPhase {
        self.phase
    }

    pub fn market_id(&self) -> Option<Uuid> {
        self.market_id
    }

    /// Betting deadline of the current (or last) market
    pub fn bet_close_time(&self) -> u64 {
        self.close_time
    }

    /// Stake required per bet
    pub fn bet_amount(&self) -> u64 {
        self.stake_amount
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Declared result of the current (or last) market
    pub fn result(&self) -> Option<i64> {
        self.declared_result
    }

    pub fn reveal_deadline(&self) -> Option<u64> {
        self.reveal_deadline
    }

    /// Stakes collected in the current lifecycle
    pub fn betting_pool(&self) -> u64 {
        self.pool
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// Closest revealers so far, in reveal order
    pub fn winners(&self) -> &[Identity] {
        self.tracker.winners()
    }

    /// Winner at `index`, if any
    pub fn winner(&self, index: usize) -> Option<Identity> {
        self.tracker.winners().get(index).copied()
    }

    /// Commitment hash submitted by `bettor` in this lifecycle
    pub fn bets(&self, bettor: &Identity) -> Option<sha256::Hash> {
        self.commitments.get(bettor).map(|c| c.commitment_hash)
    }

    pub fn commitment(&self, bettor: &Identity) -> Option<&Commitment> {
        self.commitments.get(bettor)
    }

    /// Number of bets in this lifecycle
    pub fn bettor_count(&self) -> usize {
        self.commitments.len()
    }

    /// Get market status summary
    pub fn status(&self, now: u64) -> String {
        match self.phase {
            MarketPhase::Closed => "Closed - No market running".to_string(),
            MarketPhase::Open if now < self.close_time => "Open - Accepting bets".to_string(),
            MarketPhase::Open => "Betting over - Awaiting result".to_string(),
            MarketPhase::ResultDeclared => match self.reveal_deadline {
                Some(deadline) if now < deadline => "Result declared - Accepting reveals".to_string(),
                _ => "Reveal period over - Ready to close".to_string(),
            },
        }
    }

    /// Serialize the whole market to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Restore a market from [`Market::to_json`] output.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

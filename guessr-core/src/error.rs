//! Error types for guessr-core

use crate::{identity::Identity, market::MarketPhase};
use thiserror::Error;

/// Result type alias for guessr operations
pub type Result<T> = std::result::Result<T, MarketError>;

/// Error types for market operations.
///
/// Every rejection leaves the market untouched. The rejection kinds a client has to tell apart
/// (`Unauthorized`, `WrongState`, `TooLate`, `TooEarly`, `DuplicateAction`, `InvalidAmount`,
/// `InvalidProof`) each have their own variant.
#[derive(Error, Debug)]
pub enum MarketError {
    /// Caller does not hold the owner capability
    #[error("Caller {caller} is not the owner")]
    Unauthorized { caller: Identity },

    /// Operation is not valid in the current lifecycle phase
    #[error("Function called while in wrong state: expected {expected}, market is {actual}")]
    WrongState {
        expected: MarketPhase,
        actual: MarketPhase,
    },

    /// Deadline has already passed
    #[error("Function called too late: deadline {deadline}, now {now}")]
    TooLate { deadline: u64, now: u64 },

    /// Operation not allowed yet
    #[error("Function called too early: allowed from {not_before}, now {now}")]
    TooEarly { not_before: u64, now: u64 },

    /// Second bet or second reveal by the same identity
    #[error("{identity} has already {action}")]
    DuplicateAction {
        identity: Identity,
        action: &'static str,
    },

    /// Attached stake does not match the market stake
    #[error("Incorrect amount: expected {expected} sats, got {got}")]
    InvalidAmount { expected: u64, got: u64 },

    /// Pool cannot hold another stake
    #[error("Betting pool full: {pool} sats cannot take another {stake}")]
    PoolOverflow { pool: u64, stake: u64 },

    /// Signature or commitment binding failure
    #[error("Invalid proof: {0}")]
    InvalidProof(String),

    /// Identity parsing errors
    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),

    /// Timestamp parsing errors
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// Hex decoding errors
    #[error("Hex decoding error: {0}")]
    Hex(#[from] hex::FromHexError),

    /// Serde JSON errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MarketError {
    /// Whether resubmitting with corrected input or at a later time can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MarketError::InvalidAmount { .. } | MarketError::TooEarly { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(MarketError::InvalidAmount {
            expected: 100,
            got: 50
        }
        .is_retryable());
        assert!(MarketError::TooEarly {
            not_before: 10,
            now: 5
        }
        .is_retryable());
        assert!(!MarketError::TooLate {
            deadline: 10,
            now: 20
        }
        .is_retryable());
        assert!(!MarketError::InvalidProof("bad".to_string()).is_retryable());
        assert!(!MarketError::PoolOverflow {
            pool: u64::MAX,
            stake: 1
        }
        .is_retryable());
    }

    #[test]
    fn test_wrong_state_message() {
        let err = MarketError::WrongState {
            expected: MarketPhase::Closed,
            actual: MarketPhase::Open,
        };
        assert_eq!(
            err.to_string(),
            "Function called while in wrong state: expected Closed, market is Open"
        );
    }
}

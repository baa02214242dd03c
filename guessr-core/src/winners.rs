//! Winner selection and pool distribution.
//!
//! Winners are the revealers whose guess has the smallest absolute distance to the declared
//! result. The engine tracks them incrementally while reveals come in; [`closest_guesses`]
//! recomputes the same set from a full batch.

use crate::identity::Identity;
use serde::{Deserialize, Serialize};

/// Absolute distance between a guess and the declared result.
pub fn distance(guess: i64, result: i64) -> u64 {
    guess.abs_diff(result)
}

/// Running minimum-distance tracker over reveals.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct WinnerTracker {
    /// Current minimum distance, `None` until the first reveal
    min_distance: Option<u64>,

    /// Revealers tied at `min_distance`, in reveal order
    winners: Vec<Identity>,
}

impl WinnerTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a reveal at `distance`.
    pub fn record(&mut self, revealer: Identity, distance: u64) {
        match self.min_distance {
            Some(min) if distance > min => {}
            Some(min) if distance == min => self.winners.push(revealer),
            _ => {
                self.min_distance = Some(distance);
                self.winners.clear();
                self.winners.push(revealer);
            }
        }
    }

    pub fn winners(&self) -> &[Identity] {
        &self.winners
    }

    pub fn min_distance(&self) -> Option<u64> {
        self.min_distance
    }

    pub fn clear(&mut self) {
        self.min_distance = None;
        self.winners.clear();
    }
}

/// Batch winner computation: every revealer at minimal distance to `result`, in input order.
pub fn closest_guesses(result: i64, reveals: &[(Identity, i64)]) -> Vec<Identity> {
    let Some(min) = reveals
        .iter()
        .map(|(_, guess)| distance(*guess, result))
        .min()
    else {
        return Vec::new();
    };

    reveals
        .iter()
        .filter(|(_, guess)| distance(*guess, result) == min)
        .map(|(identity, _)| *identity)
        .collect()
}

/// A transfer out of the pool, executed by the host ledger.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Payout {
    /// Receiving identity
    pub recipient: Identity,

    /// Amount in satoshis
    pub amount: u64,
}

/// Split `pool` evenly among `winners`.
///
/// The integer-division remainder goes to the first winner, so the payouts always sum to
/// `pool`. Returns no payouts when there are no winners.
pub fn split_pool(pool: u64, winners: &[Identity]) -> Vec<Payout> {
    if winners.is_empty() {
        return Vec::new();
    }

    let count = winners.len() as u64;
    let share = pool / count;
    let remainder = pool % count;

    winners
        .iter()
        .enumerate()
        .map(|(i, winner)| Payout {
            recipient: *winner,
            amount: if i == 0 { share + remainder } else { share },
        })
        .collect()
}

/// Return every committer's stake, used when nobody revealed.
pub fn refund_stakes<'a>(
    committers: impl IntoIterator<Item = &'a Identity>,
    stake_amount: u64,
) -> Vec<Payout> {
    committers
        .into_iter()
        .map(|committer| Payout {
            recipient: *committer,
            amount: stake_amount,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::identities;

    #[test]
    fn test_distance_does_not_overflow() {
        assert_eq!(distance(i64::MIN, i64::MAX), u64::MAX);
        assert_eq!(distance(-5, 5), 10);
        assert_eq!(distance(7, 7), 0);
    }

    #[test]
    fn test_tracker_closer_guess_replaces_winners() {
        let ids = identities(2);
        let mut tracker = WinnerTracker::new();
        tracker.record(ids[0], 2);
        tracker.record(ids[1], 1);

        assert_eq!(tracker.winners(), &[ids[1]]);
        assert_eq!(tracker.min_distance(), Some(1));
    }

    #[test]
    fn test_tracker_tie_appends_in_reveal_order() {
        let ids = identities(3);
        let mut tracker = WinnerTracker::new();
        tracker.record(ids[0], 1);
        tracker.record(ids[1], 1);
        tracker.record(ids[2], 4);

        assert_eq!(tracker.winners(), &[ids[0], ids[1]]);
    }

    #[test]
    fn test_tracker_exact_hit_after_misses() {
        let ids = identities(3);
        let mut tracker = WinnerTracker::new();
        tracker.record(ids[0], 3);
        tracker.record(ids[1], 3);
        tracker.record(ids[2], 0);

        assert_eq!(tracker.winners(), &[ids[2]]);
        tracker.clear();
        assert!(tracker.winners().is_empty());
        assert_eq!(tracker.min_distance(), None);
    }

    #[test]
    fn test_tracker_agrees_with_batch_in_any_order() {
        let ids = identities(5);
        let result = 300;
        let reveals: Vec<(Identity, i64)> = vec![
            (ids[0], 302),
            (ids[1], 299),
            (ids[2], 301),
            (ids[3], 250),
            (ids[4], 299),
        ];

        let mut expected = closest_guesses(result, &reveals);
        expected.sort();
        assert_eq!(expected.len(), 3);

        // Every rotation and the reversed order must give the same winner set.
        let mut orders: Vec<Vec<(Identity, i64)>> = (0..reveals.len())
            .map(|k| {
                let mut rotated = reveals.clone();
                rotated.rotate_left(k);
                rotated
            })
            .collect();
        orders.push(reveals.iter().rev().cloned().collect());

        for order in orders {
            let mut tracker = WinnerTracker::new();
            for (identity, guess) in &order {
                tracker.record(*identity, distance(*guess, result));
            }
            let mut winners = tracker.winners().to_vec();
            winners.sort();
            assert_eq!(winners, expected);
        }
    }

    #[test]
    fn test_closest_guesses_empty() {
        assert!(closest_guesses(0, &[]).is_empty());
    }

    #[test]
    fn test_split_pool_even() {
        let ids = identities(2);
        let payouts = split_pool(200_000, &ids);

        assert_eq!(payouts.len(), 2);
        assert_eq!(payouts[0].amount, 100_000);
        assert_eq!(payouts[1].amount, 100_000);
    }

    #[test]
    fn test_split_pool_remainder_to_first_winner() {
        let ids = identities(3);
        let payouts = split_pool(100_001, &ids);

        assert_eq!(payouts[0].amount, 33_335);
        assert_eq!(payouts[1].amount, 33_333);
        assert_eq!(payouts[2].amount, 33_333);
        assert_eq!(payouts.iter().map(|p| p.amount).sum::<u64>(), 100_001);
    }

    #[test]
    fn test_split_pool_no_winners() {
        assert!(split_pool(1_000, &[]).is_empty());
    }

    #[test]
    fn test_refund_stakes() {
        let ids = identities(2);
        let payouts = refund_stakes(&ids, 100_000);

        assert_eq!(payouts.len(), 2);
        assert!(payouts.iter().all(|p| p.amount == 100_000));
        assert_eq!(payouts[1].recipient, ids[1]);
    }
}

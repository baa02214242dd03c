//! Market configuration.

use crate::{error::Result, DEFAULT_MIN_STAKE, DEFAULT_REVEAL_PERIOD};
use serde::{Deserialize, Serialize};

/// Engine parameters that hold across market lifecycles.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct MarketConfig {
    /// Seconds between declaring the result and the earliest close of the reveal window
    pub reveal_period: u64,

    /// Smallest stake an owner may open a market with (in satoshis)
    pub min_stake: u64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            reveal_period: DEFAULT_REVEAL_PERIOD,
            min_stake: DEFAULT_MIN_STAKE,
        }
    }
}

impl MarketConfig {
    /// Parse a JSON configuration; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

//! # Utility Functions
//!
//! Timestamp and amount helpers shared by the engine's hosts.

use crate::{error::Result, MarketError};

/// Convert satoshis to Bitcoin
pub fn satoshi_to_btc(satoshi: u64) -> f64 {
    satoshi as f64 / 100_000_000.0
}

/// Format timestamp as human-readable string
pub fn format_timestamp(timestamp: u64) -> String {
    use chrono::DateTime;
    let dt = DateTime::from_timestamp(timestamp as i64, 0).unwrap_or_default();
    dt.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Parse a timestamp, either absolute (`1735689600`) or relative to `now` (`+86400`).
pub fn parse_timestamp(timestamp_str: &str, now: u64) -> Result<u64> {
    match timestamp_str.strip_prefix('+') {
        Some(offset) => offset
            .parse::<u64>()
            .ok()
            .and_then(|offset| now.checked_add(offset)),
        None => timestamp_str.parse::<u64>().ok(),
    }
    .ok_or_else(|| MarketError::InvalidTimestamp(timestamp_str.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_satoshi_btc_conversion() {
        assert_eq!(satoshi_to_btc(100_000_000), 1.0);
        assert_eq!(satoshi_to_btc(150_000), 0.0015);
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(1735689600), "2025-01-01 00:00:00 UTC");
    }

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(parse_timestamp("1735689600", 5).unwrap(), 1735689600);
        assert_eq!(parse_timestamp("+86400", 1735689600).unwrap(), 1735776000);
        assert!(parse_timestamp("tomorrow", 0).is_err());
        assert!(parse_timestamp("+18446744073709551615", 1).is_err());
    }
}

//! Parser for quota strings (like `"500M"` or `"-1"`)
//!
//! Units are decimal: `K` is 1000, `M` is 1000^2 and so on up to `Y` (1000^8). Binary units are
//! not accepted. The exact string `-1` means unlimited.

use crate::types::{QuotaValue, UNLIMITED_SENTINEL};
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

// `[0-9]` instead of `\d`, which would also match non-ASCII digits
static REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]+)([KMGTPEZY]?)$").expect("Regex must be valid"));

const EXPECT_STR: &str =
    "a non-negative integer with an optional decimal unit in the form \
     \"<integer>[K|M|G|T|P|E|Z|Y]\" or \"-1\" for unlimited";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuotaParseError {
    #[error("Invalid quota {input:?}: expected {}", EXPECT_STR)]
    InvalidFormat { input: String },
}

/// Parses a quota string in the form `<int>[KMGTPEZY]` or the sentinel `-1`.
///
/// The format is checked before the number is interpreted. Magnitudes that don't fit into a
/// `u128` saturate at `u128::MAX`.
pub fn parse(input: &str) -> Result<QuotaValue, QuotaParseError> {
    if input == UNLIMITED_SENTINEL {
        return Ok(QuotaValue::Unlimited);
    }

    let invalid = || QuotaParseError::InvalidFormat {
        input: input.to_owned(),
    };

    let captures = REGEX.captures(input).ok_or_else(invalid)?;
    let number = captures.get(1).ok_or_else(invalid)?.as_str();
    let unit = captures.get(2).map(|m| m.as_str()).unwrap_or_default();

    // Only fails on overflow since the regex guarantees ASCII digits
    let number: u128 = number.parse().unwrap_or(u128::MAX);

    Ok(QuotaValue::Bytes(number.saturating_mul(multiplier(unit))))
}

/// The byte multiplier for a unit suffix. An empty suffix means plain bytes.
fn multiplier(unit: &str) -> u128 {
    let exp = match unit {
        "K" => 1,
        "M" => 2,
        "G" => 3,
        "T" => 4,
        "P" => 5,
        "E" => 6,
        "Z" => 7,
        "Y" => 8,
        _ => 0,
    };

    1000u128.pow(exp)
}

#[cfg(test)]
mod test {
    use super::*;

    fn bytes(input: &str) -> u128 {
        parse(input).unwrap().to_bytes().unwrap()
    }

    #[test]
    fn plain_and_suffixed() {
        assert_eq!(bytes("0"), 0);
        assert_eq!(bytes("100"), 100);
        assert_eq!(bytes("007"), 7);
        assert_eq!(bytes("10K"), 10_000);
        assert_eq!(bytes("500M"), 500_000_000);
        assert_eq!(bytes("10G"), 10_000_000_000);
        assert_eq!(bytes("3T"), 3_000_000_000_000);
        assert_eq!(bytes("2P"), 2 * 10u128.pow(15));
        assert_eq!(bytes("2E"), 2 * 10u128.pow(18));
        assert_eq!(bytes("2Z"), 2 * 10u128.pow(21));
        assert_eq!(bytes("100Y"), 10u128.pow(26));
    }

    #[test]
    fn prefix_times_multiplier() {
        let units = ["", "K", "M", "G", "T", "P", "E", "Z", "Y"];

        for (exp, unit) in units.iter().enumerate() {
            for n in [0u128, 1, 9, 42, 999, 123_456_789] {
                assert_eq!(
                    bytes(&format!("{n}{unit}")),
                    n * 1000u128.pow(exp as u32),
                    "{n}{unit}"
                );
            }
        }
    }

    #[test]
    fn sentinel() {
        assert_eq!(parse("-1").unwrap(), QuotaValue::Unlimited);
    }

    #[test]
    fn saturates() {
        assert_eq!(bytes("999999999999999999999999999999999Y"), u128::MAX);
        assert_eq!(bytes(&"9".repeat(60)), u128::MAX);
    }

    #[test]
    fn invalid() {
        for input in [
            "", "K", "-1K", "-2", "-0", "-10G", " 1", "1 ", "1 G", "1g", "1k", "1KB", "1Ki",
            "1KiB", "1.5G", "1,5G", "1X", "5X", "10GG", "G10", "0x10", "+1", "--1", "-1 ",
            "１０", "١٠",
        ] {
            assert_eq!(
                parse(input),
                Err(QuotaParseError::InvalidFormat {
                    input: input.to_owned()
                }),
                "{input:?} must be rejected"
            );
        }
    }
}

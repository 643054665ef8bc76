//! Custom serde parser for the check interval (like `60` or `"5m"`)
//!
//! Meant for config file parsing. The interval must be positive, a zero interval would turn the
//! polling loop into a busy loop.

use regex::Regex;
use serde::Deserializer;
use serde::de::{Unexpected, Visitor as VisitorT};
use std::sync::LazyLock;
use std::time::Duration;

static REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]+) *([smhd]?)$").expect("Regex must be valid"));

const EXPECT_STR: &str = "a positive integer of seconds or a string containing a positive \
     integer n with appended time unit in the form \"<n>[s|m|h|d]\"";

/// Parses an interval in the form `<int>[s|m|h|d]` into a [Duration]. Zero is rejected.
pub fn parse_optional(input: &str) -> Option<Duration> {
    let captures = REGEX.captures(input.trim())?;
    let number: u64 = captures.get(1)?.as_str().parse().ok()?;

    let secs = match captures.get(2)?.as_str() {
        "" | "s" => number,
        "m" => number.checked_mul(60)?,
        "h" => number.checked_mul(60 * 60)?,
        "d" => number.checked_mul(24 * 60 * 60)?,
        _ => return None,
    };

    from_secs(secs)
}

fn from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

#[derive(Debug, Default)]
struct Visitor {}

impl VisitorT<'_> for Visitor {
    type Value = Duration;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str(EXPECT_STR)
    }

    fn visit_str<E>(self, input: &str) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        parse_optional(input).ok_or_else(|| E::invalid_value(Unexpected::Str(input), &self))
    }

    fn visit_u64<E>(self, input: u64) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        from_secs(input).ok_or_else(|| E::invalid_value(Unexpected::Unsigned(input), &self))
    }

    // TOML integers always arrive as i64
    fn visit_i64<E>(self, input: i64) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        let secs: u64 = input
            .try_into()
            .map_err(|_| E::invalid_value(Unexpected::Signed(input), &self))?;

        self.visit_u64(secs)
    }
}

pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Duration, D::Error> {
    de.deserialize_any(Visitor::default())
}

//! Type definitions shared by the quota daemon components.

use std::fmt::Display;

/// The string that marks a quota as unlimited in the configuration.
pub const UNLIMITED_SENTINEL: &str = "-1";

/// A storage ceiling for one database.
///
/// Decided once at parse time, so components never have to compare raw strings against
/// [UNLIMITED_SENTINEL].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QuotaValue {
    Unlimited,
    /// The ceiling in bytes. `u128` to hold the full `Y` (1000^8) range.
    Bytes(u128),
}

impl QuotaValue {
    /// The byte ceiling, `None` when unlimited
    pub fn to_bytes(self) -> Option<u128> {
        match self {
            Self::Unlimited => None,
            Self::Bytes(n) => Some(n),
        }
    }

    pub fn is_unlimited(self) -> bool {
        self == Self::Unlimited
    }

    /// Whether `usage` reaches or crosses the ceiling. Never true for [QuotaValue::Unlimited].
    pub fn is_reached_by(self, usage: u64) -> bool {
        self.to_bytes().is_some_and(|n| u128::from(usage) >= n)
    }
}

impl Display for QuotaValue {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Unlimited => f.write_str("unlimited"),
            Self::Bytes(n) => write!(f, "{n} bytes"),
        }
    }
}

/// The enforcement state of a database, derived from its privilege rows on every check.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EnforcementState {
    Unlimited,
    /// Write privileges of the database scoped accounts are revoked
    Limited,
}

impl Display for EnforcementState {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(match self {
            Self::Unlimited => "unlimited",
            Self::Limited => "limited",
        })
    }
}

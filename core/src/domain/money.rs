//! Currency amounts held as integer minor units.
//!
//! Aggregates such as `moneySaved` and `totalRevenue` are summed on every
//! reservation, so amounts are stored as cents to keep the arithmetic exact.
//! Documents persist the cent value as a JSON integer.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Currency amount in cents.
///
/// # Examples
/// ```
/// use savorly_core::domain::Money;
///
/// let price: Money = "6.29".parse().expect("valid amount");
/// assert_eq!(price.cents(), 629);
/// assert_eq!(price.to_string(), "6.29");
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// The zero amount.
    pub const ZERO: Self = Self(0);

    /// Construct an amount from cents.
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Amount in cents.
    pub const fn cents(self) -> i64 {
        self.0
    }

    /// Whether the amount is below zero.
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Add two amounts, returning `None` on overflow.
    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let magnitude = self.0.unsigned_abs();
        write!(
            f,
            "{sign}{}.{:02}",
            magnitude.div_euclid(100),
            magnitude.rem_euclid(100)
        )
    }
}

/// Error returned when parsing a decimal amount fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseMoneyError {
    /// The rejected input value.
    pub input: String,
}

impl fmt::Display for ParseMoneyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid amount '{}': expected digits with at most two decimals",
            self.input
        )
    }
}

impl std::error::Error for ParseMoneyError {}

impl FromStr for Money {
    type Err = ParseMoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let error = || ParseMoneyError {
            input: s.to_owned(),
        };
        let trimmed = s.trim();
        let (negative, unsigned) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
        let digits_only = |part: &str| part.chars().all(|c| c.is_ascii_digit());
        if whole.is_empty() || !digits_only(whole) || !digits_only(fraction) || fraction.len() > 2
        {
            return Err(error());
        }

        let whole_cents = whole
            .parse::<i64>()
            .ok()
            .and_then(|value| value.checked_mul(100))
            .ok_or_else(error)?;
        let fraction_cents = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<i64>().map_err(|_| error())? * 10,
            _ => fraction.parse::<i64>().map_err(|_| error())?,
        };
        let cents = whole_cents
            .checked_add(fraction_cents)
            .ok_or_else(error)?;
        Ok(Self(if negative { -cents } else { cents }))
    }
}

//! Fixed-scale decimal arithmetic for monetary quantities.
//!
//! Amounts are stored as an arbitrary-precision integer of `units` scaled by
//! `10^scale`. All rounding is half-up and happens only where a target scale
//! is requested; additions and multiplications are exact.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Mul};
use std::str::FromStr;

use malachite::Natural;
use malachite::num::arithmetic::traits::DivRem;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Clone, Debug)]
pub struct Amount {
    units: Natural,
    scale: u32,
}

fn pow10(exp: u32) -> Natural {
    let mut value = Natural::from(1u32);
    for _ in 0..exp {
        value *= Natural::from(10u32);
    }
    value
}

impl Amount {
    pub fn zero() -> Self {
        Self {
            units: Natural::from(0u32),
            scale: 0,
        }
    }

    pub fn from_u64(value: u64) -> Self {
        Self {
            units: Natural::from(value),
            scale: 0,
        }
    }

    /// Parses a non-negative decimal literal such as `100`, `0.3` or `12.500`.
    pub fn parse(text: &str) -> Result<Self, String> {
        let text = text.trim();
        if text.is_empty() {
            return Err("empty amount".to_string());
        }
        let (int_part, frac_part) = match text.split_once('.') {
            Some((i, f)) => (i, f),
            None => (text, ""),
        };
        if int_part.is_empty() || !int_part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(format!("invalid amount literal: {text}"));
        }
        if !frac_part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(format!("invalid amount literal: {text}"));
        }
        let digits = format!("{int_part}{frac_part}");
        let units = Natural::from_str(&digits).map_err(|_| format!("invalid amount literal: {text}"))?;
        Ok(Self {
            units,
            scale: frac_part.len() as u32,
        })
    }

    /// Parses a decimal literal, discarding a leading sign (absolute value).
    pub fn parse_abs(text: &str) -> Result<Self, String> {
        let text = text.trim();
        Self::parse(text.strip_prefix('-').unwrap_or(text))
    }

    pub fn is_zero(&self) -> bool {
        self.units == Natural::from(0u32)
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    fn rescaled_units(&self, scale: u32) -> Natural {
        debug_assert!(scale >= self.scale);
        &self.units * pow10(scale - self.scale)
    }

    pub fn checked_sub(&self, other: &Amount) -> Option<Amount> {
        let scale = self.scale.max(other.scale);
        let lhs = self.rescaled_units(scale);
        let rhs = other.rescaled_units(scale);
        if lhs < rhs {
            return None;
        }
        Some(Amount {
            units: lhs - rhs,
            scale,
        })
    }

    /// Divides by `divisor`, rounding half-up at `scale` fractional digits.
    pub fn div_half_up(&self, divisor: &Amount, scale: u32) -> Amount {
        debug_assert!(!divisor.is_zero());
        let numerator = &self.units * pow10(scale + divisor.scale);
        let denominator = &divisor.units * pow10(self.scale);
        let (quotient, remainder) = numerator.div_rem(&denominator);
        let units = if &remainder * Natural::from(2u32) >= denominator {
            quotient + Natural::from(1u32)
        } else {
            quotient
        };
        Amount { units, scale }
    }

    /// Number of digits in the integer part; zero has one digit.
    pub fn integer_digits(&self) -> u32 {
        let integral = &self.units / pow10(self.scale);
        if integral == Natural::from(0u32) {
            1
        } else {
            integral.to_string().len() as u32
        }
    }
}

impl Add<&Amount> for &Amount {
    type Output = Amount;

    fn add(self, other: &Amount) -> Amount {
        let scale = self.scale.max(other.scale);
        Amount {
            units: self.rescaled_units(scale) + other.rescaled_units(scale),
            scale,
        }
    }
}

impl Mul<&Amount> for &Amount {
    type Output = Amount;

    fn mul(self, other: &Amount) -> Amount {
        Amount {
            units: &self.units * &other.units,
            scale: self.scale + other.scale,
        }
    }
}

impl PartialEq for Amount {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Amount {}

impl PartialOrd for Amount {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Amount {
    fn cmp(&self, other: &Self) -> Ordering {
        let scale = self.scale.max(other.scale);
        self.rescaled_units(scale).cmp(&other.rescaled_units(scale))
    }
}

impl Default for Amount {
    fn default() -> Self {
        Self::zero()
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.units.to_string();
        if self.scale == 0 {
            return f.write_str(&digits);
        }
        let scale = self.scale as usize;
        if digits.len() > scale {
            let (int_part, frac_part) = digits.split_at(digits.len() - scale);
            write!(f, "{int_part}.{frac_part}")
        } else {
            write!(f, "0.{digits:0>width$}", width = scale)
        }
    }
}

impl FromStr for Amount {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Amount::parse(s)
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Amount::parse(&value).map_err(serde::de::Error::custom)
    }
}

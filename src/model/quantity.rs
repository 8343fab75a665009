//! Storage quantities
//!
//! Sizes such as `1Gi`, `512Mi` or `1.5G` compare by their byte value, so
//! `1024Mi == 1Gi`. The original spelling is kept for display.

use crate::error::{CorralError, CorralResult};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

const SUFFIXES: &[(&str, u128)] = &[
    ("Ki", 1 << 10),
    ("Mi", 1 << 20),
    ("Gi", 1 << 30),
    ("Ti", 1 << 40),
    ("Pi", 1 << 50),
    ("Ei", 1 << 60),
    ("k", 1_000),
    ("M", 1_000_000),
    ("G", 1_000_000_000),
    ("T", 1_000_000_000_000),
    ("P", 1_000_000_000_000_000),
    ("E", 1_000_000_000_000_000_000),
];

/// A storage size request
#[derive(Debug, Clone)]
pub struct Quantity {
    raw: String,
    bytes: u128,
}

impl Quantity {
    /// Whole number of gibibytes, spelled `<n>Gi`
    pub fn gibibytes(n: u64) -> Self {
        Self {
            raw: format!("{}Gi", n),
            bytes: u128::from(n) << 30,
        }
    }

    /// Byte value, fractional bytes rounded up
    pub fn bytes(&self) -> u128 {
        self.bytes
    }

    /// The spelling this quantity was parsed from
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl FromStr for Quantity {
    type Err = CorralError;

    fn from_str(s: &str) -> CorralResult<Self> {
        let raw = s.trim();
        let invalid = || CorralError::invalid(format!("invalid quantity '{}'", s));

        let split = raw
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(raw.len());
        let (number, suffix) = raw.split_at(split);

        let multiplier = if suffix.is_empty() {
            1
        } else {
            SUFFIXES
                .iter()
                .find(|(name, _)| *name == suffix)
                .map(|(_, m)| *m)
                .ok_or_else(invalid)?
        };

        let (whole, fraction) = match number.split_once('.') {
            Some((w, f)) => (w, f),
            None => (number, ""),
        };
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid());
        }
        if fraction.contains('.') || fraction.len() > 18 {
            return Err(invalid());
        }

        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid())?
        };
        let mut bytes = whole.checked_mul(multiplier).ok_or_else(invalid)?;

        if !fraction.is_empty() {
            let digits: u128 = fraction.parse().map_err(|_| invalid())?;
            let scale = 10u128.pow(fraction.len() as u32);
            let scaled = digits.checked_mul(multiplier).ok_or_else(invalid)?;
            bytes = bytes
                .checked_add(scaled.div_ceil(scale))
                .ok_or_else(invalid)?;
        }

        Ok(Self {
            raw: raw.to_string(),
            bytes,
        })
    }
}

impl PartialEq for Quantity {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for Quantity {}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for Quantity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

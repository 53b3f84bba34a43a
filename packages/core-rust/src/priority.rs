//! Provider priority levels.
//!
//! Priorities order provider descriptors inside a service: higher priorities
//! are consulted first. The type is a fieldless `Copy` enum, so every value
//! obtained by parsing or deserializing is the canonical variant and compares
//! equal (and hashes identically) to the constant it names.
//!
//! # Wire format
//!
//! Serializes to the upper-case symbolic name (`"HIGH"`). Deserialization
//! accepts the symbolic name in any case, or the numeric rank (`0`..=`4`).

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Declared priority of a registered provider, from `Lowest` to `Highest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum ProviderPriority {
    Lowest,
    Low,
    #[default]
    Medium,
    High,
    Highest,
}

/// Error returned when a string names no priority level.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown provider priority: {input:?}")]
pub struct ParsePriorityError {
    pub input: String,
}

impl ProviderPriority {
    /// All levels in ascending order.
    pub const ALL: [ProviderPriority; 5] = [
        ProviderPriority::Lowest,
        ProviderPriority::Low,
        ProviderPriority::Medium,
        ProviderPriority::High,
        ProviderPriority::Highest,
    ];

    /// Numeric rank, `0` for `Lowest` through `4` for `Highest`.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            ProviderPriority::Lowest => 0,
            ProviderPriority::Low => 1,
            ProviderPriority::Medium => 2,
            ProviderPriority::High => 3,
            ProviderPriority::Highest => 4,
        }
    }

    /// Inverse of [`rank`](Self::rank).
    #[must_use]
    pub const fn from_rank(rank: u8) -> Option<Self> {
        match rank {
            0 => Some(ProviderPriority::Lowest),
            1 => Some(ProviderPriority::Low),
            2 => Some(ProviderPriority::Medium),
            3 => Some(ProviderPriority::High),
            4 => Some(ProviderPriority::Highest),
            _ => None,
        }
    }

    /// Symbolic name used on the wire.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            ProviderPriority::Lowest => "LOWEST",
            ProviderPriority::Low => "LOW",
            ProviderPriority::Medium => "MEDIUM",
            ProviderPriority::High => "HIGH",
            ProviderPriority::Highest => "HIGHEST",
        }
    }
}

impl fmt::Display for ProviderPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProviderPriority {
    type Err = ParsePriorityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(rank) = trimmed.parse::<u8>() {
            return Self::from_rank(rank).ok_or_else(|| ParsePriorityError {
                input: s.to_string(),
            });
        }
        Self::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ParsePriorityError {
                input: s.to_string(),
            })
    }
}

impl Serialize for ProviderPriority {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for ProviderPriority {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(PriorityVisitor)
    }
}

struct PriorityVisitor;

impl Visitor<'_> for PriorityVisitor {
    type Value = ProviderPriority;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a priority name (LOWEST..HIGHEST) or a rank between 0 and 4")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        v.parse().map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        u8::try_from(v)
            .ok()
            .and_then(ProviderPriority::from_rank)
            .ok_or_else(|| E::custom(format!("priority rank out of range: {v}")))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        u64::try_from(v)
            .map_err(|_| E::custom(format!("priority rank out of range: {v}")))
            .and_then(|v| self.visit_u64(v))
    }
}

//! Resource types and typed usage limits.
//!
//! Limits are written in config as an integer, `"unlimited"`, or `-1`
//! (legacy spelling of unlimited). They always deserialize to [`Limit`], so
//! the sentinel never leaks into comparisons as a magic value.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A per-period usage ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Limit {
    /// At most this many units may be consumed per period.
    Count(u64),
    /// No ceiling.
    Unlimited,
}

impl Limit {
    /// Returns true if `used` units leave room for one more action.
    ///
    /// The comparison is strict: a limit of 5 allows the action while 0..=4
    /// units are consumed and blocks once 5 are.
    #[must_use]
    pub fn allows(&self, used: u64) -> bool {
        match self {
            Self::Unlimited => true,
            Self::Count(max) => used < *max,
        }
    }

    /// Units left before the limit blocks, or `None` when unlimited.
    #[must_use]
    pub fn remaining(&self, used: u64) -> Option<u64> {
        match self {
            Self::Unlimited => None,
            Self::Count(max) => Some(max.saturating_sub(used)),
        }
    }

    #[must_use]
    pub fn is_unlimited(&self) -> bool {
        matches!(self, Self::Unlimited)
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count(n) => write!(f, "{n}"),
            Self::Unlimited => f.write_str("unlimited"),
        }
    }
}

impl FromStr for Limit {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("unlimited") || s == "-1" {
            return Ok(Self::Unlimited);
        }
        s.parse::<u64>()
            .map(Self::Count)
            .map_err(|_| crate::Error::InvalidLimit(s.to_string()))
    }
}

impl Serialize for Limit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Count(n) => serializer.serialize_u64(*n),
            Self::Unlimited => serializer.serialize_str("unlimited"),
        }
    }
}

struct LimitVisitor;

impl Visitor<'_> for LimitVisitor {
    type Value = Limit;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a non-negative integer, -1, or \"unlimited\"")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Limit, E> {
        Ok(Limit::Count(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Limit, E> {
        match v {
            -1 => Ok(Limit::Unlimited),
            n if n >= 0 => Ok(Limit::Count(n as u64)),
            n => Err(E::custom(format!("negative limit {n}"))),
        }
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Limit, E> {
        v.parse().map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for Limit {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(LimitVisitor)
    }
}

/// Where the authoritative usage count for a resource type comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageSourceKind {
    /// Count of records the user created in the period.
    RecordCount,
    /// Standalone monthly counter bumped by `record_usage`.
    MonthlyCounter,
    /// Resolved by a host-registered usage resolver.
    External,
}

/// A metered resource.
///
/// Built-in types know their usage source; any other name is carried as
/// [`ResourceType::Custom`] and resolved externally. Names are lowercase
/// `[a-z0-9_]+`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ResourceType {
    /// Episodes created by the user this month.
    Episodes,
    /// Exports performed this month.
    Exports,
    /// AI generation requests this month.
    AiGenerations,
    Custom(String),
}

impl ResourceType {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Episodes => "episodes",
            Self::Exports => "exports",
            Self::AiGenerations => "ai_generations",
            Self::Custom(name) => name,
        }
    }

    /// Returns how usage for this type is measured.
    #[must_use]
    pub fn source_kind(&self) -> UsageSourceKind {
        match self {
            Self::Episodes => UsageSourceKind::RecordCount,
            Self::Exports | Self::AiGenerations => UsageSourceKind::MonthlyCounter,
            Self::Custom(_) => UsageSourceKind::External,
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        match name.as_str() {
            "episodes" => Ok(Self::Episodes),
            "exports" => Ok(Self::Exports),
            "ai_generations" => Ok(Self::AiGenerations),
            "" => Err(crate::Error::InvalidResourceType(s.to_string())),
            other
                if other
                    .bytes()
                    .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_') =>
            {
                Ok(Self::Custom(name))
            }
            _ => Err(crate::Error::InvalidResourceType(s.to_string())),
        }
    }
}

impl From<ResourceType> for String {
    fn from(rt: ResourceType) -> Self {
        match rt {
            ResourceType::Custom(name) => name,
            builtin => builtin.as_str().to_string(),
        }
    }
}

impl TryFrom<String> for ResourceType {
    type Error = crate::Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

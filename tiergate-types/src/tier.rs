//! Subscription tiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A named subscription level. The set is closed: anything else is rejected
/// with [`crate::Error::InvalidTier`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Default tier for users without an active membership.
    #[default]
    Free,
    Bronze,
    Silver,
    Gold,
    Platinum,
    /// Negotiated plan; limits usually come from per-user overrides.
    Custom,
}

impl Tier {
    /// Every tier, lowest first.
    pub const ALL: [Tier; 6] = [
        Tier::Free,
        Tier::Bronze,
        Tier::Silver,
        Tier::Gold,
        Tier::Platinum,
        Tier::Custom,
    ];

    /// Returns the lowercase wire name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Bronze => "bronze",
            Self::Silver => "silver",
            Self::Gold => "gold",
            Self::Platinum => "platinum",
            Self::Custom => "custom",
        }
    }

    /// Returns true for any tier other than `free`.
    #[must_use]
    pub fn is_paid(&self) -> bool {
        !matches!(self, Self::Free)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Tier::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| crate::Error::InvalidTier(s.to_string()))
    }
}

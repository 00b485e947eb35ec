//! Capability flags gating routes per listener.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A named, independently enableable capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Feature {
    Bid,
    Impression,
    Click,
    Match,
    Admin,
    Other,
}

impl Feature {
    pub const ALL: [Feature; 6] = [
        Feature::Bid,
        Feature::Impression,
        Feature::Click,
        Feature::Match,
        Feature::Admin,
        Feature::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Feature::Bid => "BID",
            Feature::Impression => "IMPRESSION",
            Feature::Click => "CLICK",
            Feature::Match => "MATCH",
            Feature::Admin => "ADMIN",
            Feature::Other => "OTHER",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Feature {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Feature::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown feature {:?}", s))
    }
}

//! Identifiers with non-trivial comparison rules.

use core::hash::{Hash, Hasher};
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Name of a configured router.
///
/// Router names are compared case-insensitively (`Main-Router` and
/// `main-router` name the same device) but keep their original spelling for
/// display.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouterName(String);

impl RouterName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Normalized form used for hashing and registry keys.
    pub fn key(&self) -> String {
        self.0.to_lowercase()
    }

    pub fn matches(&self, other: &str) -> bool {
        self.0.to_lowercase() == other.to_lowercase()
    }
}

impl PartialEq for RouterName {
    fn eq(&self, other: &Self) -> bool {
        self.matches(&other.0)
    }
}

impl Eq for RouterName {}

impl Hash for RouterName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl core::fmt::Display for RouterName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RouterName {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RouterName {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl FromStr for RouterName {
    type Err = core::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

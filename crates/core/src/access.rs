//! Access levels and operation classification.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Granularity at which a grant applies.
///
/// Levels are ordered `ReadOnly < Full`, so the most permissive of several
/// grants is their `max` and narrowing one level by another is their `min`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum AccessLevel {
    ReadOnly,
    #[default]
    Full,
}

impl AccessLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessLevel::ReadOnly => "read-only",
            AccessLevel::Full => "full",
        }
    }

    /// Whether an operation of the given kind may run at this level.
    pub fn permits(&self, kind: OperationKind) -> bool {
        match self {
            AccessLevel::Full => true,
            AccessLevel::ReadOnly => kind == OperationKind::Read,
        }
    }

    /// Apply an override. An override can only narrow, never widen.
    pub fn narrowed_by(self, other: AccessLevel) -> AccessLevel {
        self.min(other)
    }
}

impl core::fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessLevel {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "full" | "read-write" => Ok(AccessLevel::Full),
            "read-only" => Ok(AccessLevel::ReadOnly),
            other => Err(ParseError::AccessLevel(other.to_string())),
        }
    }
}

/// Whether a module operation only observes device state or changes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Read,
    Write,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Read => "read",
            OperationKind::Write => "write",
        }
    }
}

impl core::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "read" => Ok(OperationKind::Read),
            "write" => Ok(OperationKind::Write),
            other => Err(ParseError::OperationKind(other.to_string())),
        }
    }
}

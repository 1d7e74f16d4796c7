//! Error model shared by the loaders and the resolver.
//!
//! Two families live here:
//!
//! - [`ConfigIssue`]: load-time problems. Always recoverable; collected and
//!   reported next to whatever did load.
//! - [`AccessError`]: request-time failures. Fatal to the single
//!   authorization check that produced them, never turned into an allow.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Process exit status a CLI should use for an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitStatus {
    Success,
    Denied,
    ConfigError,
    NotFound,
    /// The command line itself was invalid.
    Usage,
}

impl ExitStatus {
    pub fn code(&self) -> i32 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::Denied => 2,
            ExitStatus::ConfigError => 3,
            ExitStatus::NotFound => 4,
            // EX_USAGE from sysexits(3); outside the decision codes.
            ExitStatus::Usage => 64,
        }
    }
}

/// Kind of configuration record, used in conflict reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Router,
    User,
    Group,
    Module,
}

impl core::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            RecordKind::Router => "router",
            RecordKind::User => "user",
            RecordKind::Group => "group",
            RecordKind::Module => "module",
        };
        f.write_str(s)
    }
}

/// A value that does not name an access level or operation kind.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown access level '{0}'")]
    AccessLevel(String),

    #[error("operation classification must be 'read' or 'write', got '{0}'")]
    OperationKind(String),
}

/// A load-time configuration problem.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigIssue {
    /// A fragment (or a fragment directory) could not be read or parsed.
    #[error("failed to load '{}': {reason}", path.display())]
    Load { path: PathBuf, reason: String },

    /// A record reused a name already defined by an earlier fragment.
    #[error(
        "duplicate {kind} '{name}' in '{}' ignored (first defined in '{}')",
        path.display(),
        kept.display()
    )]
    Conflict {
        kind: RecordKind,
        name: String,
        path: PathBuf,
        kept: PathBuf,
    },

    /// A record loaded, but refers to something that does not resolve.
    #[error("'{}': {message}", path.display())]
    Warning { path: PathBuf, message: String },
}

impl ConfigIssue {
    pub fn load(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Load {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn conflict(
        kind: RecordKind,
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        kept: impl Into<PathBuf>,
    ) -> Self {
        Self::Conflict {
            kind,
            name: name.into(),
            path: path.into(),
            kept: kept.into(),
        }
    }

    pub fn warning(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Warning {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn path(&self) -> &PathBuf {
        match self {
            ConfigIssue::Load { path, .. }
            | ConfigIssue::Conflict { path, .. }
            | ConfigIssue::Warning { path, .. } => path,
        }
    }
}

/// Failure to resolve a router from the registry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("router '{name}' not found (available: {})", available.join(", "))]
    NotFound { name: String, available: Vec<String> },

    #[error("no routers configured")]
    NoRoutersConfigured,
}

/// Machine-readable reason code for a denied request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialKind {
    UnknownOperation,
    UserNotConfigured,
    RouterNotFound,
    NoRoutersConfigured,
    NoMatchingGrant,
}

/// Request-time authorization failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccessError {
    #[error("unknown operation '{module}:{operation}'")]
    UnknownOperation { module: String, operation: String },

    #[error("user '{0}' is not configured")]
    UserNotConfigured(String),

    #[error("router '{name}' not found (available: {})", available.join(", "))]
    RouterNotFound { name: String, available: Vec<String> },

    #[error("no routers configured")]
    NoRoutersConfigured,

    #[error("user '{user}' has no grant for '{module}:{operation}' on router '{router}'")]
    NoMatchingGrant {
        user: String,
        module: String,
        operation: String,
        router: String,
    },
}

impl AccessError {
    pub fn kind(&self) -> DenialKind {
        match self {
            AccessError::UnknownOperation { .. } => DenialKind::UnknownOperation,
            AccessError::UserNotConfigured(_) => DenialKind::UserNotConfigured,
            AccessError::RouterNotFound { .. } => DenialKind::RouterNotFound,
            AccessError::NoRoutersConfigured => DenialKind::NoRoutersConfigured,
            AccessError::NoMatchingGrant { .. } => DenialKind::NoMatchingGrant,
        }
    }

    pub fn exit_status(&self) -> ExitStatus {
        match self {
            AccessError::UserNotConfigured(_) | AccessError::NoMatchingGrant { .. } => {
                ExitStatus::Denied
            }
            AccessError::NoRoutersConfigured => ExitStatus::ConfigError,
            AccessError::UnknownOperation { .. } | AccessError::RouterNotFound { .. } => {
                ExitStatus::NotFound
            }
        }
    }
}

impl From<LookupError> for AccessError {
    fn from(value: LookupError) -> Self {
        match value {
            LookupError::NotFound { name, available } => {
                AccessError::RouterNotFound { name, available }
            }
            LookupError::NoRoutersConfigured => AccessError::NoRoutersConfigured,
        }
    }
}

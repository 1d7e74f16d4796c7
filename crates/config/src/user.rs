//! User permission records (`users.d`).
//!
//! ```yaml
//! user:
//!   username: monitor
//!   comment: NOC dashboards
//!   permissions:
//!     - groups: [monitor, "dns-admin:read-only"]
//!       routers: "*"
//!     - groups: [{name: dhcp-admin, access: read-only}]
//!       routers: [router1, router2]
//! ```
//!
//! Group references are parsed into [`GroupRef`] pairs at load time but are
//! only resolved against the group registry when a permission is checked.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use mikro_core::{AccessLevel, ConfigIssue, RecordKind, RouterName};

use crate::loader::{FragmentError, load_fragments, parse_document};
use crate::registry::{Record, Registry};

const ALL_ROUTERS: &str = "*";

#[derive(Debug, Deserialize)]
struct UserDocument {
    user: UserFragment,
}

#[derive(Debug, Deserialize)]
struct UserFragment {
    username: String,
    #[serde(default)]
    permissions: Vec<ClauseFragment>,
    #[serde(default)]
    comment: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClauseFragment {
    #[serde(default)]
    groups: Vec<GroupRefFragment>,
    #[serde(default)]
    routers: Option<ScopeFragment>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GroupRefFragment {
    Compact(String),
    Detailed {
        name: String,
        #[serde(default)]
        access: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ScopeFragment {
    One(String),
    List(Vec<String>),
}

/// Per-reference adjustment of a group's access level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessOverride {
    /// Use the group's nominal level.
    Inherit,
    /// Narrow the group's level (never widens).
    Narrow(AccessLevel),
    /// Suffix that names no access level; the reference grants nothing.
    Unrecognized(String),
}

/// A group reference inside a clause: `name` or `name:level`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRef {
    pub group: String,
    pub access: AccessOverride,
}

impl GroupRef {
    /// Parse the compact notation. Only the first `:` separates the suffix.
    pub fn parse(raw: &str) -> Self {
        match raw.split_once(':') {
            Some((group, level)) => Self::with_level(group, Some(level)),
            None => Self::with_level(raw, None),
        }
    }

    fn with_level(group: &str, level: Option<&str>) -> Self {
        let access = match level {
            None => AccessOverride::Inherit,
            Some(level) => match level.parse::<AccessLevel>() {
                Ok(level) => AccessOverride::Narrow(level),
                Err(_) => AccessOverride::Unrecognized(level.to_string()),
            },
        };
        Self {
            group: group.trim().to_string(),
            access,
        }
    }
}

impl core::fmt::Display for GroupRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match &self.access {
            AccessOverride::Inherit => f.write_str(&self.group),
            AccessOverride::Narrow(level) => write!(f, "{}:{}", self.group, level),
            AccessOverride::Unrecognized(raw) => write!(f, "{}:{}", self.group, raw),
        }
    }
}

fn group_ref(fragment: GroupRefFragment) -> GroupRef {
    match fragment {
        GroupRefFragment::Compact(raw) => GroupRef::parse(&raw),
        GroupRefFragment::Detailed { name, access } => {
            GroupRef::with_level(&name, access.as_deref())
        }
    }
}

/// Routers a clause applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterScope {
    All,
    Only(Vec<RouterName>),
}

impl RouterScope {
    /// Whether the scope names `router`. Names compare like router names do
    /// everywhere else: case-insensitively.
    pub fn includes(&self, router: &RouterName) -> bool {
        match self {
            RouterScope::All => true,
            RouterScope::Only(names) => names.iter().any(|n| n == router),
        }
    }
}

fn router_scope(fragment: Option<ScopeFragment>) -> RouterScope {
    match fragment {
        None => RouterScope::All,
        Some(ScopeFragment::One(name)) if name.trim() == ALL_ROUTERS => RouterScope::All,
        Some(ScopeFragment::One(name)) => RouterScope::Only(vec![RouterName::new(name)]),
        Some(ScopeFragment::List(names)) => {
            RouterScope::Only(names.into_iter().map(RouterName::new).collect())
        }
    }
}

/// One grant clause: a set of groups applied to a router scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserPermissionEntry {
    pub groups: Vec<GroupRef>,
    pub routers: RouterScope,
}

/// Everything configured for one Unix user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub username: String,
    pub clauses: Vec<UserPermissionEntry>,
    pub comment: Option<String>,
    pub source: PathBuf,
    pub order: usize,
}

impl UserRecord {
    /// Group references whose override suffix could not be understood.
    pub fn unrecognized_refs(&self) -> impl Iterator<Item = &GroupRef> {
        self.clauses
            .iter()
            .flat_map(|c| c.groups.iter())
            .filter(|g| matches!(g.access, AccessOverride::Unrecognized(_)))
    }
}

impl Record for UserRecord {
    const KIND: RecordKind = RecordKind::User;

    fn name(&self) -> &str {
        &self.username
    }

    fn source(&self) -> &Path {
        &self.source
    }

    fn order(&self) -> usize {
        self.order
    }
}

struct ParsedUser {
    username: String,
    clauses: Vec<UserPermissionEntry>,
    comment: Option<String>,
}

fn parse_user(content: &str) -> Result<ParsedUser, FragmentError> {
    let doc: UserDocument = parse_document(content)?;
    let user = doc.user;
    if user.username.trim().is_empty() {
        return Err(FragmentError::invalid("username must not be empty"));
    }
    let clauses = user
        .permissions
        .into_iter()
        .map(|clause| UserPermissionEntry {
            groups: clause.groups.into_iter().map(group_ref).collect(),
            routers: router_scope(clause.routers),
        })
        .collect();
    Ok(ParsedUser {
        username: user.username,
        clauses,
        comment: user.comment,
    })
}

/// Merged user records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserRegistry {
    inner: Registry<UserRecord>,
}

impl UserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(dir: &Path) -> (Self, Vec<ConfigIssue>) {
        let loaded = load_fragments(dir, parse_user);
        let (inner, mut issues) = Registry::from_load(loaded, |u, source, order| UserRecord {
            username: u.username,
            clauses: u.clauses,
            comment: u.comment,
            source: source.to_path_buf(),
            order,
        });
        for user in inner.iter() {
            for group_ref in user.unrecognized_refs() {
                tracing::warn!(
                    user = %user.username,
                    group_ref = %group_ref,
                    "group reference has an unknown access level; it grants nothing"
                );
                issues.push(ConfigIssue::warning(
                    &user.source,
                    format!(
                        "user '{}': group reference '{group_ref}' has an unknown access level",
                        user.username
                    ),
                ));
            }
        }
        (Self { inner }, issues)
    }

    pub fn register(&mut self, user: UserRecord) -> Result<(), ConfigIssue> {
        self.inner.register(user)
    }

    pub fn get(&self, username: &str) -> Option<&UserRecord> {
        self.inner.get(username)
    }

    pub fn iter(&self) -> impl Iterator<Item = &UserRecord> {
        self.inner.iter()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

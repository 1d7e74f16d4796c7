use std::collections::BTreeSet;

use serde::Serialize;

/// Who is asking, as established by the caller from the OS.
///
/// Built fresh for every invocation; never persisted. The resolver itself
/// never inspects the OS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentityContext {
    /// Effective Unix user name.
    pub username: String,
    /// Unix group memberships.
    pub groups: BTreeSet<String>,
    /// Running with superuser privilege.
    pub superuser: bool,
}

impl IdentityContext {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            groups: BTreeSet::new(),
            superuser: false,
        }
    }

    pub fn superuser(username: impl Into<String>) -> Self {
        Self {
            superuser: true,
            ..Self::new(username)
        }
    }

    #[must_use]
    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups.extend(groups.into_iter().map(Into::into));
        self
    }
}

//! The four registries loaded together from one configuration root.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use mikro_core::ConfigIssue;

use crate::group::GroupRegistry;
use crate::module::ModuleRegistry;
use crate::router::RouterRegistry;
use crate::user::{RouterScope, UserRegistry};

/// Configuration root used when nothing else is specified.
pub const DEFAULT_CONFIG_DIR: &str = "/etc/mikro-manager";

/// Environment variable overriding [`DEFAULT_CONFIG_DIR`].
pub const CONFIG_DIR_ENV: &str = "MIKRO_CONFIG_DIR";

pub const ROUTERS_DIR: &str = "routers.d";
pub const USERS_DIR: &str = "users.d";
pub const GROUPS_DIR: &str = "groups.d";
pub const MODULES_DIR: &str = "modules.d";

/// Pick the configuration root: explicit path, then `MIKRO_CONFIG_DIR`, then
/// the system default.
pub fn resolve_config_dir(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    match std::env::var_os(CONFIG_DIR_ENV) {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => PathBuf::from(DEFAULT_CONFIG_DIR),
    }
}

/// Everything reported while loading a configuration root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigReport {
    pub issues: Vec<ConfigIssue>,
}

impl ConfigReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Routers, groups, modules and users, built once and then read-only.
///
/// Plain values: a long-lived embedder can build a new set and swap it in
/// atomically.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigSet {
    pub routers: RouterRegistry,
    pub groups: GroupRegistry,
    pub modules: ModuleRegistry,
    pub users: UserRegistry,
}

impl ConfigSet {
    /// Load every registry below `root`. Never fails: problems are collected
    /// into the report and whatever loaded is returned.
    pub fn load(root: &Path) -> (Self, ConfigReport) {
        let (routers, mut issues) = RouterRegistry::load(&root.join(ROUTERS_DIR));
        let (groups, group_issues) = GroupRegistry::load(&root.join(GROUPS_DIR));
        let (modules, module_issues) = ModuleRegistry::load(&root.join(MODULES_DIR));
        let (users, user_issues) = UserRegistry::load(&root.join(USERS_DIR));
        issues.extend(group_issues);
        issues.extend(module_issues);
        issues.extend(user_issues);

        let set = Self {
            routers,
            groups,
            modules,
            users,
        };
        issues.extend(set.cross_references());

        info!(
            root = %root.display(),
            routers = set.routers.len(),
            groups = set.groups.len(),
            modules = set.modules.len(),
            users = set.users.len(),
            issues = issues.len(),
            "configuration loaded"
        );
        for issue in &issues {
            warn!(%issue, "configuration issue");
        }

        (set, ConfigReport { issues })
    }

    /// References between registries that do not resolve. None of them is
    /// fatal: an unresolved reference simply grants nothing.
    pub fn cross_references(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        for group in self.groups.iter() {
            for missing in group.unresolved(&self.modules) {
                issues.push(ConfigIssue::warning(
                    &group.source,
                    format!("group '{}' refers to unknown module operation '{missing}'", group.name),
                ));
            }
        }

        for user in self.users.iter() {
            for clause in &user.clauses {
                for group_ref in &clause.groups {
                    if !self.groups.contains(&group_ref.group) {
                        issues.push(ConfigIssue::warning(
                            &user.source,
                            format!(
                                "user '{}' refers to unknown group '{}'",
                                user.username, group_ref.group
                            ),
                        ));
                    }
                }
                if let RouterScope::Only(names) = &clause.routers {
                    for name in names.iter().filter(|n| !self.routers.contains(n.as_str())) {
                        issues.push(ConfigIssue::warning(
                            &user.source,
                            format!("user '{}' refers to unknown router '{name}'", user.username),
                        ));
                    }
                }
            }
        }

        issues
    }
}

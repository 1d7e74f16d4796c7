//! Permission groups (`groups.d`).
//!
//! A group is a named bundle of module operations:
//!
//! ```yaml
//! group:
//!   name: dns-admin
//!   access: full            # or read-write / read-only; default full
//!   modules:
//!     dns: "*"              # every operation of dns
//!     dhcp: [list, add]     # explicit subset
//! ```
//!
//! `modules` may also be `"*"` (every known module) or a plain list of module
//! names (every operation of each). Group → operation associations are only
//! resolved against the [`ModuleRegistry`] when a permission is checked.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use mikro_core::{AccessLevel, ConfigIssue, RecordKind};

use crate::loader::{FragmentError, load_fragments, parse_document};
use crate::module::ModuleRegistry;
use crate::registry::{Record, Registry};

const WILDCARD: &str = "*";

#[derive(Debug, Deserialize)]
struct GroupDocument {
    group: GroupFragment,
}

#[derive(Debug, Deserialize)]
struct GroupFragment {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, alias = "default_access")]
    access: Option<String>,
    #[serde(default)]
    modules: Option<ModulesFragment>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ModulesFragment {
    One(String),
    List(Vec<String>),
    Map(BTreeMap<String, OperationsFragment>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OperationsFragment {
    One(String),
    List(Vec<String>),
}

/// Operations of one module covered by a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationSet {
    All,
    Only(BTreeSet<String>),
}

impl OperationSet {
    pub fn contains(&self, operation: &str) -> bool {
        match self {
            OperationSet::All => true,
            OperationSet::Only(ops) => ops.contains(operation),
        }
    }

    fn from_names(names: Vec<String>) -> Self {
        if names.iter().any(|n| n == WILDCARD) {
            OperationSet::All
        } else {
            OperationSet::Only(names.into_iter().collect())
        }
    }
}

/// Modules covered by a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleGrant {
    /// Every operation of every known module.
    AllModules,
    Modules(BTreeMap<String, OperationSet>),
}

impl ModuleGrant {
    fn covers(&self, module: &str, operation: &str) -> bool {
        match self {
            ModuleGrant::AllModules => true,
            ModuleGrant::Modules(modules) => modules
                .get(module)
                .is_some_and(|ops| ops.contains(operation)),
        }
    }
}

fn module_grant(fragment: Option<ModulesFragment>) -> ModuleGrant {
    match fragment {
        None => ModuleGrant::Modules(BTreeMap::new()),
        Some(ModulesFragment::One(m)) if m == WILDCARD => ModuleGrant::AllModules,
        Some(ModulesFragment::One(m)) => {
            ModuleGrant::Modules(BTreeMap::from([(m, OperationSet::All)]))
        }
        Some(ModulesFragment::List(list)) if list.iter().any(|m| m == WILDCARD) => {
            ModuleGrant::AllModules
        }
        Some(ModulesFragment::List(list)) => ModuleGrant::Modules(
            list.into_iter().map(|m| (m, OperationSet::All)).collect(),
        ),
        Some(ModulesFragment::Map(map)) => ModuleGrant::Modules(
            map.into_iter()
                .map(|(module, ops)| {
                    let ops = match ops {
                        OperationsFragment::One(op) => OperationSet::from_names(vec![op]),
                        OperationsFragment::List(list) => OperationSet::from_names(list),
                    };
                    (module, ops)
                })
                .collect(),
        ),
    }
}

/// A named bundle of allowed module operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionGroup {
    pub name: String,
    pub description: Option<String>,
    /// Nominal level of the group's grants, before any per-user override.
    pub access: AccessLevel,
    pub modules: ModuleGrant,
    pub source: PathBuf,
    pub order: usize,
}

impl PermissionGroup {
    /// Whether this group allows `module:operation`.
    ///
    /// Only operations declared in the module catalogue can be allowed; a
    /// group entry naming an unknown module or operation grants nothing.
    pub fn allows(&self, modules: &ModuleRegistry, module: &str, operation: &str) -> bool {
        modules.classify(module, operation).is_some() && self.modules.covers(module, operation)
    }

    /// Module and operation names this group mentions that the catalogue
    /// does not know.
    pub fn unresolved(&self, modules: &ModuleRegistry) -> Vec<String> {
        let ModuleGrant::Modules(grants) = &self.modules else {
            return Vec::new();
        };
        let mut missing = Vec::new();
        for (module, ops) in grants {
            let Some(definition) = modules.get(module) else {
                missing.push(module.clone());
                continue;
            };
            if let OperationSet::Only(ops) = ops {
                missing.extend(
                    ops.iter()
                        .filter(|op| definition.classify(op).is_none())
                        .map(|op| format!("{module}:{op}")),
                );
            }
        }
        missing
    }
}

impl Record for PermissionGroup {
    const KIND: RecordKind = RecordKind::Group;

    fn name(&self) -> &str {
        &self.name
    }

    fn source(&self) -> &Path {
        &self.source
    }

    fn order(&self) -> usize {
        self.order
    }
}

struct ParsedGroup {
    name: String,
    description: Option<String>,
    access: AccessLevel,
    modules: ModuleGrant,
}

fn parse_group(content: &str) -> Result<ParsedGroup, FragmentError> {
    let doc: GroupDocument = parse_document(content)?;
    let group = doc.group;
    if group.name.trim().is_empty() {
        return Err(FragmentError::invalid("group name must not be empty"));
    }
    let access = match group.access.as_deref() {
        None => AccessLevel::default(),
        Some(level) => level.parse::<AccessLevel>().map_err(|e| {
            FragmentError::invalid(format!("group '{}': {e}", group.name))
        })?,
    };
    Ok(ParsedGroup {
        name: group.name,
        description: group.description,
        access,
        modules: module_grant(group.modules),
    })
}

/// Merged permission groups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupRegistry {
    inner: Registry<PermissionGroup>,
}

impl GroupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(dir: &Path) -> (Self, Vec<ConfigIssue>) {
        let loaded = load_fragments(dir, parse_group);
        let (inner, issues) = Registry::from_load(loaded, |g, source, order| PermissionGroup {
            name: g.name,
            description: g.description,
            access: g.access,
            modules: g.modules,
            source: source.to_path_buf(),
            order,
        });
        (Self { inner }, issues)
    }

    pub fn register(&mut self, group: PermissionGroup) -> Result<(), ConfigIssue> {
        self.inner.register(group)
    }

    pub fn get(&self, name: &str) -> Option<&PermissionGroup> {
        self.inner.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.contains(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PermissionGroup> {
        self.inner.iter()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

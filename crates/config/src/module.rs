//! Module catalogue (`modules.d`): which operations exist and whether each
//! one reads or writes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use mikro_core::{ConfigIssue, OperationKind, RecordKind};

use crate::loader::{FragmentError, load_fragments, parse_document};
use crate::registry::{Record, Registry};

#[derive(Debug, Deserialize)]
struct ModuleDocument {
    module: ModuleFragment,
}

#[derive(Debug, Deserialize)]
struct ModuleFragment {
    name: String,
    #[serde(default)]
    operations: BTreeMap<String, Option<String>>,
}

/// A module and the classification of each of its operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDefinition {
    pub name: String,
    pub operations: BTreeMap<String, OperationKind>,
    pub source: PathBuf,
    pub order: usize,
}

impl ModuleDefinition {
    pub fn classify(&self, operation: &str) -> Option<OperationKind> {
        self.operations.get(operation).copied()
    }

    pub fn operation_names(&self) -> impl Iterator<Item = &str> {
        self.operations.keys().map(String::as_str)
    }
}

impl Record for ModuleDefinition {
    const KIND: RecordKind = RecordKind::Module;

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

struct ParsedModule {
    name: String,
    operations: BTreeMap<String, OperationKind>,
}

fn parse_module(content: &str) -> Result<ParsedModule, FragmentError> {
    let doc: ModuleDocument = parse_document(content)?;
    let module = doc.module;
    if module.name.trim().is_empty() {
        return Err(FragmentError::invalid("module name must not be empty"));
    }

    let mut operations = BTreeMap::new();
    for (operation, kind) in module.operations {
        let kind = kind.as_deref().unwrap_or("");
        let kind: OperationKind = kind.parse().map_err(|e| {
            FragmentError::invalid(format!(
                "module '{}' operation '{operation}': {e}",
                module.name
            ))
        })?;
        operations.insert(operation, kind);
    }

    Ok(ParsedModule {
        name: module.name,
        operations,
    })
}

/// Source label used for the built-in catalogue.
pub const BUILTIN_SOURCE: &str = "<builtin>";

/// Merged module definitions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleRegistry {
    inner: Registry<ModuleDefinition>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every module fragment in `dir`.
    ///
    /// When `dir` does not exist the built-in catalogue is used instead.
    pub fn load(dir: &Path) -> (Self, Vec<ConfigIssue>) {
        if !dir.is_dir() {
            tracing::debug!(dir = %dir.display(), "modules directory absent; using built-in catalogue");
            return (Self::builtin(), Vec::new());
        }
        let loaded = load_fragments(dir, parse_module);
        let (inner, issues) = Registry::from_load(loaded, |m, source, order| ModuleDefinition {
            name: m.name,
            operations: m.operations,
            source: source.to_path_buf(),
            order,
        });
        (Self { inner }, issues)
    }

    /// The catalogue shipped with the tools: the `dns` module.
    pub fn builtin() -> Self {
        use OperationKind::{Read, Write};

        let dns: BTreeMap<String, OperationKind> = [
            ("list", Read),
            ("search", Read),
            ("validate", Read),
            ("export", Read),
            ("add", Write),
            ("update", Write),
            ("delete", Write),
            ("enable", Write),
            ("disable", Write),
            ("import", Write),
        ]
        .into_iter()
        .map(|(op, kind)| (op.to_string(), kind))
        .collect();

        Self {
            inner: Registry::single(ModuleDefinition {
                name: "dns".to_string(),
                operations: dns,
                source: PathBuf::from(BUILTIN_SOURCE),
                order: 0,
            }),
        }
    }

    pub fn register(&mut self, module: ModuleDefinition) -> Result<(), ConfigIssue> {
        self.inner.register(module)
    }

    pub fn get(&self, module: &str) -> Option<&ModuleDefinition> {
        self.inner.get(module)
    }

    pub fn contains(&self, module: &str) -> bool {
        self.inner.contains(module)
    }

    /// Classification of `module:operation`, or `None` if either is unknown.
    pub fn classify(&self, module: &str, operation: &str) -> Option<OperationKind> {
        self.get(module).and_then(|m| m.classify(operation))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModuleDefinition> {
        self.inner.iter()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

//! Router connection descriptors (`routers.d`).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use mikro_core::{ConfigIssue, LookupError, RecordKind, RouterName};

use crate::loader::{FragmentError, load_fragments, parse_document};
use crate::registry::{Record, Registry};

/// Default RouterOS API port.
pub const DEFAULT_API_PORT: u16 = 8728;

#[derive(Debug, Deserialize)]
struct RouterDocument {
    router: RouterFragment,
}

#[derive(Debug, Deserialize)]
struct RouterFragment {
    name: String,
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    username: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    use_ssl: bool,
}

fn default_port() -> u16 {
    DEFAULT_API_PORT
}

/// Connection settings for one router.
///
/// Immutable once loaded. The password is never printed by `Debug` and is
/// skipped when the descriptor is serialized for reports.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct RouterDescriptor {
    pub name: RouterName,
    pub host: String,
    pub port: u16,
    pub username: String,
    #[serde(skip)]
    pub password: String,
    pub use_ssl: bool,
    pub source: PathBuf,
    pub order: usize,
}

impl core::fmt::Debug for RouterDescriptor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RouterDescriptor")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("use_ssl", &self.use_ssl)
            .field("source", &self.source)
            .field("order", &self.order)
            .finish()
    }
}

impl Record for RouterDescriptor {
    const KIND: RecordKind = RecordKind::Router;

    fn name(&self) -> &str {
        self.name.as_str()
    }

    fn source(&self) -> &Path {
        &self.source
    }

    fn order(&self) -> usize {
        self.order
    }

    fn key_for(name: &str) -> String {
        RouterName::new(name).key()
    }
}

fn parse_router(content: &str) -> Result<RouterFragment, FragmentError> {
    let doc: RouterDocument = parse_document(content)?;
    let router = doc.router;
    if router.name.trim().is_empty() {
        return Err(FragmentError::invalid("router name must not be empty"));
    }
    if router.host.trim().is_empty() {
        return Err(FragmentError::invalid(format!(
            "router '{}' has no host",
            router.name
        )));
    }
    Ok(router)
}

/// Merged router descriptors. The first-loaded router is the default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouterRegistry {
    inner: Registry<RouterDescriptor>,
}

impl RouterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `*.yaml` router fragment in `dir`.
    pub fn load(dir: &Path) -> (Self, Vec<ConfigIssue>) {
        let loaded = load_fragments(dir, parse_router);
        let (inner, issues) = Registry::from_load(loaded, |f, source, order| RouterDescriptor {
            name: RouterName::new(f.name),
            host: f.host,
            port: f.port,
            username: f.username,
            password: f.password,
            use_ssl: f.use_ssl,
            source: source.to_path_buf(),
            order,
        });
        (Self { inner }, issues)
    }

    /// Add a descriptor; a duplicate name (any case) is rejected.
    pub fn register(&mut self, descriptor: RouterDescriptor) -> Result<(), ConfigIssue> {
        self.inner.register(descriptor)
    }

    /// Case-insensitive exact lookup.
    pub fn lookup(&self, name: &str) -> Result<&RouterDescriptor, LookupError> {
        self.inner.get(name).ok_or_else(|| LookupError::NotFound {
            name: name.to_string(),
            available: self.names(),
        })
    }

    /// The router loaded first.
    pub fn default_router(&self) -> Result<&RouterDescriptor, LookupError> {
        self.inner.first().ok_or(LookupError::NoRoutersConfigured)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.contains(name)
    }

    /// Router names in load order.
    pub fn names(&self) -> Vec<String> {
        self.inner.iter().map(|r| r.name.to_string()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RouterDescriptor> {
        self.inner.iter()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

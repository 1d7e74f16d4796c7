//! `mikro-config` — layered, directory-based configuration.
//!
//! Each record kind lives in its own `*.d` directory, one record per YAML
//! file. Directories are read independently; within a directory, lexical file
//! order decides precedence (first definition wins).

pub mod group;
pub mod loader;
pub mod module;
pub mod registry;
pub mod router;
pub mod set;
pub mod user;

pub use group::{GroupRegistry, ModuleGrant, OperationSet, PermissionGroup};
pub use loader::{Fragment, FragmentError, LoadResult, load_fragments, parse_document};
pub use module::{ModuleDefinition, ModuleRegistry};
pub use registry::{Record, Registry};
pub use router::{DEFAULT_API_PORT, RouterDescriptor, RouterRegistry};
pub use set::{CONFIG_DIR_ENV, ConfigReport, ConfigSet, DEFAULT_CONFIG_DIR, resolve_config_dir};
pub use user::{AccessOverride, GroupRef, RouterScope, UserPermissionEntry, UserRecord, UserRegistry};

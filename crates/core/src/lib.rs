//! `mikro-core` — shared vocabulary for the router access-control layer.
//!
//! This crate contains **pure** primitives (no filesystem, no OS identity).

pub mod access;
pub mod error;
pub mod id;

pub use access::{AccessLevel, OperationKind};
pub use error::{
    AccessError, ConfigIssue, DenialKind, ExitStatus, LookupError, ParseError,
    RecordKind,
};
pub use id::RouterName;

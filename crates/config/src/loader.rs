//! Fragment discovery and parsing.
//!
//! A fragment directory is scanned for `*.yaml` files, which are parsed in
//! ascending lexical order of their file names. Numeric prefixes (`00-`,
//! `10-`, ...) are a naming convention only; the loader guarantees ordering,
//! nothing more.
//!
//! - A missing directory is an empty result, not an error.
//! - A fragment that fails to read or parse is skipped and reported.
//! - No writes.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};

use mikro_core::ConfigIssue;

/// File extension that marks a fragment.
pub const FRAGMENT_EXTENSION: &str = "yaml";

/// A successfully parsed fragment with its provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment<T> {
    pub value: T,
    pub source: PathBuf,
    /// Position among the fragments parsed from the same directory.
    pub order: usize,
}

/// Outcome of loading one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadResult<T> {
    pub fragments: Vec<Fragment<T>>,
    pub issues: Vec<ConfigIssue>,
}

impl<T> Default for LoadResult<T> {
    fn default() -> Self {
        Self {
            fragments: Vec::new(),
            issues: Vec::new(),
        }
    }
}

/// Why a single fragment could not be turned into a record.
#[derive(Debug, Error)]
pub enum FragmentError {
    #[error("read failed: {0}")]
    Read(#[from] std::io::Error),

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{0}")]
    Invalid(String),
}

impl FragmentError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }
}

/// Deserialize a YAML fragment, treating an empty document as an error.
pub fn parse_document<D: DeserializeOwned>(content: &str) -> Result<D, FragmentError> {
    if content.trim().is_empty() {
        return Err(FragmentError::invalid("empty fragment"));
    }
    Ok(serde_yaml::from_str(content)?)
}

/// Load every fragment in `dir` through `parse`, in lexical file-name order.
pub fn load_fragments<T, F>(dir: &Path, mut parse: F) -> LoadResult<T>
where
    F: FnMut(&str) -> Result<T, FragmentError>,
{
    let mut result = LoadResult::default();

    if !dir.is_dir() {
        debug!(dir = %dir.display(), "fragment directory absent; nothing to load");
        return result;
    }

    let files = match list_fragment_files(dir) {
        Ok(files) => files,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "cannot list fragment directory");
            result.issues.push(ConfigIssue::load(dir, e.to_string()));
            return result;
        }
    };

    for path in files {
        let parsed = std::fs::read_to_string(&path)
            .map_err(FragmentError::from)
            .and_then(|content| parse(&content));

        match parsed {
            Ok(value) => {
                let order = result.fragments.len();
                debug!(file = %path.display(), order, "loaded fragment");
                result.fragments.push(Fragment {
                    value,
                    source: path,
                    order,
                });
            }
            Err(e) => {
                warn!(file = %path.display(), error = %e, "skipping malformed fragment");
                result.issues.push(ConfigIssue::load(path, e.to_string()));
            }
        }
    }

    result
}

fn list_fragment_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_fragment = path
            .extension()
            .is_some_and(|ext| ext == FRAGMENT_EXTENSION);
        if is_fragment && path.is_file() {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

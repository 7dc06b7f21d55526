//! Repository access for the agent.
//!
//! [`CodeRepository`] is the read-only view the tools run against.
//! [`LocalRepository`] implements it over a checked-out directory, and
//! [`cloner`] produces that directory from a remote URL.

pub mod cloner;
pub mod local;

pub use cloner::{clone_repository, current_commit, Checkout, CloneOptions};
pub use local::{LocalRepository, ScanConfig};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One line matched by a code search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchMatch {
    pub file: String,
    pub line: usize,
    pub content: String,
}

/// Declared dependencies of the project (name -> version requirement).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependencies {
    pub dependencies: BTreeMap<String, String>,
    #[serde(rename = "devDependencies")]
    pub dev_dependencies: BTreeMap<String, String>,
}

/// Read-only view of the repository under audit.
///
/// Implementations must be shareable across concurrent analysis runs.
pub trait CodeRepository: Send + Sync {
    /// Relative paths of files matching a glob pattern.
    fn list_files(&self, pattern: &str) -> Result<Vec<String>>;

    /// Read several files at once. Never fails as a whole: files that are
    /// missing or unreadable map to an `[error: ...]` placeholder.
    fn read_files(&self, paths: &[String]) -> BTreeMap<String, String>;

    /// Search file contents for a regex, optionally restricted by a file glob.
    fn search_code(&self, pattern: &str, file_glob: Option<&str>) -> Result<Vec<SearchMatch>>;

    /// Dependencies declared in the project manifest.
    fn get_dependencies(&self) -> Result<Dependencies>;
}

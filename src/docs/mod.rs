//! Design-system documentation available to the agent.
//!
//! Documentation is optional. When configured, the agent gets two extra
//! tools to list and read these documents alongside the code.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

/// File extensions treated as documentation.
const DOC_EXTENSIONS: &[&str] = &["md", "mdx", "txt", "json"];

/// Largest document handed to the agent, in bytes.
pub const MAX_DOC_SIZE: u64 = 512 * 1024;

#[derive(Debug, Error)]
pub enum DocsError {
    #[error("document not found: {0}")]
    NotFound(String),
    #[error("not a documentation file: {0}")]
    Unsupported(String),
    #[error("document too large: {path} ({size} bytes, limit {limit})")]
    TooLarge { path: String, size: u64, limit: u64 },
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// A document known to one of the sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextDocument {
    /// Name of the source that holds the document.
    pub source: String,
    /// Document kind derived from its extension ("markdown", "json", ...).
    #[serde(rename = "type")]
    pub doc_type: String,
    /// Path relative to the source root.
    pub path: String,
}

/// Collaborator serving design-system documentation.
pub trait DocumentSource: Send + Sync {
    fn list_documents(&self) -> Result<Vec<ContextDocument>>;

    /// Read a document by its relative path. The first source holding it wins.
    fn read_document(&self, path: &str) -> Result<String, DocsError>;
}

/// A named documentation directory.
#[derive(Debug, Clone)]
pub struct DocDirectory {
    pub name: String,
    pub root: PathBuf,
}

/// Documentation read from local directories, searched in order.
pub struct LocalDocs {
    sources: Vec<DocDirectory>,
}

impl LocalDocs {
    pub fn new(sources: Vec<DocDirectory>) -> Self {
        Self { sources }
    }

    /// Build from plain directory paths, naming each source after its last component.
    pub fn from_paths(paths: &[PathBuf]) -> Self {
        let sources = paths
            .iter()
            .map(|root| DocDirectory {
                name: root
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| root.display().to_string()),
                root: root.clone(),
            })
            .collect();
        Self::new(sources)
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

fn doc_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension().and_then(|e| e.to_str())?;
    if !DOC_EXTENSIONS.contains(&ext) {
        return None;
    }
    Some(match ext {
        "md" | "mdx" => "markdown",
        "json" => "json",
        _ => "text",
    })
}

fn is_safe_relative(path: &str) -> bool {
    let path = Path::new(path);
    !path.is_absolute()
        && !path
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
}

impl DocumentSource for LocalDocs {
    fn list_documents(&self) -> Result<Vec<ContextDocument>> {
        let mut documents = Vec::new();

        for source in &self.sources {
            if !source.root.is_dir() {
                debug!("Documentation source missing: {}", source.root.display());
                continue;
            }

            for entry in WalkDir::new(&source.root)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
            {
                let Some(kind) = doc_type(entry.path()) else {
                    continue;
                };
                let relative = entry
                    .path()
                    .strip_prefix(&source.root)
                    .unwrap_or(entry.path())
                    .to_string_lossy()
                    .replace('\\', "/");
                documents.push(ContextDocument {
                    source: source.name.clone(),
                    doc_type: kind.to_string(),
                    path: relative,
                });
            }
        }

        Ok(documents)
    }

    fn read_document(&self, path: &str) -> Result<String, DocsError> {
        if !is_safe_relative(path) {
            return Err(DocsError::NotFound(path.to_string()));
        }

        if doc_type(Path::new(path)).is_none() {
            return Err(DocsError::Unsupported(path.to_string()));
        }

        for source in &self.sources {
            let full_path = source.root.join(path);
            if !full_path.is_file() {
                continue;
            }

            let io_error = |e: std::io::Error| DocsError::Io {
                path: path.to_string(),
                source: e,
            };
            let size = fs::metadata(&full_path).map_err(io_error)?.len();
            if size > MAX_DOC_SIZE {
                return Err(DocsError::TooLarge {
                    path: path.to_string(),
                    size,
                    limit: MAX_DOC_SIZE,
                });
            }
            return fs::read_to_string(&full_path).map_err(io_error);
        }

        Err(DocsError::NotFound(path.to_string()))
    }
}

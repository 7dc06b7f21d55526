//! Filesystem-backed repository.
//!
//! Walks a checked-out directory while respecting configured excludes,
//! hidden files, and a maximum file size.

use super::{CodeRepository, Dependencies, SearchMatch};
use anyhow::{anyhow, bail, Context, Result};
use glob::Pattern;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Longest line echoed back in a search result.
const MAX_MATCH_LINE_CHARS: usize = 240;

/// Configuration for repository traversal.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Extensions searched when `search_code` gets no file glob.
    pub extensions: Vec<String>,
    /// Directory or file names to skip (e.g. ["node_modules", "dist"]).
    pub excludes: Vec<String>,
    /// Maximum file size in bytes.
    pub max_file_size: u64,
    /// Cap on `search_code` matches.
    pub max_search_results: usize,
    /// Cap on `list_files` entries.
    pub max_listed_files: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extensions: vec![
                "js", "jsx", "ts", "tsx", "vue", "svelte", "css", "scss", "less", "html",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            excludes: vec![
                ".git",
                "node_modules",
                "dist",
                "build",
                "coverage",
                ".next",
                "target",
                "vendor",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            max_file_size: 256 * 1024,
            max_search_results: 50,
            max_listed_files: 500,
        }
    }
}

impl From<&crate::config::ScannerConfig> for ScanConfig {
    fn from(config: &crate::config::ScannerConfig) -> Self {
        Self {
            extensions: config.extensions.clone(),
            excludes: config.excludes.clone(),
            max_file_size: config.max_file_size,
            max_search_results: config.max_search_results,
            max_listed_files: config.max_listed_files,
        }
    }
}

/// A repository rooted at a local directory.
pub struct LocalRepository {
    root: PathBuf,
    config: ScanConfig,
}

impl LocalRepository {
    pub fn new(root: PathBuf, config: ScanConfig) -> Self {
        Self { root, config }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All non-excluded files as (absolute path, relative path), sorted by name.
    pub fn files(&self) -> Vec<(PathBuf, String)> {
        WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !self.is_excluded_entry(entry))
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    debug!("Skipping unreadable entry: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| {
                let path = entry.into_path();
                let relative = self.relative(&path);
                (path, relative)
            })
            .collect()
    }

    fn is_excluded_entry(&self, entry: &DirEntry) -> bool {
        let name = entry.file_name().to_string_lossy();
        self.is_excluded(&name)
    }

    /// Check if a name matches exclusion patterns.
    fn is_excluded(&self, name: &str) -> bool {
        if name.starts_with('.') {
            return true;
        }

        self.config.excludes.iter().any(|pattern| name == pattern)
    }

    fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }

    fn has_searchable_extension(&self, path: &Path) -> bool {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        self.config.extensions.iter().any(|allowed| allowed == ext)
    }

    fn too_large(&self, path: &Path) -> bool {
        fs::metadata(path)
            .map(|m| m.len() > self.config.max_file_size)
            .unwrap_or(true)
    }

    /// Resolve a relative path, refusing anything that escapes the root.
    fn resolve(&self, relative: &str) -> Result<PathBuf> {
        let candidate = Path::new(relative);
        let escapes = candidate.is_absolute()
            || candidate
                .components()
                .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)));
        if escapes {
            bail!("access denied: path outside repository");
        }

        let full_path = self.root.join(candidate);

        // Symlinks can still point outside the root.
        if let (Ok(canonical_root), Ok(canonical_path)) =
            (fs::canonicalize(&self.root), fs::canonicalize(&full_path))
        {
            if !canonical_path.starts_with(canonical_root) {
                bail!("access denied: path outside repository");
            }
        }

        Ok(full_path)
    }

    fn read_one(&self, relative: &str) -> Result<String> {
        let full_path = self.resolve(relative)?;

        if !full_path.exists() {
            bail!("file not found");
        }
        if !full_path.is_file() {
            bail!("not a file");
        }
        let size = fs::metadata(&full_path)?.len();
        if size > self.config.max_file_size {
            bail!(
                "file too large ({} bytes, limit {})",
                size,
                self.config.max_file_size
            );
        }

        fs::read_to_string(&full_path).map_err(|e| anyhow!("failed to read file: {}", e))
    }

    fn package_json_dependencies(path: &Path) -> Result<Dependencies> {
        let content = fs::read_to_string(path).context("failed to read package.json")?;
        let manifest: Value = serde_json::from_str(&content).context("invalid package.json")?;

        let section = |key: &str| -> BTreeMap<String, String> {
            manifest
                .get(key)
                .and_then(Value::as_object)
                .map(|deps| {
                    deps.iter()
                        .map(|(name, version)| {
                            let version = version.as_str().unwrap_or("*").to_string();
                            (name.clone(), version)
                        })
                        .collect()
                })
                .unwrap_or_default()
        };

        Ok(Dependencies {
            dependencies: section("dependencies"),
            dev_dependencies: section("devDependencies"),
        })
    }

    fn cargo_dependencies(path: &Path) -> Result<Dependencies> {
        let content = fs::read_to_string(path).context("failed to read Cargo.toml")?;
        let manifest: toml::Value = toml::from_str(&content).context("invalid Cargo.toml")?;

        let section = |key: &str| -> BTreeMap<String, String> {
            manifest
                .get(key)
                .and_then(toml::Value::as_table)
                .map(|deps| {
                    deps.iter()
                        .map(|(name, spec)| {
                            let version = match spec {
                                toml::Value::String(v) => v.clone(),
                                toml::Value::Table(t) => t
                                    .get("version")
                                    .and_then(toml::Value::as_str)
                                    .unwrap_or("*")
                                    .to_string(),
                                _ => "*".to_string(),
                            };
                            (name.clone(), version)
                        })
                        .collect()
                })
                .unwrap_or_default()
        };

        Ok(Dependencies {
            dependencies: section("dependencies"),
            dev_dependencies: section("dev-dependencies"),
        })
    }
}

impl CodeRepository for LocalRepository {
    fn list_files(&self, pattern: &str) -> Result<Vec<String>> {
        let pattern = pattern.trim();
        let matcher = if pattern.is_empty() || pattern == "*" || pattern == "**" {
            None
        } else {
            Some(
                Pattern::new(pattern.trim_start_matches("./"))
                    .with_context(|| format!("invalid glob pattern: {}", pattern))?,
            )
        };

        let mut listed: Vec<String> = self
            .files()
            .into_iter()
            .map(|(_, relative)| relative)
            .filter(|relative| matcher.as_ref().map_or(true, |m| m.matches(relative)))
            .collect();

        if listed.len() > self.config.max_listed_files {
            warn!(
                "list_files({}) matched {} files, truncating to {}",
                pattern,
                listed.len(),
                self.config.max_listed_files
            );
            listed.truncate(self.config.max_listed_files);
        }

        Ok(listed)
    }

    fn read_files(&self, paths: &[String]) -> BTreeMap<String, String> {
        paths
            .iter()
            .map(|path| {
                let content = self
                    .read_one(path)
                    .unwrap_or_else(|e| format!("[error: {}]", e));
                (path.clone(), content)
            })
            .collect()
    }

    fn search_code(&self, pattern: &str, file_glob: Option<&str>) -> Result<Vec<SearchMatch>> {
        let regex =
            Regex::new(pattern).with_context(|| format!("invalid search pattern: {}", pattern))?;
        let file_filter = file_glob
            .map(|g| {
                Pattern::new(g.trim_start_matches("./"))
                    .with_context(|| format!("invalid file glob: {}", g))
            })
            .transpose()?;

        let max = self.config.max_search_results;
        let mut results = Vec::new();

        for (path, relative) in self.files() {
            if results.len() >= max {
                break;
            }

            let included = match &file_filter {
                Some(filter) => filter.matches(&relative),
                None => self.has_searchable_extension(&path),
            };
            if !included || self.too_large(&path) {
                continue;
            }

            let Ok(content) = fs::read_to_string(&path) else {
                continue;
            };

            for (index, line) in content.lines().enumerate() {
                if regex.is_match(line) {
                    results.push(SearchMatch {
                        file: relative.clone(),
                        line: index + 1,
                        content: line.trim().chars().take(MAX_MATCH_LINE_CHARS).collect(),
                    });
                    if results.len() >= max {
                        break;
                    }
                }
            }
        }

        debug!("search_code({}) found {} matches", pattern, results.len());
        Ok(results)
    }

    fn get_dependencies(&self) -> Result<Dependencies> {
        let package_json = self.root.join("package.json");
        if package_json.is_file() {
            return Self::package_json_dependencies(&package_json);
        }

        let cargo_toml = self.root.join("Cargo.toml");
        if cargo_toml.is_file() {
            return Self::cargo_dependencies(&cargo_toml);
        }

        bail!("no package.json or Cargo.toml found in repository root")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fixture() -> LocalRepository {
        let root = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures/sample-app");
        LocalRepository::new(root, ScanConfig::default())
    }

    #[test]
    fn test_list_files_with_glob() {
        let repo = fixture();
        let files = repo.list_files("src/components/*.tsx").unwrap();
        assert_eq!(files, vec!["src/components/Button.tsx", "src/components/Card.tsx"]);
    }

    #[test]
    fn test_list_files_all_skips_hidden_and_excluded() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("node_modules/pkg")).unwrap();
        fs::write(temp_dir.path().join("node_modules/pkg/index.js"), "x").unwrap();
        fs::write(temp_dir.path().join(".env"), "SECRET=1").unwrap();
        fs::write(temp_dir.path().join("App.tsx"), "export {}").unwrap();

        let repo = LocalRepository::new(temp_dir.path().to_path_buf(), ScanConfig::default());
        assert_eq!(repo.list_files("**/*").unwrap(), vec!["App.tsx"]);
        assert_eq!(repo.list_files("").unwrap(), vec!["App.tsx"]);
    }

    #[test]
    fn test_list_files_invalid_glob() {
        assert!(fixture().list_files("src/[").is_err());
    }

    #[test]
    fn test_read_files_reports_missing_as_placeholder() {
        let repo = fixture();
        let files = repo.read_files(&[
            "src/components/Button.tsx".to_string(),
            "src/nope.tsx".to_string(),
        ]);
        assert!(files["src/components/Button.tsx"].contains("<button"));
        assert_eq!(files["src/nope.tsx"], "[error: file not found]");
    }

    #[test]
    fn test_read_files_refuses_escape() {
        let repo = fixture();
        let files = repo.read_files(&["../../Cargo.toml".to_string()]);
        assert!(files["../../Cargo.toml"].contains("outside repository"));
    }

    #[test]
    fn test_read_files_respects_size_limit() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("big.css"), "a".repeat(64)).unwrap();
        let config = ScanConfig {
            max_file_size: 16,
            ..ScanConfig::default()
        };
        let repo = LocalRepository::new(temp_dir.path().to_path_buf(), config);
        let files = repo.read_files(&["big.css".to_string()]);
        assert!(files["big.css"].starts_with("[error: file too large"));
    }

    #[test]
    fn test_search_code_regex() {
        let repo = fixture();
        let matches = repo.search_code(r"#[0-9a-fA-F]{6}", None).unwrap();
        assert!(!matches.is_empty());
        assert!(matches.iter().all(|m| m.line > 0));
        assert!(matches.iter().any(|m| m.file == "src/pages/Home.tsx"));
    }

    #[test]
    fn test_search_code_with_file_glob() {
        let repo = fixture();
        let matches = repo.search_code("<button", Some("src/pages/*")).unwrap();
        assert!(matches.iter().all(|m| m.file.starts_with("src/pages/")));
    }

    #[test]
    fn test_search_code_caps_results() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a.ts"), "x\n".repeat(20)).unwrap();
        let config = ScanConfig {
            max_search_results: 5,
            ..ScanConfig::default()
        };
        let repo = LocalRepository::new(temp_dir.path().to_path_buf(), config);
        assert_eq!(repo.search_code("x", None).unwrap().len(), 5);
    }

    #[test]
    fn test_search_code_invalid_regex() {
        assert!(fixture().search_code("(unclosed", None).is_err());
    }

    #[test]
    fn test_get_dependencies_package_json() {
        let deps = fixture().get_dependencies().unwrap();
        assert_eq!(deps.dependencies.get("@acme/ui").map(String::as_str), Some("^2.4.0"));
        assert!(deps.dev_dependencies.contains_key("typescript"));
    }

    #[test]
    fn test_get_dependencies_cargo_fallback() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("Cargo.toml"),
            "[package]\nname = \"x\"\n\n[dependencies]\nserde = { version = \"1\", features = [\"derive\"] }\nlog = \"0.4\"\n\n[dev-dependencies]\ntempfile = \"3\"\n",
        )
        .unwrap();
        let repo = LocalRepository::new(temp_dir.path().to_path_buf(), ScanConfig::default());
        let deps = repo.get_dependencies().unwrap();
        assert_eq!(deps.dependencies["serde"], "1");
        assert_eq!(deps.dependencies["log"], "0.4");
        assert_eq!(deps.dev_dependencies["tempfile"], "3");
    }

    #[test]
    fn test_get_dependencies_missing_manifest() {
        let temp_dir = TempDir::new().unwrap();
        let repo = LocalRepository::new(temp_dir.path().to_path_buf(), ScanConfig::default());
        assert!(repo.get_dependencies().is_err());
    }
}

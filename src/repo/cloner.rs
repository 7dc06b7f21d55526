//! Checkout of the repository under audit.
//!
//! A remote URL is shallow-cloned with git2 into a temporary directory, or
//! into `--checkout-dir`, where an existing checkout is reused as-is.

use anyhow::{Context, Result};
use git2::build::RepoBuilder;
use git2::{FetchOptions, Progress, RemoteCallbacks, Repository};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// A working tree ready to audit.
///
/// A clone into a temp dir is removed when this value drops; a
/// `--checkout-dir` checkout stays on disk.
pub struct Checkout {
    path: PathBuf,
    /// Short hash of HEAD, when the checkout has one.
    pub commit: Option<String>,
    /// True when an existing checkout was reused instead of cloned.
    pub reused: bool,
    scratch: Option<TempDir>,
}

impl Checkout {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True when the checkout is deleted on drop.
    pub fn is_temporary(&self) -> bool {
        self.scratch.is_some()
    }
}

/// How and where to clone.
#[derive(Debug, Clone)]
pub struct CloneOptions {
    /// Branch to check out; the remote default when `None`.
    pub branch: Option<String>,
    /// History depth; full history when `None`.
    pub depth: Option<i32>,
    pub show_progress: bool,
    /// Persistent checkout directory; a temp dir when `None`.
    pub target_dir: Option<PathBuf>,
}

impl Default for CloneOptions {
    fn default() -> Self {
        Self {
            branch: None,
            depth: Some(1),
            show_progress: true,
            target_dir: None,
        }
    }
}

/// Clone `url`, or reuse the checkout already present in `target_dir`.
pub fn clone_repository(url: &str, options: CloneOptions) -> Result<Checkout> {
    let (path, scratch) = match options.target_dir {
        Some(ref target) => {
            if let Ok(repo) = Repository::open(target) {
                return Ok(reuse(repo, target, options.branch.as_deref()));
            }
            (target.clone(), None)
        }
        None => {
            let scratch = TempDir::new().context("Failed to create temporary checkout directory")?;
            (scratch.path().to_path_buf(), Some(scratch))
        }
    };

    info!("Cloning {} into {}", url, path.display());

    let progress = if options.show_progress {
        Some(object_progress_bar()?)
    } else {
        None
    };

    let mut builder = RepoBuilder::new();
    builder.fetch_options(fetch_options(options.depth, progress.clone()));
    if let Some(ref branch) = options.branch {
        builder.branch(branch);
    }

    let repo = builder
        .clone(url, &path)
        .with_context(|| format!("Failed to clone {}", url))?;

    if let Some(bar) = progress {
        bar.finish_with_message("cloned");
    }

    let commit = short_head(&repo);
    debug!("Checked out {:?} at {}", commit, path.display());

    Ok(Checkout {
        path,
        commit,
        reused: false,
        scratch,
    })
}

fn reuse(repo: Repository, target: &Path, branch: Option<&str>) -> Checkout {
    info!("Reusing existing checkout at {}", target.display());

    if let Some(wanted) = branch {
        let current = repo
            .head()
            .ok()
            .and_then(|head| head.shorthand().map(str::to_string));
        if current.as_deref() != Some(wanted) {
            warn!(
                "Checkout at {} is on {}, not {}; auditing it as-is",
                target.display(),
                current.as_deref().unwrap_or("a detached HEAD"),
                wanted
            );
        }
    }

    Checkout {
        path: target.to_path_buf(),
        commit: short_head(&repo),
        reused: true,
        scratch: None,
    }
}

fn object_progress_bar() -> Result<ProgressBar> {
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} {msg} [{bar:40.cyan/blue}] {pos}/{len} objects")
        .context("Invalid progress bar template")?
        .progress_chars("#>-");
    let bar = ProgressBar::new(0);
    bar.set_style(style);
    bar.set_message("receiving");
    Ok(bar)
}

fn fetch_options(depth: Option<i32>, progress: Option<ProgressBar>) -> FetchOptions<'static> {
    let mut callbacks = RemoteCallbacks::new();
    if let Some(bar) = progress {
        callbacks.transfer_progress(move |stats: Progress<'_>| {
            bar.set_length(stats.total_objects() as u64);
            bar.set_position(stats.received_objects() as u64);
            true
        });
    }

    let mut fetch = FetchOptions::new();
    fetch.remote_callbacks(callbacks);
    if let Some(depth) = depth {
        fetch.depth(depth);
    }
    fetch
}

/// Short hash of HEAD for a checkout at `path`, if it is a git repository.
pub fn current_commit(path: &Path) -> Option<String> {
    Repository::discover(path).ok().and_then(|repo| short_head(&repo))
}

fn short_head(repo: &Repository) -> Option<String> {
    let commit = repo.head().ok()?.peel_to_commit().ok()?;
    let id = commit.id().to_string();
    Some(id[..8.min(id.len())].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// A repository with a single commit on its default branch.
    fn committed_repo(dir: &Path) -> Repository {
        let repo = Repository::init(dir).unwrap();
        fs::write(dir.join("Button.tsx"), "export const Button = () => null;\n").unwrap();
        {
            let mut index = repo.index().unwrap();
            index.add_path(Path::new("Button.tsx")).unwrap();
            index.write().unwrap();
            let tree_id = index.write_tree().unwrap();
            let tree = repo.find_tree(tree_id).unwrap();
            let signature = git2::Signature::now("Audit", "audit@example.com").unwrap();
            repo.commit(Some("HEAD"), &signature, &signature, "init", &tree, &[])
                .unwrap();
        }
        repo
    }

    #[test]
    fn test_clone_options_default() {
        let opts = CloneOptions::default();
        assert!(opts.branch.is_none());
        assert_eq!(opts.depth, Some(1));
        assert!(opts.target_dir.is_none());
    }

    #[test]
    fn test_current_commit_of_repo_without_commits() {
        let temp_dir = TempDir::new().unwrap();
        Repository::init(temp_dir.path()).unwrap();
        assert_eq!(current_commit(temp_dir.path()), None);
    }

    #[test]
    fn test_current_commit_is_short_hash() {
        let temp_dir = TempDir::new().unwrap();
        committed_repo(temp_dir.path());
        let commit = current_commit(temp_dir.path()).unwrap();
        assert_eq!(commit.len(), 8);
    }

    #[test]
    fn test_existing_target_is_reused() {
        let temp_dir = TempDir::new().unwrap();
        committed_repo(temp_dir.path());
        let options = CloneOptions {
            target_dir: Some(temp_dir.path().to_path_buf()),
            show_progress: false,
            branch: Some("does-not-exist".to_string()),
            ..CloneOptions::default()
        };

        let checkout = clone_repository("https://example.invalid/app.git", options).unwrap();
        assert!(checkout.reused);
        assert_eq!(checkout.commit, current_commit(temp_dir.path()));
        assert_eq!(checkout.path(), temp_dir.path());
        assert!(!checkout.is_temporary());

        drop(checkout);
        assert!(temp_dir.path().join("Button.tsx").is_file());
    }

    #[test]
    fn test_clone_from_local_source() {
        let source = TempDir::new().unwrap();
        committed_repo(source.path());
        let url = source.path().to_string_lossy().to_string();
        let options = CloneOptions {
            depth: None,
            show_progress: false,
            ..CloneOptions::default()
        };

        let checkout = clone_repository(&url, options).unwrap();
        assert!(!checkout.reused);
        assert!(checkout.path().join("Button.tsx").is_file());
        assert_eq!(checkout.commit, current_commit(source.path()));
        assert!(checkout.is_temporary());

        let cloned_at = checkout.path().to_path_buf();
        drop(checkout);
        assert!(!cloned_at.exists());
    }

    #[test]
    fn test_clone_into_checkout_dir_outlives_checkout() {
        let source = TempDir::new().unwrap();
        committed_repo(source.path());
        let parent = TempDir::new().unwrap();
        let target = parent.path().join("app");
        let options = CloneOptions {
            depth: None,
            show_progress: false,
            target_dir: Some(target.clone()),
            ..CloneOptions::default()
        };

        let checkout = clone_repository(&source.path().to_string_lossy(), options).unwrap();
        assert!(!checkout.reused);
        assert!(!checkout.is_temporary());

        drop(checkout);
        assert!(target.join("Button.tsx").is_file());
    }
}

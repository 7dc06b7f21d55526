//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::models::Priority;
use clap::Parser;
use std::path::PathBuf;

/// DsAuditor - design-system adoption audits driven by an LLM agent
///
/// The agent explores the repository with tools (list, read, search,
/// dependencies, documentation) under a token budget and reports where
/// the codebase could adopt the design system.
///
/// Examples:
///   dsauditor --repo https://github.com/owner/app.git --design-system "Acme UI" --package @acme/ui
///   dsauditor --local ./my-app --docs ./design-docs --format json
///   dsauditor --local ./my-app --token-budget 50000 --max-rounds 10
///   dsauditor --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Git repository URL to audit
    #[arg(short, long, value_name = "URL", required_unless_present_any = ["init_config", "local"])]
    pub repo: Option<String>,

    /// Local directory to audit instead of cloning
    #[arg(long, value_name = "DIR", conflicts_with = "repo")]
    pub local: Option<PathBuf>,

    /// Specific branch to clone
    #[arg(short, long, value_name = "BRANCH")]
    pub branch: Option<String>,

    /// Clone into this directory (reused if it already holds a checkout)
    #[arg(long, value_name = "DIR")]
    pub checkout_dir: Option<PathBuf>,

    /// Model identifier
    #[arg(short, long, env = "DSAUDITOR_MODEL")]
    pub model: Option<String>,

    /// Chat-completions API base URL
    #[arg(long, value_name = "URL", env = "DSAUDITOR_API_URL")]
    pub api_url: Option<String>,

    /// Environment variable holding the API key
    #[arg(long, value_name = "VAR")]
    pub api_key_env: Option<String>,

    /// Temperature for LLM responses (0.0 - 2.0)
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Token ceiling for the run
    #[arg(long, value_name = "TOKENS")]
    pub token_budget: Option<u64>,

    /// Exploration rounds before the model is forced to finish
    #[arg(long, value_name = "COUNT")]
    pub max_rounds: Option<u32>,

    /// Fraction of the token budget that triggers the forced finish (0 < r <= 1)
    #[arg(long, value_name = "RATIO")]
    pub force_threshold: Option<f64>,

    /// Name of the design system being adopted
    #[arg(long, value_name = "NAME")]
    pub design_system: Option<String>,

    /// Package(s) that ship the design system (comma-separated)
    #[arg(long, value_name = "PKGS", value_delimiter = ',')]
    pub package: Option<Vec<String>>,

    /// Extra instructions for the agent
    #[arg(long, value_name = "TEXT")]
    pub focus: Option<String>,

    /// Design-system documentation directory (repeatable)
    #[arg(long, value_name = "DIR")]
    pub docs: Vec<PathBuf>,

    /// Names to exclude from exploration (comma-separated)
    #[arg(long, value_name = "NAMES", value_delimiter = ',')]
    pub exclude: Option<Vec<String>>,

    /// Output file path for the report
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Write the full conversation as JSON to this file
    #[arg(long, value_name = "FILE")]
    pub transcript: Option<PathBuf>,

    /// Exit with code 2 if an opportunity at or above this priority is found
    #[arg(long, value_name = "LEVEL")]
    pub fail_on: Option<FailOnLevel>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .dsauditor.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// List the files the agent could explore and exit (no LLM calls)
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .dsauditor.toml configuration file
    #[arg(long)]
    pub init_config: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

/// Priority level for --fail-on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, clap::ValueEnum)]
pub enum FailOnLevel {
    Low,
    Medium,
    High,
}

impl From<FailOnLevel> for Priority {
    fn from(level: FailOnLevel) -> Self {
        match level {
            FailOnLevel::Low => Priority::Low,
            FailOnLevel::Medium => Priority::Medium,
            FailOnLevel::High => Priority::High,
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Repository label for reports: the URL, or the local path.
    pub fn repo_label(&self) -> String {
        match (&self.repo, &self.local) {
            (Some(url), _) => url.clone(),
            (None, Some(local)) => local.display().to_string(),
            (None, None) => String::new(),
        }
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if let Some(ref repo) = self.repo {
            if !repo.starts_with("https://") && !repo.starts_with("git@") {
                return Err("Repository URL must start with 'https://' or 'git@'".to_string());
            }
        }

        if let Some(ref api_url) = self.api_url {
            if !api_url.starts_with("http://") && !api_url.starts_with("https://") {
                return Err("API URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(temperature) = self.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err("Temperature must be between 0.0 and 2.0".to_string());
            }
        }

        if let Some(ratio) = self.force_threshold {
            if !(ratio > 0.0 && ratio <= 1.0) {
                return Err("Force threshold must be in (0, 1]".to_string());
            }
        }

        if self.token_budget == Some(0) {
            return Err("Token budget must be at least 1".to_string());
        }

        if self.max_rounds == Some(0) {
            return Err("Max rounds must be at least 1".to_string());
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref local_path) = self.local {
            if !local_path.is_dir() {
                return Err(format!(
                    "Local directory does not exist: {}",
                    local_path.display()
                ));
            }
        }

        for dir in &self.docs {
            if !dir.is_dir() {
                return Err(format!("Docs directory does not exist: {}", dir.display()));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// `config_verbose` is `general.verbose` from the config file; the
    /// flags win over it.
    pub fn log_level(&self, config_verbose: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || config_verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args::parse_from(["dsauditor", "--repo", "https://github.com/test/app"])
    }

    #[test]
    fn test_parse_defaults() {
        let args = make_args();
        assert_eq!(args.format, OutputFormat::Markdown);
        assert!(args.docs.is_empty());
        assert!(args.token_budget.is_none());
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_parse_budget_flags_and_packages() {
        let args = Args::parse_from([
            "dsauditor",
            "--repo",
            "https://github.com/test/app",
            "--token-budget",
            "1000",
            "--force-threshold",
            "0.8",
            "--package",
            "@acme/ui,@acme/tokens",
            "--fail-on",
            "medium",
        ]);
        assert_eq!(args.token_budget, Some(1000));
        assert_eq!(args.force_threshold, Some(0.8));
        assert_eq!(
            args.package,
            Some(vec!["@acme/ui".to_string(), "@acme/tokens".to_string()])
        );
        assert_eq!(Priority::from(args.fail_on.unwrap()), Priority::Medium);
    }

    #[test]
    fn test_repo_required_without_local() {
        assert!(Args::try_parse_from(["dsauditor"]).is_err());
        assert!(Args::try_parse_from(["dsauditor", "--init-config"]).is_ok());
    }

    #[test]
    fn test_validation_invalid_url() {
        let mut args = make_args();
        args.repo = Some("invalid-url".to_string());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_threshold_range() {
        let mut args = make_args();
        args.force_threshold = Some(0.0);
        assert!(args.validate().is_err());
        args.force_threshold = Some(1.0);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(false), tracing::Level::INFO);
        assert_eq!(args.log_level(true), tracing::Level::DEBUG);

        args.verbose = true;
        assert_eq!(args.log_level(false), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(false), tracing::Level::ERROR);
        assert_eq!(args.log_level(true), tracing::Level::ERROR);
    }
}

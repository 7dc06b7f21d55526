//! DsAuditor - design-system adoption audits driven by an LLM agent
//!
//! A CLI tool that lets a chat-completions model explore a repository
//! through tools and report where it could adopt a design system.
//!
//! Exit codes:
//!   0 - Success (no opportunities above threshold, or no --fail-on set)
//!   1 - Runtime error (config, clone failure, analysis error, etc.)
//!   2 - Opportunities found at or above the --fail-on priority

mod agent;
mod analysis;
mod cli;
mod config;
mod docs;
mod llm;
mod models;
mod repo;
mod report;

use agent::{prompts, AnalysisEngine, ToolDispatcher};
use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::{Config, CONFIG_FILE_NAME};
use docs::{DocumentSource, LocalDocs};
use llm::OpenAiClient;
use models::{Priority, Report, ReportMetadata, RunStatus};
use repo::{CodeRepository, LocalRepository, ScanConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    let (config, config_source) = match resolve_config(&args) {
        Ok(resolved) => resolved,
        Err(e) => {
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };

    init_logging(&args, config.general.verbose);

    info!("DsAuditor v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    match config_source {
        Some(path) => info!("Loaded config from {}", path.display()),
        None => debug!("No config file found, using defaults"),
    }

    match run_audit(args, config).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Audit failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .dsauditor.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to customize the model, budget, design system, and more.");
    Ok(())
}

/// Initialize logging. `RUST_LOG` wins over the verbosity flags, which win
/// over `general.verbose`.
fn init_logging(args: &Args, config_verbose: bool) {
    let level = args.log_level(config_verbose);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string().to_lowercase()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Warning: failed to set tracing subscriber: {}", e);
    }
}

/// Run the complete audit workflow. Returns the process exit code.
async fn run_audit(args: Args, mut config: Config) -> Result<i32> {
    let start_time = Instant::now();

    let repo_label = args.repo_label();

    // Step 1: Get the repository. A temporary clone lives until `_checkout` drops.
    let (repo_path, _checkout) = get_repository(&args)?;
    info!("Repository at: {}", repo_path.display());

    // Audit scope from the audited repository applies unless --config was given
    if args.config.is_none() {
        match Config::load_from_dir(&repo_path) {
            Ok(Some(repo_config)) => {
                info!(
                    "Applying [audit], [budget] and [scanner] from the repository's {}",
                    CONFIG_FILE_NAME
                );
                config.apply_repository_config(repo_config);
            }
            Ok(None) => {}
            Err(e) => warn!("Ignoring repository config: {:#}", e),
        }
    }
    config.merge_with_args(&args);

    let scan_config = ScanConfig::from(&config.scanner);

    if args.dry_run {
        return handle_dry_run(&repo_path, scan_config);
    }

    // Step 2: Wire the collaborators
    let repository: Arc<dyn CodeRepository> =
        Arc::new(LocalRepository::new(repo_path.clone(), scan_config));
    let docs = load_docs(&config.docs.paths);
    let dispatcher = ToolDispatcher::new(repository, docs);
    let has_docs = dispatcher.has_docs();

    let client = OpenAiClient::from_env(
        &config.model.api_url,
        &config.model.api_key_env,
        config.model.timeout_seconds,
    )?;

    let engine = AnalysisEngine::new(config.engine_config(), Arc::new(client), dispatcher);
    let engine_config = engine.config();

    println!("🤖 Auditing for {} adoption", config.audit.design_system);
    println!("   Repository: {}", repo_label);
    println!("   Model: {}", engine_config.model);
    println!("   API: {}", config.model.api_url);
    println!(
        "   Budget: {} tokens, {} rounds (forced finish at {:.0}%)",
        engine_config.token_budget,
        engine_config.max_rounds,
        engine_config.force_threshold_ratio * 100.0
    );
    if has_docs {
        println!("   Docs: {} source(s)", config.docs.paths.len());
    }

    // Step 3: Run the agent
    println!("\n🔬 Running exploration...\n");
    let system = prompts::system_prompt(has_docs);
    let user = prompts::user_prompt(&config.audit, has_docs);
    let run = engine.run(&system, &user).await;

    if let Some(ref path) = args.transcript {
        let transcript = serde_json::to_string_pretty(&run.conversation)
            .context("Failed to serialize transcript")?;
        std::fs::write(path, transcript)
            .with_context(|| format!("Failed to write transcript to {}", path.display()))?;
        info!(
            "Transcript written to {} ({} messages, {} tool results)",
            path.display(),
            run.conversation.message_count(),
            run.conversation.tool_results()
        );
    }

    // Step 4: Build and save the report
    println!("\n📝 Generating report...");

    let metadata = ReportMetadata {
        repo: repo_label,
        commit: repo::current_commit(&repo_path),
        analysis_date: Utc::now(),
        model_used: config.model.name.clone(),
        design_system: config.audit.design_system.clone(),
        duration_seconds: start_time.elapsed().as_secs_f64(),
    };
    let report = Report {
        metadata,
        result: run.result,
    };

    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&report),
    };

    let output_path = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.general.output));
    std::fs::write(&output_path, &output)
        .with_context(|| format!("Failed to write report to {}", output_path.display()))?;

    if report.result.status == RunStatus::Complete && report.result.payload.is_empty() {
        warn!("The model finished without reporting any findings");
    }

    print_summary(&report);
    println!("\n   Report saved to: {}", output_path.display());

    if report.result.status == RunStatus::Error {
        eprintln!(
            "\n❌ Analysis failed: {}",
            report.result.error_detail.as_deref().unwrap_or("unknown error")
        );
        return Ok(1);
    }

    // Check --fail-on threshold
    if let Some(level) = args.fail_on {
        let threshold = Priority::from(level);
        if analysis::any_at_or_above(&report.result.payload.opportunities, threshold) {
            eprintln!(
                "\n⛔ Opportunities found at or above {} priority. Failing (exit code 2).",
                threshold
            );
            return Ok(2);
        }
    }

    Ok(0)
}

fn print_summary(report: &Report) {
    let result = &report.result;
    let summary = analysis::OpportunitySummary::from_opportunities(&result.payload.opportunities);

    println!("\n📊 Analysis Summary:");
    println!("   Status: {}", result.status);
    println!("   Opportunities: {}", summary.total);
    println!(
        "   - {} High: {} | {} Medium: {} | {} Low: {}",
        Priority::High.emoji(),
        summary.high,
        Priority::Medium.emoji(),
        summary.medium,
        Priority::Low.emoji(),
        summary.low
    );
    println!("   Patterns: {}", result.payload.patterns.len());
    println!(
        "   Rounds: {} | Tokens: {} | Est. cost: ${:.4}",
        result.usage.rounds, result.usage.total_tokens, result.usage.estimated_cost
    );
    println!("   Duration: {:.1}s", report.metadata.duration_seconds);
}

/// Handle --dry-run: list what the agent could explore, exit.
fn handle_dry_run(repo_path: &Path, scan_config: ScanConfig) -> Result<i32> {
    println!("\n🔍 Dry run: listing explorable files (no LLM call)...\n");

    let repository = LocalRepository::new(repo_path.to_path_buf(), scan_config);
    let files = repository.list_files("**/*")?;
    println!("   Root: {}", repository.root().display());

    if files.is_empty() {
        println!("   No files found.");
    } else {
        for file in &files {
            println!("     📄 {}", file);
        }
        println!("\n   Total: {} files", files.len());
    }

    match repository.get_dependencies() {
        Ok(deps) if !deps.dependencies.is_empty() || !deps.dev_dependencies.is_empty() => {
            println!(
                "   Dependencies: {} ({} dev)",
                deps.dependencies.len(),
                deps.dev_dependencies.len()
            );
        }
        Ok(_) => {}
        Err(e) => debug!("No dependency manifest: {:#}", e),
    }

    println!("\n✅ Dry run complete. No LLM calls were made.");
    Ok(0)
}

/// Operator config: `--config`, else `.dsauditor.toml` in the working directory.
fn resolve_config(args: &Args) -> Result<(Config, Option<PathBuf>)> {
    Config::resolve(args.config.as_deref(), Path::new("."))
}

/// Documentation sources, skipping paths that are not directories.
fn load_docs(paths: &[PathBuf]) -> Option<Arc<dyn DocumentSource>> {
    let existing: Vec<PathBuf> = paths
        .iter()
        .filter(|path| {
            let is_dir = path.is_dir();
            if !is_dir {
                warn!("Docs directory not found, skipping: {}", path.display());
            }
            is_dir
        })
        .cloned()
        .collect();

    let docs = LocalDocs::from_paths(&existing);
    if docs.is_empty() {
        None
    } else {
        Some(Arc::new(docs))
    }
}

/// Get the repository path (clone if needed), with the checkout that owns it.
fn get_repository(args: &Args) -> Result<(PathBuf, Option<repo::Checkout>)> {
    if let Some(ref local) = args.local {
        info!("Using local directory: {}", local.display());
        return Ok((local.clone(), None));
    }

    let repo_url = args
        .repo
        .as_deref()
        .context("--repo or --local is required")?;
    println!("📥 Cloning repository: {}", repo_url);

    let clone_options = repo::CloneOptions {
        branch: args.branch.clone(),
        show_progress: !args.quiet,
        target_dir: args.checkout_dir.clone(),
        ..Default::default()
    };

    let checkout = repo::clone_repository(repo_url, clone_options)?;
    debug!("Checkout at {}", checkout.path().display());
    if let Some(ref commit) = checkout.commit {
        info!(
            "{} commit {}",
            if checkout.reused { "Reusing" } else { "Checked out" },
            commit
        );
    }
    if checkout.is_temporary() {
        debug!("Temporary checkout is removed when the audit ends");
    }
    Ok((checkout.path().to_path_buf(), Some(checkout)))
}

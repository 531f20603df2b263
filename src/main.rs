use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

mod cli;

use cli::Cli;
use cli::commands::{Commands, GraphCommands, PlansCommands, RepoArgs};
use fixloop::config::Config;
use fixloop::domain::{EXIT_INFRASTRUCTURE, Persistence, RunOutcome, RunStatus};
use fixloop::executor::Executor;
use fixloop::graph::{CodeGraph, repo_data_dir};
use fixloop::llm::{AnthropicClient, AnthropicConfig, LlmClient};
use fixloop::planner::{LlmPlanner, LlmPlannerConfig};
use fixloop::prompt::PromptRenderer;
use fixloop::review::{LlmReviewer, LlmReviewerConfig};
use fixloop::runner::{LoopRunner, LoopRunnerConfig};
use fixloop::store::{CachedPlanRecord, PlanCache, PlanStore};
use fixloop::tools::{ToolContext, ToolRegistry};
use fixloop::workspace::{CommitResult, Workspace};

fn setup_logging(level: &str) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("fixloop")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("fixloop.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

/// Per-repository graph and plan store
struct RepoData {
    graph: Arc<CodeGraph>,
    store: Arc<PlanStore>,
}

fn open_repo_data(config: &Config, repo_path: &Path) -> Result<RepoData> {
    let dir = repo_data_dir(&config.storage.data_dir, repo_path);
    let graph = Arc::new(CodeGraph::open(&dir).context("Failed to open code graph")?);
    let store = PlanStore::open(&dir, graph.clone())
        .context("Failed to open plan store")?
        .with_min_similarity(config.cache.min_similarity);
    Ok(RepoData {
        graph,
        store: Arc::new(store),
    })
}

fn repo_path(repo: &RepoArgs, config: &Config) -> PathBuf {
    repo.path.clone().unwrap_or_else(|| config.git.work_dir.clone())
}

async fn run_application(cli: &Cli, config: &Config) -> Result<i32> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        Commands::Fix {
            issue,
            repo_url,
            repo,
            clean,
            push,
            keep,
            max_rounds,
        } => {
            let opts = FixOptions {
                issue: issue.clone(),
                repo_url: repo_url.clone(),
                path: repo_path(repo, config),
                clean: *clean,
                push: *push || config.git.push_on_success,
                keep: *keep,
                max_rounds: max_rounds.unwrap_or(config.runner.max_rounds),
            };
            handle_fix_command(opts, config).await
        }
        Commands::Plans { command } => handle_plans_command(command, config).map(|_| 0),
        Commands::Graph { command } => handle_graph_command(command, config).map(|_| 0),
    }
}

struct FixOptions {
    issue: String,
    repo_url: Option<String>,
    path: PathBuf,
    clean: bool,
    push: bool,
    keep: bool,
    max_rounds: u32,
}

fn infrastructure_failure(what: &str, err: impl std::fmt::Display) -> i32 {
    warn!("{}: {}", what, err);
    eprintln!("{} {}: {}", "Infrastructure failure:".red().bold(), what, err);
    EXIT_INFRASTRUCTURE
}

async fn handle_fix_command(opts: FixOptions, config: &Config) -> Result<i32> {
    info!("Fixing issue: {}", opts.issue);
    println!("{} {}", "Issue:".green().bold(), opts.issue);

    let mut workspace = Workspace::new(&opts.path, opts.repo_url.clone());
    if let Err(e) = workspace.prepare(opts.clean) {
        return Ok(infrastructure_failure("working copy", e));
    }
    println!("{} {}", "Working copy:".cyan(), workspace.path().display());

    let data = match open_repo_data(config, workspace.path()) {
        Ok(d) => d,
        Err(e) => return Ok(infrastructure_failure("storage", format!("{:#}", e))),
    };
    if opts.clean
        && let Err(e) = data.graph.clear_structure()
    {
        warn!("Failed to clear code graph: {}", e);
    }
    match data.graph.index_files(workspace.path()) {
        Ok(n) => println!("{} {} files", "Indexed:".cyan(), n),
        Err(e) => warn!("Failed to index working copy: {}", e),
    }

    let llm_config = AnthropicConfig {
        model: config.llm.planner_model.clone(),
        max_tokens: config.llm.max_tokens,
        timeout: config.llm.timeout(),
    };
    let client: Arc<dyn LlmClient> = match AnthropicClient::new(llm_config) {
        Ok(c) => Arc::new(c),
        Err(e) => return Ok(infrastructure_failure("LLM client", e)),
    };

    let renderer = Arc::new(PromptRenderer::with_builtin().context("Failed to load prompt templates")?);
    let registry = Arc::new(ToolRegistry::standard(data.graph.clone()));
    let ctx = ToolContext::new(workspace.path())
        .with_max_output(config.tools.max_output_bytes)
        .with_recursive_listing(config.tools.list_files_recursive);

    let planner = LlmPlanner::new(
        client.clone(),
        renderer.clone(),
        registry.definitions(),
        LlmPlannerConfig {
            model: Some(config.llm.planner_model.clone()),
            max_tokens: config.llm.max_tokens,
            timeout: config.runner.planner_timeout(),
        },
    );
    let reviewer = LlmReviewer::new(
        client,
        renderer,
        LlmReviewerConfig {
            model: Some(config.llm.reviewer_model.clone()),
            max_tokens: config.llm.reviewer_max_tokens,
            timeout: config.runner.reviewer_timeout(),
        },
    );
    let executor = Executor::new(registry, ctx, config.runner.step_timeout());
    let cache: Arc<dyn PlanCache> = data.store.clone();
    let runner = LoopRunner::new(
        Arc::new(planner),
        executor,
        Arc::new(reviewer),
        Some(cache),
        LoopRunnerConfig {
            max_rounds: opts.max_rounds,
            cache_enabled: config.cache.enabled,
        },
    );

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling run");
            ctrl_c.cancel();
        }
    });

    let outcome = runner
        .run_with_cancel(&opts.issue, &cancel)
        .await
        .context("Loop runner failed")?;
    print_outcome(&outcome);

    if opts.push && matches!(outcome.persisted, Some(Persistence::Saved(_))) {
        let message = format!("{}{}", config.git.commit_prefix, opts.issue);
        match workspace.commit_and_push(&message) {
            Ok(CommitResult::Pushed) => println!("{} {}", "Pushed:".green(), message),
            Ok(CommitResult::NoChanges) => println!("{}", "No changes to commit".yellow()),
            Err(e) => {
                warn!("Failed to push fix: {}", e);
                println!("{} {}", "Push failed:".yellow(), e);
            }
        }
    }

    if !opts.keep
        && let Err(e) = workspace.cleanup()
    {
        warn!("Failed to clean up working copy: {}", e);
    }

    Ok(outcome.exit_code())
}

fn print_outcome(outcome: &RunOutcome) {
    let status = outcome.status.to_string();
    let status = match outcome.status {
        RunStatus::Resolved => status.green().bold(),
        RunStatus::Exhausted => status.yellow().bold(),
        RunStatus::InfrastructureFailure(_) => status.red().bold(),
        RunStatus::Cancelled => status.magenta().bold(),
    };
    println!("{} {}", "Result:".bold(), status);
    println!("{}", outcome.render_report());
}

fn print_record(record: &CachedPlanRecord, full: bool) {
    println!(
        "{}  {}  {}",
        record.id.cyan(),
        record.created_at_display().dimmed(),
        record.issue
    );
    if full {
        let files: Vec<&str> = record.touched_files.iter().map(String::as_str).collect();
        println!("  {} {}", "files:".green(), files.join(", "));
        println!("{}", record.steps_json());
    }
}

fn handle_plans_command(command: &PlansCommands, config: &Config) -> Result<()> {
    info!("Handling plans command: {:?}", command);
    match command {
        PlansCommands::List { repo } => {
            let data = open_repo_data(config, &repo_path(repo, config))?;
            let records = data.store.list()?;
            if records.is_empty() {
                println!("{}", "No cached plans".yellow());
            }
            for record in records.iter().rev() {
                print_record(record, false);
            }
        }
        PlansCommands::Show { id, repo } => {
            let data = open_repo_data(config, &repo_path(repo, config))?;
            match data.store.get(id)? {
                Some(record) => print_record(&record, true),
                None => eyre::bail!("No cached plan with id {}", id),
            }
        }
        PlansCommands::ForFile { file, repo } => {
            let data = open_repo_data(config, &repo_path(repo, config))?;
            let records = data.store.find_by_file(file)?;
            if records.is_empty() {
                println!("{} {}", "No cached plans touched".yellow(), file);
            }
            for record in &records {
                print_record(record, false);
            }
        }
    }
    Ok(())
}

fn handle_graph_command(command: &GraphCommands, config: &Config) -> Result<()> {
    info!("Handling graph command: {:?}", command);
    match command {
        GraphCommands::Index { repo } => {
            let path = repo_path(repo, config);
            let data = open_repo_data(config, &path)?;
            let count = data.graph.index_files(&path)?;
            println!("{} {} files under {}", "Indexed:".green(), count, path.display());
        }
        GraphCommands::Query { sql, repo } => {
            let data = open_repo_data(config, &repo_path(repo, config))?;
            println!("{}", data.graph.query(sql)?);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    // Setup logging once the configured level is known
    setup_logging(config.log_level()).context("Failed to setup logging")?;
    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    let code = run_application(&cli, &config).await.context("Application failed")?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

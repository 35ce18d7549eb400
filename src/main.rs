// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Sortwise: Local Folder Organizer
//!
//! Deduplicates, categorizes and files away everything dropped into the
//! watched folders, with a local Ollama model or static rules.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

use sortwise::categories;
use sortwise::config::{AppConfig, DuplicateAction};
use sortwise::coordinator::WatchCoordinator;
use sortwise::db::Database;
use sortwise::history::{History, UndoResult};
use sortwise::ollama::OllamaClient;
use sortwise::orchestrator::{Orchestrator, RunSummary};
use sortwise::watcher::FileWatcher;
use sortwise::SortwiseError;

/// Sortwise CLI - Local Folder Organizer
#[derive(Parser, Debug)]
#[command(name = "sortwise")]
#[command(author = "Jonathan D. A. Jewell <hyperpolymath>")]
#[command(version)]
#[command(about = "Deduplicate and sort files into categories with a local AI model", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (JSON format)
    #[arg(short, long, default_value = "config.json", global = true)]
    config: PathBuf,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable trace logging (most verbose)
    #[arg(long, global = true)]
    trace: bool,

    /// Output format for results
    #[arg(long, global = true, default_value = "text", value_parser = ["text", "json", "jsonl"])]
    format: String,

    /// Suppress non-essential output (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Settings shared by `sort` and `watch`
#[derive(clap::Args, Debug, Default)]
struct RunOptions {
    /// Dry run mode (log intended moves only)
    #[arg(long)]
    dry_run: bool,

    /// Destination root (default: each source root)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Use static rules instead of the AI engine
    #[arg(long)]
    no_ai: bool,

    /// Skip Ollama health check on startup
    #[arg(long)]
    skip_health_check: bool,

    /// Extract zip/tar/gz archives and sort their contents
    #[arg(long)]
    extract: bool,

    /// Delete archives after successful extraction
    #[arg(long)]
    delete_archives: bool,

    /// Remember fingerprints across runs
    #[arg(long)]
    global_dedup: bool,

    /// What to do with duplicates
    #[arg(long, value_parser = ["skip", "quarantine", "delete"])]
    duplicates: Option<String>,

    /// Add a category (repeatable, in priority order)
    #[arg(long = "category")]
    categories: Vec<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sort a directory once and exit
    Sort {
        /// Directory to sort (overrides config)
        path: Option<PathBuf>,

        #[command(flatten)]
        options: RunOptions,
    },

    /// Watch directories and sort whatever changes
    Watch {
        /// Directories to watch (overrides config)
        #[arg(short, long)]
        dir: Vec<PathBuf>,

        /// Sort existing files in directories on startup
        #[arg(long)]
        process_existing: bool,

        #[command(flatten)]
        options: RunOptions,
    },

    /// Show the effective category list
    Categories,

    /// History and undo operations
    History {
        #[command(subcommand)]
        action: HistoryCommands,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },

    /// Show AI engine and database status
    Status,

    /// Fingerprint index maintenance
    Index {
        #[command(subcommand)]
        action: IndexCommands,
    },

    /// Initialize a new Sortwise folder
    Init {
        /// Directory to initialize (default: current)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Force overwrite existing configuration
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand, Debug)]
enum HistoryCommands {
    /// List recent moves
    List {
        /// Number of entries to show
        #[arg(short = 'n', long, default_value = "10")]
        count: usize,
    },

    /// Move recently sorted files back
    Undo {
        /// Number of moves to undo
        #[arg(short = 'n', long, default_value = "1")]
        count: usize,

        /// Dry run (show what would be undone)
        #[arg(long)]
        dry_run: bool,
    },

    /// Clear all history
    Clear {
        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand, Debug)]
enum IndexCommands {
    /// Show recent placements recorded in the database
    Recent {
        /// Number of placements to show
        #[arg(short = 'n', long, default_value = "20")]
        count: usize,
    },

    /// Forget every known fingerprint so global dedup starts over
    Reset,
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Generate default configuration file
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "config.json")]
        output: PathBuf,
    },

    /// Validate configuration file
    Validate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if !cli.quiet {
        info!("Sortwise v{} - Local Folder Organizer", env!("CARGO_PKG_VERSION"));
    }

    let config = AppConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    match cli.command {
        Some(Commands::Sort { path, options }) => {
            run_sort(config, path, options, &cli.format).await
        }
        Some(Commands::Watch { dir, process_existing, options }) => {
            run_watch(config, dir, process_existing, options).await
        }
        Some(Commands::Categories) => run_categories(&config, &cli.format),
        Some(Commands::History { action }) => run_history_command(&config, action),
        Some(Commands::Config { action }) => run_config_command(config, action, &cli.config),
        Some(Commands::Status) => run_status(&config).await,
        Some(Commands::Index { action }) => run_index_command(&config, action),
        Some(Commands::Init { dir, force }) => run_init(dir, force),
        None if config.watch.enabled => {
            run_watch(config, vec![], true, RunOptions::default()).await
        }
        None => run_sort(config, None, RunOptions::default(), &cli.format).await,
    }
}

/// Fold command-line overrides into the configuration before it is frozen
fn apply_options(config: &mut AppConfig, options: &RunOptions) -> sortwise::Result<()> {
    if options.dry_run {
        config.rules.dry_run = true;
    }
    if let Some(output) = &options.output {
        config.output_dir = Some(output.to_string_lossy().to_string());
    }
    if options.no_ai {
        config.ai_engine.enabled = false;
    }
    if options.extract {
        config.rules.extract_archives = true;
    }
    if options.delete_archives {
        config.rules.delete_archives = true;
    }
    if options.global_dedup {
        config.rules.global_dedup = true;
    }
    if let Some(action) = &options.duplicates {
        config.rules.duplicate_action = action.parse::<DuplicateAction>()?;
    }
    if !options.categories.is_empty() {
        config.rules.custom_categories = options.categories.clone();
    }
    Ok(())
}

/// Create and canonicalize source roots so watcher paths match scan paths
fn prepare_roots(config: &mut AppConfig) -> sortwise::Result<()> {
    let mut roots = Vec::with_capacity(config.watch_paths.len());
    for path in config.roots() {
        if !path.exists() {
            std::fs::create_dir_all(&path)?;
            info!("Created directory: {:?}", path);
        }
        roots.push(path.canonicalize()?.to_string_lossy().to_string());
    }
    config.watch_paths = roots;
    Ok(())
}

/// Fall back to static rules when the AI engine cannot be reached
async fn check_engine(config: &mut AppConfig, skip: bool) {
    if !config.ai_engine.enabled {
        info!("AI engine disabled, using rule-based sorting");
        return;
    }
    if skip {
        warn!("Skipping Ollama health check");
        return;
    }

    let client = match OllamaClient::new(
        &config.ai_engine.url,
        std::time::Duration::from_secs(config.ai_engine.timeout_secs),
    ) {
        Ok(c) => c,
        Err(e) => {
            warn!("Cannot build Ollama client ({}), using rule-based sorting", e);
            config.ai_engine.enabled = false;
            return;
        }
    };

    info!("Checking Ollama availability...");
    if let Err(e) = client.health_check().await {
        warn!("{}. Using rule-based sorting.", e);
        config.ai_engine.enabled = false;
        return;
    }

    match client.model_available(&config.ai_engine.model).await {
        Ok(true) => info!("Model '{}' available", config.ai_engine.model),
        Ok(false) => warn!(
            "Model '{}' not found. Try: ollama pull {}",
            config.ai_engine.model, config.ai_engine.model
        ),
        Err(e) => warn!("Could not list models: {}", e),
    }
}

/// Flip the returned receiver to `true` on Ctrl+C or SIGTERM
fn shutdown_signal() -> watch::Receiver<bool> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = signal::ctrl_c().await {
                error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    error!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = terminate => info!("Received SIGTERM, shutting down..."),
        }

        let _ = shutdown_tx.send(true);
        // Keep the sender alive so receivers keep seeing `true`
        std::future::pending::<()>().await;
    });

    shutdown_rx
}

/// Sort once and report
async fn run_sort(
    mut config: AppConfig,
    path: Option<PathBuf>,
    options: RunOptions,
    format: &str,
) -> anyhow::Result<()> {
    if let Some(path) = path {
        if !path.is_dir() {
            anyhow::bail!("{} is not a directory", path.display());
        }
        config.watch_paths = vec![path.to_string_lossy().to_string()];
    }
    apply_options(&mut config, &options)?;
    prepare_roots(&mut config)?;
    check_engine(&mut config, options.skip_health_check).await;

    if config.rules.dry_run {
        warn!("DRY RUN MODE - files will not be moved");
    }

    let config = Arc::new(config);
    let orchestrator = Orchestrator::from_config(config)?;
    let shutdown = shutdown_signal();
    let summary = orchestrator.run(&shutdown).await?;

    print_summary(&summary, format)?;
    Ok(())
}

fn print_summary(summary: &RunSummary, format: &str) -> anyhow::Result<()> {
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(summary)?),
        "jsonl" => {
            for placed in &summary.placements {
                println!("{}", serde_json::to_string(placed)?);
            }
        }
        _ => {
            summary.log();
            for placed in &summary.placements {
                let arrow = if placed.moved { "->" } else { "=>" };
                println!("{} {} {} [{}]", placed.from.display(), arrow, placed.to.display(), placed.category);
            }
        }
    }
    Ok(())
}

/// Run the watch mode (main organizer loop)
async fn run_watch(
    mut config: AppConfig,
    dir_overrides: Vec<PathBuf>,
    process_existing: bool,
    options: RunOptions,
) -> anyhow::Result<()> {
    if !dir_overrides.is_empty() {
        config.watch_paths = dir_overrides
            .iter()
            .map(|p| p.to_string_lossy().to_string())
            .collect();
    }
    apply_options(&mut config, &options)?;
    prepare_roots(&mut config)?;
    check_engine(&mut config, options.skip_health_check).await;

    info!("Watch directories: {:?}", config.watch_paths);
    if config.rules.dry_run {
        warn!("DRY RUN MODE - files will not be moved");
    }

    let config = Arc::new(config);
    let orchestrator = Arc::new(Orchestrator::from_config(config.clone())?);
    info!("Database initialized: {}", config.database.path);

    let (mut watcher, events) = FileWatcher::new()?;
    for root in config.roots() {
        watcher.watch(&root)?;
    }

    let shutdown = shutdown_signal();
    let mut coordinator = WatchCoordinator::new(config.clone(), orchestrator);

    if process_existing {
        info!("Processing existing files...");
        coordinator.process_existing(&shutdown).await;
    }

    info!("Organizer active. Press Ctrl+C to stop.");
    coordinator.run(events, shutdown).await?;

    info!("Sortwise stopped.");
    Ok(())
}

fn run_categories(config: &AppConfig, format: &str) -> anyhow::Result<()> {
    let resolved = categories::resolve(config);
    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&resolved)?);
        return Ok(());
    }

    let custom = categories::resolve_with_defaults::<String>(&config.rules.custom_categories, &[]);
    println!("Categories ({}):", resolved.len());
    for (i, name) in resolved.iter().enumerate() {
        let marker = if categories::find_candidate(&custom, name).is_some() { "*" } else { " " };
        println!("  {:2}. {} {}", i + 1, marker, name);
    }
    println!("Fallback: {}", config.rules.fallback_category);
    Ok(())
}

/// Run history commands
fn run_history_command(config: &AppConfig, action: HistoryCommands) -> anyhow::Result<()> {
    let history = History::new(PathBuf::from(&config.history.path));

    match action {
        HistoryCommands::List { count } => {
            let entries = history.get_recent(count)?;
            println!("Recent history ({} entries):", entries.len());
            for entry in entries {
                let status = if entry.undone { "[UNDONE]" } else { "" };
                println!("  {} [{}] {} -> {} {}",
                    entry.timestamp.format("%Y-%m-%d %H:%M"),
                    entry.category,
                    entry.original_path.display(),
                    entry.new_path.display(),
                    status
                );
            }
        }
        HistoryCommands::Undo { count, dry_run } => {
            let entries = history.get_undoable()?;
            let to_undo: Vec<_> = entries.into_iter().rev().take(count).collect();

            if to_undo.is_empty() {
                println!("No moves to undo");
                return Ok(());
            }

            for entry in to_undo {
                if dry_run {
                    println!("Would undo: {} -> {}",
                        entry.new_path.display(),
                        entry.original_path.display()
                    );
                    continue;
                }
                match history.undo(&entry)? {
                    UndoResult::Restored => println!("Undone: {} -> {}",
                        entry.new_path.display(),
                        entry.original_path.display()
                    ),
                    UndoResult::Missing => warn!("File not found (may have been moved/deleted): {:?}", entry.new_path),
                    UndoResult::Occupied => warn!("Original location is taken, leaving {:?} alone", entry.new_path),
                }
            }
        }
        HistoryCommands::Clear { force } => {
            if !force {
                eprintln!("Use --force to confirm clearing history");
                return Ok(());
            }
            history.clear()?;
            println!("History cleared");
        }
    }

    Ok(())
}

/// Run config commands
fn run_config_command(config: AppConfig, action: ConfigCommands, config_path: &Path) -> anyhow::Result<()> {
    match action {
        ConfigCommands::Show => {
            let json = serde_json::to_string_pretty(&config)?;
            println!("{}", json);
        }
        ConfigCommands::Generate { output } => {
            let default_config = AppConfig::default();
            default_config.save(&output)?;
            println!("Generated config at {:?}", output);
        }
        ConfigCommands::Validate => {
            config
                .validate()
                .with_context(|| format!("{} is invalid", config_path.display()))?;
            println!("Configuration at {:?} is valid", config_path);
            println!("  Watch paths: {:?}", config.watch_paths);
            println!("  Categories: {}", categories::resolve(&config).join(", "));
            println!("  Model: {}", config.ai_engine.model);
            println!("  Database: {}", config.database.path);
        }
    }

    Ok(())
}

/// List logged placements or reset the fingerprint index
fn run_index_command(config: &AppConfig, action: IndexCommands) -> anyhow::Result<()> {
    let db = Database::open(&config.database.path)?;

    match action {
        IndexCommands::Recent { count } => {
            let placements = db.get_recent_placements(count)?;
            if placements.is_empty() {
                println!("No placements recorded.");
            }
            for p in placements {
                println!(
                    "[{}] {} -> {} ({})",
                    p.created_at.format("%Y-%m-%d %H:%M:%S"), p.original_path, p.new_path, p.category
                );
            }
        }
        IndexCommands::Reset => {
            let removed = db.clear_fingerprints()?;
            db.vacuum()?;
            info!("Removed {} fingerprints from {}", removed, config.database.path);
            println!("Fingerprint index cleared ({} entries).", removed);
        }
    }

    Ok(())
}

/// Run status check
async fn run_status(config: &AppConfig) -> anyhow::Result<()> {
    println!("Sortwise v{} Status", env!("CARGO_PKG_VERSION"));
    println!("======================");

    let client = OllamaClient::new(
        &config.ai_engine.url,
        std::time::Duration::from_secs(config.ai_engine.timeout_secs),
    )?;

    if !config.ai_engine.enabled {
        println!("AI engine: disabled (rule-based sorting)");
    } else {
        match client.health_check().await {
            Ok(()) => println!("Ollama: Running at {}", client.base_url()),
            Err(e) => println!("Ollama: Error - {}", e),
        }

        match client.list_models().await {
            Ok(models) => {
                println!("\nAvailable models:");
                for m in &models {
                    let marker = if m.starts_with(config.ai_engine.model.as_str()) { "→" } else { " " };
                    println!("  {} {}", marker, m);
                }
            }
            Err(e) => println!("  Error listing models: {}", e),
        }
    }

    match Database::open(&config.database.path) {
        Ok(db) => {
            let stats = db.get_stats()?;
            println!("\nDatabase ({}):", config.database.path);
            println!("  Known fingerprints: {}", stats.fingerprint_count);
            println!("  Placements: {}", stats.placement_count);
            for (category, count) in db.get_category_stats()? {
                println!("    {}: {}", category, count);
            }
        }
        Err(e) => println!("\nDatabase: ✗ Error - {}", e),
    }

    println!("\nConfiguration:");
    println!("  Watch paths: {:?}", config.watch_paths);
    println!("  Model: {}", config.ai_engine.model);
    println!("  Dedup: {} (global: {})", config.dedup_enabled(), config.global_dedup_enabled());
    println!("  Duplicates: {:?}", config.rules.duplicate_action);

    Ok(())
}

/// Initialize a new Sortwise folder
fn run_init(dir: Option<PathBuf>, force: bool) -> anyhow::Result<()> {
    let target = dir.unwrap_or_else(|| PathBuf::from("."));
    let config_path = target.join("config.json");

    if config_path.exists() && !force {
        return Err(SortwiseError::Config(
            "config.json already exists. Use --force to overwrite".to_string()
        ).into());
    }

    let inbox = target.join("inbox");
    std::fs::create_dir_all(&inbox)?;

    let config = AppConfig {
        watch_paths: vec![inbox.to_string_lossy().to_string()],
        ..AppConfig::default()
    };
    config.save(&config_path)?;

    println!("Sortwise initialized in {:?}", target);
    println!("\nCreated:");
    println!("  - config.json");
    println!("  - inbox/");
    println!("\nNext steps:");
    println!("  1. Start Ollama: ollama serve");
    println!("  2. Start organizer: sortwise watch");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from(["sortwise"]).unwrap();
        assert!(!cli.verbose);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_sort_command() {
        let cli = Cli::try_parse_from([
            "sortwise", "sort", "/tmp/inbox", "--dry-run", "--duplicates", "quarantine",
            "--category", "Work", "--category", "Personal",
        ]).unwrap();

        match cli.command {
            Some(Commands::Sort { path, options }) => {
                assert_eq!(path, Some(PathBuf::from("/tmp/inbox")));
                let mut config = AppConfig::default();
                apply_options(&mut config, &options).unwrap();
                assert!(config.rules.dry_run);
                assert_eq!(config.rules.duplicate_action, DuplicateAction::Quarantine);
                assert_eq!(config.rules.custom_categories, vec!["Work", "Personal"]);
            }
            _ => panic!("Expected Sort command"),
        }
    }

    #[test]
    fn test_cli_watch_command() {
        let cli = Cli::try_parse_from([
            "sortwise", "watch", "--dry-run", "--dir", "/tmp/test", "--no-ai"
        ]).unwrap();

        match cli.command {
            Some(Commands::Watch { dir, options, .. }) => {
                assert!(options.dry_run);
                assert!(options.no_ai);
                assert_eq!(dir, vec![PathBuf::from("/tmp/test")]);
            }
            _ => panic!("Expected Watch command"),
        }
    }

    #[test]
    fn test_cli_index_command() {
        let cli = Cli::try_parse_from(["sortwise", "index", "recent", "-n", "5"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Index { action: IndexCommands::Recent { count: 5 } })
        ));
    }

    #[test]
    fn test_cli_rejects_unknown_duplicate_action() {
        assert!(Cli::try_parse_from(["sortwise", "sort", "--duplicates", "shred"]).is_err());
    }
}

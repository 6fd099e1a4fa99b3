//! Alfred CLI entry point

use alfred::cli::{confirm, Args, Commands, ConfigCommand, MemoryCommand, PluginCommand, TaskArgs};
use alfred::config::{display_value, ApiKeys, ConfigStore};
use alfred::{logging, TaskOrchestrator, TaskRequest};
use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing::warn;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    if let Err(e) = run(args).await {
        eprintln!("{} {:#}", "✗".red(), e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    load_env_files();

    let mut store = ConfigStore::load(args.config.clone()).context("Failed to load configuration")?;
    let config = store.config().clone();
    let level = args
        .log_level_override()
        .unwrap_or(config.logging.level.as_str());
    logging::init(level, config.log_file().as_deref()).context("Failed to initialise logging")?;
    if let Some(reason) = store.fallback_reason() {
        warn!(path = %store.path().display(), "Ignoring configuration file: {}", reason);
        eprintln!(
            "{} {} ({}); using defaults. Fix it with `alfred config set` or `alfred config reset`.",
            "!".yellow(),
            reason,
            store.path().display()
        );
    }

    if let Commands::Config(cmd) = &args.command {
        return run_config(&mut store, cmd, args.yes);
    }

    let keys = ApiKeys::from_env();
    let mut orchestrator = TaskOrchestrator::new(&config, &keys, Default::default())
        .await
        .context("Failed to initialize Alfred")?;

    match &args.command {
        Commands::Task(task) => run_task(&mut orchestrator, task, args.verbose).await,
        Commands::Memory(cmd) => run_memory(&orchestrator, cmd, args.yes).await,
        Commands::Plugin(cmd) => run_plugin(&mut orchestrator, cmd),
        Commands::Status => {
            println!("{}", "Alfred System Status".green().bold());
            println!("{}", orchestrator.get_status().await);
            print_model_info(&orchestrator);
            Ok(())
        }
        Commands::Config(_) => Ok(()),
    }
}

fn print_model_info(orchestrator: &TaskOrchestrator) {
    let models = orchestrator.router().get_model_info();
    if models.is_empty() {
        return;
    }
    println!("\n{}", "Models".bold());
    for model in models {
        let preferred: Vec<&str> = model.preferred_for.iter().map(|t| t.as_str()).collect();
        if preferred.is_empty() {
            println!("{} {}", "✓".green(), model.name);
        } else {
            println!("{} {} (preferred for {})", "✓".green(), model.name, preferred.join(", "));
        }
    }
}

/// `.env` in the working directory, then `~/.alfred/.env`; existing vars win
fn load_env_files() {
    let _ = dotenvy::dotenv();
    if let Some(home) = dirs::home_dir() {
        let _ = dotenvy::from_path(home.join(".alfred").join(".env"));
    }
}

async fn run_task(orchestrator: &mut TaskOrchestrator, task: &TaskArgs, verbose: bool) -> Result<()> {
    println!("{}", "Alfred Task Execution".blue().bold());
    println!("{}\n", task.prompt);

    let mut request = TaskRequest::new(task.prompt.clone())
        .with_memory(!task.no_memory)
        .with_plugins(!task.no_plugins)
        .with_verbose(verbose);
    if let Some(model) = &task.model {
        request = request.with_model(model.clone());
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    spinner.set_message("Working...");
    spinner.enable_steady_tick(Duration::from_millis(100));

    let outcome = orchestrator.execute_task(request).await;
    spinner.finish_and_clear();

    if verbose {
        if let Some(task) = orchestrator.completed_tasks().back() {
            println!("{} {} [{}]", "Task".dimmed(), task.task_id, task.state.display_name());
        }
    }

    match outcome {
        Ok(result) => {
            println!("{} {}", "✓".green(), "Task completed successfully".bold());
            println!("\n{}", result);
            Ok(())
        }
        Err(e) => bail!("Task failed: {}", e),
    }
}

async fn run_memory(orchestrator: &TaskOrchestrator, cmd: &MemoryCommand, yes: bool) -> Result<()> {
    match cmd {
        MemoryCommand::Search { query, limit } => {
            println!("{}", "Memory Search Results".bold());
            println!("Query: {}\n", query);
            let results = orchestrator.memory_search(query, *limit).await;
            if results.is_empty() {
                println!("No matching memories.");
            }
            for (i, result) in results.iter().enumerate() {
                println!("{}. {}", i + 1, result);
            }
        }
        MemoryCommand::List { limit } => {
            println!("{}", "Recent Memories".bold());
            for memory in orchestrator.list_memories(*limit).await {
                println!("• {}", memory);
            }
        }
        MemoryCommand::Clear => {
            if yes || confirm("Are you sure you want to clear all memory?")? {
                if !orchestrator.clear_memory().await {
                    bail!("Failed to clear memory");
                }
                println!("{} Memory cleared", "✓".green());
            }
        }
        MemoryCommand::Inspect => {
            let stats = orchestrator.memory_stats().await;
            println!("{}", "Memory Statistics".bold());
            println!("Backend: {}", stats.backend);
            println!("Total memories: {}", stats.total);
            println!("Queries this session: {}", stats.queries);
            println!("Healthy: {}", if stats.healthy { "yes".green() } else { "no".red() });
        }
        MemoryCommand::Export { path } => {
            let count = orchestrator
                .export_memory(path)
                .await
                .with_context(|| format!("Failed to export memory to {}", path.display()))?;
            println!("{} Exported {} memories to {}", "✓".green(), count, path.display());
        }
        MemoryCommand::Import { path } => {
            let count = orchestrator
                .import_memory(path)
                .await
                .with_context(|| format!("Failed to import memory from {}", path.display()))?;
            println!("{} Imported {} memories from {}", "✓".green(), count, path.display());
        }
    }
    Ok(())
}

fn run_plugin(orchestrator: &mut TaskOrchestrator, cmd: &PluginCommand) -> Result<()> {
    match cmd {
        PluginCommand::List => {
            println!("{}", "Available Plugins".bold());
            let plugins = orchestrator.list_plugins();
            if plugins.is_empty() {
                println!("No plugins installed. Try `alfred plugin sample`.");
            }
            for (name, enabled) in plugins {
                if enabled {
                    println!("{} {}", "✓".green(), name);
                } else {
                    println!("{} {}", "✗".red(), name);
                }
            }
        }
        PluginCommand::Enable { name } | PluginCommand::Disable { name } => {
            let enable = matches!(cmd, PluginCommand::Enable { .. });
            let action = if enable { "enable" } else { "disable" };
            if !orchestrator.toggle_plugin(name, enable) {
                bail!("Failed to {} plugin {}", action, name);
            }
            println!("{} Plugin {} {}d", "✓".green(), name, action);
        }
        PluginCommand::Install { path } => {
            if !orchestrator.install_plugin(path) {
                bail!("Failed to install plugin from {}", path.display());
            }
            println!("{} Plugin installed from {}", "✓".green(), path.display());
        }
        PluginCommand::Sample => {
            let count = orchestrator.create_sample_plugins()?;
            println!("{} Created {} sample plugin(s)", "✓".green(), count);
        }
    }
    Ok(())
}

fn run_config(store: &mut ConfigStore, cmd: &ConfigCommand, yes: bool) -> Result<()> {
    match cmd {
        ConfigCommand::Show { key: Some(key) } => match store.get(key) {
            Some(value) => println!("{}: {}", key, display_value(&value)),
            None => bail!("Unknown configuration key: {}", key),
        },
        ConfigCommand::Show { key: None } => {
            println!("{}", "Alfred Configuration".bold());
            println!("File: {}\n", store.path().display());
            for (key, value) in store.items() {
                println!("{}: {}", key, value);
            }
        }
        ConfigCommand::Set { key, value } => {
            store.set(key, value)?;
            println!("{} Set {} = {}", "✓".green(), key, value);
        }
        ConfigCommand::Reset => {
            if yes || confirm("Are you sure you want to reset configuration?")? {
                store.reset()?;
                println!("{} Configuration reset", "✓".green());
            }
        }
    }
    Ok(())
}

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use colored::Colorize;
use inquire::Confirm;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use wtt::config::Config;
use wtt::daemon;
use wtt::error::{Result, WttError};
use wtt::git::GitWorkspace;
use wtt::ledger::LedgerStore;
use wtt::process::{ProcessTable, Signal, SystemProcessTable};
use wtt::registry::{current_project_key, ProcessRegistry};
use wtt::selector::{InquireChooser, ProcessSelector, SelectTarget};
use wtt::tracker::TrackingLoop;
use wtt::view::{self, ViewOptions};

/// wtt: track work time per git branch, attributed per calendar day
#[derive(Parser, Debug)]
#[command(name = "wtt")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Shared data directory (default: ~/wtt)
    #[arg(long = "base-dir", global = true)]
    base_dir: Option<PathBuf>,

    /// Config file (TOML format)
    #[arg(long = "config", global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short = 'v', long = "verbose", global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start tracking the project in the current directory
    Start {
        /// Block the terminal instead of detaching into the background
        #[arg(long = "foreground")]
        foreground: bool,

        /// Branch sampling interval in seconds
        #[arg(long = "interval")]
        interval: Option<u64>,
    },
    /// Stop the tracker for a selected project
    Stop {
        /// Project key to stop
        #[arg(short = 'p', long = "project")]
        project: Option<String>,

        /// Pid of the tracker to stop
        #[arg(long = "pid")]
        pid: Option<u32>,
    },
    /// Show tracked time per branch
    View {
        /// Only this date (DD-MM-YYYY)
        #[arg(short = 'd', long = "date")]
        date: Option<String>,

        /// Only today's date
        #[arg(long = "today")]
        today: bool,

        /// All projects, not just the current one
        #[arg(short = 'a', long = "all")]
        all: bool,

        /// Render as an aligned table
        #[arg(short = 't', long = "table")]
        table: bool,
    },
    /// Reset the ledger and remove all process markers
    Clear {
        /// Skip the confirmation prompt
        #[arg(short = 'f', long = "force")]
        force: bool,
    },
    /// Manage background tracking processes
    Processes {
        #[command(subcommand)]
        command: ProcessCommands,
    },
}

#[derive(Subcommand, Debug)]
enum ProcessCommands {
    /// List active, stale and unregistered trackers
    List,
    /// Force-kill every tracker process
    Kill {
        /// Skip the confirmation prompt
        #[arg(short = 'f', long = "force")]
        force: bool,
    },
}

fn setup_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("wtt=debug,info")
    } else {
        EnvFilter::new("wtt=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn load_config(cli: &Cli, interval: Option<u64>) -> Result<Config> {
    let mut config = if let Some(ref config_path) = cli.config {
        Config::from_file(config_path)?
    } else {
        Config::default()
    };

    config.merge_cli_args(cli.base_dir.clone(), interval);
    Ok(config)
}

fn confirm(prompt: &str, force: bool) -> bool {
    if force {
        return true;
    }
    Confirm::new(prompt)
        .with_default(false)
        .prompt()
        .unwrap_or(false)
}

async fn run_start(config: Config, foreground: bool) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let git = GitWorkspace::new(&cwd);
    if !git.is_git_repository() {
        return Err(WttError::NotAGitRepository);
    }
    let project = wtt::ledger::project_key(&cwd);

    if !foreground {
        let pid = daemon::start_detached(&config, &project)?;
        println!(
            "{} Tracking '{}' in the background (pid {})",
            "STARTED:".green().bold(),
            project.cyan(),
            pid
        );
        return Ok(());
    }

    // Shutdown signal handling, same channel shape as a graceful Ctrl+C
    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received interrupt, stopping tracker");
            let _ = shutdown_tx.send(());
        }
    });

    let tracker = TrackingLoop::new(Arc::new(config), git, project);
    let summary = tracker.run(shutdown_rx).await?;

    println!(
        "\n{} Saved {} in '{}'",
        "STOPPED:".green().bold(),
        view::format_seconds(summary.tracked_seconds).cyan(),
        summary.last_branch
    );
    Ok(())
}

fn run_stop(config: &Config, project: Option<String>, pid: Option<u32>) -> Result<()> {
    let registry = ProcessRegistry::new(&config.base_dir);
    let table = SystemProcessTable;
    let selector = ProcessSelector::new(&registry, &table);

    let target = match (project, pid) {
        (Some(name), _) => SelectTarget::Project(name),
        (None, Some(pid)) => SelectTarget::Pid(pid),
        (None, None) => SelectTarget::Interactive,
    };

    let candidate = selector.select(target, &InquireChooser)?;
    selector.terminate(&candidate)?;

    println!(
        "{} Stopped '{}' (pid {})",
        "STOPPED:".green().bold(),
        candidate.project.cyan(),
        candidate.pid
    );
    Ok(())
}

fn run_view(config: &Config, date: Option<String>, today: bool, all: bool, table: bool) -> Result<()> {
    let store = LedgerStore::new(&config.base_dir);
    let ledger = store.load()?;

    let options = ViewOptions {
        all,
        project: if all { None } else { Some(current_project_key()) },
        date,
        today,
    };

    let mode = if table {
        wtt::config::RenderMode::Table
    } else {
        config.render_mode
    };

    println!("{}", view::renderer_for(mode).render(&ledger, &options));
    Ok(())
}

fn run_clear(config: &Config, force: bool) -> Result<()> {
    if !confirm("Delete all tracked time data?", force) {
        println!("{}", "Cancelled.".yellow());
        return Ok(());
    }

    let store = LedgerStore::new(&config.base_dir);
    store.clear()?;
    ProcessRegistry::new(&config.base_dir).deregister_all()?;

    println!("{} All tracked data cleared.", "CLEARED:".green().bold());
    Ok(())
}

fn run_process_list(config: &Config) -> Result<()> {
    let registry = ProcessRegistry::new(&config.base_dir);
    let table = SystemProcessTable;
    let selector = ProcessSelector::new(&registry, &table);
    let report = selector.report()?;

    if report.active.is_empty() && report.stale.is_empty() && report.unregistered.is_empty() {
        println!("{}", "No tracking processes found.".yellow());
        return Ok(());
    }

    for process in &report.active {
        println!(
            "{}  {} (pid {})",
            "active".green(),
            process.project,
            process.pid
        );
    }
    for process in &report.stale {
        println!(
            "{}   {} (pid {}, process gone)",
            "stale".yellow(),
            process.project,
            process.pid
        );
    }
    for pid in &report.unregistered {
        println!("{} pid {} (no marker, owner unknown)", "unknown".red(), pid);
    }
    Ok(())
}

fn run_process_kill(config: &Config, force: bool) -> Result<()> {
    if !confirm("Force-kill every tracking process?", force) {
        println!("{}", "Cancelled.".yellow());
        return Ok(());
    }

    let registry = ProcessRegistry::new(&config.base_dir);
    let table = SystemProcessTable;
    let selector = ProcessSelector::new(&registry, &table);
    let report = selector.report()?;

    let mut pids: Vec<u32> = report.active.iter().map(|p| p.pid).collect();
    pids.extend(&report.unregistered);

    if pids.is_empty() && report.stale.is_empty() {
        return Err(WttError::NoActiveProcesses);
    }

    for pid in &pids {
        table.signal(*pid, Signal::Kill)?;
    }
    registry.deregister_all()?;

    println!(
        "{} Killed {} tracker(s), removed all markers.",
        "KILLED:".green().bold(),
        pids.len()
    );
    Ok(())
}

async fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Start { foreground, interval } => {
            let config = load_config(&cli, interval)?;
            run_start(config, foreground).await
        }
        Commands::Stop { ref project, pid } => {
            let config = load_config(&cli, None)?;
            run_stop(&config, project.clone(), pid)
        }
        Commands::View {
            ref date,
            today,
            all,
            table,
        } => {
            let config = load_config(&cli, None)?;
            run_view(&config, date.clone(), today, all, table)
        }
        Commands::Clear { force } => {
            let config = load_config(&cli, None)?;
            run_clear(&config, force)
        }
        Commands::Processes { ref command } => {
            let config = load_config(&cli, None)?;
            match command {
                ProcessCommands::List => run_process_list(&config),
                ProcessCommands::Kill { force } => run_process_kill(&config, *force),
            }
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match dispatch(cli).await {
        Ok(()) => {}
        // User-facing, non-fatal conditions exit cleanly
        Err(WttError::NotFound(target)) => {
            println!("{} No tracked process matches '{}'.", "NOT FOUND:".yellow().bold(), target);
        }
        Err(WttError::NoActiveProcesses) => {
            println!("{}", "No active tracking processes.".yellow());
        }
        Err(WttError::NotInitialized) => {
            println!("{}", "Nothing to clear: no tracked data yet.".yellow());
        }
        Err(WttError::SelectionCancelled) => {
            println!("{}", "Cancelled.".yellow());
        }
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    }
}

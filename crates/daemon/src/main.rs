//! Conductor Daemon
//!
//! Serves shared shell sessions to browsers.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use daemon::config::Config;
use daemon::orchestrator::DaemonOrchestrator;
use daemon::pidfile::{is_process_running, remove_pid_file, running_pid, write_pid_file};

/// Conductor Daemon - shared shell sessions over HTTP and WebSocket.
#[derive(Parser, Debug)]
#[command(name = "conductor-daemon")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for the daemon.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the daemon in the foreground
    Start,

    /// Stop the running daemon
    Stop {
        /// Force immediate termination (SIGKILL)
        #[arg(long, short)]
        force: bool,

        /// Seconds to wait for the daemon to exit (default: 30)
        #[arg(long, default_value = "30")]
        timeout: u64,
    },

    /// Show daemon status
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(config_path) => Config::load(config_path)?,
        None => Config::load_default()?,
    };
    config.apply_env_overrides();

    let filter = if cli.verbose {
        "debug".to_string()
    } else {
        config.daemon.log_level.clone()
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Some(config_path) = &cli.config {
        tracing::info!("Using config file: {:?}", config_path);
    }

    let pid_path = config.pid_file_path();

    match cli.command {
        Commands::Start => {
            config.validate()?;

            if let Some(pid) = running_pid(&pid_path) {
                eprintln!("Error: Daemon already running (PID: {})", pid);
                eprintln!();
                eprintln!("To stop the existing daemon, run:");
                eprintln!("  conductor-daemon stop");
                std::process::exit(1);
            }

            run_daemon(config, &pid_path).await?;
        }
        Commands::Stop { force, timeout } => {
            tracing::info!("Stopping daemon (force: {})", force);

            match stop_daemon(&pid_path, force, Duration::from_secs(timeout)).await {
                Ok(pid) => {
                    println!("Daemon (PID {}) stopped", pid);
                }
                Err(e) => {
                    eprintln!("Failed to stop daemon: {:#}", e);
                    if !force {
                        eprintln!("Try: conductor-daemon stop --force");
                    }
                    std::process::exit(1);
                }
            }
        }
        Commands::Status => match running_pid(&pid_path) {
            Some(pid) => {
                println!("Daemon Status: running");
                println!("  PID:      {}", pid);
                println!("  PID file: {}", pid_path.display());
            }
            None => {
                println!("Daemon Status: stopped");
                std::process::exit(1);
            }
        },
    }

    Ok(())
}

/// Runs the daemon until SIGINT or SIGTERM.
async fn run_daemon(config: Config, pid_path: &Path) -> anyhow::Result<()> {
    let mut orchestrator = DaemonOrchestrator::new(config)?;

    write_pid_file(pid_path)
        .with_context(|| format!("Failed to write PID file: {}", pid_path.display()))?;

    let result = async {
        orchestrator.start().await?;
        wait_for_shutdown_signal().await?;
        tracing::info!("Received shutdown signal");
        orchestrator.stop().await
    }
    .await;

    remove_pid_file(pid_path);
    result
}

/// Waits for SIGTERM or SIGINT. SIGHUP is logged and otherwise ignored.
async fn wait_for_shutdown_signal() -> anyhow::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to register SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to register SIGINT handler")?;
    let mut sighup = signal(SignalKind::hangup()).context("Failed to register SIGHUP handler")?;

    loop {
        tokio::select! {
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM");
                return Ok(());
            }
            _ = sigint.recv() => {
                tracing::info!("Received SIGINT");
                return Ok(());
            }
            _ = sighup.recv() => {
                tracing::debug!("Ignoring SIGHUP");
            }
        }
    }
}

/// Signals the daemon named by the PID file and waits for it to exit.
async fn stop_daemon(pid_path: &Path, force: bool, timeout: Duration) -> anyhow::Result<u32> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let pid = running_pid(pid_path).ok_or_else(|| anyhow::anyhow!("Daemon is not running"))?;
    let raw = i32::try_from(pid).context("PID out of range")?;
    let signal = if force { Signal::SIGKILL } else { Signal::SIGTERM };

    kill(Pid::from_raw(raw), signal)
        .with_context(|| format!("Failed to signal daemon (PID {})", pid))?;
    println!("Sent {} to daemon (PID {})", signal, pid);

    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if !is_process_running(pid) {
            // A killed daemon cannot clean up after itself.
            if force {
                let _ = std::fs::remove_file(pid_path);
            }
            return Ok(pid);
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    anyhow::bail!("Timeout waiting for daemon to exit ({}s)", timeout.as_secs())
}

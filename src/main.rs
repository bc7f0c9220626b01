//! Entry point: parses the CLI surface, installs the tracing subscriber,
//! and drives the orchestrator to completion.

use clap::Parser;
use std::path::PathBuf;
use waypoints::errors::OrchestratorError;
use waypoints::orchestrator::{self, OrchestratorConfig};

/// Supervisor that drives an external coding assistant through a four-phase
/// Requirements/Interfaces/Tests/Implementation workflow.
#[derive(Parser, Debug)]
#[command(name = "waypoints-supervisor")]
struct Cli {
    /// Working directory for the workflow.
    #[arg(short = 'd', long = "dir", default_value = ".")]
    dir: PathBuf,

    /// Initial task description handed to phase 1. If omitted, the phase 1
    /// context asks the assistant to ask the operator directly.
    #[arg(short = 't', long = "task")]
    task: Option<String>,
}

/// `--wp-hook <event>` is not part of the documented CLI surface: it's how
/// the assistant CLI calls back into this same binary for `PreToolUse`/
/// `Stop` events (see `hooks::settings`). Sniffed ahead of `Cli::parse` so it
/// never shows up in `--help` or clap's error messages.
fn hook_event_from_args() -> Option<String> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--wp-hook" {
            return args.next();
        }
    }
    None
}

fn install_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let install_dir = std::env::var("WP_INSTALL_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|home| home.join(".claude").join("waypoints"))
                .unwrap_or_else(|| PathBuf::from(".claude/waypoints"))
        });
    let trace_dir = install_dir.join("logs").join("trace");
    std::fs::create_dir_all(&trace_dir).ok()?;

    let file_appender = tracing_appender::rolling::daily(&trace_dir, "waypoints.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = tracing_subscriber::EnvFilter::try_from_env("WAYPOINTS_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .try_init();

    Some(guard)
}

#[tokio::main]
async fn main() {
    if let Some(event) = hook_event_from_args() {
        waypoints::hooks::dispatch(&event).await;
        return;
    }

    let _tracing_guard = install_tracing();
    let cli = Cli::parse();

    let config = OrchestratorConfig::new(cli.dir, cli.task);

    let outcome = tokio::select! {
        result = orchestrator::run(config) => result,
        _ = tokio::signal::ctrl_c() => {
            eprintln!("\nInterrupted.");
            std::process::exit(130);
        }
    };

    match outcome {
        Ok(()) => std::process::exit(0),
        Err(OrchestratorError::UserAbort) => std::process::exit(130),
        Err(_) => std::process::exit(1),
    }
}

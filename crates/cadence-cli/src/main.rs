#![forbid(unsafe_code)]

mod cmd;
mod http;
mod output;

use cadence_core::cache::{CacheService, FileCache};
use cadence_core::config::{EffectiveConfig, resolve_config};
use cadence_core::error::ErrorCode;
use cadence_core::reconcile::Controller;
use chrono::Utc;
use clap::{Parser, Subcommand};
use output::{CliError, OutputMode, TerminalNotifier, render_error, resolve_output_mode};
use std::env;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "cad: goal and routine consistency tracker",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Output format; overrides --json, FORMAT and the user config.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Bearer token for the server (overrides CADENCE_TOKEN).
    #[arg(long, global = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Output mode before the config layer has been read.
    fn early_output_mode(&self) -> OutputMode {
        resolve_output_mode(self.format, if self.json { "json" } else { "" })
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Views",
        about = "Show the merged completion timeline",
        long_about = "Merge server and locally recorded completions into one timeline, newest first, grouped by day.",
        after_help = "EXAMPLES:\n    # Everything recorded so far\n    cad timeline\n\n    # The last week only\n    cad timeline --days 7\n\n    # Emit machine-readable output\n    cad timeline --json"
    )]
    Timeline(cmd::timeline::TimelineArgs),

    #[command(
        next_help_heading = "Views",
        about = "Show the current streak",
        long_about = "Count consecutive days with at least one completion, ending today (or yesterday when nothing is done yet today).",
        after_help = "EXAMPLES:\n    # Print the streak\n    cad streak\n\n    # Just the number, for scripts\n    cad streak --format text"
    )]
    Streak(cmd::streak::StreakArgs),

    #[command(
        next_help_heading = "Views",
        about = "Rank goals and routines by completion days",
        long_about = "Count the distinct days each goal and routine was completed on and rank them.",
        after_help = "EXAMPLES:\n    # All items\n    cad consistency\n\n    # Routines only\n    cad consistency --filter routine"
    )]
    Consistency(cmd::consistency::ConsistencyArgs),

    #[command(
        next_help_heading = "Views",
        about = "List routines with today's status",
        long_about = "List routines and whether each is done today. Uses the last known list when the server is unreachable.",
        after_help = "EXAMPLES:\n    # All routines\n    cad routines\n\n    # Search by title\n    cad routines --search stretch"
    )]
    Routines(cmd::routines::RoutinesArgs),

    #[command(
        next_help_heading = "Completions",
        about = "Mark a goal or routine done for today",
        long_about = "Record today's completion. When the server is unreachable the completion is kept locally until `cad sync`.",
        after_help = "EXAMPLES:\n    # Mark a routine done\n    cad done routine 65f1c0\n\n    # Record with an explicit title\n    cad done routine 65f1c0 --title \"Morning stretch\""
    )]
    Done(cmd::done::DoneArgs),

    #[command(
        next_help_heading = "Completions",
        about = "Undo today's completion of an item",
        long_about = "Remove today's completion of a goal or routine, locally or on the server.",
        after_help = "EXAMPLES:\n    # Undo a routine\n    cad undo routine 65f1c0"
    )]
    Undo(cmd::undo::UndoArgs),

    #[command(
        next_help_heading = "Completions",
        about = "Upload completions recorded offline",
        long_about = "Upload locally recorded completions to the server and drop the ones it already has.",
        after_help = "EXAMPLES:\n    # Push pending completions\n    cad sync"
    )]
    Sync(cmd::sync::SyncArgs),

    #[command(
        next_help_heading = "Goals",
        about = "Mark a goal completed",
        long_about = "Flag a goal as completed. Already completed goals are rejected.",
        after_help = "EXAMPLES:\n    # Complete a goal\n    cad complete-goal 65f1aa"
    )]
    CompleteGoal(cmd::complete::CompleteGoalArgs),

    #[command(
        next_help_heading = "History",
        about = "Clear all completion history",
        long_about = "Empty the local cache immediately, then delete every completion on the server and report the tally.",
        after_help = "EXAMPLES:\n    # Clear everything\n    cad clear-history --yes"
    )]
    ClearHistory(cmd::clear::ClearHistoryArgs),

    #[command(
        next_help_heading = "History",
        about = "Clear the history of one item",
        long_about = "Remove every completion of one goal or routine. Goals are reopened.",
        after_help = "EXAMPLES:\n    # Reset a routine's history\n    cad clear-item routine 65f1c0"
    )]
    ClearItem(cmd::manage::ClearItemArgs),

    #[command(
        next_help_heading = "History",
        about = "Delete a goal or routine with its history",
        long_about = "Delete a goal or routine on the server and remove all of its completions.",
        after_help = "EXAMPLES:\n    # Delete a routine\n    cad delete-item routine 65f1c0 --yes"
    )]
    DeleteItem(cmd::manage::DeleteItemArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("CADENCE_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "cadence=debug,info"
        } else {
            "cadence=info,warn"
        })
    });

    let format = env::var("CADENCE_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn build_controller(
    config: &EffectiveConfig,
    project_root: &Path,
    cli_token: Option<&str>,
    output: OutputMode,
) -> Controller {
    let cache = FileCache::new(config.project.cache.resolve_dir(project_root))
        .with_lock_timeout(config.project.cache.lock_timeout());
    let remote = http::UreqRemote::new(
        &config.project.remote.base_url,
        config.project.remote.timeout(),
        config.token(cli_token),
    );
    Controller::new(
        CacheService::new(Arc::new(cache), config.project.day),
        Arc::new(remote),
        Arc::new(TerminalNotifier::new(output)),
    )
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let project_root = env::current_dir()?;
    let config = match resolve_config(&project_root, cli.json) {
        Ok(config) => config,
        Err(err) => {
            let message = format!("{}: {err:#}", ErrorCode::ConfigParseError.message());
            render_error(
                cli.early_output_mode(),
                &CliError::coded(&message, ErrorCode::ConfigParseError),
            )?;
            anyhow::bail!(message);
        }
    };
    let output = resolve_output_mode(cli.format, &config.resolved_output);
    let controller = build_controller(&config, &project_root, cli.token.as_deref(), output);
    let now = Utc::now();

    match &cli.command {
        Commands::Timeline(args) => cmd::timeline::run_timeline(args, output, &controller, now),
        Commands::Streak(args) => cmd::streak::run_streak(args, output, &controller, now),
        Commands::Consistency(args) => {
            cmd::consistency::run_consistency(args, output, &controller, now)
        }
        Commands::Routines(args) => cmd::routines::run_routines(args, output, &controller, now),
        Commands::Done(args) => cmd::done::run_done(args, output, &controller, now),
        Commands::Undo(args) => cmd::undo::run_undo(args, output, &controller, now),
        Commands::Sync(args) => cmd::sync::run_sync(args, output, &controller, now),
        Commands::CompleteGoal(args) => {
            cmd::complete::run_complete_goal(args, output, &controller)
        }
        Commands::ClearHistory(args) => {
            cmd::clear::run_clear_history(args, output, &controller, now)
        }
        Commands::ClearItem(args) => cmd::manage::run_clear_item(args, output, &controller, now),
        Commands::DeleteItem(args) => cmd::manage::run_delete_item(args, output, &controller, now),
    }
}

//! Command-line request layer for the event tracker.
//!
//! # Responsibility
//! - Map sub-commands onto lifecycle operations.
//! - Print results as JSON and map failure kinds to exit codes.
//!
//! # Invariants
//! - Only talks to storage through `LifecycleService`.
//! - Timestamps leave this layer as ISO-8601 text with a `Z` marker.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use eventlog_core::db::open_db;
use eventlog_core::{
    generate_sample_events, init_logging, init_stderr_logging, AppConfig, ErrorKind, EventId,
    EventPatch, EventStatus, LifecycleError, LifecycleService, NewEvent, SqliteEventRepository,
    StatusFilter,
};
use log::debug;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;

/// Personal task/event tracker
#[derive(Parser, Debug)]
#[command(name = "eventlog", version)]
#[command(about = "Track timed events through their lifecycle", long_about = None)]
struct Cli {
    /// SQLite database file (overrides EVENTLOG_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Log level: trace|debug|info|warn|error (overrides EVENTLOG_LOG_LEVEL)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Absolute directory for rolling log files (overrides EVENTLOG_LOG_DIR)
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new active event
    Create(CreateArgs),
    /// Show one event
    Get { id: EventId },
    /// List events ordered by due time
    List {
        /// active|completed|deleted|all
        #[arg(long, default_value = "active")]
        status: StatusFilter,
    },
    /// Change fields of an event
    Update(UpdateArgs),
    /// Mark an active event completed
    Complete(TransitionArgs),
    /// Return a completed event to active
    Reopen(TransitionArgs),
    /// Soft-delete an event
    Delete { id: EventId },
    /// Show the complete/reopen history of an event, newest first
    Actions { id: EventId },
    /// Insert randomly generated sample events
    Seed {
        #[arg(long, default_value_t = 20)]
        count: usize,
        /// RNG seed for reproducible data
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[derive(Args, Debug)]
struct CreateArgs {
    title: String,
    #[arg(long)]
    description: Option<String>,
    /// Due date, e.g. `2024-06-01T10:00`, `tomorrow 9:00`, `in 3 days`
    #[arg(long)]
    due: Option<String>,
    /// Free-text hint such as `morning`
    #[arg(long)]
    time_hint: Option<String>,
    #[arg(long)]
    priority: Option<i64>,
}

#[derive(Args, Debug)]
struct UpdateArgs {
    id: EventId,
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    due: Option<String>,
    #[arg(long)]
    time_hint: Option<String>,
    #[arg(long)]
    priority: Option<i64>,
    /// Direct status write; not recorded in the action history
    #[arg(long)]
    status: Option<EventStatus>,
}

#[derive(Args, Debug)]
struct TransitionArgs {
    id: EventId,
    #[arg(long)]
    comment: Option<String>,
}

#[derive(Serialize)]
struct Message {
    message: String,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", serde_json::json!({ "error": format!("{err:#}") }));
            ExitCode::from(exit_code_for(&err))
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = resolve_config(&cli)?;
    match config.log_dir.as_ref() {
        Some(dir) => init_logging(&config.log_level, &dir.to_string_lossy())?,
        None => init_stderr_logging(&config.log_level)?,
    }
    debug!(
        "event=cli_start module=cli status=ok db_path={}",
        config.db_path.display()
    );

    let mut conn = open_db(&config.db_path)
        .with_context(|| format!("failed to open database {}", config.db_path.display()))?;
    let repo = SqliteEventRepository::try_new(&mut conn)?;
    let mut service = LifecycleService::new(repo);

    match cli.command {
        Commands::Create(args) => {
            let input = NewEvent {
                title: args.title,
                description: args.description,
                due_at: args.due,
                time_hint: args.time_hint,
                priority: args.priority,
            };
            print_json(&service.create(&input)?)
        }
        Commands::Get { id } => print_json(&service.get(id)?),
        Commands::List { status } => print_json(&service.list(status)?),
        Commands::Update(args) => {
            let patch = EventPatch {
                title: args.title,
                description: args.description,
                due_at: args.due,
                time_hint: args.time_hint,
                priority: args.priority,
                status: args.status,
            };
            print_json(&service.update(args.id, &patch)?)
        }
        Commands::Complete(args) => {
            print_json(&service.complete(args.id, args.comment.as_deref())?)
        }
        Commands::Reopen(args) => print_json(&service.reopen(args.id, args.comment.as_deref())?),
        Commands::Delete { id } => {
            service.soft_delete(id)?;
            print_json(&Message {
                message: format!("event {id} deleted"),
            })
        }
        Commands::Actions { id } => print_json(&service.list_actions(id)?),
        Commands::Seed { count, seed } => {
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            print_json(&generate_sample_events(&service, count, &mut rng)?)
        }
    }
}

fn resolve_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = AppConfig::from_env()?;
    if let Some(db) = cli.db.clone() {
        config.db_path = db;
    }
    if let Some(level) = cli.log_level.clone() {
        config.log_level = level;
    }
    if let Some(dir) = cli.log_dir.clone() {
        config.log_dir = Some(dir);
    }
    Ok(config)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn exit_code_for(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<LifecycleError>().map(LifecycleError::kind) {
        Some(ErrorKind::Validation) => 2,
        Some(ErrorKind::NotFound) => 3,
        Some(ErrorKind::Conflict) => 4,
        Some(ErrorKind::Internal) | None => 1,
    }
}

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use configuration::{load_config, Config, LoggingSettings};
use core_types::{Directive, RankBounds, RankedEntry, Scope, ScopeSelector, SortMetric};
use database::{connect, run_migrations, DbRepository};
use engine::{Leaderboard, LeaderboardEngine, SnapshotUnavailable, TimeSpec};
use serde::Serialize;
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// The main entry point for the pxlstats leaderboard tool.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config().context("Failed to load configuration")?;
    let _log_guard = init_tracing(&config.logging)?;

    // Initialize the database connection and run migrations
    let db_pool = connect(&config.store)
        .await
        .context("Failed to connect to the snapshot store")?;
    run_migrations(&db_pool)
        .await
        .context("Failed to run database migrations")?;

    let engine = LeaderboardEngine::new(Arc::new(DbRepository::new(db_pool)), config);

    match cli.command {
        Commands::Leaderboard(args) => handle_leaderboard(args, &engine).await,
        Commands::UserInfo(args) => handle_user_info(args, &engine).await,
    }
}

/// Console output filtered by `RUST_LOG` (or the configured default), plus a
/// daily-rolling log file when a directory is configured.
fn init_tracing(settings: &LoggingSettings) -> Result<Option<WorkerGuard>> {
    let filter = || {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&settings.default_filter))
    };
    let console = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(filter());

    if settings.directory.is_empty() {
        tracing_subscriber::registry().with(console).try_init()?;
        return Ok(None);
    }

    let appender = tracing_appender::rolling::daily(&settings.directory, &settings.file_prefix);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let file = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(writer)
        .with_filter(filter());
    tracing_subscriber::registry().with(console).with(file).try_init()?;
    Ok(Some(guard))
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Leaderboards and activity statistics over canvas snapshots.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the leaderboard, optionally around one user or over a time window.
    Leaderboard(LeaderboardArgs),
    /// Show the standings and recent activity of one user.
    UserInfo(UserInfoArgs),
}

#[derive(Parser)]
struct LeaderboardArgs {
    /// Center the leaderboard on this user.
    username: Option<String>,

    /// Rank by the current canvas instead of all-time.
    #[arg(long, conflicts_with = "epoch")]
    canvas: bool,

    /// Rank by the given canvas code.
    #[arg(long, value_name = "CODE")]
    epoch: Option<String>,

    /// Number of lines to show.
    #[arg(long, short = 'l')]
    lines: Option<usize>,

    /// Show a rank range instead, e.g. "5-10".
    #[arg(long, short = 'r', conflicts_with = "username")]
    ranks: Option<RankBounds>,

    /// Only count activity over the last period, e.g. "1d12h".
    #[arg(long, conflicts_with_all = ["before", "after"])]
    last: Option<String>,

    /// Only count activity before this instant (RFC 3339).
    #[arg(long)]
    before: Option<DateTime<Utc>>,

    /// Only count activity after this instant (RFC 3339).
    #[arg(long)]
    after: Option<DateTime<Utc>>,

    /// What to rank by. Any time window implies `delta`.
    #[arg(long, value_enum, default_value_t = SortArg::Count)]
    sort: SortArg,
}

#[derive(Parser)]
struct UserInfoArgs {
    /// The user to look up.
    username: String,
}

#[derive(Clone, Copy, ValueEnum)]
enum SortArg {
    Count,
    Delta,
}

impl From<SortArg> for SortMetric {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Count => SortMetric::Count,
            SortArg::Delta => SortMetric::Delta,
        }
    }
}

// ==============================================================================
// Command Logic
// ==============================================================================

async fn handle_leaderboard(
    args: LeaderboardArgs,
    engine: &LeaderboardEngine<DbRepository>,
) -> Result<()> {
    let time_spec = match (&args.last, args.after, args.before) {
        (Some(last), _, _) => TimeSpec::Relative(last.clone()),
        (None, None, None) => TimeSpec::Now,
        (None, after, before) => TimeSpec::Absolute { after, before },
    };
    let scope = match (args.canvas, &args.epoch) {
        (_, Some(code)) => ScopeSelector::Epoch(code.clone()),
        (true, None) => ScopeSelector::CurrentEpoch,
        (false, None) => ScopeSelector::AllTime,
    };
    let lines = args.lines.unwrap_or(engine.config().leaderboard.default_lines);
    let directive = match (args.ranks, &args.username) {
        (Some(bounds), _) => Directive::from(bounds),
        (None, Some(name)) => Directive::CenteredOn {
            entity_id: engine.resolve_entity(name).await?,
            lines,
        },
        (None, None) => Directive::TopN(lines),
    };

    let board = engine
        .build_leaderboard(&time_spec, &scope, &directive, args.sort.into())
        .await?;
    let view = LeaderboardView::new(&board, engine.config());
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}

async fn handle_user_info(
    args: UserInfoArgs,
    engine: &LeaderboardEngine<DbRepository>,
) -> Result<()> {
    let entity_id = engine.resolve_entity(&args.username).await?;
    let summary = engine.entity_summary(entity_id).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

// ==============================================================================
// Presentation
// ==============================================================================

/// The leaderboard as printed, with ranks rendered against the ceiling.
#[derive(Serialize)]
struct LeaderboardView<'a> {
    effective_scope: &'a Scope,
    boundary1: Option<DateTime<Utc>>,
    boundary2: Option<DateTime<Utc>>,
    last_known_instant: Option<DateTime<Utc>>,
    sort_metric: SortMetric,
    rate_unit: Option<&'static str>,
    unavailable: &'a [SnapshotUnavailable],
    entries: Vec<EntryView<'a>>,
}

#[derive(Serialize)]
struct EntryView<'a> {
    rank_label: String,
    #[serde(flatten)]
    entry: &'a RankedEntry,
}

impl<'a> LeaderboardView<'a> {
    fn new(board: &'a Leaderboard, config: &Config) -> Self {
        let ceiling = config.leaderboard.rank_ceiling;
        Self {
            effective_scope: &board.effective_scope,
            boundary1: board.boundary1,
            boundary2: board.boundary2,
            last_known_instant: board.last_known_instant,
            sort_metric: board.sort_metric,
            rate_unit: board.rate_unit.map(|unit| unit.suffix()),
            unavailable: &board.unavailable,
            entries: board
                .entries
                .iter()
                .map(|entry| EntryView {
                    rank_label: entry.rank_label(ceiling).to_string(),
                    entry,
                })
                .collect(),
        }
    }
}

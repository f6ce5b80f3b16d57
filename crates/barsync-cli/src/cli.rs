//! CLI argument definitions for barsync.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `sync` | Bring tracked instruments up to the latest trading session |
//! | `track` | Register instruments for syncing |
//! | `status` | Show warehouse counts and freshness |
//! | `calendar` | Inspect upcoming trading days |
//!
//! # Exit Codes
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | Success, including partially failed batches |
//! | 2 | Invalid input or batch precondition failure |
//! | 3 | Every instrument in the batch failed |
//! | 4 | Warehouse error |
//! | 10 | I/O error |

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Rate-limited daily bar collector for the Korean market.
#[derive(Debug, Parser)]
#[command(
    name = "barsync",
    author,
    version,
    about = "Calendar-aware daily bar synchronization",
    long_about = "barsync keeps a local DuckDB warehouse of daily OHLCV bars current.\n\
\n\
  • Trading-calendar aware: weekends, exchange holidays, 09:00 session open\n\
  • Incremental: fetches only the span each instrument is missing\n\
  • Rate-limited: provider quotas are enforced, never merely retried\n\
\n\
Use 'barsync <command> --help' for command-specific help."
)]
pub struct Cli {
    /// Path to the warehouse database file.
    ///
    /// Defaults to `$BARSYNC_HOME/warehouse.duckdb`.
    #[arg(long, global = true)]
    pub db_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sync daily bars up to the latest completed trading session.
    ///
    /// With no codes, syncs every tracked instrument. Instruments already
    /// current are skipped unless --force is given.
    ///
    /// # Examples
    ///
    ///   barsync sync
    ///   barsync sync 005930 000660
    ///   barsync sync --force --test-mode
    Sync(SyncArgs),

    /// Register instruments for syncing.
    ///
    /// # Examples
    ///
    ///   barsync track 005930 --market kospi
    ///   barsync track 035720 247540 --market kosdaq
    Track(TrackArgs),

    /// Show warehouse counts and per-instrument freshness.
    Status,

    /// Show the current session date and upcoming trading days.
    Calendar(CalendarArgs),
}

/// Arguments for the `sync` command.
#[derive(Debug, Args)]
pub struct SyncArgs {
    /// Instrument codes to sync (six digits each). Empty means all tracked.
    #[arg(num_args = 0..)]
    pub codes: Vec<String>,

    /// Re-fetch instruments even when they are already current.
    #[arg(long, default_value_t = false)]
    pub force: bool,

    /// Cap the batch at the first five instruments.
    #[arg(long, default_value_t = false)]
    pub test_mode: bool,

    /// Base URL of the bar provider. Defaults to $BARSYNC_SOURCE_URL.
    #[arg(long)]
    pub source_url: Option<String>,

    /// Maximum provider calls per quota window.
    #[arg(long, default_value_t = 100)]
    pub quota_limit: u32,

    /// Quota window length in seconds.
    #[arg(long, default_value_t = 60)]
    pub quota_window_secs: u64,

    /// Widest date span a single provider call may cover.
    #[arg(long, default_value_t = 120)]
    pub max_span_days: u32,
}

/// Arguments for the `track` command.
#[derive(Debug, Args)]
pub struct TrackArgs {
    /// Instrument codes to register (six digits each).
    #[arg(required = true, num_args = 1..)]
    pub codes: Vec<String>,

    /// Market segment for the registered instruments (kospi or kosdaq).
    #[arg(long)]
    pub market: Option<String>,
}

/// Arguments for the `calendar` command.
#[derive(Debug, Args)]
pub struct CalendarArgs {
    /// Number of days ahead to inspect.
    #[arg(long, default_value_t = 7)]
    pub days: u32,
}

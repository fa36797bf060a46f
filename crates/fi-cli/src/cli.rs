//! Command-line argument definitions.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

/// Desktop focus and activity tracker.
///
/// Records which application window and browser page hold focus, how
/// actively the keyboard and mouse are used, and when you go idle.
#[derive(Debug, Parser)]
#[command(name = "fi", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Track focus until Ctrl-C, then print today's summary.
    Track {
        /// Stop after this many polling ticks.
        #[arg(long)]
        ticks: Option<u64>,
    },

    /// Show the focus summary for one UTC day.
    Summary {
        /// Day to summarize (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Rank applications (or browser pages) by total focus time.
    Top {
        /// Number of entries to show.
        #[arg(long, default_value_t = 10)]
        limit: usize,

        /// Rank browser pages instead of applications.
        #[arg(long)]
        pages: bool,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List recorded sessions, most recent first.
    Sessions {
        /// Range start: RFC 3339 or relative (e.g. "2 hours ago").
        #[arg(long)]
        start: Option<String>,

        /// Range end: RFC 3339 or relative. Defaults to now.
        #[arg(long)]
        end: Option<String>,

        /// List browser page sessions instead of window sessions.
        #[arg(long)]
        browser: bool,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Export sessions, aggregates and a summary as JSON.
    Export {
        /// Range start: RFC 3339 or relative.
        #[arg(long)]
        start: Option<String>,

        /// Range end: RFC 3339 or relative.
        #[arg(long)]
        end: Option<String>,
    },

    /// Delete history older than the retention period.
    Prune {
        /// Days of history to keep. Defaults to the configured retention.
        #[arg(long)]
        days: Option<u32>,
    },

    /// Show database location, record counts and the latest sessions.
    Status,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_track_with_tick_limit() {
        let cli = Cli::try_parse_from(["fi", "--verbose", "track", "--ticks", "3"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Some(Commands::Track { ticks: Some(3) })));
    }

    #[test]
    fn parses_summary_date() {
        let cli = Cli::try_parse_from(["fi", "summary", "--date", "2025-01-15", "--json"]).unwrap();
        let Some(Commands::Summary { date, json }) = cli.command else {
            panic!("expected summary command");
        };
        assert_eq!(date, NaiveDate::from_ymd_opt(2025, 1, 15));
        assert!(json);
        assert!(Cli::try_parse_from(["fi", "summary", "--date", "15/01/2025"]).is_err());
    }
}

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use fi_core::SubjectKind;
use tracing_subscriber::EnvFilter;

use fi_cli::commands::{export, prune, sessions, status, summary, top, track, util};
use fi_cli::{Cli, Commands, Config};

/// Load config and open database, ensuring the parent directory exists.
fn open_database(config_path: Option<&Path>) -> Result<(fi_db::Database, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = fi_db::Database::open(&config.database_path).context("failed to open database")?;
    Ok((db, config))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let mut stdout = std::io::stdout().lock();
    let now = Utc::now();

    match &cli.command {
        Some(Commands::Track { ticks }) => {
            let (db, config) = open_database(cli.config.as_deref())?;
            track::run(&mut stdout, db, &config, *ticks)?;
        }
        Some(Commands::Summary { date, json }) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            let date = date.unwrap_or_else(|| now.date_naive());
            summary::run(&mut stdout, &db, date, *json)?;
        }
        Some(Commands::Top { limit, pages, json }) => {
            let (db, config) = open_database(cli.config.as_deref())?;
            top::run(
                &mut stdout,
                &db,
                *limit,
                *pages,
                *json,
                config.title_display_width,
            )?;
        }
        Some(Commands::Sessions {
            start,
            end,
            browser,
            json,
        }) => {
            let (db, config) = open_database(cli.config.as_deref())?;
            let range = util::resolve_range(start.as_deref(), end.as_deref(), now)?;
            let kind = if *browser {
                SubjectKind::BrowserTab
            } else {
                SubjectKind::Window
            };
            sessions::run(
                &mut stdout,
                &db,
                &range,
                kind,
                *json,
                config.title_display_width,
            )?;
        }
        Some(Commands::Export { start, end }) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            let range = util::resolve_range(start.as_deref(), end.as_deref(), now)?;
            export::run(&mut stdout, &db, &range)?;
        }
        Some(Commands::Prune { days }) => {
            let (mut db, config) = open_database(cli.config.as_deref())?;
            prune::run(
                &mut stdout,
                &mut db,
                days.unwrap_or(config.retention_days),
                now,
            )?;
        }
        Some(Commands::Status) => {
            let (db, config) = open_database(cli.config.as_deref())?;
            status::run(
                &mut stdout,
                &db,
                &config.database_path,
                config.title_display_width,
            )?;
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}

//! SICSR Timetable - a terminal front-end for the SICSR class timetable.
//!
//! Shows the classes for the selected batches on a given day, serving the
//! local cache first and refreshing it through CORS relays.

mod render;

use std::io;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::{Duration, NaiveDate};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use timetable_core::{Config, TimetableCoordinator};

/// Default length of a calendar export
const DEFAULT_EXPORT_DAYS: i64 = 7;

#[derive(Parser)]
#[command(name = "timetable", version, about = "SICSR class timetable, offline-friendly")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Show classes for a day (default: today)
    Show {
        /// Date to show, YYYY-MM-DD
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Days from the chosen date, e.g. -1 for yesterday
        #[arg(long, allow_hyphen_values = true, default_value_t = 0)]
        offset: i64,
        /// Print the cached view without waiting for the refresh
        #[arg(long)]
        no_wait: bool,
        /// Print courses as JSON
        #[arg(long)]
        json: bool,
    },
    /// List batches, optionally filtered by name
    Batches {
        #[arg(long)]
        filter: Option<String>,
    },
    /// Save the batch selection and show today's classes
    Select {
        /// Exact batch names; none clears the selection
        names: Vec<String>,
    },
    /// Download an iCalendar export of the selected batches
    Export {
        /// First day, YYYY-MM-DD (default: today)
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Number of days
        #[arg(long, default_value_t = DEFAULT_EXPORT_DAYS)]
        days: i64,
        /// Output file (default: timetable_<from>.ics)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Print the effective configuration
    Config {
        /// Write it to the config file so it can be edited
        #[arg(long)]
        init: bool,
    },
}

/// Initialize the tracing subscriber for logging.
/// `RUST_LOG` controls the level; `TIMETABLE_LOG_DIR` adds a daily log file.
fn init_tracing() -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match std::env::var("TIMETABLE_LOG_DIR") {
        Ok(dir) if !dir.trim().is_empty() => {
            let appender = tracing_appender::rolling::daily(dir.trim(), "timetable.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    let _guard = init_tracing();

    let cli = Cli::parse();
    let config = Config::load().context("Failed to load config")?;

    if let Some(Command::Config { init }) = cli.command {
        let path = Config::config_path()?;
        if init {
            config.save().context("Failed to save config")?;
            println!("Wrote {}", path.display());
        } else {
            println!("# {}", path.display());
        }
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let mut coordinator = TimetableCoordinator::from_config(&config)?;

    info!("Timetable starting");
    coordinator.load_catalog().await;
    if let Some(prompt) = render::catalog_unavailable(coordinator.catalog_state()) {
        eprintln!("{}", prompt);
        std::process::exit(1);
    }

    let command = cli.command.unwrap_or(Command::Show {
        date: None,
        offset: 0,
        no_wait: false,
        json: false,
    });

    match command {
        Command::Show { date, offset, no_wait, json } => {
            let target = shift_date(date.unwrap_or(coordinator.date()), offset)?;
            coordinator.set_date(target);
            coordinator.load_courses().await;
            show(&mut coordinator, no_wait, json).await?;
        }
        Command::Batches { filter } => {
            let batches = coordinator.filter_batches(filter.as_deref().unwrap_or_default());
            print!("{}", render::batch_list(&batches, coordinator.selection()));
        }
        Command::Select { names } => {
            let (selection, unknown) = coordinator.selection_from_names(&names);
            if !unknown.is_empty() {
                bail!(
                    "Unknown batch name(s): {}. Use `timetable batches --filter <text>` to search.",
                    unknown.join(", ")
                );
            }
            coordinator.save_selection(selection).await;
            show(&mut coordinator, false, false).await?;
        }
        Command::Export { from, days, out } => {
            let from = from.unwrap_or(coordinator.date());
            let to = shift_date(from, days.max(1) - 1)?;
            let ics = coordinator.export_calendar(from, to).await?;
            let path = out.unwrap_or_else(|| PathBuf::from(format!("timetable_{}.ics", from)));
            std::fs::write(&path, ics)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Saved {} to {}", export_range(from, to), path.display());
        }
        // Handled before the catalog loads
        Command::Config { .. } => {}
    }

    info!("Timetable shutting down");
    Ok(())
}

async fn show(coordinator: &mut TimetableCoordinator, no_wait: bool, json: bool) -> Result<()> {
    if !json {
        print!("{}", render::day(coordinator));
    }
    if no_wait || !coordinator.is_refreshing() {
        if json {
            println!("{}", serde_json::to_string_pretty(coordinator.courses())?);
        }
        return Ok(());
    }

    let before = coordinator.courses().to_vec();
    coordinator.wait_for_refresh().await;
    if json {
        println!("{}", serde_json::to_string_pretty(coordinator.courses())?);
    } else if coordinator.courses() != before.as_slice() {
        println!("\nUpdated:");
        print!("{}", render::day(coordinator));
    } else {
        println!(
            "{}",
            render::status_line(coordinator.status(), coordinator.last_synced().as_deref())
        );
    }
    Ok(())
}

/// `date` moved by `days`, or an error past the representable calendar
fn shift_date(date: NaiveDate, days: i64) -> Result<NaiveDate> {
    Duration::try_days(days)
        .and_then(|delta| date.checked_add_signed(delta))
        .with_context(|| format!("{} shifted by {} days is out of range", date, days))
}

fn export_range(from: NaiveDate, to: NaiveDate) -> String {
    if from == to {
        from.to_string()
    } else {
        format!("{} to {}", from, to)
    }
}

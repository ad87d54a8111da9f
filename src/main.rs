//! hristime - calendar and leave retrieval for HRIS time assistants
//!
//! A CLI that fetches an employee's calendar from the HRIS backend one
//! week at a time and merges the weekly aggregates into a single
//! chronological view, plus the single-shot leave calls around it.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (invalid input, backend failure, config, etc.)
//!   2 - Calendar retrieved but some weeks are missing

mod backend;
mod cli;
mod config;
mod engine;
mod error;
mod models;
mod report;
mod segment;

use anyhow::{Context, Result};
use backend::BackendClient;
use cli::{Args, Command, OutputFormat};
use config::{Config, CONFIG_FILE_NAME};
use engine::RetrievalEngine;
use error::EngineError;
use indicatif::{ProgressBar, ProgressStyle};
use models::{parse_date, PaidHolidayRequest, Period, SimulationRequest, TeamSchedule};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Config is read before logging so `[general] verbose` can apply
    let mut config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    init_logging(args.log_level(config.general.verbose));

    info!("hristime v{}", env!("CARGO_PKG_VERSION"));
    debug!("Command: {:?}", args.command);
    debug!("Config: {:?}", config);

    match run(args, config).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Request failed: {}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .hristime.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", CONFIG_FILE_NAME);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to point at your backend and tune concurrency.");
    Ok(())
}

/// Initialize logging at the given level.
///
/// Logs go to stderr; stdout carries the rendered result.
fn init_logging(level: tracing::Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Run the selected command. Returns exit code (0 or 2).
async fn run(args: Args, config: Config) -> Result<i32> {
    let start_time = Instant::now();

    let client = BackendClient::new(
        config.backend_config(args.authorization_token.clone(), args.edge_token.clone()),
    )?;
    let command = args.command.clone().context("A command is required")?;
    let format = args.format;

    let mut exit_code = 0;

    let output = match command {
        Command::Calendar {
            subject, begin, end, ..
        } => {
            let period = Period::parse(&begin, &end)?;
            let engine = RetrievalEngine::new(client, config.engine_options())
                .with_progress(progress_bar(args.quiet));
            debug!("Engine options: {:?}", engine.options());

            let view = engine.retrieve(&subject, &period).await?;

            if !view.aggregate.is_complete() {
                warn!(
                    "Calendar for {} is partial: {} window(s) missing",
                    subject,
                    view.aggregate.missing.len()
                );
                exit_code = 2;
            }

            match format {
                OutputFormat::Json => report::generate_json(&view)?,
                OutputFormat::Markdown => report::generate_calendar_markdown(&view),
            }
        }
        Command::Team { date, subjects } => {
            let date = parse_date(&date).ok_or_else(|| {
                EngineError::InvalidInput(format!("date '{}' must be YYYY-MM-DD", date))
            })?;

            let schedule = if subjects.is_empty() {
                let members = client.team_calendar(date).await?;
                TeamSchedule::TeamEndpoint { date, members }
            } else {
                let engine = RetrievalEngine::new(client, config.engine_options())
                    .with_progress(progress_bar(args.quiet));
                engine.team_fan_out(&subjects, date).await?
            };

            match format {
                OutputFormat::Json => report::generate_json(&schedule)?,
                OutputFormat::Markdown => report::generate_team_markdown(&schedule),
            }
        }
        Command::Leaves { subject } => {
            let registry = client.leave_registry(&subject).await?;

            match format {
                OutputFormat::Json => report::generate_json(&registry)?,
                OutputFormat::Markdown => report::generate_registry_markdown(&subject, &registry),
            }
        }
        Command::RegistryId { subject } => {
            let id = client.leave_registry_id(&subject).await?;

            match format {
                OutputFormat::Json => report::generate_json(&id)?,
                OutputFormat::Markdown => format!(
                    "Leave registry of {}: `{}`\n",
                    subject, id.leave_registry_id
                ),
            }
        }
        Command::Simulate {
            subject,
            leave_type,
            months,
        } => {
            let request = SimulationRequest {
                contract_id: subject.clone(),
                leave_type,
                months,
            };
            let simulation = client.balance_simulation(&request).await?;

            match format {
                OutputFormat::Json => report::generate_json(&simulation)?,
                OutputFormat::Markdown => {
                    report::generate_simulation_markdown(&subject, leave_type, &simulation)
                }
            }
        }
        Command::Submit {
            registry_id,
            begin,
            end,
            begin_moment,
            end_moment,
        } => {
            let invalid_date =
                |s: &str| EngineError::InvalidInput(format!("date '{}' must be YYYY-MM-DD", s));
            let request = PaidHolidayRequest {
                leave_registry_id: registry_id,
                begin_date: parse_date(&begin).ok_or_else(|| invalid_date(&begin))?,
                begin_moment,
                end_date: parse_date(&end).ok_or_else(|| invalid_date(&end))?,
                end_moment,
            };
            let submitted = client.submit_paid_holiday(&request).await?;

            match format {
                OutputFormat::Json => report::generate_json(&submitted)?,
                OutputFormat::Markdown => report::generate_submission_markdown(&submitted),
            }
        }
    };

    write_output(&output, config.general.output.as_ref())?;

    debug!("Completed in {:.2}s", start_time.elapsed().as_secs_f64());

    Ok(exit_code)
}

/// Progress bar for multi-window fetches, drawn on stderr.
fn progress_bar(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }

    let style = ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} windows")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");

    ProgressBar::new(0).with_style(style)
}

/// Print the rendered result, or save it when an output file is set.
fn write_output(content: &str, path: Option<&PathBuf>) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write output to {}", path.display()))?;
            eprintln!("✅ Saved to {}", path.display());
        }
        None => print!("{}", content),
    }
    Ok(())
}

/// Load configuration from file or use defaults.
///
/// Runs before logging is initialized, so problems go straight to stderr.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_from_dir(Path::new(".")) {
        Ok(Some(config)) => Ok(config),
        Ok(None) => Ok(Config::default()),
        Err(e) => {
            eprintln!("⚠️  Ignoring {}: {:#}", CONFIG_FILE_NAME, e);
            Ok(Config::default())
        }
    }
}

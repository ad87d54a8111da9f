//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::engine::Completeness;
use crate::models::{Granularity, LeaveType, MomentOfDay};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// hristime - calendar and leave retrieval for HRIS time assistants
///
/// Fetches an employee's calendar week by week from the HRIS backend and
/// merges it into one chronological view. Also exposes the leave
/// registry, team schedule, balance simulation and paid holiday calls.
///
/// Examples:
///   hristime calendar EMP12345 --begin 2023-06-05 --end 2023-06-25
///   hristime calendar EMP67890 --begin 2023-07-15 --end 2023-08-10 --require-all
///   hristime team --date 2023-06-07
///   hristime simulate EMP12345 --leave-type fr_rtt --month 2024-01,2024-02
///   hristime --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .hristime.toml in the current directory
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Base URL of the calendar / leave registry backend
    #[arg(long, global = true, value_name = "URL", env = "HRISTIME_BACKEND_URL")]
    pub backend_url: Option<String>,

    /// Base URL of the absences API (simulate, submit)
    #[arg(long, global = true, value_name = "URL", env = "HRISTIME_ABSENCES_URL")]
    pub absences_url: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Maximum number of concurrent backend calls
    #[arg(long, global = true, value_name = "NUM")]
    pub concurrency: Option<usize>,

    /// Output format (markdown, json)
    #[arg(long, global = true, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Write the result to this file instead of stdout
    #[arg(short, long, global = true, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Bearer token for the absences API
    #[arg(long, global = true, env = "HRISTIME_AUTHORIZATION_TOKEN", hide_env_values = true)]
    pub authorization_token: Option<String>,

    /// Edge authentication cookie value for the absences API
    #[arg(long, global = true, env = "HRISTIME_AUTH_EDGE_TOKEN", hide_env_values = true)]
    pub edge_token: Option<String>,

    /// Generate a default .hristime.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Merged calendar of one employee over a period
    Calendar {
        /// Contract identifier of the employee
        subject: String,

        /// First day of the period (YYYY-MM-DD)
        #[arg(long, value_name = "DATE")]
        begin: String,

        /// Last day of the period (YYYY-MM-DD)
        #[arg(long, value_name = "DATE")]
        end: String,

        /// Fail instead of returning a partial calendar
        ///
        /// Shorthand for --completeness require-all
        #[arg(long, conflicts_with = "completeness")]
        require_all: bool,

        /// Whether missing windows are tolerated (tolerate-partial, require-all)
        #[arg(long, value_name = "MODE")]
        completeness: Option<Completeness>,

        /// Width of one backend request (week, day)
        #[arg(long, value_name = "UNIT")]
        granularity: Option<Granularity>,
    },

    /// Everyone's schedule for one day
    ///
    /// Without --subject the backend team endpoint is used; with one or
    /// more --subject the calendar of each listed employee is fetched.
    Team {
        /// Day to look at (YYYY-MM-DD)
        #[arg(long, value_name = "DATE")]
        date: String,

        /// Contract identifier of a team member (repeatable)
        #[arg(long = "subject", value_name = "ID")]
        subjects: Vec<String>,
    },

    /// Leave registry aggregate of one employee
    Leaves {
        /// Contract identifier of the employee
        subject: String,
    },

    /// Leave registry identifier of one employee
    RegistryId {
        /// Contract identifier of the employee
        subject: String,
    },

    /// Monthly leave balance projections
    Simulate {
        /// Contract identifier of the employee
        subject: String,

        /// Leave type to simulate
        #[arg(long, value_name = "TYPE")]
        leave_type: LeaveType,

        /// Months to simulate (YYYY-MM, comma-separated or repeated)
        #[arg(long = "month", value_name = "MONTH", value_delimiter = ',', required = true)]
        months: Vec<String>,
    },

    /// Submit a paid holiday for pre-approval
    Submit {
        /// Leave registry identifier (UUID)
        #[arg(long, value_name = "UUID")]
        registry_id: String,

        /// First day of the leave (YYYY-MM-DD)
        #[arg(long, value_name = "DATE")]
        begin: String,

        /// Last day of the leave (YYYY-MM-DD)
        #[arg(long, value_name = "DATE")]
        end: String,

        /// When the leave starts on the first day
        #[arg(long, default_value = "beginning-of-day", value_name = "MOMENT")]
        begin_moment: MomentOfDay,

        /// When the leave ends on the last day
        #[arg(long, default_value = "end-of-day", value_name = "MOMENT")]
        end_moment: MomentOfDay,
    },
}

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.command.is_none() {
            return Err("A command is required (see --help)".to_string());
        }

        for url in [&self.backend_url, &self.absences_url].into_iter().flatten() {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(format!("URL must start with 'http://' or 'https://': {}", url));
            }
        }

        // Validate concurrency
        if self.concurrency == Some(0) {
            return Err("Concurrency must be at least 1".to_string());
        }

        // Validate timeout if provided
        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// `config_verbose` is the `[general] verbose` value from the config
    /// file; the CLI flags win over it.
    pub fn log_level(&self, config_verbose: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || config_verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

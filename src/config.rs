//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.hristime.toml` files.

use crate::backend::BackendConfig;
use crate::engine::{Completeness, EngineOptions};
use crate::models::Granularity;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".hristime.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Aggregate backend settings.
    #[serde(default)]
    pub backend: BackendSection,

    /// Absences API settings.
    #[serde(default)]
    pub absences_api: AbsencesApiConfig,

    /// Merge settings.
    #[serde(default)]
    pub merge: MergeConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Write rendered results here instead of stdout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    /// Number of concurrent backend calls.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: None,
            verbose: false,
            concurrency: default_concurrency(),
        }
    }
}

fn default_concurrency() -> usize {
    4
}

/// Aggregate backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSection {
    /// Base URL of the calendar / leave registry backend.
    #[serde(default = "default_backend_url")]
    pub base_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for BackendSection {
    fn default() -> Self {
        Self {
            base_url: default_backend_url(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_backend_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_timeout() -> u64 {
    30
}

/// Absences API settings (simulation and submission).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbsencesApiConfig {
    #[serde(default = "default_absences_url")]
    pub base_url: String,

    /// Country code sent with leave types and records.
    #[serde(default = "default_country")]
    pub country: String,
}

impl Default for AbsencesApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_absences_url(),
            country: default_country(),
        }
    }
}

fn default_absences_url() -> String {
    "https://api.dev.payfit.tech/time-absences-api/api/v2".to_string()
}

fn default_country() -> String {
    "FR".to_string()
}

/// How per-window results are merged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergeConfig {
    #[serde(default)]
    pub completeness: Completeness,

    #[serde(default)]
    pub granularity: Granularity,
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from a directory.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join(CONFIG_FILE_NAME);

        if path.exists() {
            Ok(Some(Self::load(&path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings and only
    /// override values they explicitly provide.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref url) = args.backend_url {
            self.backend.base_url = url.clone();
        }
        if let Some(ref url) = args.absences_url {
            self.absences_api.base_url = url.clone();
        }
        if let Some(timeout) = args.timeout {
            self.backend.timeout_seconds = timeout;
        }
        if let Some(concurrency) = args.concurrency {
            self.general.concurrency = concurrency;
        }
        if let Some(ref output) = args.output {
            self.general.output = Some(output.clone());
        }

        if let Some(crate::cli::Command::Calendar {
            require_all,
            completeness,
            granularity,
            ..
        }) = &args.command
        {
            if *require_all {
                self.merge.completeness = Completeness::RequireAll;
            } else if let Some(mode) = completeness {
                self.merge.completeness = *mode;
            }
            if let Some(g) = granularity {
                self.merge.granularity = *g;
            }
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Client settings, with credentials supplied by the caller.
    pub fn backend_config(
        &self,
        authorization_token: Option<String>,
        edge_token: Option<String>,
    ) -> BackendConfig {
        BackendConfig {
            base_url: self.backend.base_url.clone(),
            absences_url: self.absences_api.base_url.clone(),
            country: self.absences_api.country.clone(),
            timeout_seconds: self.backend.timeout_seconds,
            authorization_token,
            edge_token,
        }
    }

    /// Engine settings.
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            concurrency: self.general.concurrency.max(1),
            completeness: self.merge.completeness,
            granularity: self.merge.granularity,
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

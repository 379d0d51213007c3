//! Service configuration management
//!
//! Values are layered: built-in defaults, then an optional TOML file, then `OSC_LISTENER_*`
//! environment variables, then command-line flags. The result is validated before use.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use ::config::{Config, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use event_batcher::EngineConfig;
use osc_transport::TransportConfig;

/// Main service configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Engine timing and control-prefix settings
    pub engine: EngineConfig,

    /// UDP listen settings
    pub transport: TransportConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// How batches are written to stdout
    pub output: OutputConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "pretty".to_string() }
    }
}

/// Batch output configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// `key arg arg ...` per line
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

/// Command-line flags
#[derive(Debug, Default, Parser)]
#[command(name = "osc-listener", version, about = "Coalesce OSC messages and print them in periodic batches")]
pub struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Host to listen on
    #[arg(long)]
    pub host: Option<String>,

    /// UDP port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Emission period in milliseconds
    #[arg(long)]
    pub period_ms: Option<u64>,

    /// Log level
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format
    #[arg(long)]
    pub log_format: Option<String>,

    /// Batch output format
    #[arg(long, value_enum)]
    pub output: Option<OutputFormat>,
}

impl ServiceConfig {
    /// Load configuration from TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::new(&path.to_string_lossy(), FileFormat::Toml))
            .build()
            .with_context(|| format!("Failed to read configuration file {:?}", path))?;

        config
            .try_deserialize()
            .with_context(|| format!("Invalid configuration in {:?}", path))
    }

    /// Save configuration to TOML file
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write configuration file {:?}", path))?;
        Ok(())
    }

    /// Apply `OSC_LISTENER_*` overrides through `lookup`
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("OSC_LISTENER_HOST") {
            self.transport.host = host;
        }

        if let Some(port) = lookup("OSC_LISTENER_PORT") {
            self.transport.port =
                port.parse().with_context(|| format!("Invalid OSC_LISTENER_PORT: {port:?}"))?;
        }

        if let Some(period) = lookup("OSC_LISTENER_PERIOD_MS") {
            self.engine.emission_period_ms = period
                .parse()
                .with_context(|| format!("Invalid OSC_LISTENER_PERIOD_MS: {period:?}"))?;
        }

        if let Some(level) = lookup("OSC_LISTENER_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Some(format) = lookup("OSC_LISTENER_LOG_FORMAT") {
            self.logging.format = format;
        }

        Ok(())
    }

    /// Apply flags given on the command line
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(host) = &cli.host {
            self.transport.host = host.clone();
        }
        if let Some(port) = cli.port {
            self.transport.port = port;
        }
        if let Some(period_ms) = cli.period_ms {
            self.engine.emission_period_ms = period_ms;
        }
        if let Some(level) = &cli.log_level {
            self.logging.level = level.clone();
        }
        if let Some(format) = &cli.log_format {
            self.logging.format = format.clone();
        }
        if let Some(output) = cli.output {
            self.output.format = output;
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.engine.validate().map_err(|e| anyhow!(e))?;
        self.transport.validate().map_err(|e| anyhow!(e))?;

        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => return Err(anyhow!("Invalid log level: {}", self.logging.level)),
        }

        match self.logging.format.as_str() {
            "json" | "pretty" | "compact" => {}
            _ => return Err(anyhow!("Invalid log format: {}", self.logging.format)),
        }

        Ok(())
    }
}

/// Load configuration from the file named on the command line, the environment and flags
pub fn load_config(cli: &Cli) -> Result<ServiceConfig> {
    let mut config = match &cli.config {
        Some(path) => ServiceConfig::from_file(path)?,
        None => ServiceConfig::default(),
    };

    config.apply_env_overrides(|key| std::env::var(key).ok())?;
    config.apply_cli(cli);
    config.validate()?;

    Ok(config)
}

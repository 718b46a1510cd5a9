//! Logging setup for the CLI and its pool workers.
//!
//! Everything goes to stderr: a worker's stdout carries the pool protocol.
//!
//! # Environment Variables
//!
//! - `GSW_LOG` - Log filter (overrides `RUST_LOG`)
//! - `RUST_LOG` - Standard filter, used when `GSW_LOG` is unset
//!
//! Without either, the `--log-level` flag decides.

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use tracing::Level;
use tracing_subscriber::{fmt as tfmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable holding a filter directive.
pub const LOG_ENV: &str = "GSW_LOG";

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Multi-line human-readable output.
    #[default]
    Pretty,
    /// Single-line output.
    Compact,
    /// One JSON object per event.
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pretty => write!(f, "pretty"),
            Self::Compact => write!(f, "compact"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Log level accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogLevel(pub Level);

impl Default for LogLevel {
    fn default() -> Self {
        Self(Level::INFO)
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_level(s).map(Self).ok_or_else(|| {
            format!("unknown log level '{s}'; valid options: error, warn, info, debug, trace")
        })
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.as_str().to_lowercase())
    }
}

fn parse_level(s: &str) -> Option<Level> {
    match s.to_lowercase().as_str() {
        "error" => Some(Level::ERROR),
        "warn" | "warning" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        "debug" => Some(Level::DEBUG),
        "trace" => Some(Level::TRACE),
        _ => None,
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    /// Level used when no filter is set.
    pub level: LogLevel,
    /// Output format.
    pub format: LogFormat,
    /// Filter directive; wins over `level`.
    pub filter: Option<String>,
}

impl LogConfig {
    /// Configuration from the command-line flags.
    pub fn new(level: LogLevel, format: LogFormat) -> Self {
        Self {
            level,
            format,
            filter: None,
        }
    }

    /// Picks up `GSW_LOG`, then `RUST_LOG`, unless a filter is already set.
    pub fn with_env_overrides(mut self) -> Self {
        if self.filter.is_none() {
            self.filter = std::env::var(LOG_ENV)
                .or_else(|_| std::env::var("RUST_LOG"))
                .ok()
                .filter(|filter| !filter.trim().is_empty());
        }
        self
    }

    fn build_filter(&self) -> EnvFilter {
        let fallback = || EnvFilter::new(self.level.to_string());
        match &self.filter {
            Some(filter) => EnvFilter::try_new(filter).unwrap_or_else(|_| {
                eprintln!("warning: invalid log filter '{filter}', using {}", self.level);
                fallback()
            }),
            None => fallback(),
        }
    }
}

/// Installs the global subscriber on stderr. Later calls are ignored.
pub fn init(config: LogConfig) {
    let filter = config.build_filter();
    let registry = tracing_subscriber::registry().with(filter);
    let result = match config.format {
        LogFormat::Json => registry
            .with(tfmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Compact => registry
            .with(tfmt::layer().compact().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Pretty => registry
            .with(tfmt::layer().with_writer(std::io::stderr))
            .try_init(),
    };
    let _ = result;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_parse_case_insensitively() {
        assert_eq!("DEBUG".parse::<LogLevel>().expect("level").0, Level::DEBUG);
        assert_eq!("warning".parse::<LogLevel>().expect("level").0, Level::WARN);
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn level_display_is_a_valid_filter() {
        let level = LogLevel(Level::TRACE);
        assert_eq!(level.to_string(), "trace");
        assert!(EnvFilter::try_new(level.to_string()).is_ok());
    }

    #[test]
    fn explicit_filter_is_kept() {
        let config = LogConfig {
            filter: Some("gsw_run=debug".into()),
            ..LogConfig::default()
        }
        .with_env_overrides();
        assert_eq!(config.filter.as_deref(), Some("gsw_run=debug"));
    }
}

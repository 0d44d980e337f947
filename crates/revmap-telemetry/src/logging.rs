//! Subscriber installation.

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::{self, writer::BoxMakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::error::{TelemetryError, TelemetryResult};

/// How events are rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line, for a terminal.
    #[default]
    Pretty,
    /// One short line per event.
    Compact,
    /// One JSON object per event, with the current span.
    Json,
    /// One line per event with every field.
    Full,
}

impl FromStr for LogFormat {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::Pretty, Self::Compact, Self::Json, Self::Full]
            .into_iter()
            .find(|format| format.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| TelemetryError::ConfigError(format!("unknown log format: {s}")))
    }
}

impl LogFormat {
    /// Lowercase name, as accepted by `from_str`.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Pretty => "pretty",
            Self::Compact => "compact",
            Self::Json => "json",
            Self::Full => "full",
        }
    }
}

/// Where events are written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LogTarget {
    /// Standard output.
    Stdout,
    /// Standard error, leaving stdout to command output.
    #[default]
    Stderr,
    /// Daily rolling files `{prefix}.YYYY-MM-DD` under `dir`.
    DailyFiles {
        /// Directory, created if missing.
        dir: PathBuf,
        /// File name prefix.
        prefix: String,
    },
}

/// Everything `setup_logging` needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// An `EnvFilter` expression, e.g. `info,revmap_map=trace`.
    pub filter: String,
    /// Event rendering.
    pub format: LogFormat,
    /// Output.
    pub target: LogTarget,
    /// ANSI colours. Always off for file targets.
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::new("info")
    }
}

impl LogConfig {
    /// Log at `level` and above to stderr in the pretty format.
    #[must_use]
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            filter: level.into(),
            format: LogFormat::default(),
            target: LogTarget::default(),
            ansi: true,
        }
    }

    /// Set the format.
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the target.
    #[must_use]
    pub fn with_target(mut self, target: LogTarget) -> Self {
        if matches!(target, LogTarget::DailyFiles { .. }) {
            self.ansi = false;
        }
        self.target = target;
        self
    }

    /// Append a per-target directive such as `revmap_ledger=debug`.
    #[must_use]
    pub fn with_directive(mut self, directive: impl AsRef<str>) -> Self {
        self.filter.push(',');
        self.filter.push_str(directive.as_ref());
        self
    }

    fn env_filter(&self) -> TelemetryResult<EnvFilter> {
        EnvFilter::try_new(&self.filter)
            .map_err(|e| TelemetryError::ConfigError(format!("bad filter '{}': {e}", self.filter)))
    }

    fn writer(&self) -> TelemetryResult<BoxMakeWriter> {
        Ok(match &self.target {
            LogTarget::Stdout => BoxMakeWriter::new(std::io::stdout),
            LogTarget::Stderr => BoxMakeWriter::new(std::io::stderr),
            LogTarget::DailyFiles { dir, prefix } => {
                std::fs::create_dir_all(dir).map_err(|e| {
                    TelemetryError::ConfigError(format!(
                        "cannot create log directory {}: {e}",
                        dir.display()
                    ))
                })?;
                BoxMakeWriter::new(RollingFileAppender::new(Rotation::DAILY, dir, prefix))
            },
        })
    }
}

/// Install `config` as the global subscriber.
///
/// # Errors
///
/// [`TelemetryError::ConfigError`] for a bad filter or an unusable log
/// directory, [`TelemetryError::InitError`] if a subscriber is already set.
pub fn setup_logging(config: &LogConfig) -> TelemetryResult<()> {
    let filter = config.env_filter()?;
    let base = fmt::layer()
        .with_writer(config.writer()?)
        .with_ansi(config.ansi);

    let layer: Box<dyn Layer<Registry> + Send + Sync> = match config.format {
        LogFormat::Pretty => base.pretty().boxed(),
        LogFormat::Compact => base.compact().boxed(),
        LogFormat::Json => base.json().with_current_span(true).boxed(),
        LogFormat::Full => base.boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .try_init()
        .map_err(|e| TelemetryError::InitError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LogConfig::default();
        assert_eq!(config.filter, "info");
        assert_eq!(config.format, LogFormat::Pretty);
        assert_eq!(config.target, LogTarget::Stderr);
        assert!(config.ansi);
    }

    #[test]
    fn test_directives_extend_filter() {
        let config = LogConfig::new("warn")
            .with_directive("revmap_map=trace")
            .with_directive("revmap_ledger=debug");
        assert_eq!(config.filter, "warn,revmap_map=trace,revmap_ledger=debug");
        assert!(config.env_filter().is_ok());
    }

    #[test]
    fn test_file_target_turns_off_ansi() {
        let dir = tempfile::tempdir().unwrap();
        let config = LogConfig::new("debug").with_target(LogTarget::DailyFiles {
            dir: dir.path().join("logs"),
            prefix: "revmap".to_owned(),
        });
        assert!(!config.ansi);
        assert!(config.writer().is_ok());
        assert!(dir.path().join("logs").is_dir());
    }

    #[test]
    fn test_format_names() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("Compact".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert_eq!(LogFormat::Full.name(), "full");
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_bad_directive_rejected_before_install() {
        let config = LogConfig::new("info").with_directive("[nope");
        assert!(matches!(
            setup_logging(&config),
            Err(TelemetryError::ConfigError(_))
        ));
    }
}

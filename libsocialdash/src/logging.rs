//! Logging setup for the dashboard binary
//!
//! All output goes to stderr; stdout is reserved for command results so
//! `--format json` output can be piped.
//!
//! The level applies to socialdash's own crates. HTTP internals (`reqwest`,
//! `hyper`, `rustls`) stay at `warn` unless `RUST_LOG` says otherwise.
//!
//! ```no_run
//! use libsocialdash::logging::{LogFormat, LoggingConfig};
//!
//! LoggingConfig::from_env(false)
//!     .with_format(Some(LogFormat::Json))
//!     .init();
//! ```

use std::io::IsTerminal;
use std::str::FromStr;

use tracing_subscriber::EnvFilter;

pub const LOG_FORMAT_VAR: &str = "SOCIALDASH_LOG_FORMAT";
pub const LOG_LEVEL_VAR: &str = "SOCIALDASH_LOG_LEVEL";

const OWN_CRATES: &[&str] = &["libsocialdash", "socialdash"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Compact single-line events
    Text,
    /// One JSON object per event
    Json,
    /// Multi-line events with source locations
    Pretty,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Text => "text",
            LogFormat::Json => "json",
            LogFormat::Pretty => "pretty",
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [LogFormat::Text, LogFormat::Json, LogFormat::Pretty]
            .into_iter()
            .find(|format| format.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!(
                    "Invalid log format: '{}'. Valid options: text, json, pretty",
                    s
                )
            })
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Level for socialdash's own events
    pub level: String,
    /// Forces `debug`, whatever `level` says
    pub verbose: bool,
}

impl LoggingConfig {
    pub fn new(format: LogFormat, level: impl Into<String>, verbose: bool) -> Self {
        Self {
            format,
            level: level.into(),
            verbose,
        }
    }

    /// Read `SOCIALDASH_LOG_FORMAT` and `SOCIALDASH_LOG_LEVEL`; unset or
    /// unparsable values mean text at `warn`
    pub fn from_env(verbose: bool) -> Self {
        let format = std::env::var(LOG_FORMAT_VAR)
            .ok()
            .and_then(|value| match value.parse() {
                Ok(format) => Some(format),
                Err(e) => {
                    eprintln!("Ignoring {}: {}", LOG_FORMAT_VAR, e);
                    None
                }
            })
            .unwrap_or(LogFormat::Text);
        let level = std::env::var(LOG_LEVEL_VAR).unwrap_or_else(|_| "warn".to_string());

        Self::new(format, level, verbose)
    }

    /// Override the format, e.g. from a command-line flag
    pub fn with_format(mut self, format: Option<LogFormat>) -> Self {
        if let Some(format) = format {
            self.format = format;
        }
        self
    }

    /// Filter directives: our crates at the configured level, everything
    /// else at `warn`
    pub fn directives(&self) -> String {
        let level = if self.verbose { "debug" } else { self.level.as_str() };
        let mut directives = vec!["warn".to_string()];
        directives.extend(OWN_CRATES.iter().map(|krate| format!("{}={}", krate, level)));
        directives.join(",")
    }

    /// Install the global subscriber
    ///
    /// `RUST_LOG` takes precedence over the configured directives. A second
    /// call is a no-op.
    pub fn init(&self) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.directives()));
        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr);

        let installed = match self.format {
            LogFormat::Json => builder
                .json()
                .flatten_event(true)
                .with_current_span(false)
                .try_init(),
            LogFormat::Pretty => builder
                .pretty()
                .with_file(true)
                .with_line_number(true)
                .try_init(),
            LogFormat::Text => builder
                .compact()
                .with_target(false)
                .with_ansi(std::io::stderr().is_terminal())
                .try_init(),
        };

        if installed.is_err() {
            tracing::debug!("Logging was already initialized");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_log_format_parsing() {
        assert_eq!(" Json ".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("PRETTY".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("yaml"
            .parse::<LogFormat>()
            .unwrap_err()
            .contains("Invalid log format: 'yaml'"));
    }

    #[test]
    fn test_directives_scope_level_to_own_crates() {
        let config = LoggingConfig::new(LogFormat::Text, "info", false);
        assert_eq!(config.directives(), "warn,libsocialdash=info,socialdash=info");

        let verbose = LoggingConfig::new(LogFormat::Text, "error", true);
        assert_eq!(verbose.directives(), "warn,libsocialdash=debug,socialdash=debug");
    }

    #[test]
    fn test_flag_overrides_env_format() {
        let config = LoggingConfig::new(LogFormat::Json, "warn", false).with_format(None);
        assert_eq!(config.format, LogFormat::Json);

        let config = config.with_format(Some(LogFormat::Pretty));
        assert_eq!(config.format, LogFormat::Pretty);
    }

    #[test]
    #[serial]
    fn test_from_env() {
        std::env::set_var(LOG_FORMAT_VAR, "json");
        std::env::set_var(LOG_LEVEL_VAR, "debug");
        let config = LoggingConfig::from_env(false);
        assert_eq!(config, LoggingConfig::new(LogFormat::Json, "debug", false));

        std::env::set_var(LOG_FORMAT_VAR, "xml");
        std::env::remove_var(LOG_LEVEL_VAR);
        let config = LoggingConfig::from_env(true);
        assert_eq!(config, LoggingConfig::new(LogFormat::Text, "warn", true));

        std::env::remove_var(LOG_FORMAT_VAR);
    }
}

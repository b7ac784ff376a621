//! Coffer Logging Bootstrap
//!
//! The Coffer crates emit structured events through `tracing`. This crate
//! installs a `tracing-subscriber` formatter for binaries and demos, driven by
//! environment variables so deployments can change verbosity without a rebuild.
//!
//! # Usage
//!
//! ```rust,no_run
//! fn main() {
//!     coffer_log::init().expect("logging already initialized");
//!     tracing::info!(port = 8000, "server starting");
//! }
//! ```
//!
//! # Environment Variables
//!
//! - `COFFER_LOG=debug,coffer_redis=trace` - filter directives (falls back to `RUST_LOG`)
//! - `COFFER_LOG_FORMAT=pretty|compact|json` - output format (default `json`)
//! - `COFFER_LOG_COLOR=1|0` - enable/disable ANSI colors (`NO_COLOR` also disables)

use std::env;
use std::str::FromStr;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Filter used when neither `COFFER_LOG` nor `RUST_LOG` is set.
pub const DEFAULT_FILTER: &str = "info";

// ============================================================================
// Log Format
// ============================================================================

/// Output format for log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Multi-line, human friendly output
    Pretty,
    /// Compact single-line output
    Compact,
    /// One JSON object per event
    Json,
}

impl FromStr for Format {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pretty" => Ok(Format::Pretty),
            "compact" => Ok(Format::Compact),
            "json" => Ok(Format::Json),
            _ => Err(UnknownFormat(s.to_string())),
        }
    }
}

/// Returned when `COFFER_LOG_FORMAT` names an unsupported format.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown log format '{0}' (expected pretty, compact or json)")]
pub struct UnknownFormat(pub String);

// ============================================================================
// Configuration
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// `EnvFilter` directives, e.g. `info,coffer_redis=debug`
    pub filter: String,
    /// Output format
    pub format: Format,
    /// Whether ANSI colors are emitted
    pub color: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_FILTER.to_string(),
            format: Format::Json,
            color: false,
        }
    }
}

impl LogConfig {
    /// Build the configuration from `COFFER_LOG*` environment variables.
    pub fn from_env() -> Self {
        let filter = env::var("COFFER_LOG")
            .or_else(|_| env::var("RUST_LOG"))
            .unwrap_or_else(|_| DEFAULT_FILTER.to_string());

        let format = env::var("COFFER_LOG_FORMAT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(Format::Json);

        let color = match env::var("COFFER_LOG_COLOR") {
            Ok(v) => is_truthy(&v),
            Err(_) => env::var("NO_COLOR").is_err() && env::var("TERM").is_ok(),
        };

        Self {
            filter,
            format,
            color,
        }
    }

    /// Set the filter directives.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    /// Set the output format.
    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    /// Enable or disable colors.
    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_new(&self.filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    }
}

fn is_truthy(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

// ============================================================================
// Public API
// ============================================================================

/// Error returned when a global subscriber is already installed.
pub type InitError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Install the global subscriber using [`LogConfig::from_env`].
pub fn init() -> Result<(), InitError> {
    init_with(&LogConfig::from_env())
}

/// Install the global subscriber with an explicit configuration.
///
/// Fails instead of panicking if a subscriber was already installed, so
/// tests and embedders can call it more than once.
pub fn init_with(config: &LogConfig) -> Result<(), InitError> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(config.env_filter())
        .with_ansi(config.color)
        .with_target(true);

    match config.format {
        Format::Pretty => builder.pretty().try_init(),
        Format::Compact => builder.compact().try_init(),
        #[cfg(feature = "json")]
        Format::Json => builder.json().with_current_span(false).try_init(),
        #[cfg(not(feature = "json"))]
        Format::Json => builder.compact().try_init(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_str() {
        assert_eq!("pretty".parse(), Ok(Format::Pretty));
        assert_eq!("COMPACT".parse(), Ok(Format::Compact));
        assert_eq!(" json ".parse(), Ok(Format::Json));
        assert_eq!(
            "xml".parse::<Format>().unwrap_err().to_string(),
            "unknown log format 'xml' (expected pretty, compact or json)"
        );
    }

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.filter, "info");
        assert_eq!(config.format, Format::Json);
        assert!(!config.color);
    }

    #[test]
    fn test_builder_methods() {
        let config = LogConfig::default()
            .with_filter("debug,coffer_redis=trace")
            .with_format(Format::Compact)
            .with_color(true);

        assert_eq!(config.filter, "debug,coffer_redis=trace");
        assert_eq!(config.format, Format::Compact);
        assert!(config.color);
    }

    #[test]
    fn test_invalid_filter_falls_back() {
        let config = LogConfig::default().with_filter("=[not a directive");
        // Must not panic; an unparsable filter degrades to the default.
        let _ = config.env_filter();
    }

    #[test]
    fn test_truthy_values() {
        assert!(is_truthy("1"));
        assert!(is_truthy("TRUE"));
        assert!(!is_truthy("0"));
        assert!(!is_truthy("yes"));
    }

    #[test]
    fn test_second_init_reports_error() {
        let config = LogConfig::default().with_format(Format::Compact);
        let _ = init_with(&config);
        assert!(init_with(&config).is_err());
    }
}

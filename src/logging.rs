//! Log setup for the `codecstack` binary.
//!
//! Only events from this crate are shown, at the level picked on the command
//! line.  `CODECSTACK_LOG` replaces that default with full `EnvFilter`
//! directives, e.g. `CODECSTACK_LOG=codecstack::stack=trace,zstd=debug`.

use clap::ValueEnum;
use tracing_subscriber::EnvFilter;

/// Environment variable holding filter directives that override `--log-level`.
pub const LOG_ENV: &str = "CODECSTACK_LOG";

#[derive(Copy, Clone, Debug, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    #[default]
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn  => "warn",
            LogLevel::Info  => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Filter directives used when `CODECSTACK_LOG` is unset.
pub fn default_directives(level: LogLevel) -> String {
    format!("{}={}", env!("CARGO_CRATE_NAME"), level.as_str())
}

fn build_env_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_directives(level)))
}

/// Install a global subscriber writing to stderr.  A second call is a no-op.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(build_env_filter(level))
        .with_ansi(false);

    let installed = match format {
        LogFormat::Text => builder.try_init().is_ok(),
        LogFormat::Json => builder.json().try_init().is_ok(),
    };
    if installed {
        tracing::debug!(?format, level = level.as_str(), "logging initialised");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_directives_scope_to_this_crate() {
        assert_eq!(default_directives(LogLevel::Debug), "codecstack=debug");
        assert_eq!(default_directives(LogLevel::default()), "codecstack=warn");
    }

    #[test]
    fn every_level_parses_as_a_filter() {
        for level in LogLevel::value_variants() {
            assert!(EnvFilter::try_new(default_directives(*level)).is_ok(), "{level:?}");
        }
    }
}

//! Utilities for logging.

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

/// Build the env filter, defaulting to `level` when `RUST_LOG` isn't set.
fn env_filter(level: Level) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy()
}

/// Install a global subscriber.
///
/// Returns false if a subscriber was already installed.
pub fn init(level: Level, format: LogFormat) -> bool {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_file(true)
        .with_line_number(true);

    match format {
        LogFormat::Plain => builder.try_init().is_ok(),
        LogFormat::Json => builder.json().try_init().is_ok(),
    }
}

/// Install a subscriber writing through the test harness' captured output.
///
/// Safe to call from every test, only the first call installs anything.
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(env_filter(Level::DEBUG))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_test_is_repeatable() {
        init_test();
        init_test();
        // Already installed by the calls above.
        assert!(!init(Level::INFO, LogFormat::Plain));
    }
}

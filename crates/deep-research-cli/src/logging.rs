use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::settings::resolved::DEFAULT_LOG_LEVEL;

/// Build the log filter: `RUST_LOG` wins, then `level`, then the default.
pub fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL))
}

/// Install the global subscriber. Logs go to stderr so stdout carries only
/// report output. Calling this twice is harmless.
pub fn init_logging(level: &str) {
    let _ = tracing_subscriber::registry()
        .with(build_filter(level))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_directive_falls_back() {
        // Must not panic on garbage
        let _ = build_filter("[[not a filter");
        let _ = build_filter("deep_research_core=debug");
    }

    #[test]
    fn test_init_twice() {
        init_logging("warn");
        init_logging("debug");
    }
}

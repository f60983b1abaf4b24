//! Tracing initialization for embedders.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;

/// Initializes the global tracing subscriber from the logging config.
///
/// An explicit `RUST_LOG` takes precedence over the configured level.
/// Returns `false` when a global subscriber was already installed (e.g.,
/// by the embedding process), in which case nothing is changed.
pub fn init(config: &LoggingConfig) -> bool {
    let directives =
        std::env::var("RUST_LOG").unwrap_or_else(|_| format!("stratadb_storage={}", config.level));
    let filter = tracing_subscriber::EnvFilter::new(directives);

    let registry = tracing_subscriber::registry().with(filter);
    if config.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .is_ok()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_safe_to_call_repeatedly() {
        let config = LoggingConfig::default();
        // First call may win or lose against other tests; the second call
        // must always report the subscriber as already installed.
        let _ = init(&config);
        assert!(!init(&config));
    }
}

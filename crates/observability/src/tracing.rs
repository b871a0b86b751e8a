//! Subscriber configuration.

use tracing_subscriber::EnvFilter;

/// Build the filter: `RUST_LOG` if set and parseable, else `fallback`.
pub fn filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// JSON lines with timestamps, one object per event.
pub fn init(fallback: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(fallback))
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .with_current_span(true)
        .try_init();
}

/// Human-readable output captured by the test harness.
pub fn init_for_tests() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter("debug"))
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_init_is_harmless() {
        init_for_tests();
        init_for_tests();
        init("info");
        ::tracing::info!("still logging");
    }

    #[test]
    fn fallback_filter_parses() {
        // Only meaningful when RUST_LOG is unset, but must never panic.
        let _ = filter(crate::DEFAULT_FILTER);
    }
}

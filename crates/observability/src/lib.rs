//! Process-wide tracing setup.

/// Install the JSON subscriber used by the server binary.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init() {
    tracing::init(DEFAULT_FILTER);
}

/// Filter applied when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info,tower_http=debug,sqlx=warn";

pub mod tracing;

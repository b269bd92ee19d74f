//! Logging setup for the Huddle binaries.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Crates whose spans and events are shown at the default level.
const CRATES: &[&str] = &[
    "huddle",
    "huddle_room",
    "huddle_transport",
    "huddle_protocol",
    "huddle_session",
    "huddle_tick",
];

/// Builds the filter used when `RUST_LOG` is not set: every Huddle crate
/// plus the binary itself at `default_level`.
pub fn default_filter(binary_name: &str, default_level: &str) -> String {
    CRATES
        .iter()
        .copied()
        .chain(std::iter::once(binary_name))
        .map(|target| format!("{}={}", target.replace('-', "_"), default_level))
        .collect::<Vec<_>>()
        .join(",")
}

/// Installs the global tracing subscriber.
///
/// The level can be overridden with the `RUST_LOG` environment variable.
/// Call once, at the start of `main`.
pub fn setup_logger(binary_name: &str, default_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter(binary_name, default_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

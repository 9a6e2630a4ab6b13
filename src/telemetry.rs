//! Structured logging initialisation.
//!
//! `RUST_LOG` overrides the default filter when set.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry, fmt};

/// Installs the global `tracing` subscriber.
///
/// Returns `false` when a subscriber was already installed, in which case the
/// call has no effect. Safe to call from every test.
///
/// # Examples
///
/// ```
/// let _installed = foreman::telemetry::init_tracing("foreman=info");
/// tracing::info!(component = "example", "logging ready");
/// ```
#[must_use]
pub fn init_tracing(default_filter: &str) -> bool {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let formatting_layer = fmt::layer().with_target(true);
    Registry::default()
        .with(env_filter)
        .with(formatting_layer)
        .try_init()
        .is_ok()
}

/// Installs a subscriber that writes through the test harness.
///
/// Captured output only shows for failing tests.
#[must_use]
pub fn init_test_tracing() -> bool {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("foreman=debug"));
    Registry::default()
        .with(env_filter)
        .with(fmt::layer().with_test_writer())
        .try_init()
        .is_ok()
}

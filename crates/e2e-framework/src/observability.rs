//! Tracing initialisation for test binaries.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "e2e_framework=info,e2e=info";

/// Install a global subscriber: `RUST_LOG` filter plus the fmt layer, or JSON
/// lines when `E2E_LOG_FORMAT=json`.
///
/// Safe to call from every test; only the first call installs anything.
/// Returns whether this call installed the subscriber.
pub fn init_tracing() -> bool {
    let json = std::env::var("E2E_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);

    let installed = if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_test_writer())
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_test_writer())
            .try_init()
    };
    installed.is_ok()
}

//! Tracing initialization.
//!
//! Log levels come from `RUST_LOG` using the usual `EnvFilter` directives, for example:
//!
//! ```bash
//! export RUST_LOG="schoolgate=debug,tower_http=info,sqlx=warn"
//! ```
//!
//! Without `RUST_LOG` the service logs at `info`.

use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Install the global subscriber: an env-driven filter in front of the console fmt layer.
///
/// Fails if a global subscriber is already installed.
pub fn init_telemetry() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    info!("Telemetry initialized");
    Ok(())
}

//! Observability infrastructure: tracing and metrics.
//!
//! The core only records through the `tracing` and `metrics` facades. No
//! metrics exporter is installed here; a host process may install one.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod metrics;

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` wins over `default_level`. Must be called once, at startup.
pub fn init(default_level: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = match std::env::var("RUST_LOG") {
        Ok(_) => EnvFilter::from_default_env(),
        Err(_) => EnvFilter::try_new(default_level)?,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false).with_level(true))
        .try_init()?;

    metrics::register_core_metrics();
    tracing::debug!("observability initialized (level: {})", default_level);

    Ok(())
}

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize structured logging for the binary.
///
/// JSON output with span context so remote-call and transition logs carry
/// their drive/deal fields; the level comes from RUST_LOG with the supplied
/// default.
pub fn init_telemetry(default_level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true),
        )
        .with(filter)
        .init();

    tracing::info!("deal-desk telemetry initialized with structured logging");
    Ok(())
}

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global JSON subscriber.
///
/// Level is controlled by `RUST_LOG`, falling back to `default_filter`.
/// Calling it again (e.g. from several tests) is a no-op.
pub fn init_telemetry(default_filter: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let formatting_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(true)
        .json();

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(formatting_layer)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_initialization_is_harmless() {
        init_telemetry("debug");
        init_telemetry("info");
        tracing::info!("telemetry initialized twice");
    }
}

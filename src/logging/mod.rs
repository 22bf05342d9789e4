use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Console logging with the configured level as the default filter;
/// `RUST_LOG` takes precedence when set.
pub fn init_logging(default_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true))
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        log_level = %default_level,
        "logging initialized"
    );
}

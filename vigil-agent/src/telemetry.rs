use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the global subscriber. `RUST_LOG` overrides the defaults.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    "info,vigil_core=info,hyper=warn,reqwest=warn".into()
                }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

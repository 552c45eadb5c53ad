use std::sync::Once;

const DEFAULT_FILTER: &str = "liveroom_core=debug,liveroom_desktop=info";

/// Initialize tracing/logging. Call once from the host before mounting a
/// screen; later calls are no-ops. `RUST_LOG` overrides the default filter.
pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_FILTER));
        let installed = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .try_init();
        if installed.is_err() {
            tracing::debug!("a global tracing subscriber was already installed");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_logging_is_idempotent() {
        init_logging();
        init_logging();
        tracing::info!("logging initialized");
    }
}

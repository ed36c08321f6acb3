use dpkit_core::config::LoggingSection;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Install a `fmt` subscriber when logging is enabled. `RUST_LOG` wins over
/// the configured filter, and an already installed subscriber is kept.
pub fn init(logging: &LoggingSection) {
    if !logging.enabled {
        return;
    }
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = if logging.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if let Err(err) = installed {
        debug!(error = %err, "keeping the existing tracing subscriber");
    }
}

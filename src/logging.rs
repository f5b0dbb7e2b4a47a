//! Logging initialisation.
//!
//! Every component logs through `tracing` at natural levels: `info!` on
//! pipeline request completion, `warn!` on propagation skips and invalid
//! actions, `error!` on topology load failure. There is no custom log
//! sink here — file rotation and network shipping belong to the
//! out-of-scope telemetry layer.

use tracing_subscriber::{fmt, EnvFilter};

/// Initialise the global tracing subscriber from a filter directive
/// (e.g. `"info"`, `"sagin_router=debug,tower_http=info"`).
pub fn init_logging(filter: &str) {
    let env_filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(env_filter).init();
}

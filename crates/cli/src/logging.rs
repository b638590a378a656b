//! Logging setup for the CLI. There is no daemon process here, so unlike the
//! teacher this only ever logs to the console.

use tracing_subscriber::EnvFilter;

/// Initialize console logging. `RUST_LOG` overrides the default of `info`.
pub fn init_cli_logging() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::builder().with_default_directive(tracing::Level::INFO.into()).from_env_lossy())
    .with_target(true)
    .init();
}

//! Presence Gateway entry point
//!
//! Run with:
//! ```bash
//! cargo run -p presence-gateway
//! ```
//!
//! Configuration is loaded from environment variables.

use presence_common::{try_init_tracing_with_config, AppConfig, TracingConfig};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = try_init_tracing_with_config(TracingConfig::for_environment(config.app.env)) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    info!(
        env = ?config.app.env,
        address = %config.gateway.address(),
        timeout_window_secs = config.presence.timeout_window_secs,
        "Configuration loaded"
    );

    if let Err(e) = presence_gateway::run(config).await {
        error!(error = %e, "Gateway failed");
        std::process::exit(1);
    }
}

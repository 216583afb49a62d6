//! # Service Desk Webhook Service
//!
//! Binary entry point.
//!
//! This executable:
//! - Loads configuration from files and the environment
//! - Initializes logging
//! - Builds the dispatcher and its REST-backed collaborators
//! - Starts the HTTP server from sd-webhook-api

use sd_webhook_api::{start_server, LoggingConfig, ServiceConfig};
use sd_webhook_service::{build_dispatcher, init_tracing};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // -------------------------------------------------------------------------
    // Load configuration
    //
    // Sources (applied in order, later sources override earlier ones):
    //  1. /etc/sd-webhook/service.yaml   system-wide defaults
    //  2. ./config/service.yaml          deployment-local override
    //  3. Path given by SDW_CONFIG_FILE  operator-specified file
    //  4. Environment variables prefixed SDW__ (double-underscore separator)
    //     e.g. SDW__SERVER__PORT=9090 sets server.port = 9090
    //
    // Logging is configured from the result, so a load failure is reported
    // through the default subscriber.
    // -------------------------------------------------------------------------
    let loaded = ServiceConfig::load(None);

    let logging = loaded
        .as_ref()
        .map(|config| config.logging.clone())
        .unwrap_or_else(|_| LoggingConfig::default());
    init_tracing(&logging);

    info!("Starting Service Desk webhook service");

    let service_config = match loaded {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Failed to load configuration; aborting");
            std::process::exit(3);
        }
    };

    if let Err(e) = service_config.validate() {
        error!(error = %e, "Service configuration is invalid; aborting");
        std::process::exit(3);
    }

    let dispatcher = match build_dispatcher(&service_config).await {
        Ok(dispatcher) => Arc::new(dispatcher),
        Err(e) => {
            error!(error = %e, "Failed to build dispatcher; aborting");
            std::process::exit(3);
        }
    };

    info!(
        host = %service_config.server.host,
        port = service_config.server.port,
        "Starting HTTP server"
    );

    if let Err(e) = start_server(service_config, dispatcher).await {
        error!("Failed to start server: {}", e);
        std::process::exit(e.exit_code());
    }
}

//! # Service Desk Webhook Service
//!
//! Wiring for the service binary: logging, the REST-backed collaborators,
//! the compiled-in handler registry and the dispatcher built from them.

pub mod handlers;

use sd_webhook_api::{ConfigError, LoggingConfig, ServiceConfig};
use sd_webhook_core::adapters::RestServiceDesk;
use sd_webhook_core::{
    CustomFieldCache, Dispatcher, HandlerLocator, HandlerRegistry, RequestTypeResolver,
};
use servicedesk_sdk::{Credentials, ServiceDeskClient};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured filter.
pub fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let registry = tracing_subscriber::registry().with(filter);

    if logging.json_format {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Build the dispatcher described by `config`.
///
/// Opens the custom field cache file, so call once per process.
pub async fn build_dispatcher(config: &ServiceConfig) -> Result<Dispatcher, ConfigError> {
    let password = config
        .service_desk
        .password()
        .ok_or_else(|| ConfigError::Missing {
            key: "service_desk.bot_password".to_string(),
        })?;

    let client = ServiceDeskClient::builder(Credentials::new(
        config.service_desk.bot_name.clone(),
        password.expose(),
    ))
    .config(config.service_desk.client_config())
    .build()
    .map_err(|e| ConfigError::Invalid {
        message: e.to_string(),
    })?;

    let desk = Arc::new(RestServiceDesk::new(client, config.custom_fields.api));

    let cache = match &config.custom_fields.cache_file {
        Some(path) => CustomFieldCache::open(path.clone(), desk.clone()).await,
        None => CustomFieldCache::in_memory(desk.clone()),
    };
    let resolver = RequestTypeResolver::new(Arc::new(cache))
        .with_field_names(config.custom_fields.request_type_fields.clone());

    let registry = handlers::registry();
    warn_unregistered(config, &registry);
    info!(handlers = ?registry.names(), "Registered compiled-in handlers");

    let locator = HandlerLocator::new(config.handlers.clone(), Arc::new(registry));

    Ok(Dispatcher::new(desk, Arc::new(resolver), locator)
        .with_settings(config.dispatch.settings()))
}

/// Table entries naming a handler that is not compiled in never dispatch.
fn warn_unregistered(config: &ServiceConfig, registry: &HandlerRegistry) {
    for (request_type, handler) in &config.handlers {
        if !registry.contains(handler) {
            warn!(
                request_type = %request_type,
                handler = %handler,
                "Handler table names an unregistered handler"
            );
        }
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

//! # Service Desk Webhook HTTP Service
//!
//! HTTP server receiving Service Desk and Jira webhooks and handing them to
//! the [`Dispatcher`].
//!
//! This service provides:
//! - One POST route per event kind (`/create`, `/comment`, `/org-change`,
//!   `/transition`, `/jira-hook`), each answering an empty `200`
//! - `GET /` liveness probe and `GET /health` status endpoint
//! - Request logging with correlation IDs
//! - Graceful shutdown on SIGINT/SIGTERM

pub mod config;
pub mod errors;

pub use config::{
    CustomFieldConfig, DispatchConfig, LoggingConfig, Secret, ServerConfig, ServiceConfig,
    ServiceDeskConfig,
};
pub use errors::{ConfigError, ServiceError};

use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    middleware,
    response::{Json, Response},
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use sd_webhook_core::{DispatchOutcome, Dispatcher, EventKind};
use serde::Serialize;
use std::future::{Future, IntoFuture};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, error, info, instrument, warn};

// ============================================================================
// Application State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Configuration for the service
    pub config: Arc<ServiceConfig>,

    /// Dispatch engine shared by every route
    pub dispatcher: Arc<Dispatcher>,
}

impl AppState {
    pub fn new(config: ServiceConfig, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            config: Arc::new(config),
            dispatcher,
        }
    }
}

// ============================================================================
// HTTP Server
// ============================================================================

/// Create HTTP router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let mut webhook_routes = Router::new();
    for kind in EventKind::ALL {
        webhook_routes = webhook_routes.route(
            kind.route(),
            post(move |State(state): State<AppState>, body: Bytes| {
                handle_delivery(state, kind, body)
            }),
        );
    }

    let health_routes = Router::new()
        .route("/", get(handle_liveness))
        .route("/health", get(handle_health_check));

    let mut router = Router::new()
        .merge(webhook_routes)
        .merge(health_routes)
        .layer(DefaultBodyLimit::max(state.config.server.max_body_size))
        .layer(middleware::from_fn(request_logging_middleware))
        .layer(TraceLayer::new_for_http());

    if state.config.server.enable_cors {
        router = router.layer(CorsLayer::permissive());
    }

    router.with_state(state)
}

/// Start HTTP server
pub async fn start_server(
    config: ServiceConfig,
    dispatcher: Arc<Dispatcher>,
) -> Result<(), ServiceError> {
    let address = config.server.bind_address();
    let shutdown_timeout = Duration::from_secs(config.server.shutdown_timeout_seconds);

    let app = create_router(AppState::new(config, dispatcher));

    let listener =
        tokio::net::TcpListener::bind(&address)
            .await
            .map_err(|e| ServiceError::BindFailed {
                address: address.clone(),
                message: e.to_string(),
            })?;

    info!(address = %address, "Starting HTTP server");

    let shutdown_signal = async move {
        let ctrl_c = async {
            tokio::signal::ctrl_c()
                .await
                .expect("Failed to install Ctrl+C signal handler");
        };

        #[cfg(unix)]
        let terminate = async {
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("Failed to install SIGTERM signal handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received SIGINT (Ctrl+C), initiating graceful shutdown with {}s timeout", shutdown_timeout.as_secs());
            },
            _ = terminate => {
                info!("Received SIGTERM, initiating graceful shutdown with {}s timeout", shutdown_timeout.as_secs());
            },
        }
    };

    serve_until(listener, app, shutdown_signal, shutdown_timeout).await?;

    info!("HTTP server shutdown complete");
    Ok(())
}

/// Serve `app` until `signal` resolves.
///
/// In-flight deliveries then get at most `grace` to finish before the
/// server is dropped.
async fn serve_until<S>(
    listener: tokio::net::TcpListener,
    app: Router,
    signal: S,
    grace: Duration,
) -> Result<(), ServiceError>
where
    S: Future<Output = ()> + Send + 'static,
{
    let (signalled_tx, mut signalled_rx) = watch::channel(false);
    let graceful = async move {
        signal.await;
        let _ = signalled_tx.send(true);
    };

    let server = axum::serve(listener, app)
        .with_graceful_shutdown(graceful)
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        biased;
        result = &mut server => return result.map_err(server_failed),
        _ = signalled_rx.changed() => {}
    }

    match tokio::time::timeout(grace, server).await {
        Ok(result) => result.map_err(server_failed),
        Err(_) => {
            warn!(
                timeout_seconds = grace.as_secs(),
                "Shutdown timeout elapsed, dropping in-flight requests"
            );
            Ok(())
        }
    }
}

fn server_failed(e: std::io::Error) -> ServiceError {
    ServiceError::ServerFailed {
        message: e.to_string(),
    }
}

// ============================================================================
// Webhook Handlers
// ============================================================================

/// Run one delivery through the dispatcher.
///
/// The platform does not act on the response, so every outcome, including
/// an unparseable body, is answered with an empty `200`.
#[instrument(skip(state, body), fields(route = %kind, size = body.len()))]
pub async fn handle_delivery(state: AppState, kind: EventKind, body: Bytes) -> StatusCode {
    let outcome = state.dispatcher.dispatch(kind, &body).await;

    match &outcome {
        DispatchOutcome::Failed { capability } => {
            warn!(capability = %capability, "Delivery ended with a handler failure");
        }
        DispatchOutcome::Aborted { reason } => {
            warn!(reason = %reason, "Delivery aborted");
        }
        other => debug!(outcome = ?other, "Delivery handled"),
    }

    StatusCode::OK
}

// ============================================================================
// Health Check Handlers
// ============================================================================

async fn handle_liveness() -> &'static str {
    "Hello, world!"
}

/// Basic health check endpoint
#[instrument(skip(state))]
async fn handle_health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let registry = state.dispatcher.locator().registry();

    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        handlers: registry.names().into_iter().map(str::to_string).collect(),
    })
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: String,
    pub handlers: Vec<String>,
}

// ============================================================================
// Middleware
// ============================================================================

/// Request logging middleware with correlation ID tracking
///
/// Reuses an inbound `x-correlation-id` or generates one, and echoes it on
/// the response.
#[instrument(skip(request, next), fields(
    method = %request.method(),
    uri = %request.uri(),
    correlation_id
))]
async fn request_logging_middleware(
    mut request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = std::time::Instant::now();

    let correlation_id = request
        .headers()
        .get("x-correlation-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    tracing::Span::current().record("correlation_id", correlation_id.as_str());
    request.extensions_mut().insert(correlation_id.clone());

    info!(
        correlation_id = %correlation_id,
        method = %method,
        uri = %uri,
        "Request started"
    );

    let mut response = next.run(request).await;
    let duration = start.elapsed();

    if let Ok(header_value) = correlation_id.parse() {
        response
            .headers_mut()
            .insert("x-correlation-id", header_value);
    }

    let status = response.status();

    if status.is_server_error() {
        error!(
            correlation_id = %correlation_id,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed with server error"
        );
    } else if status.is_client_error() {
        warn!(
            correlation_id = %correlation_id,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed with client error"
        );
    } else {
        info!(
            correlation_id = %correlation_id,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed successfully"
        );
    }

    response
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

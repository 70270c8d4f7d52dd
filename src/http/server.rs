//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, timeout, request ID)
//! - Own the breaker registry and the demo service
//! - Serve until the shutdown signal fires

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::http::handlers;
use crate::resilience::registry::CircuitBreakerRegistry;
use crate::service::ExternalService;
use crate::Result;

/// Application state injected into handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub registry: Arc<CircuitBreakerRegistry>,
    pub external: Arc<ExternalService>,
}

/// HTTP server fronting the protected services.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Build the registry, the demo service and the router.
    pub fn new(config: &AppConfig) -> Result<Self> {
        let registry = Arc::new(CircuitBreakerRegistry::new(config.circuit_breaker.clone())?);
        let external = Arc::new(ExternalService::new(&registry, &config.external_service)?);
        Ok(Self::with_state(config, AppState { registry, external }))
    }

    /// Build the router around an already assembled state.
    pub fn with_state(config: &AppConfig, state: AppState) -> Self {
        let router = Self::build_router(config, state.clone());
        Self { router, state }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &AppConfig, state: AppState) -> Router {
        let timeout = Duration::from_secs(config.server.request_timeout_secs);

        Router::new()
            .route("/api/external", get(handlers::call_external))
            .route("/api/status", get(handlers::list_status))
            .route("/api/status/{id}", get(handlers::breaker_status))
            .route("/health", get(handlers::health))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(TimeoutLayer::new(timeout))
                    .layer(PropagateRequestIdLayer::x_request_id()),
            )
    }

    pub fn registry(&self) -> &Arc<CircuitBreakerRegistry> {
        &self.state.registry
    }

    /// Run the server on `listener` until `shutdown` completes, then drain
    /// in-flight requests.
    pub async fn run<S>(self, listener: TcpListener, shutdown: S) -> std::io::Result<()>
    where
        S: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use circuit_breaker::config::{AppConfig, CircuitBreakerConfig};
use circuit_breaker::{CircuitBreakerRegistry, HttpServer, Shutdown};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// A service instance bound to an ephemeral local port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub registry: Arc<CircuitBreakerRegistry>,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<std::io::Result<()>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Trigger shutdown and wait for the server task to finish.
    #[allow(dead_code)]
    pub async fn stop(self) {
        self.shutdown.trigger();
        let result = tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("server did not stop in time")
            .expect("server task panicked");
        assert!(result.is_ok());
    }
}

/// Breaker settings small enough to trip and recover within a test.
pub fn fast_breaker() -> CircuitBreakerConfig {
    CircuitBreakerConfig::new()
        .with_failure_rate_threshold(50.0)
        .with_minimum_number_of_calls(4)
        .with_sliding_window_size(4)
        .with_wait_duration_in_open_state(Duration::from_millis(100))
        .with_permitted_number_of_calls_in_half_open_state(2)
}

/// Config for a demo dependency that fails with `failure_probability`.
pub fn test_config(failure_probability: f64) -> AppConfig {
    let mut config = AppConfig::default();
    config.server.bind_address = "127.0.0.1:0".to_string();
    config.circuit_breaker = fast_breaker();
    config.external_service.failure_probability = failure_probability;
    config.external_service.latency_ms = 0;
    config
}

/// Start the service on 127.0.0.1 with an ephemeral port.
pub async fn start_server(config: AppConfig) -> TestServer {
    let server = HttpServer::new(&config).expect("valid test config");
    let registry = Arc::clone(server.registry());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let handle = tokio::spawn(server.run(listener, shutdown.signalled()));

    TestServer {
        addr,
        registry,
        shutdown,
        handle,
    }
}

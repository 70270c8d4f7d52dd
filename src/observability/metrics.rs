//! Metrics collection and exposition.
//!
//! # Metrics
//! - `circuit_breaker_calls_total` (counter): calls by breaker and outcome
//!   (`success`, `failure`, `not_permitted`)
//! - `circuit_breaker_state_transitions_total` (counter): by breaker, from, to
//! - `circuit_breaker_state` (gauge): 0=closed, 1=open, 2=half-open
//! - `circuit_breaker_failure_rate` (gauge): percent over the sliding window
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op, so library users pay nothing
//! - The Prometheus exporter is installed only by the binary

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::resilience::circuit_breaker::State;

/// What happened to a call that reached the breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Success,
    Failure,
    NotPermitted,
}

impl CallKind {
    fn as_label(self) -> &'static str {
        match self {
            CallKind::Success => "success",
            CallKind::Failure => "failure",
            CallKind::NotPermitted => "not_permitted",
        }
    }
}

/// Install the Prometheus exporter with an HTTP scrape listener on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_call(breaker: &str, kind: CallKind) {
    metrics::counter!(
        "circuit_breaker_calls_total",
        "breaker" => breaker.to_string(),
        "outcome" => kind.as_label()
    )
    .increment(1);
}

pub fn record_transition(breaker: &str, from: State, to: State) {
    metrics::counter!(
        "circuit_breaker_state_transitions_total",
        "breaker" => breaker.to_string(),
        "from" => from.as_str(),
        "to" => to.as_str()
    )
    .increment(1);
    record_state(breaker, to);
}

pub fn record_state(breaker: &str, state: State) {
    metrics::gauge!("circuit_breaker_state", "breaker" => breaker.to_string())
        .set(f64::from(state as u8));
}

pub fn record_failure_rate(breaker: &str, percent: f64) {
    metrics::gauge!("circuit_breaker_failure_rate", "breaker" => breaker.to_string())
        .set(percent);
}

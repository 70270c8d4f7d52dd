//! Circuit breaker for downstream dependency protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: dependency assumed down, calls go straight to the fallback
//! - Half-Open: a limited number of probe calls test for recovery
//!
//! # State Transitions
//! ```text
//! Closed → Open: calls >= minimum_number_of_calls
//!                and failure rate >= failure_rate_threshold
//! Open → Half-Open: wait_duration_in_open_state elapsed (checked on the next call)
//! Half-Open → Closed: any probe succeeds
//! Half-Open → Open: any probe fails
//! ```
//!
//! # Design Decisions
//! - State and half-open call count share one `AtomicU64`, so admitting a
//!   probe and leaving half-open are ordered by a single compare-and-swap
//! - While open, the low half of that word is the open generation, so every
//!   open period has a distinct word and a stale Open → Half-Open swap fails
//! - The probe budget is a counting semaphore without release: it only
//!   resets when the state changes
//! - Outcomes are recorded before any transition decision that reads them
//! - Operation errors never reach the caller; the fallback answers instead

use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::config::validation::validate_breaker_config;
use crate::config::CircuitBreakerConfig;
use crate::observability::metrics::{self, CallKind};
use crate::resilience::sliding_window::{SlidingWindow, WindowSnapshot};
use crate::{Error, Result};

/// Circuit breaker state.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum State {
    Closed = 0,
    Open = 1,
    HalfOpen = 2,
}

impl From<u8> for State {
    fn from(val: u8) -> Self {
        match val {
            1 => State::Open,
            2 => State::HalfOpen,
            _ => State::Closed,
        }
    }
}

impl State {
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Closed => "CLOSED",
            State::Open => "OPEN",
            State::HalfOpen => "HALF_OPEN",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of a breaker for status reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CircuitBreakerStatus {
    pub state: State,
    pub call_count: usize,
    pub failure_rate_percent: f64,
    pub half_open_call_count: u32,
}

impl fmt::Display for CircuitBreakerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Circuit Breaker State: {}, Call Count: {}, Failure Rate: {:.2}%, Half-Open Calls: {}",
            self.state, self.call_count, self.failure_rate_percent, self.half_open_call_count
        )
    }
}

// Layout of the packed state word: state in the high 32 bits. The low 32
// bits hold the half-open call count while half-open, the open generation
// while open, and zero while closed.
const STATE_SHIFT: u32 = 32;
const COUNT_MASK: u64 = 0xFFFF_FFFF;

/// Marks `last_open_nanos` as never set.
const NEVER_OPENED: u64 = u64::MAX;

fn pack(state: State, half_open_calls: u32) -> u64 {
    ((state as u64) << STATE_SHIFT) | u64::from(half_open_calls)
}

fn unpack(word: u64) -> (State, u32) {
    (
        State::from((word >> STATE_SHIFT) as u8),
        (word & COUNT_MASK) as u32,
    )
}

fn half_open_calls(word: u64) -> u32 {
    match unpack(word) {
        (State::HalfOpen, calls) => calls,
        _ => 0,
    }
}

/// A circuit breaker guarding one logical dependency.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    window: SlidingWindow,
    /// Packed `(State, counter)`, see `pack`.
    state: AtomicU64,
    /// Source of open generations.
    open_generation: AtomicU32,
    /// Generation whose open time is in `last_open_nanos`. Stored after it.
    stamped_generation: AtomicU32,
    /// Nanoseconds after `epoch` at which the breaker last opened.
    last_open_nanos: AtomicU64,
    epoch: Instant,
}

impl CircuitBreaker {
    /// Create a closed breaker.
    ///
    /// Fails with [`Error::InvalidArgument`] when the configuration cannot
    /// drive a breaker (see `validate_breaker_config`).
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Result<Self> {
        let name = name.into();
        if let Err(errors) = validate_breaker_config(&config) {
            let detail = errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            return Err(Error::InvalidArgument(format!(
                "circuit breaker '{name}': {detail}"
            )));
        }

        tracing::info!(
            breaker = %name,
            failure_rate_threshold = config.failure_rate_threshold,
            minimum_number_of_calls = config.minimum_number_of_calls,
            sliding_window_size = config.sliding_window_size,
            wait_ms = u64::try_from(config.wait_duration_in_open_state.as_millis()).unwrap_or(u64::MAX),
            half_open_calls = config.permitted_number_of_calls_in_half_open_state,
            "Circuit breaker created"
        );
        metrics::record_state(&name, State::Closed);

        Ok(Self {
            window: SlidingWindow::new(config.sliding_window_size),
            name,
            config,
            state: AtomicU64::new(pack(State::Closed, 0)),
            open_generation: AtomicU32::new(0),
            stamped_generation: AtomicU32::new(0),
            last_open_nanos: AtomicU64::new(NEVER_OPENED),
            epoch: Instant::now(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    // --- Read-only accessors ---

    /// Current state without applying the timed Open → Half-Open transition.
    pub fn state(&self) -> State {
        unpack(self.state.load(Ordering::Acquire)).0
    }

    pub fn call_count(&self) -> usize {
        self.window.count()
    }

    /// Failure rate in percent over the sliding window.
    pub fn failure_rate(&self) -> f64 {
        self.window.current_failure_rate()
    }

    pub fn half_open_call_count(&self) -> u32 {
        half_open_calls(self.state.load(Ordering::Acquire))
    }

    /// When the breaker last opened, `None` if it never has.
    pub fn last_open_time(&self) -> Option<Instant> {
        match self.last_open_nanos.load(Ordering::Acquire) {
            NEVER_OPENED => None,
            nanos => Some(self.epoch + Duration::from_nanos(nanos)),
        }
    }

    pub fn status(&self) -> CircuitBreakerStatus {
        let word = self.state.load(Ordering::Acquire);
        let window = self.window.snapshot();
        CircuitBreakerStatus {
            state: unpack(word).0,
            call_count: window.calls,
            failure_rate_percent: window.failure_rate(),
            half_open_call_count: half_open_calls(word),
        }
    }

    // --- Execution ---

    /// Run `operation` through the breaker.
    ///
    /// Returns the operation's value on success. When the breaker rejects the
    /// call, or the operation fails, returns `fallback()` instead.
    pub fn execute<T, E, Op, Fb>(&self, operation: Op, fallback: Fb) -> T
    where
        Op: FnOnce() -> std::result::Result<T, E>,
        E: fmt::Display,
        Fb: FnOnce() -> T,
    {
        match self.try_execute(operation, || Ok::<T, Infallible>(fallback())) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Like [`execute`](Self::execute) with a fallible fallback. The
    /// fallback's error is returned to the caller as is.
    pub fn try_execute<T, E, F, Op, Fb>(&self, operation: Op, fallback: Fb) -> std::result::Result<T, F>
    where
        Op: FnOnce() -> std::result::Result<T, E>,
        E: fmt::Display,
        Fb: FnOnce() -> std::result::Result<T, F>,
    {
        let Some(permit) = self.try_acquire_permission() else {
            return fallback();
        };

        match operation() {
            Ok(value) => {
                permit.on_success();
                Ok(value)
            }
            Err(e) => {
                permit.on_failure(&e);
                fallback()
            }
        }
    }

    /// Async counterpart of [`execute`](Self::execute).
    pub async fn execute_async<T, E, Op, Fut, Fb>(&self, operation: Op, fallback: Fb) -> T
    where
        Op: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: fmt::Display,
        Fb: FnOnce() -> T,
    {
        match self
            .try_execute_async(operation, || Ok::<T, Infallible>(fallback()))
            .await
        {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Async counterpart of [`try_execute`](Self::try_execute).
    ///
    /// If the returned future is dropped while the operation is pending, the
    /// call counts as failed.
    pub async fn try_execute_async<T, E, F, Op, Fut, Fb>(
        &self,
        operation: Op,
        fallback: Fb,
    ) -> std::result::Result<T, F>
    where
        Op: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: fmt::Display,
        Fb: FnOnce() -> std::result::Result<T, F>,
    {
        let Some(permit) = self.try_acquire_permission() else {
            return fallback();
        };

        match operation().await {
            Ok(value) => {
                permit.on_success();
                Ok(value)
            }
            Err(e) => {
                permit.on_failure(&e);
                fallback()
            }
        }
    }

    /// Decide whether a call may run right now.
    ///
    /// `None` means the caller must use its fallback. A returned permit must
    /// be completed with [`CallPermit::on_success`] or
    /// [`CallPermit::on_failure`]; dropping it records a failure.
    pub fn try_acquire_permission(&self) -> Option<CallPermit<'_>> {
        self.attempt_reset();

        let mut word = self.state.load(Ordering::Acquire);
        loop {
            let (state, half_open_calls) = unpack(word);
            match state {
                State::Closed => return Some(CallPermit::new(self)),
                State::Open => {
                    self.reject(state);
                    return None;
                }
                State::HalfOpen => {
                    if half_open_calls >= self.config.permitted_number_of_calls_in_half_open_state {
                        self.reject(state);
                        return None;
                    }
                    // Take a probe slot; lose the race and we re-evaluate.
                    match self.state.compare_exchange_weak(
                        word,
                        pack(State::HalfOpen, half_open_calls + 1),
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    ) {
                        Ok(_) => return Some(CallPermit::new(self)),
                        Err(current) => word = current,
                    }
                }
            }
        }
    }

    fn reject(&self, state: State) {
        tracing::debug!(breaker = %self.name, state = %state, "Call not permitted, executing fallback");
        metrics::record_call(&self.name, CallKind::NotPermitted);
    }

    // --- Transitions ---

    /// Open → Half-Open once the wait has elapsed. Exactly one caller wins
    /// the swap; every caller re-reads the state afterwards.
    fn attempt_reset(&self) {
        let word = self.state.load(Ordering::Acquire);
        let (state, generation) = unpack(word);
        if state == State::Open && self.wait_elapsed(generation) {
            self.half_open_from(word);
        }
    }

    /// Swap the exact open word `observed` for Half-Open. Fails once the
    /// breaker has left that open period, even if it has opened again since.
    fn half_open_from(&self, observed: u64) -> bool {
        let swapped = self
            .state
            .compare_exchange(
                observed,
                pack(State::HalfOpen, 0),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if swapped {
            self.transitioned(State::Open, State::HalfOpen, None);
        }
        swapped
    }

    /// Whether open period `generation` has lasted the configured wait.
    /// False until that period's open time has been published.
    fn wait_elapsed(&self, generation: u32) -> bool {
        if self.stamped_generation.load(Ordering::Acquire) != generation {
            return false;
        }
        let opened_at = self.last_open_nanos.load(Ordering::Acquire);
        if opened_at == NEVER_OPENED {
            return false;
        }
        let elapsed = self.now_nanos().saturating_sub(opened_at);
        u128::from(elapsed) >= self.config.wait_duration_in_open_state.as_nanos()
    }

    fn record_success(&self) {
        self.window.record(true);
        metrics::record_call(&self.name, CallKind::Success);

        let mut word = self.state.load(Ordering::Acquire);
        while unpack(word).0 == State::HalfOpen {
            match self.state.compare_exchange_weak(
                word,
                pack(State::Closed, 0),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    self.transitioned(State::HalfOpen, State::Closed, None);
                    break;
                }
                Err(current) => word = current,
            }
        }
        metrics::record_failure_rate(&self.name, self.window.current_failure_rate());
    }

    fn record_failure(&self) {
        let snapshot = self.window.record_and_snapshot(false);
        metrics::record_call(&self.name, CallKind::Failure);
        metrics::record_failure_rate(&self.name, snapshot.failure_rate());

        let mut word = self.state.load(Ordering::Acquire);
        loop {
            let from = unpack(word).0;
            match from {
                State::Open => return,
                State::Closed if !self.should_open(&snapshot) => return,
                State::Closed | State::HalfOpen => {
                    let generation = self
                        .open_generation
                        .fetch_add(1, Ordering::Relaxed)
                        .wrapping_add(1);
                    match self.state.compare_exchange_weak(
                        word,
                        pack(State::Open, generation),
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    ) {
                        Ok(_) => {
                            // Time first, then the generation that vouches for it.
                            self.last_open_nanos.store(self.now_nanos(), Ordering::Release);
                            self.stamped_generation.store(generation, Ordering::Release);
                            self.transitioned(from, State::Open, Some(snapshot));
                            return;
                        }
                        Err(current) => word = current,
                    }
                }
            }
        }
    }

    fn should_open(&self, window: &WindowSnapshot) -> bool {
        if window.calls < self.config.minimum_number_of_calls {
            return false;
        }
        window.failure_rate() >= self.config.failure_rate_threshold
    }

    fn transitioned(&self, from: State, to: State, window: Option<WindowSnapshot>) {
        match (to, window) {
            (State::Open, Some(window)) => tracing::warn!(
                breaker = %self.name,
                from = %from,
                to = %to,
                failure_rate = window.failure_rate(),
                calls = window.calls,
                "Circuit breaker opened"
            ),
            _ => tracing::info!(
                breaker = %self.name,
                from = %from,
                to = %to,
                "Circuit breaker state changed"
            ),
        }
        metrics::record_transition(&self.name, from, to);
    }

    fn now_nanos(&self) -> u64 {
        // Saturates after ~584 years of uptime.
        u64::try_from(self.epoch.elapsed().as_nanos()).unwrap_or(NEVER_OPENED - 1)
    }
}

/// Admission to run one call through a breaker.
///
/// Dropping a permit without reporting an outcome (the operation panicked or
/// its future was cancelled) records a failure, so a half-open probe is never
/// left hanging.
#[derive(Debug)]
#[must_use = "a dropped permit records a failed call"]
pub struct CallPermit<'a> {
    breaker: &'a CircuitBreaker,
    completed: bool,
}

impl<'a> CallPermit<'a> {
    fn new(breaker: &'a CircuitBreaker) -> Self {
        Self {
            breaker,
            completed: false,
        }
    }

    pub fn on_success(mut self) {
        self.completed = true;
        tracing::trace!(breaker = %self.breaker.name, "Operation succeeded");
        self.breaker.record_success();
    }

    pub fn on_failure<E: fmt::Display + ?Sized>(mut self, error: &E) {
        self.completed = true;
        tracing::debug!(breaker = %self.breaker.name, error = %error, "Operation failed");
        self.breaker.record_failure();
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if !self.completed {
            tracing::debug!(breaker = %self.breaker.name, "Call abandoned before completion");
            self.breaker.record_failure();
        }
    }
}

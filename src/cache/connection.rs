//! Connection Manager Module
//!
//! Owns the connection to the backing store and the [`HealthState`] derived
//! from it. Every store call goes through [`ConnectionManager::execute`],
//! which bounds it with the command timeout and turns connection failures
//! into state transitions. While the state is not `Connected`, a single
//! background supervisor retries the connection with capped linear backoff.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::cache::{
    AtomicHealth, Backend, BackendError, BackendErrorKind, BackendResult, HealthState,
};
use crate::config::Config;

// == Retry Policy ==
/// Reconnect delay: `step × attempt`, capped at `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub step: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(step: Duration, max_delay: Duration) -> Self {
        Self { step, max_delay }
    }

    /// Delay before reconnect attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.step.saturating_mul(attempt).min(self.max_delay)
    }
}

// == Lifecycle Event ==
/// Connection lifecycle signals that drive [`HealthState`].
#[derive(Debug, Clone)]
pub enum LifecycleEvent {
    /// (Re)connection succeeded
    Connected,
    /// Transport error or timeout
    Error(String),
    /// Connection closed by the store
    Closed(String),
}

#[derive(Debug)]
struct Inner {
    backend: Backend,
    health: AtomicHealth,
    policy: RetryPolicy,
    connect_timeout: Duration,
    command_timeout: Duration,
    /// A supervisor task is running
    supervising: AtomicBool,
    /// `close` was called; no further reconnects
    shut_down: AtomicBool,
    shutdown: Notify,
    reconnects: AtomicU64,
}

// == Connection Manager ==
/// Supervises the store connection. Clones share the same connection.
#[derive(Debug, Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    // == Constructor ==
    /// Creates a manager in the `Disconnected` state; call [`connect`](Self::connect).
    pub fn new(backend: Backend, config: &Config) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                health: AtomicHealth::new(),
                policy: RetryPolicy::new(config.retry_step, config.retry_max_delay),
                connect_timeout: config.connect_timeout,
                command_timeout: config.command_timeout,
                supervising: AtomicBool::new(false),
                shut_down: AtomicBool::new(false),
                shutdown: Notify::new(),
                reconnects: AtomicU64::new(0),
            }),
        }
    }

    // == Connect ==
    /// Attempts the initial connection.
    ///
    /// Never fails: on error the state becomes `Errored`, the supervisor
    /// keeps retrying in the background and caching stays disabled until it
    /// succeeds. Returns the state after the attempt.
    pub async fn connect(&self) -> HealthState {
        self.inner.shut_down.store(false, Ordering::Release);

        match attempt_connect(&self.inner).await {
            Ok(()) => handle_event(&self.inner, LifecycleEvent::Connected),
            Err(e) => handle_event(&self.inner, LifecycleEvent::Error(e.to_string())),
        }
        self.state()
    }

    // == Execute ==
    /// Runs one store call under the command timeout.
    ///
    /// Connection failures (including the timeout) are translated into a
    /// lifecycle event before being handed back to the caller.
    pub async fn execute<T, F>(&self, call: F) -> BackendResult<T>
    where
        F: Future<Output = BackendResult<T>>,
    {
        let result = match tokio::time::timeout(self.inner.command_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::timeout(format!(
                "store call exceeded {}ms",
                self.inner.command_timeout.as_millis()
            ))),
        };

        if let Err(e) = &result {
            if e.is_connection_failure() {
                self.report_failure(e);
            }
        }
        result
    }

    /// Translates a connection failure into the matching lifecycle event.
    pub fn report_failure(&self, err: &BackendError) {
        let event = match err.kind {
            BackendErrorKind::Closed => LifecycleEvent::Closed(err.message.clone()),
            _ => LifecycleEvent::Error(err.to_string()),
        };
        handle_event(&self.inner, event);
    }

    /// Applies a lifecycle event to the health state.
    pub fn handle_event(&self, event: LifecycleEvent) {
        handle_event(&self.inner, event);
    }

    // == Close ==
    /// Releases the connection and stops reconnecting.
    pub async fn close(&self) {
        self.inner.shut_down.store(true, Ordering::Release);
        self.inner.shutdown.notify_waiters();
        self.inner.backend.close().await;

        let previous = self.inner.health.swap(HealthState::Disconnected);
        info!(
            provider = self.inner.backend.provider_name(),
            previous = %previous,
            "Cache connection closed"
        );
    }

    // == Accessors ==
    pub fn state(&self) -> HealthState {
        self.inner.health.load()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == HealthState::Connected
    }

    pub fn backend(&self) -> &Backend {
        &self.inner.backend
    }

    /// Successful reconnections since construction.
    pub fn reconnect_count(&self) -> u64 {
        self.inner.reconnects.load(Ordering::Relaxed)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.inner.policy
    }
}

async fn attempt_connect(inner: &Inner) -> BackendResult<()> {
    match tokio::time::timeout(inner.connect_timeout, inner.backend.connect()).await {
        Ok(result) => result,
        Err(_) => Err(BackendError::timeout(format!(
            "connect exceeded {}ms",
            inner.connect_timeout.as_millis()
        ))),
    }
}

/// Applies a lifecycle transition and starts the supervisor when leaving `Connected`.
fn handle_event(inner: &Arc<Inner>, event: LifecycleEvent) {
    let provider = inner.backend.provider_name();
    match event {
        LifecycleEvent::Connected => {
            if inner.shut_down.load(Ordering::Acquire) {
                return;
            }
            let previous = inner.health.swap(HealthState::Connected);
            if previous != HealthState::Connected {
                info!(provider, previous = %previous, "Cache store connected");
            }
        }
        LifecycleEvent::Error(reason) => {
            if inner.shut_down.load(Ordering::Acquire) {
                return;
            }
            let previous = inner.health.swap(HealthState::Errored);
            if previous != HealthState::Errored {
                warn!(provider, previous = %previous, error = %reason, "Cache store error, caching disabled");
            }
            spawn_supervisor(inner);
        }
        LifecycleEvent::Closed(reason) => {
            if inner.shut_down.load(Ordering::Acquire) {
                return;
            }
            let previous = inner.health.swap(HealthState::Disconnected);
            if previous == HealthState::Connected {
                warn!(provider, reason = %reason, "Cache store connection closed, caching disabled");
            }
            spawn_supervisor(inner);
        }
    }
}

/// Starts the reconnect loop unless one is already running.
fn spawn_supervisor(inner: &Arc<Inner>) {
    if inner.shut_down.load(Ordering::Acquire) || inner.supervising.swap(true, Ordering::AcqRel) {
        return;
    }

    let inner = Arc::clone(inner);
    tokio::spawn(async move {
        let mut attempt: u32 = 0;

        while !inner.shut_down.load(Ordering::Acquire) {
            attempt = attempt.saturating_add(1);
            let delay = inner.policy.delay_for(attempt);

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = inner.shutdown.notified() => break,
            }
            if inner.shut_down.load(Ordering::Acquire) {
                break;
            }

            match attempt_connect(&inner).await {
                Ok(()) => {
                    inner.reconnects.fetch_add(1, Ordering::Relaxed);
                    info!(attempt, "Cache store reconnected");
                    handle_event(&inner, LifecycleEvent::Connected);
                    break;
                }
                Err(e) => {
                    // Failed attempts keep the store marked as errored
                    if !inner.shut_down.load(Ordering::Acquire) {
                        inner.health.swap(HealthState::Errored);
                    }
                    debug!(attempt, delay_ms = delay.as_millis() as u64, error = %e, "Cache reconnect attempt failed");
                }
            }
        }

        inner.supervising.store(false, Ordering::Release);

        // A failure may have landed between the reconnect and the flag reset
        if inner.health.load() != HealthState::Connected && !inner.shut_down.load(Ordering::Acquire) {
            spawn_supervisor(&inner);
        }
    });
}

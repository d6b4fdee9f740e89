//! Host controller lifecycle.
//!
//! The [`HostController`] owns a bus endpoint address and a start/stop state
//! machine around the forwarding activity:
//!
//! ```text
//! new() ──► STOPPED ──start()──► RUNNING ──stop()──► STOPPED ──start()──► …
//! ```
//!
//! `start` returns only after the forwarding task has confirmed it is live;
//! `stop` returns only after the task has fully quiesced and released the
//! endpoint. A stop that cannot confirm quiescence poisons the controller:
//! further starts are rejected.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

use super::relay;
use crate::error::{BusError, Result};
use crate::transport::BusListener;

/// Default time `stop` waits for the forwarding activity to quiesce.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Default capacity of the inbound event channel feeding the relay loop.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Configuration for a host controller.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// How long `stop` waits for the forwarding activity to exit before
    /// declaring the controller dead.
    pub shutdown_timeout: Duration,
    /// Capacity of the inbound event channel between connection readers and
    /// the relay loop.
    pub event_capacity: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

/// Handles to a live forwarding activity.
struct RelayHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// The broker process for one debug-bus endpoint.
///
/// Constructing opens no transport resource; `start` binds the endpoint and
/// brings up the forwarding activity, `stop` tears both down again. The
/// controller is restartable any number of times.
pub struct HostController {
    endpoint: String,
    config: BrokerConfig,
    running: Arc<AtomicBool>,
    /// Number of currently connected parties, maintained by the relay.
    party_count: Arc<AtomicUsize>,
    /// Set after a failed stop; the forwarding activity's state is unknown
    /// and the controller must not be started again.
    poisoned: bool,
    relay: Option<RelayHandle>,
}

impl HostController {
    /// Create a controller bound to an endpoint address (not yet opened).
    ///
    /// `is_running` is `false` until a successful `start`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_config(endpoint, BrokerConfig::default())
    }

    /// Create a controller with explicit configuration.
    pub fn with_config(endpoint: impl Into<String>, config: BrokerConfig) -> Self {
        Self {
            endpoint: endpoint.into(),
            config,
            running: Arc::new(AtomicBool::new(false)),
            party_count: Arc::new(AtomicUsize::new(0)),
            poisoned: false,
            relay: None,
        }
    }

    /// The endpoint address this controller listens on.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Pure state query; callable from any context, never blocks.
    #[inline]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Number of parties currently connected to the bus endpoint.
    ///
    /// Zero while stopped. Like `is_running`, a non-blocking state query.
    #[inline]
    pub fn connected_parties(&self) -> usize {
        self.party_count.load(Ordering::Acquire)
    }

    /// Bind the endpoint and bring up the forwarding activity.
    ///
    /// Returns once the forwarding activity has confirmed it is live and
    /// able to accept connections. On any failure the controller remains
    /// stopped and nothing is left bound.
    ///
    /// # Errors
    ///
    /// - [`BusError::ContractViolation`] if already running, or after a
    ///   failed stop.
    /// - [`BusError::Bind`] if the endpoint address is malformed or cannot
    ///   be acquired.
    /// - [`BusError::Startup`] if the forwarding activity exits before
    ///   confirming readiness.
    pub async fn start(&mut self) -> Result<()> {
        if self.poisoned {
            return Err(BusError::ContractViolation(
                "start attempted after a failed stop",
            ));
        }
        if self.is_running() {
            return Err(BusError::ContractViolation("start while already running"));
        }

        // Bind before spawning: a bind failure rolls back by simply
        // dropping the listener here.
        let listener = BusListener::bind(&self.endpoint)?;

        let (ready_tx, ready_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let running = self.running.clone();
        let party_count = self.party_count.clone();
        let event_capacity = self.config.event_capacity;
        let task = tokio::spawn(async move {
            relay::relay_loop(listener, ready_tx, shutdown_rx, event_capacity, party_count).await;
            // Clean exit paths land here; the flag also covers a relay that
            // exits on its own (e.g. a fatal accept error).
            running.store(false, Ordering::Release);
        });

        // Synchronization point: do not report running before the relay can
        // accept connections.
        if ready_rx.await.is_err() {
            let _ = task.await;
            return Err(BusError::Startup(
                "forwarding activity exited before confirming readiness".to_string(),
            ));
        }

        self.running.store(true, Ordering::Release);
        self.relay = Some(RelayHandle {
            shutdown: shutdown_tx,
            task,
        });
        tracing::debug!(endpoint = %self.endpoint, "host controller started");
        Ok(())
    }

    /// Signal the forwarding activity to terminate and wait for it to
    /// fully quiesce.
    ///
    /// Once this returns `Ok`, no frame handling occurs, all transport
    /// handles are released and the endpoint can be bound again.
    ///
    /// # Errors
    ///
    /// - [`BusError::ContractViolation`] if not running.
    /// - [`BusError::Shutdown`] if the forwarding activity cannot be
    ///   confirmed stopped within the configured timeout, or panicked.
    ///   This poisons the controller; no further start will be accepted.
    pub async fn stop(&mut self) -> Result<()> {
        if !self.is_running() {
            return Err(BusError::ContractViolation("stop while not running"));
        }
        let Some(handle) = self.relay.take() else {
            return Err(BusError::ContractViolation("stop while not running"));
        };

        let _ = handle.shutdown.send(true);

        let mut task = handle.task;
        match tokio::time::timeout(self.config.shutdown_timeout, &mut task).await {
            Ok(Ok(())) => {
                self.running.store(false, Ordering::Release);
                tracing::debug!(endpoint = %self.endpoint, "host controller stopped");
                Ok(())
            }
            Ok(Err(join_err)) => {
                self.poisoned = true;
                self.running.store(false, Ordering::Release);
                Err(BusError::Shutdown(format!(
                    "forwarding activity panicked: {}",
                    join_err
                )))
            }
            Err(_elapsed) => {
                // The relay is stuck; abort it so its resources eventually
                // release, but the controller stays unusable.
                task.abort();
                self.poisoned = true;
                self.running.store(false, Ordering::Release);
                Err(BusError::Shutdown(format!(
                    "forwarding activity did not quiesce within {:?}",
                    self.config.shutdown_timeout
                )))
            }
        }
    }
}

impl Drop for HostController {
    fn drop(&mut self) {
        // Dropping while running is a contract violation; it cannot be a
        // compile error for a Drop type, so make it loud and leak-free.
        if self.is_running() {
            tracing::error!(
                endpoint = %self.endpoint,
                "host controller dropped while running; aborting forwarding activity"
            );
            if let Some(handle) = self.relay.take() {
                handle.task.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructed_controller_is_stopped() {
        let hostctrl = HostController::new("inproc://ctor");
        assert!(!hostctrl.is_running());
        assert_eq!(hostctrl.endpoint(), "inproc://ctor");
    }

    #[test]
    fn test_config_defaults() {
        let config = BrokerConfig::default();
        assert_eq!(config.shutdown_timeout, DEFAULT_SHUTDOWN_TIMEOUT);
        assert_eq!(config.event_capacity, DEFAULT_EVENT_CAPACITY);
    }

    #[tokio::test]
    async fn test_start_rejects_malformed_endpoint() {
        let mut hostctrl = HostController::new("not-an-endpoint");
        let result = hostctrl.start().await;
        assert!(matches!(result, Err(BusError::Bind { .. })));
        assert!(!hostctrl.is_running());
    }

    #[tokio::test]
    async fn test_start_rejects_endpoint_in_use() {
        let mut first = HostController::new("inproc://in-use-ctrl");
        first.start().await.unwrap();

        let mut second = HostController::new("inproc://in-use-ctrl");
        let result = second.start().await;
        assert!(matches!(result, Err(BusError::Bind { .. })));
        assert!(!second.is_running());

        first.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_start_leaves_endpoint_free() {
        let mut first = HostController::new("inproc://rollback-ctrl");
        first.start().await.unwrap();

        let mut second = HostController::new("inproc://rollback-ctrl");
        assert!(second.start().await.is_err());

        // The failed attempt must not hold anything: after the first
        // controller stops, the endpoint binds again.
        first.stop().await.unwrap();
        second.start().await.unwrap();
        second.stop().await.unwrap();
    }
}

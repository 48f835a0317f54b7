// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Remote connection lifecycle.
//!
//! The [`ConnectionSupervisor`] decides, for every operation, whether the remote
//! store should be attempted. It connects lazily on first use, reconnects with
//! bounded backoff after transport errors, and answers "is the remote usable"
//! with a plain boolean.
//!
//! # States
//!
//! ```text
//! Disconnected → Connecting → Ready ⇄ Reconnecting
//!                     │                    │
//!                     └──────→ Failed ←────┘
//! ```
//!
//! - The first attempt of an epoch runs inline, bounded by the connect timeout.
//!   Callers that arrive while it is in flight wait for it and share its outcome.
//! - Further attempts run in one background task; callers go to the fallback
//!   meanwhile instead of blocking.
//! - After the attempt budget is spent the state is `Failed`. Once the cool-down
//!   has passed, the next caller starts a fresh epoch.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::resilience::retry::{retry, RetryPolicy};
use crate::storage::traits::{Connector, RemoteStore, StoreError};

/// Remote connection state, broadcast to watchers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No session and no attempt in progress
    Disconnected = 0,
    /// First attempt of an epoch in progress
    Connecting = 1,
    /// Session established
    Ready = 2,
    /// Lost a session, retrying in the background
    Reconnecting = 3,
    /// Retry budget spent; waiting for the cool-down
    Failed = 4,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Ready => write!(f, "Ready"),
            Self::Reconnecting => write!(f, "Reconnecting"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// Supervisor tuning.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub retry: RetryPolicy,
    /// Bound on a single connect attempt
    pub connect_timeout: Duration,
    /// Wait for an in-flight attempt (true) or fail fast to the fallback (false)
    pub offline_queueing: bool,
    /// How long `Failed` suppresses new attempts
    pub failed_cooldown: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            connect_timeout: Duration::from_secs(2),
            offline_queueing: true,
            failed_cooldown: Duration::from_secs(5),
        }
    }
}

struct Shared {
    connector: Arc<dyn Connector>,
    config: SupervisorConfig,

    state: watch::Sender<ConnectionState>,

    /// Present only while `Ready`
    client: RwLock<Option<Arc<dyn RemoteStore>>>,

    /// Gate for inline attempts (single-flight)
    connect_gate: AsyncMutex<()>,

    /// Bumped each time an inline attempt completes
    generation: AtomicU64,

    /// Bumped by `disconnect()`; stale background loops must not install clients
    epoch: AtomicU64,

    /// A background retry loop owns reconnection
    reconnecting: AtomicBool,
    reconnect_task: Mutex<Option<JoinHandle<()>>>,

    failed_at: Mutex<Option<Instant>>,
}

impl Shared {
    fn set_state(&self, next: ConnectionState) {
        let prev = self.state.send_replace(next);
        if prev != next {
            debug!(from = %prev, to = %next, "Remote connection state changed");
            crate::metrics::set_connection_state(next as u8);
            crate::metrics::set_remote_healthy(next == ConnectionState::Ready);
        }
    }

    /// One connect attempt, bounded by the connect timeout.
    async fn attempt_once(&self) -> Result<Arc<dyn RemoteStore>, StoreError> {
        let timeout = self.config.connect_timeout;
        let result = match tokio::time::timeout(timeout, self.connector.connect()).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Connection(format!(
                "connect timed out after {:?}",
                timeout
            ))),
        };
        match &result {
            Ok(_) => crate::metrics::record_connect_attempt("success"),
            Err(e) => {
                debug!(error = %e, "Connect attempt failed");
                crate::metrics::record_connect_attempt("failure");
            }
        }
        result
    }

    /// Install a fresh session unless `disconnect()` moved past `epoch`.
    ///
    /// The epoch is checked under the client lock, which `disconnect()` also
    /// takes after bumping it, so a session can't land after a disconnect.
    fn install(&self, epoch: u64, client: Arc<dyn RemoteStore>) -> bool {
        let mut slot = self.client.write();
        if self.epoch.load(Ordering::Acquire) != epoch {
            return false;
        }
        *slot = Some(client);
        *self.failed_at.lock() = None;
        self.reconnecting.store(false, Ordering::Release);
        self.set_state(ConnectionState::Ready);
        drop(slot);
        info!("Remote store connected");
        true
    }

    fn mark_failed(&self, err: &StoreError) {
        *self.client.write() = None;
        *self.failed_at.lock() = Some(Instant::now());
        self.reconnecting.store(false, Ordering::Release);
        self.set_state(ConnectionState::Failed);
        warn!(
            error = %err,
            cooldown = ?self.config.failed_cooldown,
            "Remote store unreachable, serving from fallback until cool-down passes"
        );
    }

    fn cooldown_elapsed(&self) -> bool {
        match *self.failed_at.lock() {
            Some(at) => at.elapsed() >= self.config.failed_cooldown,
            None => true,
        }
    }
}

/// Owns the remote connection and its retry policy.
///
/// Cheap to clone; clones share one connection.
#[derive(Clone)]
pub struct ConnectionSupervisor {
    shared: Arc<Shared>,
}

impl ConnectionSupervisor {
    pub fn new(connector: Arc<dyn Connector>, config: SupervisorConfig) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            shared: Arc::new(Shared {
                connector,
                config,
                state,
                client: RwLock::new(None),
                connect_gate: AsyncMutex::new(()),
                generation: AtomicU64::new(0),
                epoch: AtomicU64::new(0),
                reconnecting: AtomicBool::new(false),
                reconnect_task: Mutex::new(None),
                failed_at: Mutex::new(None),
            }),
        }
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    /// Watch state transitions.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// The remote handle, only while connected. Never triggers a connect.
    #[must_use]
    pub fn current_client(&self) -> Option<Arc<dyn RemoteStore>> {
        self.shared.client.read().clone()
    }

    /// Returns true if the remote store is usable, connecting first if needed.
    pub async fn ensure_connected(&self) -> bool {
        self.connected_client().await.is_some()
    }

    /// Like [`ensure_connected`](Self::ensure_connected) but hands back the client.
    pub async fn connected_client(&self) -> Option<Arc<dyn RemoteStore>> {
        if let Some(client) = self.current_client() {
            return Some(client);
        }
        let shared = &self.shared;
        if shared.reconnecting.load(Ordering::Acquire) || !shared.cooldown_elapsed() {
            return None;
        }

        let seen = shared.generation.load(Ordering::Acquire);
        let _gate = if shared.config.offline_queueing {
            shared.connect_gate.lock().await
        } else {
            match shared.connect_gate.try_lock() {
                Ok(gate) => gate,
                Err(_) => return None,
            }
        };

        // Someone else's attempt finished while we waited: share its outcome
        if shared.generation.load(Ordering::Acquire) != seen
            || shared.reconnecting.load(Ordering::Acquire)
        {
            return self.current_client();
        }
        if let Some(client) = self.current_client() {
            return Some(client);
        }

        shared.set_state(ConnectionState::Connecting);
        let epoch = shared.epoch.load(Ordering::Acquire);
        let outcome = shared.attempt_once().await;

        if shared.epoch.load(Ordering::Acquire) != epoch {
            debug!("Disconnected while connecting, dropping the attempt's outcome");
            shared.generation.fetch_add(1, Ordering::AcqRel);
            if let Ok(client) = outcome {
                close_abandoned(client).await;
            }
            return None;
        }

        let client = match outcome {
            Ok(client) if shared.install(epoch, client.clone()) => Some(client),
            Ok(client) => {
                shared.generation.fetch_add(1, Ordering::AcqRel);
                close_abandoned(client).await;
                return None;
            }
            Err(e) if e.is_recoverable() && shared.config.retry.max_attempts > 1 => {
                warn!(error = %e, "Remote store connect failed, retrying in background");
                self.spawn_reconnect(1);
                None
            }
            Err(e) => {
                shared.mark_failed(&e);
                None
            }
        };
        shared.generation.fetch_add(1, Ordering::AcqRel);
        client
    }

    /// Tell the supervisor a call on `failed` went wrong.
    ///
    /// Recoverable errors drop the session and start a background reconnect.
    /// Anything else leaves the connection state alone, as does an error from
    /// a session that has already been replaced.
    pub fn report_error(&self, failed: &Arc<dyn RemoteStore>, err: &StoreError) {
        if !err.is_recoverable() {
            return;
        }
        let shared = &self.shared;
        {
            let mut client = shared.client.write();
            match client.as_ref() {
                Some(current) if Arc::ptr_eq(current, failed) => {}
                Some(_) => {
                    debug!(error = %err, "Ignoring error from a replaced session");
                    return;
                }
                None => return,
            }
            // Claim reconnection before the client disappears so no caller
            // races an inline attempt against the loop.
            shared.reconnecting.store(true, Ordering::Release);
            *client = None;
        }
        warn!(error = %err, "Lost remote store session, reconnecting");
        shared.set_state(ConnectionState::Reconnecting);
        self.spawn_reconnect(0);
    }

    /// Tear down the remote session and return to `Disconnected`.
    ///
    /// The next operation reconnects from scratch.
    pub async fn disconnect(&self) {
        let shared = &self.shared;
        shared.epoch.fetch_add(1, Ordering::AcqRel);
        if let Some(task) = shared.reconnect_task.lock().take() {
            task.abort();
        }
        let client = shared.client.write().take();
        shared.reconnecting.store(false, Ordering::Release);
        *shared.failed_at.lock() = None;
        if let Some(client) = client {
            if let Err(e) = client.disconnect().await {
                debug!(error = %e, "Error while closing remote session");
            }
        }
        shared.set_state(ConnectionState::Disconnected);
        info!("Remote store disconnected");
    }

    fn spawn_reconnect(&self, failed_so_far: usize) {
        let shared = self.shared.clone();
        shared.reconnecting.store(true, Ordering::Release);
        if failed_so_far > 0 {
            shared.set_state(ConnectionState::Connecting);
        }
        let epoch = shared.epoch.load(Ordering::Acquire);

        let task = tokio::spawn(async move {
            let result = retry("remote_reconnect", &shared.config.retry, failed_so_far, || {
                shared.attempt_once()
            })
            .await;

            if shared.epoch.load(Ordering::Acquire) != epoch {
                return;
            }
            match result {
                Ok(client) => {
                    if !shared.install(epoch, client.clone()) {
                        close_abandoned(client).await;
                    }
                }
                Err(e) => shared.mark_failed(&e),
            }
        });

        if let Some(previous) = self.shared.reconnect_task.lock().replace(task) {
            previous.abort();
        }
    }
}

async fn close_abandoned(client: Arc<dyn RemoteStore>) {
    if let Err(e) = client.disconnect().await {
        debug!(error = %e, "Error while closing abandoned session");
    }
}

impl std::fmt::Debug for ConnectionSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSupervisor")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

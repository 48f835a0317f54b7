// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Store façade.
//!
//! The [`ResilientStore`] is the only type application code needs. Every call
//! goes to the remote store when the supervisor says it is usable, and to the
//! in-process fallback when it is not or when the remote call fails.
//!
//! # Consistency
//!
//! The two paths are not reconciled. A key written while the remote was down
//! lives only in this process; once the remote recovers, reads go there and
//! will not see it. Every result is a [`Served`] so callers that need
//! cross-instance consistency can check [`Served::is_degraded()`].
//!
//! # Example
//!
//! ```rust,no_run
//! use resilient_store::{ResilientStore, StoreConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), resilient_store::StoreError> {
//! let store = ResilientStore::new(StoreConfig::default())?;
//!
//! store.set("session:abc", "alice").await?;
//! let user = store.get("session:abc").await?;
//! if user.is_degraded() {
//!     println!("served in-process only");
//! }
//! assert_eq!(user.into_inner().as_deref(), Some("alice"));
//! # Ok(())
//! # }
//! ```

mod types;
mod api;
mod pubsub_api;
mod sorted_api;
mod lifecycle;

pub use types::{Served, ServedBy, Subscription, HealthCheck};

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::watch;
use tracing::warn;

use crate::config::StoreConfig;
use crate::resilience::supervisor::{ConnectionState, ConnectionSupervisor};
use crate::storage::memory::FallbackStore;
use crate::storage::redis::RedisConnector;
use crate::storage::traits::{Connector, RemoteStore, StoreError};

/// Remote-first key-value store with an in-process fallback.
///
/// `Send + Sync`; construct once and share through an `Arc`.
pub struct ResilientStore {
    pub(super) supervisor: ConnectionSupervisor,
    pub(super) fallback: FallbackStore,
}

impl ResilientStore {
    /// Build a store backed by Redis. Does not connect; the first call does.
    pub fn new(config: StoreConfig) -> Result<Self, StoreError> {
        config.validate()?;
        let connector = RedisConnector::new(
            &config.url,
            config.key_prefix.as_deref(),
            config.connect_timeout(),
        )?;
        Ok(Self::with_connector(&config, Arc::new(connector)))
    }

    /// Build from `STORE_*` environment variables.
    pub fn from_env() -> Result<Self, StoreError> {
        Self::new(StoreConfig::from_env()?)
    }

    /// Build over any connector (alternative remotes, test doubles).
    pub fn with_connector(config: &StoreConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            supervisor: ConnectionSupervisor::new(connector, config.supervisor_config()),
            fallback: FallbackStore::new(),
        }
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.supervisor.state()
    }

    /// Watch connection state transitions.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.supervisor.state_receiver()
    }

    /// True if the remote store is usable, connecting first if needed.
    pub async fn is_remote_available(&self) -> bool {
        self.supervisor.ensure_connected().await
    }

    /// Direct access to the fallback store.
    #[must_use]
    pub fn fallback(&self) -> &FallbackStore {
        &self.fallback
    }

    /// Remote first, fallback on unavailability or any non-programming error.
    pub(super) async fn route<T, R, Fut, F>(
        &self,
        operation: &'static str,
        remote: R,
        fallback: F,
    ) -> Result<Served<T>, StoreError>
    where
        R: FnOnce(Arc<dyn RemoteStore>) -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
        F: FnOnce(&FallbackStore) -> Result<T, StoreError>,
    {
        if let Some(client) = self.supervisor.connected_client().await {
            match self.call_remote(operation, client, remote).await {
                Ok(value) => return Ok(Served::remote(value)),
                Err(e) if e.is_programming_error() => return Err(e),
                Err(_) => {}
            }
        }

        crate::metrics::record_degraded(operation);
        let result = fallback(&self.fallback);
        let status = if result.is_ok() { "success" } else { "rejected" };
        crate::metrics::record_operation("fallback", operation, status);
        crate::metrics::set_fallback_keys(self.fallback.len());
        result.map(Served::fallback)
    }

    /// Remote only; `T::default()` tagged as fallback when the remote can't answer.
    pub(super) async fn route_remote_only<T, R, Fut>(
        &self,
        operation: &'static str,
        remote: R,
    ) -> Result<Served<T>, StoreError>
    where
        T: Default,
        R: FnOnce(Arc<dyn RemoteStore>) -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        if let Some(client) = self.supervisor.connected_client().await {
            match self.call_remote(operation, client, remote).await {
                Ok(value) => return Ok(Served::remote(value)),
                Err(e) if e.is_programming_error() => return Err(e),
                Err(_) => {}
            }
        }
        crate::metrics::record_degraded(operation);
        Ok(Served::fallback(T::default()))
    }

    /// Run one remote call, recording it and reporting failures to the supervisor.
    async fn call_remote<T, R, Fut>(
        &self,
        operation: &'static str,
        client: Arc<dyn RemoteStore>,
        remote: R,
    ) -> Result<T, StoreError>
    where
        R: FnOnce(Arc<dyn RemoteStore>) -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let start = Instant::now();
        let result = remote(client.clone()).await;
        crate::metrics::record_latency("remote", operation, start.elapsed());

        match &result {
            Ok(_) => crate::metrics::record_operation("remote", operation, "success"),
            Err(e) if e.is_programming_error() => {
                crate::metrics::record_operation("remote", operation, "rejected");
            }
            Err(e) => {
                warn!(operation, error = %e, "Remote store call failed, serving from fallback");
                crate::metrics::record_operation("remote", operation, "error");
                self.supervisor.report_error(&client, e);
            }
        }
        result
    }
}

impl std::fmt::Debug for ResilientStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientStore")
            .field("state", &self.state())
            .field("fallback_keys", &self.fallback.len())
            .finish()
    }
}

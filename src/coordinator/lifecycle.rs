// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Administrative calls: ping, flush, disconnect, raw access and health.

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use crate::storage::traits::RemoteStore;

use super::{HealthCheck, ResilientStore, Served};

impl ResilientStore {
    /// Always succeeds. `PONG` from the fallback when the remote can't answer.
    pub async fn ping(&self) -> Served<String> {
        match self
            .route_remote_only("ping", |c| async move { c.ping().await })
            .await
        {
            Ok(served) if !served.is_degraded() => served,
            _ => Served::fallback("PONG".to_string()),
        }
    }

    /// Clear the fallback, and the remote too when it is usable.
    ///
    /// Tagged remote only if the remote flush succeeded.
    pub async fn flush_all(&self) -> Served<()> {
        self.fallback.flush_all();
        crate::metrics::set_fallback_keys(0);

        let Some(client) = self.supervisor.connected_client().await else {
            info!("Flushed fallback store (remote unavailable)");
            return Served::fallback(());
        };
        match client.flush_all().await {
            Ok(()) => {
                crate::metrics::record_operation("remote", "flush_all", "success");
                info!("Flushed remote and fallback stores");
                Served::remote(())
            }
            Err(e) => {
                warn!(error = %e, "Remote flush failed, only the fallback store was cleared");
                crate::metrics::record_operation("remote", "flush_all", "error");
                self.supervisor.report_error(&client, &e);
                Served::fallback(())
            }
        }
    }

    /// Drop the remote session and reset to `Disconnected`.
    ///
    /// Fallback data is kept. The next call reconnects from scratch.
    pub async fn disconnect(&self) {
        self.supervisor.disconnect().await;
    }

    /// The underlying remote handle, only while connected. Never connects.
    #[must_use]
    pub fn raw_client(&self) -> Option<Arc<dyn RemoteStore>> {
        self.supervisor.current_client()
    }

    /// Probe the current session (if any) without starting a connect.
    pub async fn health_check(&self) -> HealthCheck {
        let state = self.state();
        let fallback_keys = self.fallback.len();
        crate::metrics::set_fallback_keys(fallback_keys);

        let (remote_connected, remote_latency_ms) = match self.raw_client() {
            None => (None, None),
            Some(client) => {
                let start = Instant::now();
                match client.ping().await {
                    Ok(_) => (Some(true), Some(start.elapsed().as_millis() as u64)),
                    Err(_) => (Some(false), None),
                }
            }
        };

        HealthCheck {
            state,
            remote_connected,
            remote_latency_ms,
            fallback_keys,
            healthy: remote_connected == Some(true),
        }
    }
}

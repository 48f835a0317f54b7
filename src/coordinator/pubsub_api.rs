// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Pub/sub. Remote only: there is no in-process emulation.

use tracing::warn;

use super::{ResilientStore, Served, Subscription};

impl ResilientStore {
    /// Publish a message. Returns the number of receivers.
    ///
    /// Zero (tagged as fallback) when the remote is unusable or the publish
    /// fails; real-time features may not be working in that case.
    pub async fn publish(&self, channel: &str, message: &str) -> Served<u64> {
        let result = self
            .route_remote_only("publish", |c| async move { c.publish(channel, message).await })
            .await;
        match result {
            Ok(served) => {
                if served.is_degraded() {
                    crate::metrics::record_publish_dropped();
                }
                served
            }
            // Publishing never produces a caller bug; treat any leftover error as a drop
            Err(e) => {
                warn!(channel, error = %e, "Publish failed");
                crate::metrics::record_publish_dropped();
                Served::fallback(0)
            }
        }
    }

    /// Open a dedicated subscriber connection.
    pub async fn create_subscriber(&self) -> Subscription {
        let Some(client) = self.supervisor.connected_client().await else {
            return Subscription::Unavailable;
        };
        match client.subscriber().await {
            Ok(sub) => {
                crate::metrics::record_operation("remote", "create_subscriber", "success");
                Subscription::Active(sub)
            }
            Err(e) => {
                warn!(error = %e, "Could not open subscriber connection");
                crate::metrics::record_operation("remote", "create_subscriber", "error");
                self.supervisor.report_error(&client, &e);
                Subscription::Unavailable
            }
        }
    }
}

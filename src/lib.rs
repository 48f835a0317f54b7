// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! # Resilient Store
//!
//! A key-value client that talks to Redis when it can and to an in-process
//! emulation when it can't, behind one API.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      ResilientStore                         │
//! │  • One method per operation                                │
//! │  • Results tagged Remote / Fallback (Served<T>)            │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                 (is the remote usable? ask once)
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   ConnectionSupervisor                      │
//! │  • Lazy, single-flight connect                             │
//! │  • Backoff min(i × 100ms, 3s), 10 attempts, then Failed    │
//! │  • Cool-down, then a fresh epoch                           │
//! └─────────────────────────────────────────────────────────────┘
//!                 │ usable                    │ not usable / error
//!                 ▼                           ▼
//! ┌──────────────────────────────┐ ┌────────────────────────────┐
//! │       Redis (remote)         │ │  FallbackStore (in-proc)   │
//! │  • ConnectionManager         │ │  • strings, hashes, lists, │
//! │  • Optional key prefix       │ │    sets, lazy expiry       │
//! │  • Pub/sub, sorted sets      │ │  • No pub/sub, no zsets    │
//! └──────────────────────────────┘ └────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use resilient_store::{ResilientStore, StoreConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), resilient_store::StoreError> {
//!     let store = Arc::new(ResilientStore::new(StoreConfig {
//!         url: "redis://localhost:6379".into(),
//!         ..Default::default()
//!     })?);
//!
//!     store.set_with_expiry("session:42", "alice", 3600).await?;
//!     store.rpush("recent", &["a", "b"]).await?;
//!
//!     let user = store.get("session:42").await?;
//!     println!("{:?} (served by {})", user.value, user.served_by);
//!
//!     // Zero receivers while Redis is down
//!     let delivered = store.publish("events", "login").await;
//!     println!("delivered to {}", *delivered);
//!
//!     store.disconnect().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Degraded Operation
//!
//! Writes served by the fallback are visible only to this process and are
//! not copied to Redis when it comes back. Check [`Served::is_degraded()`]
//! where that matters.
//!
//! ## Configuration
//!
//! See [`StoreConfig`] for all options and their `STORE_*` environment variables.
//!
//! ## Modules
//!
//! - [`coordinator`]: The [`ResilientStore`] façade
//! - [`storage`]: The remote seam, Redis and the fallback store
//! - [`resilience`]: Retry policy and connection supervision

pub mod config;
pub mod storage;
pub mod resilience;
pub mod coordinator;
pub mod metrics;

// Note: We don't expose a `tracing` module to avoid conflict with the tracing crate

pub use config::StoreConfig;
pub use coordinator::{ResilientStore, Served, ServedBy, Subscription, HealthCheck};
pub use storage::traits::{Connector, RemoteStore, Subscriber, Message, StoreError};
pub use storage::memory::FallbackStore;
pub use storage::redis::{RedisConnector, RedisRemote};
pub use resilience::retry::RetryPolicy;
pub use resilience::supervisor::{ConnectionState, ConnectionSupervisor, SupervisorConfig};

// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Public types for the store façade.

use std::ops::Deref;

use crate::resilience::supervisor::ConnectionState;
use crate::storage::traits::Subscriber;

/// Which store produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServedBy {
    /// The remote store answered
    Remote,
    /// The in-process fallback answered (degraded: invisible to other instances)
    Fallback,
}

impl std::fmt::Display for ServedBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Remote => write!(f, "remote"),
            Self::Fallback => write!(f, "fallback"),
        }
    }
}

/// A result tagged with the path that served it.
///
/// Callers that don't care can use [`into_inner`](Self::into_inner) or deref.
#[derive(Debug, Clone, PartialEq)]
pub struct Served<T> {
    pub value: T,
    pub served_by: ServedBy,
}

impl<T> Served<T> {
    pub fn remote(value: T) -> Self {
        Self { value, served_by: ServedBy::Remote }
    }

    pub fn fallback(value: T) -> Self {
        Self { value, served_by: ServedBy::Fallback }
    }

    /// True when the call was served in-process only.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.served_by == ServedBy::Fallback
    }

    pub fn into_inner(self) -> T {
        self.value
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Served<U> {
        Served { value: f(self.value), served_by: self.served_by }
    }
}

impl<T> Deref for Served<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

/// Outcome of [`super::ResilientStore::create_subscriber()`].
///
/// Pub/sub has no in-process emulation, so a disconnected store says so
/// explicitly instead of handing out a half-initialized subscriber.
pub enum Subscription {
    Active(Box<dyn Subscriber>),
    Unavailable,
}

impl Subscription {
    #[must_use]
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Active(_))
    }

    pub fn into_subscriber(self) -> Option<Box<dyn Subscriber>> {
        match self {
            Self::Active(sub) => Some(sub),
            Self::Unavailable => None,
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active(_) => write!(f, "Subscription::Active"),
            Self::Unavailable => write!(f, "Subscription::Unavailable"),
        }
    }
}

/// Snapshot returned by [`super::ResilientStore::health_check()`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthCheck {
    /// Supervisor state when the check ran
    pub state: ConnectionState,
    /// `None` when no session exists, so no probe was made
    pub remote_connected: Option<bool>,
    /// PING round trip
    pub remote_latency_ms: Option<u64>,
    /// Keys held in-process (including not-yet-purged expired ones)
    pub fallback_keys: usize,
    /// Remote answered the probe
    pub healthy: bool,
}

// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// Transport could not establish or keep a session.
    #[error("Connection error: {0}")]
    Connection(String),
    /// Remote is a read-only replica or the topology is changing.
    #[error("Remote store is read-only: {0}")]
    ReadOnly(String),
    /// An established session's call failed.
    #[error("Storage backend error: {0}")]
    Backend(String),
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,
    #[error("Value is not an integer or out of range: {0}")]
    NotInteger(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Remote store unavailable")]
    Unavailable,
    #[error("Configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// Errors that warrant tearing down the session and reconnecting.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::ReadOnly(_))
    }

    /// Caller bugs. These propagate from whichever path sees them.
    #[must_use]
    pub fn is_programming_error(&self) -> bool {
        matches!(
            self,
            Self::WrongType | Self::NotInteger(_) | Self::InvalidArgument(_)
        )
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        use redis::ErrorKind;

        if err.is_io_error()
            || err.is_connection_refusal()
            || err.is_timeout()
            || err.is_connection_dropped()
        {
            return Self::Connection(err.to_string());
        }
        if err.code() == Some("WRONGTYPE") {
            return Self::WrongType;
        }
        match err.kind() {
            ErrorKind::ReadOnly
            | ErrorKind::TryAgain
            | ErrorKind::ClusterDown
            | ErrorKind::MasterDown
            | ErrorKind::BusyLoadingError => Self::ReadOnly(err.to_string()),
            ErrorKind::InvalidClientConfig => Self::Config(err.to_string()),
            ErrorKind::ResponseError if err.to_string().contains("not an integer") => {
                Self::NotInteger(err.to_string())
            }
            _ => Self::Backend(err.to_string()),
        }
    }
}

/// A message received on a subscribed channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub channel: String,
    pub payload: String,
}

/// A dedicated subscriber connection.
#[async_trait]
pub trait Subscriber: Send {
    async fn subscribe(&mut self, channel: &str) -> Result<(), StoreError>;
    async fn unsubscribe(&mut self, channel: &str) -> Result<(), StoreError>;

    /// Wait for the next message. `Ok(None)` means the connection closed.
    async fn next_message(&mut self) -> Result<Option<Message>, StoreError>;
}

/// The capability set the façade needs from a remote key-value store.
///
/// Any conforming client can stand in for Redis here, including test doubles.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    async fn set_with_expiry(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), StoreError>;
    async fn del(&self, keys: &[&str]) -> Result<u64, StoreError>;
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError>;
    async fn exists(&self, keys: &[&str]) -> Result<u64, StoreError>;
    async fn expire(&self, key: &str, seconds: i64) -> Result<bool, StoreError>;
    async fn ttl(&self, key: &str) -> Result<i64, StoreError>;
    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, StoreError>;

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<bool, StoreError>;
    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StoreError>;
    async fn hget_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError>;
    async fn hmset(&self, key: &str, fields: &[(&str, &str)]) -> Result<(), StoreError>;
    async fn hdel(&self, key: &str, fields: &[&str]) -> Result<u64, StoreError>;

    async fn lpush(&self, key: &str, values: &[&str]) -> Result<u64, StoreError>;
    async fn rpush(&self, key: &str, values: &[&str]) -> Result<u64, StoreError>;
    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, StoreError>;
    async fn llen(&self, key: &str) -> Result<u64, StoreError>;

    async fn sadd(&self, key: &str, members: &[&str]) -> Result<u64, StoreError>;
    async fn srem(&self, key: &str, members: &[&str]) -> Result<u64, StoreError>;
    async fn sismember(&self, key: &str, member: &str) -> Result<bool, StoreError>;
    async fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError>;

    async fn zadd(&self, key: &str, score: f64, member: &str) -> Result<u64, StoreError>;
    async fn zrem(&self, key: &str, members: &[&str]) -> Result<u64, StoreError>;
    async fn zrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, StoreError>;
    async fn zrange_with_scores(
        &self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> Result<Vec<(String, f64)>, StoreError>;
    async fn zscore(&self, key: &str, member: &str) -> Result<Option<f64>, StoreError>;
    async fn zcard(&self, key: &str) -> Result<u64, StoreError>;

    async fn publish(&self, channel: &str, message: &str) -> Result<u64, StoreError>;
    async fn subscriber(&self) -> Result<Box<dyn Subscriber>, StoreError>;

    async fn ping(&self) -> Result<String, StoreError>;
    async fn flush_all(&self) -> Result<(), StoreError>;
    async fn disconnect(&self) -> Result<(), StoreError>;
}

/// Establishes sessions to a remote store.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn RemoteStore>, StoreError>;
}

// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Redis implementation of the remote store seam.
//!
//! - [`RedisConnector`] opens sessions (one `ConnectionManager` per session)
//! - [`RedisRemote`] runs commands on a session
//! - [`RedisSubscriber`] wraps a dedicated pub/sub connection
//!
//! An optional key prefix namespaces every key, so several applications can
//! share one Redis instance. Pub/sub channel names are not prefixed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::{ConnectionManager, ConnectionManagerConfig, PubSub};
use redis::{cmd, AsyncCommands, Client};
use tracing::debug;

use super::traits::{Connector, Message, RemoteStore, StoreError, Subscriber};

/// Opens Redis sessions for the supervisor.
pub struct RedisConnector {
    client: Client,
    prefix: String,
    timeout: Duration,
}

impl RedisConnector {
    /// Validate the URL without connecting.
    pub fn new(url: &str, prefix: Option<&str>, timeout: Duration) -> Result<Self, StoreError> {
        let client = Client::open(url).map_err(|e| StoreError::Config(e.to_string()))?;
        Ok(Self {
            client,
            prefix: prefix.unwrap_or("").to_string(),
            timeout,
        })
    }
}

#[async_trait]
impl Connector for RedisConnector {
    #[tracing::instrument(skip(self), fields(prefix = %self.prefix))]
    async fn connect(&self) -> Result<Arc<dyn RemoteStore>, StoreError> {
        // Reconnection is the supervisor's job, not the manager's
        let config = ConnectionManagerConfig::new()
            .set_number_of_retries(0)
            .set_connection_timeout(self.timeout)
            .set_response_timeout(self.timeout);
        let connection = ConnectionManager::new_with_config(self.client.clone(), config).await?;
        let remote = RedisRemote {
            connection,
            client: self.client.clone(),
            prefix: self.prefix.clone(),
        };
        // Prove the session works before handing it out
        remote.ping().await?;
        Ok(Arc::new(remote))
    }
}

pub struct RedisRemote {
    connection: ConnectionManager,
    /// For dedicated pub/sub connections
    client: Client,
    /// Optional key prefix for namespacing (e.g., "myapp:" → "myapp:session.abc")
    prefix: String,
}

impl RedisRemote {
    /// Apply the prefix to a key.
    #[inline]
    fn prefixed_key(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}{}", self.prefix, key)
        }
    }

    fn prefixed_keys(&self, keys: &[&str]) -> Vec<String> {
        keys.iter().map(|k| self.prefixed_key(k)).collect()
    }

    /// Strip the prefix from a key (for returning clean names).
    #[inline]
    fn strip_prefix<'a>(&self, key: &'a str) -> &'a str {
        if self.prefix.is_empty() {
            key
        } else {
            key.strip_prefix(&self.prefix).unwrap_or(key)
        }
    }

    /// Get a clone of the connection manager for commands the trait doesn't cover.
    pub fn connection(&self) -> ConnectionManager {
        self.connection.clone()
    }

    /// Get the configured prefix
    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

#[async_trait]
impl RemoteStore for RedisRemote {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.connection.clone();
        Ok(conn.get(self.prefixed_key(key)).await?)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        let _: () = conn.set(self.prefixed_key(key), value).await?;
        Ok(())
    }

    async fn set_with_expiry(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        let _: () = conn.set_ex(self.prefixed_key(key), value, ttl_secs).await?;
        Ok(())
    }

    async fn del(&self, keys: &[&str]) -> Result<u64, StoreError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.connection.clone();
        Ok(conn.del(self.prefixed_keys(keys)).await?)
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.connection.clone();
        let found: Vec<String> = conn.keys(self.prefixed_key(pattern)).await?;
        let mut keys: Vec<String> = found
            .iter()
            .map(|k| self.strip_prefix(k).to_string())
            .collect();
        keys.sort_unstable();
        Ok(keys)
    }

    async fn exists(&self, keys: &[&str]) -> Result<u64, StoreError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.connection.clone();
        Ok(conn.exists(self.prefixed_keys(keys)).await?)
    }

    async fn expire(&self, key: &str, seconds: i64) -> Result<bool, StoreError> {
        let mut conn = self.connection.clone();
        Ok(conn.expire(self.prefixed_key(key), seconds).await?)
    }

    async fn ttl(&self, key: &str) -> Result<i64, StoreError> {
        let mut conn = self.connection.clone();
        Ok(conn.ttl(self.prefixed_key(key)).await?)
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, StoreError> {
        let mut conn = self.connection.clone();
        Ok(conn.incr(self.prefixed_key(key), delta).await?)
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<bool, StoreError> {
        let mut conn = self.connection.clone();
        let added: u64 = conn.hset(self.prefixed_key(key), field, value).await?;
        Ok(added > 0)
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.connection.clone();
        Ok(conn.hget(self.prefixed_key(key), field).await?)
    }

    async fn hget_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        let mut conn = self.connection.clone();
        Ok(conn.hgetall(self.prefixed_key(key)).await?)
    }

    async fn hmset(&self, key: &str, fields: &[(&str, &str)]) -> Result<(), StoreError> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut conn = self.connection.clone();
        let _: () = conn.hset_multiple(self.prefixed_key(key), fields).await?;
        Ok(())
    }

    async fn hdel(&self, key: &str, fields: &[&str]) -> Result<u64, StoreError> {
        if fields.is_empty() {
            return Ok(0);
        }
        let mut conn = self.connection.clone();
        Ok(conn.hdel(self.prefixed_key(key), fields).await?)
    }

    async fn lpush(&self, key: &str, values: &[&str]) -> Result<u64, StoreError> {
        let mut conn = self.connection.clone();
        Ok(conn.lpush(self.prefixed_key(key), values).await?)
    }

    async fn rpush(&self, key: &str, values: &[&str]) -> Result<u64, StoreError> {
        let mut conn = self.connection.clone();
        Ok(conn.rpush(self.prefixed_key(key), values).await?)
    }

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, StoreError> {
        let mut conn = self.connection.clone();
        Ok(conn.lrange(self.prefixed_key(key), start as isize, stop as isize).await?)
    }

    async fn llen(&self, key: &str) -> Result<u64, StoreError> {
        let mut conn = self.connection.clone();
        Ok(conn.llen(self.prefixed_key(key)).await?)
    }

    async fn sadd(&self, key: &str, members: &[&str]) -> Result<u64, StoreError> {
        let mut conn = self.connection.clone();
        Ok(conn.sadd(self.prefixed_key(key), members).await?)
    }

    async fn srem(&self, key: &str, members: &[&str]) -> Result<u64, StoreError> {
        if members.is_empty() {
            return Ok(0);
        }
        let mut conn = self.connection.clone();
        Ok(conn.srem(self.prefixed_key(key), members).await?)
    }

    async fn sismember(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let mut conn = self.connection.clone();
        Ok(conn.sismember(self.prefixed_key(key), member).await?)
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.connection.clone();
        Ok(conn.smembers(self.prefixed_key(key)).await?)
    }

    async fn zadd(&self, key: &str, score: f64, member: &str) -> Result<u64, StoreError> {
        let mut conn = self.connection.clone();
        Ok(conn.zadd(self.prefixed_key(key), member, score).await?)
    }

    async fn zrem(&self, key: &str, members: &[&str]) -> Result<u64, StoreError> {
        if members.is_empty() {
            return Ok(0);
        }
        let mut conn = self.connection.clone();
        Ok(conn.zrem(self.prefixed_key(key), members).await?)
    }

    async fn zrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>, StoreError> {
        let mut conn = self.connection.clone();
        Ok(conn.zrange(self.prefixed_key(key), start as isize, stop as isize).await?)
    }

    async fn zrange_with_scores(
        &self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> Result<Vec<(String, f64)>, StoreError> {
        let mut conn = self.connection.clone();
        Ok(conn
            .zrange_withscores(self.prefixed_key(key), start as isize, stop as isize)
            .await?)
    }

    async fn zscore(&self, key: &str, member: &str) -> Result<Option<f64>, StoreError> {
        let mut conn = self.connection.clone();
        Ok(conn.zscore(self.prefixed_key(key), member).await?)
    }

    async fn zcard(&self, key: &str) -> Result<u64, StoreError> {
        let mut conn = self.connection.clone();
        Ok(conn.zcard(self.prefixed_key(key)).await?)
    }

    async fn publish(&self, channel: &str, message: &str) -> Result<u64, StoreError> {
        let mut conn = self.connection.clone();
        Ok(conn.publish(channel, message).await?)
    }

    async fn subscriber(&self) -> Result<Box<dyn Subscriber>, StoreError> {
        let pubsub = self.client.get_async_pubsub().await?;
        Ok(Box::new(RedisSubscriber { pubsub }))
    }

    async fn ping(&self) -> Result<String, StoreError> {
        let mut conn = self.connection.clone();
        Ok(cmd("PING").query_async(&mut conn).await?)
    }

    async fn flush_all(&self) -> Result<(), StoreError> {
        let mut conn = self.connection.clone();
        if self.prefix.is_empty() {
            let _: () = cmd("FLUSHALL").query_async(&mut conn).await?;
            return Ok(());
        }
        // Namespaced: only clear our own keys
        let keys: Vec<String> = conn.keys(format!("{}*", self.prefix)).await?;
        if !keys.is_empty() {
            let _: () = conn.del(keys).await?;
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), StoreError> {
        // The manager closes its socket when the last clone drops
        debug!(prefix = %self.prefix, "Releasing Redis session");
        Ok(())
    }
}

/// Dedicated pub/sub connection.
pub struct RedisSubscriber {
    pubsub: PubSub,
}

#[async_trait]
impl Subscriber for RedisSubscriber {
    async fn subscribe(&mut self, channel: &str) -> Result<(), StoreError> {
        Ok(self.pubsub.subscribe(channel).await?)
    }

    async fn unsubscribe(&mut self, channel: &str) -> Result<(), StoreError> {
        Ok(self.pubsub.unsubscribe(channel).await?)
    }

    async fn next_message(&mut self) -> Result<Option<Message>, StoreError> {
        let Some(msg) = self.pubsub.on_message().next().await else {
            return Ok(None);
        };
        let payload: String = msg.get_payload()?;
        Ok(Some(Message {
            channel: msg.get_channel_name().to_string(),
            payload,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connector_rejects_bad_url() {
        let result = RedisConnector::new("not a url", None, Duration::from_secs(1));
        assert!(matches!(result, Err(StoreError::Config(_))));
    }

    #[test]
    fn test_connector_accepts_url_without_connecting() {
        // Nothing listens here; opening the client must still succeed
        let result = RedisConnector::new("redis://127.0.0.1:1", Some("app:"), Duration::from_secs(1));
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_connect_to_closed_port_is_recoverable() {
        let connector =
            RedisConnector::new("redis://127.0.0.1:1", None, Duration::from_millis(500)).unwrap();
        let err = connector.connect().await.err().expect("nothing listens on port 1");
        assert!(err.is_recoverable(), "unexpected error: {}", err);
    }
}

// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Sorted sets.
//!
//! Remote only. While the remote is unusable these return zero or empty,
//! tagged [`ServedBy::Fallback`](super::ServedBy::Fallback), and nothing is
//! stored in-process.

use crate::storage::traits::StoreError;

use super::{ResilientStore, Served};

impl ResilientStore {
    /// Add or update a member. Returns 1 if it was new.
    pub async fn zadd(&self, key: &str, score: f64, member: &str) -> Result<Served<u64>, StoreError> {
        if score.is_nan() {
            return Err(StoreError::InvalidArgument("score is not a number".into()));
        }
        self.route_remote_only("zadd", |c| async move { c.zadd(key, score, member).await })
            .await
    }

    pub async fn zrem(&self, key: &str, members: &[&str]) -> Result<Served<u64>, StoreError> {
        self.route_remote_only("zrem", |c| async move { c.zrem(key, members).await })
            .await
    }

    /// Members by rank, lowest score first.
    pub async fn zrange(&self, key: &str, start: i64, stop: i64) -> Result<Served<Vec<String>>, StoreError> {
        self.route_remote_only("zrange", |c| async move { c.zrange(key, start, stop).await })
            .await
    }

    pub async fn zrange_with_scores(
        &self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> Result<Served<Vec<(String, f64)>>, StoreError> {
        self.route_remote_only("zrange_with_scores", |c| async move {
            c.zrange_with_scores(key, start, stop).await
        })
        .await
    }

    pub async fn zscore(&self, key: &str, member: &str) -> Result<Served<Option<f64>>, StoreError> {
        self.route_remote_only("zscore", |c| async move { c.zscore(key, member).await })
            .await
    }

    pub async fn zcard(&self, key: &str) -> Result<Served<u64>, StoreError> {
        self.route_remote_only("zcard", |c| async move { c.zcard(key).await })
            .await
    }
}

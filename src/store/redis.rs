// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Redis-backed counter store shared across serving processes.

use super::{CounterStore, StoreError};
use redis::aio::ConnectionManager;
use std::time::Duration;
use tokio::sync::OnceCell;

/// Counter store backed by a Redis server.
///
/// Counters are plain integer strings written with `SETEX`, so Redis owns
/// expiry. No `INCR` is used: the limiter's read-then-write is not atomic.
///
/// One managed connection is opened on first use and shared by every
/// command; it reconnects on its own after a failure.
#[derive(Clone)]
pub struct RedisStore {
    client: redis::Client,
    manager: std::sync::Arc<OnceCell<ConnectionManager>>,
}

impl RedisStore {
    /// Create a store from a connection URL such as `redis://127.0.0.1/`.
    ///
    /// No connection is made until the first command.
    pub fn open(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)
            .map_err(|e| StoreError::Unavailable(format!("invalid Redis URL: {e}")))?;
        Ok(Self {
            client,
            manager: Default::default(),
        })
    }

    async fn connection(&self) -> Result<ConnectionManager, StoreError> {
        let manager = self
            .manager
            .get_or_try_init(|| ConnectionManager::new(self.client.clone()))
            .await
            .map_err(|e| StoreError::Unavailable(format!("Redis connection failed: {e}")))?;
        Ok(manager.clone())
    }
}

impl CounterStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<u32>, StoreError> {
        let mut conn = self.connection().await?;
        let value: Option<u32> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::Unavailable(format!("Redis GET failed: {e}")))?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: u32, ttl: Duration) -> Result<(), StoreError> {
        let ttl_secs = ttl.as_secs();
        if ttl_secs == 0 || ttl_secs > i64::MAX as u64 {
            return Err(StoreError::InvalidTtl);
        }
        let mut conn = self.connection().await?;
        let () = redis::cmd("SETEX")
            .arg(key)
            .arg(ttl_secs)
            .arg(value)
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::Unavailable(format!("Redis SETEX failed: {e}")))?;
        Ok(())
    }
}

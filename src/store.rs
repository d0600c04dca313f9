// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Counter store contract shared by every serving process.
//!
//! The rate limiter only ever issues a `get` followed by at most one `set`
//! with a TTL. Backends decide how expiry is enforced; the limiter never
//! deletes counters itself.

mod memory;
#[cfg(feature = "redis")]
mod redis;

pub use memory::MemoryStore;
#[cfg(feature = "redis")]
pub use self::redis::RedisStore;

use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Counter store failure.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backend could not be reached or answered with an error.
    #[error("counter store unavailable: {0}")]
    Unavailable(String),

    /// A counter must expire, at a time the backend can represent.
    #[error("counter TTL must be at least one second and representable by the store")]
    InvalidTtl,
}

/// Key-value store of attempt counters with per-entry expiry.
pub trait CounterStore: Send + Sync {
    /// Read a counter. Missing and expired keys both read as `None`.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<u32>, StoreError>> + Send;

    /// Write a counter, replacing any previous value and re-arming its TTL.
    fn set(
        &self,
        key: &str,
        value: u32,
        ttl: Duration,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// Counter store selected at startup from configuration.
#[derive(Clone)]
pub enum Backend {
    Memory(MemoryStore),
    #[cfg(feature = "redis")]
    Redis(RedisStore),
}

impl CounterStore for Backend {
    async fn get(&self, key: &str) -> Result<Option<u32>, StoreError> {
        match self {
            Self::Memory(store) => store.get(key).await,
            #[cfg(feature = "redis")]
            Self::Redis(store) => store.get(key).await,
        }
    }

    async fn set(&self, key: &str, value: u32, ttl: Duration) -> Result<(), StoreError> {
        match self {
            Self::Memory(store) => store.set(key, value, ttl).await,
            #[cfg(feature = "redis")]
            Self::Redis(store) => store.set(key, value, ttl).await,
        }
    }
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memory(store) => f.debug_tuple("Memory").field(store).finish(),
            #[cfg(feature = "redis")]
            Self::Redis(_) => f.write_str("Redis"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_backend_delegates_to_memory() {
        let backend = Backend::Memory(MemoryStore::new());

        backend.set("rl:login:10.0.0.1", 3, Duration::from_secs(60)).await.unwrap();

        assert_eq!(backend.get("rl:login:10.0.0.1").await.unwrap(), Some(3));
        assert_eq!(backend.get("rl:login:10.0.0.2").await.unwrap(), None);
    }
}

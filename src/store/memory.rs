// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Process-local counter store.
//!
//! Suitable for a single serving process and for tests. Expiry is checked
//! lazily on read; [`MemoryStore::purge_expired`] reclaims memory and is
//! meant to be called periodically.

use super::{CounterStore, StoreError};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug)]
struct Entry {
    value: u32,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// In-memory counter store. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every expired counter. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        let purged = before - entries.len();
        if purged > 0 {
            debug!(purged, remaining = entries.len(), "Purged expired counters");
        }
        purged
    }

    /// Number of stored counters, including expired ones not yet purged.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl CounterStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<u32>, StoreError> {
        let entries = self.entries.read().await;
        let now = Instant::now();
        Ok(entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value))
    }

    async fn set(&self, key: &str, value: u32, ttl: Duration) -> Result<(), StoreError> {
        if ttl.is_zero() {
            return Err(StoreError::InvalidTtl);
        }
        let expires_at = Instant::now()
            .checked_add(ttl)
            .ok_or(StoreError::InvalidTtl)?;
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(300);

    #[tokio::test]
    async fn test_missing_key_reads_none() {
        let store = MemoryStore::new();
        assert_eq!(store.get("rl:login:127.0.0.1").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let store = MemoryStore::new();
        store.set("k", 2, TTL).await.unwrap();

        tokio::time::advance(TTL - Duration::from_secs(1)).await;
        assert_eq!(store.get("k").await.unwrap(), Some(2));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_rearms_ttl() {
        let store = MemoryStore::new();
        store.set("k", 1, TTL).await.unwrap();

        tokio::time::advance(Duration::from_secs(200)).await;
        store.set("k", 2, TTL).await.unwrap();

        // 400s after the first write, 200s after the second
        tokio::time::advance(Duration::from_secs(200)).await;
        assert_eq!(store.get("k").await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_zero_ttl_rejected() {
        let store = MemoryStore::new();
        let result = store.set("k", 1, Duration::ZERO).await;
        assert!(matches!(result, Err(StoreError::InvalidTtl)));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_unrepresentable_ttl_rejected() {
        let store = MemoryStore::new();
        let result = store.set("k", 1, Duration::from_secs(u64::MAX)).await;
        assert!(matches!(result, Err(StoreError::InvalidTtl)));
        assert!(store.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let store = MemoryStore::new();
        store.set("short", 1, Duration::from_secs(10)).await.unwrap();
        store.set("long", 1, TTL).await.unwrap();

        tokio::time::advance(Duration::from_secs(11)).await;

        assert_eq!(store.purge_expired().await, 1);
        assert_eq!(store.len().await, 1);
        assert_eq!(store.get("long").await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_clones_share_entries() {
        let store = MemoryStore::new();
        let other = store.clone();
        store.set("k", 4, TTL).await.unwrap();
        assert_eq!(other.get("k").await.unwrap(), Some(4));
    }
}

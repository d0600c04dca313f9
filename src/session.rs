// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Login sessions.
//!
//! A session is a random token handed to the client in the `sessionid`
//! cookie. The server keeps only the SHA-256 of each token, mapped to the
//! user it belongs to and an expiry instant.

use crate::config::MAX_PERIOD_SECS;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "sessionid";

/// `Set-Cookie` header value that ends the session on the client.
pub const CLEAR_SESSION_COOKIE: &str = "sessionid=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax";

const TOKEN_BYTES: usize = 32;

struct Session {
    user_id: u64,
    expires_at: Instant,
}

/// Server-side session table.
pub struct Sessions {
    ttl: Duration,
    inner: RwLock<HashMap<String, Session>>,
}

impl Sessions {
    /// Sessions lasting `ttl`, capped at one year.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl: ttl.min(Duration::from_secs(MAX_PERIOD_SECS)),
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Start a session for `user_id` and return its token.
    pub async fn create(&self, user_id: u64) -> String {
        let token: String = rand::random::<[u8; TOKEN_BYTES]>()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect();
        let session = Session {
            user_id,
            expires_at: Instant::now() + self.ttl,
        };
        self.inner.write().await.insert(hash_token(&token), session);
        debug!(user_id, "Session created");
        token
    }

    /// User behind `token`, if the session exists and has not expired.
    pub async fn resolve(&self, token: &str) -> Option<u64> {
        let sessions = self.inner.read().await;
        sessions
            .get(&hash_token(token))
            .filter(|session| session.expires_at > Instant::now())
            .map(|session| session.user_id)
    }

    pub async fn revoke(&self, token: &str) {
        if let Some(session) = self.inner.write().await.remove(&hash_token(token)) {
            debug!(user_id = session.user_id, "Session revoked");
        }
    }

    /// Drop expired sessions.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut sessions = self.inner.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| session.expires_at > now);
        let purged = before - sessions.len();
        if purged > 0 {
            debug!(purged, "Purged expired sessions");
        }
        purged
    }

    /// `Set-Cookie` header value handing `token` to the client.
    pub fn set_cookie(&self, token: &str) -> String {
        format!(
            "{SESSION_COOKIE}={token}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
            self.ttl.as_secs()
        )
    }
}

fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

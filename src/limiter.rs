// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! POST attempt limiter for account endpoints.
//!
//! Each protected endpoint owns a key. Attempts are counted per
//! `(key, origin address)` in a shared [`CounterStore`] under
//! `rl:<key>:<origin>`. Only POST requests are counted.
//!
//! Every allowed attempt rewrites the counter with a fresh TTL of `period`,
//! so the window restarts from the most recent attempt rather than the
//! first one. A rejected attempt writes nothing, which keeps a saturated
//! counter at exactly `limit`.
//!
//! The read and the write are separate store calls. Two concurrent POSTs
//! from one origin may both read the same count and both be allowed.

use crate::config::RateLimitConfig;
use crate::metrics::{Metrics, Outcome};
use crate::store::{CounterStore, StoreError};
use axum::extract::ConnectInfo;
use axum::http::{Method, Request};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info};

/// Message shown to a client whose attempt was rejected.
pub const TOO_MANY_ATTEMPTS: &str = "Too many attempts. Please try again later.";

/// The parts of a request the limiter looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestInfo {
    pub method: Method,
    /// Client IP address, empty when the server could not resolve it
    pub origin: String,
    /// Request path without query string, used as the redirect target
    pub path: String,
}

impl RequestInfo {
    pub fn new(method: Method, origin: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method,
            origin: origin.into(),
            path: path.into(),
        }
    }

    /// Describe an HTTP request. The origin is the peer IP from axum's
    /// connect info; it is empty when the server was started without it.
    pub fn from_request<B>(request: &Request<B>) -> Self {
        let origin = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_default();

        Self {
            method: request.method().clone(),
            origin,
            path: request.uri().path().to_string(),
        }
    }
}

/// Rejected attempt: show `message` and send the client back to `redirect_to`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub message: &'static str,
    pub redirect_to: String,
}

impl Rejection {
    fn back_to(path: &str) -> Self {
        Self {
            message: TOO_MANY_ATTEMPTS,
            redirect_to: path.to_string(),
        }
    }
}

/// Result of [`RateLimiter::check_and_record`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Limited(Rejection),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }
}

/// Result of [`RateLimiter::guard`].
#[derive(Debug)]
pub enum Guarded<T> {
    /// The wrapped operation ran and produced `T`
    Completed(T),
    /// The wrapped operation was not run
    Rejected(Rejection),
}

/// Store key for the attempt counter of `origin` on endpoint `key`.
pub fn counter_key(key: &str, origin: &str) -> String {
    format!("rl:{key}:{origin}")
}

/// Limiter for one endpoint key over a shared counter store.
pub struct RateLimiter<S> {
    config: RateLimitConfig,
    store: Arc<S>,
    metrics: Option<Metrics>,
}

impl<S> Clone for RateLimiter<S> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            store: Arc::clone(&self.store),
            metrics: self.metrics.clone(),
        }
    }
}

impl<S: CounterStore> RateLimiter<S> {
    pub fn new(config: RateLimitConfig, store: Arc<S>) -> Self {
        Self {
            config,
            store,
            metrics: None,
        }
    }

    /// Count decisions in `metrics`.
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Decide whether `request` may proceed and record the attempt.
    ///
    /// Non-POST requests are allowed without touching the store. A POST
    /// performs one read and, if allowed, one write. Store failures are
    /// returned as-is.
    pub async fn check_and_record(&self, request: &RequestInfo) -> Result<Decision, StoreError> {
        if request.method != Method::POST {
            return Ok(Decision::Allowed);
        }

        let key = &self.config.key;
        let counter_key = counter_key(key, &request.origin);
        let attempts = self.store.get(&counter_key).await?.unwrap_or(0);

        if attempts >= self.config.limit {
            info!(
                key = %key,
                origin = %request.origin,
                attempts,
                limit = self.config.limit,
                "Too many attempts, rejecting"
            );
            self.record(Outcome::Limited);
            return Ok(Decision::Limited(Rejection::back_to(&request.path)));
        }

        let attempts = attempts.saturating_add(1);
        self.store
            .set(&counter_key, attempts, self.config.period())
            .await?;

        debug!(
            key = %key,
            origin = %request.origin,
            attempts,
            limit = self.config.limit,
            "Attempt recorded"
        );
        self.record(Outcome::Allowed);
        Ok(Decision::Allowed)
    }

    /// Run `operation` if `request` is allowed.
    ///
    /// `operation` is invoked exactly once when the attempt is allowed and
    /// never when it is rejected or the store fails.
    pub async fn guard<F, Fut, T>(
        &self,
        request: &RequestInfo,
        operation: F,
    ) -> Result<Guarded<T>, StoreError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        match self.check_and_record(request).await? {
            Decision::Allowed => Ok(Guarded::Completed(operation().await)),
            Decision::Limited(rejection) => Ok(Guarded::Rejected(rejection)),
        }
    }

    fn record(&self, outcome: Outcome) {
        if let Some(metrics) = &self.metrics {
            metrics.record_decision(&self.config.key, outcome);
        }
    }
}

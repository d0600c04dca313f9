// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Account Rate Limiter
//!
//! A registration and login service whose POST endpoints are guarded by a
//! per-origin attempt limiter:
//!
//! - Attempts counted per endpoint key and client IP (5 per 300s default)
//! - Counters held in a shared store with per-entry TTL (in-memory or Redis)
//! - The window re-arms on every allowed attempt
//! - Rejected attempts redirect back with a flash notice
//! - Read-only requests are never counted
//!
//! Around the limiter sit Argon2id password storage, cookie sessions, a
//! profile page and a JSON API over users and profiles.

pub mod accounts;
pub mod api;
pub mod app;
pub mod config;
pub mod cookies;
pub mod extract;
pub mod forms;
pub mod handlers;
pub mod layer;
pub mod limiter;
pub mod metrics;
pub mod notice;
pub mod password;
pub mod session;
pub mod store;

pub use config::{Config, RateLimitConfig};
pub use layer::RateLimitLayer;
pub use limiter::{Decision, RateLimiter, RequestInfo};
pub use store::{CounterStore, MemoryStore, StoreError};

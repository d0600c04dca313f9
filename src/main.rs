// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Account Rate Limiter Service
//!
//! Serves registration and login endpoints whose POST attempts are limited
//! per client IP.
//!
//! ## Configuration
//!
//! Configuration is loaded from environment variables:
//!
//! - `BIND_ADDR`: Server bind address (default: 0.0.0.0:8080)
//! - `RATE_LIMIT`: Max POST attempts per endpoint and IP (default: 5)
//! - `RATE_PERIOD_SECS`: Attempt window in seconds (default: 300)
//! - `COUNTER_STORE`: `memory` or `redis` (default: memory)
//! - `REDIS_URL`: Redis connection URL for the redis store
//! - `METRICS_ENABLED`: Serve Prometheus metrics (default: true)
//! - `SESSION_TTL_SECS`: Login session lifetime in seconds (default: 1209600)
//! - `SEED_USERS`: Insert the sample accounts at startup (default: false)

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use account_rate_limiter::{
    accounts::SEED_ACCOUNTS,
    app,
    config::{Config, StoreKind},
    handlers::AppState,
    metrics::Metrics,
    store::{Backend, MemoryStore},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    // Load configuration
    let config = Config::default().apply_env(|name| std::env::var(name).ok())?;
    config.validate()?;
    info!(
        bind_addr = %config.bind_addr,
        login_limit = config.endpoints.login.limit,
        register_limit = config.endpoints.register.limit,
        period_secs = config.endpoints.login.period_secs,
        store = ?config.store.backend,
        "Starting account rate limiter"
    );

    let store = Arc::new(open_store(&config)?);

    let metrics = if config.metrics.enabled {
        Some(Metrics::new()?)
    } else {
        None
    };

    let state = Arc::new(AppState::new(config.clone(), metrics)?);
    if config.seed_users {
        let created = state.accounts.seed(SEED_ACCOUNTS).await?;
        info!(created, "Seeded sample accounts");
    }

    // Spawn cleanup task
    let memory = match store.as_ref() {
        Backend::Memory(memory) => Some(memory.clone()),
        #[cfg(feature = "redis")]
        _ => None,
    };
    spawn_purge(Arc::clone(&state), memory, config.store.purge_interval());

    let app = app::router(state, store);

    // Start server
    let addr: SocketAddr = config.bind_addr.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

fn open_store(config: &Config) -> anyhow::Result<Backend> {
    match config.store.backend {
        StoreKind::Memory => Ok(Backend::Memory(MemoryStore::new())),
        #[cfg(feature = "redis")]
        StoreKind::Redis => {
            let url = config
                .store
                .redis_url
                .as_deref()
                .ok_or(account_rate_limiter::config::ConfigError::MissingRedisUrl)?;
            Ok(Backend::Redis(account_rate_limiter::store::RedisStore::open(url)?))
        }
        #[cfg(not(feature = "redis"))]
        StoreKind::Redis => Err(account_rate_limiter::config::ConfigError::RedisDisabled.into()),
    }
}

fn spawn_purge(state: Arc<AppState>, counters: Option<MemoryStore>, every: std::time::Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            if let Some(counters) = &counters {
                counters.purge_expired().await;
            }
            state.sessions.purge_expired().await;
        }
    });
}

// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Router assembly.

use crate::api;
use crate::config::RateLimitConfig;
use crate::handlers::{self, AppState};
use crate::layer::RateLimitLayer;
use crate::limiter::RateLimiter;
use crate::store::CounterStore;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Build the service router.
///
/// `POST /register/` and `POST /login/` each get their own limiter over the
/// shared `store`; every other route is unlimited. `/dashboard/`,
/// `/profile/` and `/api/` need a session.
pub fn router<S>(state: Arc<AppState>, store: Arc<S>) -> Router
where
    S: CounterStore + 'static,
{
    let endpoints = state.config.endpoints.clone();
    let metrics_config = state.config.metrics.clone();

    let limiter = |config: RateLimitConfig| {
        let limiter = RateLimiter::new(config, Arc::clone(&store));
        match &state.metrics {
            Some(metrics) => limiter.with_metrics(metrics.clone()),
            None => limiter,
        }
    };
    let register_limiter = limiter(endpoints.register);
    let login_limiter = limiter(endpoints.login);

    let mut router = Router::new()
        .route("/health", get(handlers::health))
        .route("/healthz", get(handlers::health))
        .route(
            "/register/",
            get(handlers::register_page)
                .post(handlers::register)
                .layer(RateLimitLayer::new(register_limiter)),
        )
        .route(
            "/login/",
            get(handlers::login_page)
                .post(handlers::login)
                .layer(RateLimitLayer::new(login_limiter)),
        )
        .route(handlers::DASHBOARD_PATH, get(handlers::dashboard))
        .route(
            handlers::PROFILE_PATH,
            get(handlers::profile_page).post(handlers::update_profile),
        )
        .route("/logout/", post(handlers::logout))
        .route("/api/users/", get(api::list_users))
        .route("/api/users/:id/", get(api::get_user))
        .route(
            "/api/profiles/",
            get(api::list_profiles).post(api::create_profile),
        )
        .route(
            "/api/profiles/:id/",
            get(api::get_profile)
                .put(api::update_profile)
                .patch(api::update_profile)
                .delete(api::delete_profile),
        );

    if metrics_config.enabled {
        router = router.route(&metrics_config.path, get(handlers::metrics));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

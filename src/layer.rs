// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Tower layer that puts a [`RateLimiter`] in front of a route.
//!
//! ```rust,ignore
//! let login = get(login_page)
//!     .post(login)
//!     .layer(RateLimitLayer::new(RateLimiter::new(config, store)));
//! ```
//!
//! A rejected POST never reaches the wrapped service: the client is sent
//! back to the same path with a flash notice. Store failures become a 500.

use crate::limiter::{Guarded, RateLimiter, Rejection, RequestInfo};
use crate::notice::{redirect_with_notice, Notice};
use crate::store::{CounterStore, StoreError};
use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::error;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        redirect_with_notice(self.redirect_to, &Notice::error(self.message))
    }
}

impl IntoResponse for StoreError {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: self.to_string(),
                code: "COUNTER_STORE_ERROR",
            }),
        )
            .into_response()
    }
}

/// Layer wrapping services with a [`RateLimiter`].
pub struct RateLimitLayer<S> {
    limiter: RateLimiter<S>,
}

impl<S> RateLimitLayer<S> {
    pub fn new(limiter: RateLimiter<S>) -> Self {
        Self { limiter }
    }
}

impl<S> Clone for RateLimitLayer<S> {
    fn clone(&self) -> Self {
        Self {
            limiter: self.limiter.clone(),
        }
    }
}

impl<S, I> Layer<I> for RateLimitLayer<S> {
    type Service = RateLimitService<S, I>;

    fn layer(&self, inner: I) -> Self::Service {
        RateLimitService {
            limiter: self.limiter.clone(),
            inner,
        }
    }
}

/// Service produced by [`RateLimitLayer`].
pub struct RateLimitService<S, I> {
    limiter: RateLimiter<S>,
    inner: I,
}

impl<S, I: Clone> Clone for RateLimitService<S, I> {
    fn clone(&self) -> Self {
        Self {
            limiter: self.limiter.clone(),
            inner: self.inner.clone(),
        }
    }
}

impl<S, I> Service<Request<Body>> for RateLimitService<S, I>
where
    S: CounterStore + 'static,
    I: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    I::Future: Send + 'static,
    I::Error: Send + 'static,
{
    type Response = Response;
    type Error = I::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response, I::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        // The clone is not ready; keep the ready one for this call
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let limiter = self.limiter.clone();

        Box::pin(async move {
            let info = RequestInfo::from_request(&request);
            match limiter.guard(&info, move || inner.call(request)).await {
                Ok(Guarded::Completed(result)) => result,
                Ok(Guarded::Rejected(rejection)) => Ok(rejection.into_response()),
                Err(err) => {
                    error!(
                        key = %limiter.config().key,
                        origin = %info.origin,
                        error = %err,
                        "Counter store failed"
                    );
                    Ok(err.into_response())
                }
            }
        })
    }
}

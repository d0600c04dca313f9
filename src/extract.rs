// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Request extractors for the logged-in user.
//!
//! Both read the `sessionid` cookie. They differ only in how they turn an
//! anonymous request away: pages redirect to the login form, the API
//! answers `401`.

use crate::accounts::Account;
use crate::cookies;
use crate::handlers::{AppState, LOGIN_PATH};
use crate::session::SESSION_COOKIE;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use url::form_urlencoded;

/// Logged-in user of a page. Anonymous requests go to the login form.
pub struct CurrentUser(pub Account);

/// Logged-in user of an API call. Anonymous requests get `401`.
pub struct ApiUser(pub Account);

async fn session_user(parts: &Parts, state: &AppState) -> Option<Account> {
    let token = cookies::find(&parts.headers, SESSION_COOKIE)?;
    let id = state.sessions.resolve(token).await?;
    state.accounts.get(id).await
}

/// `302` to the login form, asking it to come back to `path`.
pub fn login_redirect(path: &str) -> Response {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("next", path)
        .finish();
    (
        StatusCode::FOUND,
        [(header::LOCATION, format!("{LOGIN_PATH}?{query}"))],
    )
        .into_response()
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        session_user(parts, state)
            .await
            .map(Self)
            .ok_or_else(|| login_redirect(parts.uri.path()))
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for ApiUser {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        session_user(parts, state).await.map(Self).ok_or_else(|| {
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "detail": "Authentication credentials were not provided." })),
            )
                .into_response()
        })
    }
}

// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! HTTP handlers for the account service.
//!
//! Pages are returned as JSON documents naming the page, its form fields,
//! the logged-in user and any pending notice. POST handlers for register
//! and login only run once the route's rate limiter has let the attempt
//! through.

use crate::accounts::{Account, AccountDirectory, AccountError};
use crate::config::Config;
use crate::cookies;
use crate::extract::CurrentUser;
use crate::forms::{LoginForm, ProfileForm, RegisterForm, ValidationError};
use crate::metrics::Metrics;
use crate::notice::{redirect_with_notice, Notice, CLEAR_COOKIE};
use crate::password::{PasswordError, PasswordHasher};
use crate::session::{Sessions, CLEAR_SESSION_COOKIE, SESSION_COOKIE};
use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Form, Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

/// Where clients land after registering or logging in.
pub const DASHBOARD_PATH: &str = "/dashboard/";
/// Login form, also where anonymous visitors of private pages are sent.
pub const LOGIN_PATH: &str = "/login/";
pub const PROFILE_PATH: &str = "/profile/";

const REGISTER_FIELDS: &[&str] = &[
    "username",
    "first_name",
    "last_name",
    "email",
    "password1",
    "password2",
];
const LOGIN_FIELDS: &[&str] = &["username", "password"];
const PROFILE_FIELDS: &[&str] = &[
    "first_name",
    "last_name",
    "email",
    "bio",
    "avatar_url",
    "location",
    "phone",
];

/// Shared application state.
pub struct AppState {
    pub accounts: AccountDirectory,
    pub sessions: Sessions,
    pub metrics: Option<Metrics>,
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config, metrics: Option<Metrics>) -> Result<Self, PasswordError> {
        let hasher = PasswordHasher::new(&config.passwords)?;
        Ok(Self {
            accounts: AccountDirectory::new(hasher),
            sessions: Sessions::new(config.sessions.ttl()),
            metrics,
            config,
        })
    }

    /// Start a session for `account` on `response`, ending any session the
    /// request already carried.
    async fn log_in(&self, headers: &HeaderMap, account: &Account, mut response: Response) -> Response {
        if let Some(old) = cookies::find(headers, SESSION_COOKIE) {
            self.sessions.revoke(old).await;
        }
        let token = self.sessions.create(account.id).await;
        match HeaderValue::try_from(self.sessions.set_cookie(&token)) {
            Ok(cookie) => {
                response.headers_mut().append(header::SET_COOKIE, cookie);
                response
            }
            Err(err) => {
                error!(error = %err, "Session cookie is not a valid header value");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub timestamp: String,
}

/// A page as seen by the client.
#[derive(Debug, Serialize)]
pub struct PageResponse {
    pub page: &'static str,
    #[serde(skip_serializing_if = "no_fields")]
    pub fields: &'static [&'static str],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<PageUser>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<Notice>,
}

/// The logged-in user as shown on a page.
#[derive(Debug, Serialize)]
pub struct PageUser {
    #[serde(flatten)]
    pub account: Account,
    pub avatar_initial: String,
}

impl From<Account> for PageUser {
    fn from(account: Account) -> Self {
        Self {
            avatar_initial: account.avatar_initial(),
            account,
        }
    }
}

/// One field-level form error.
#[derive(Debug, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// Form errors response body.
#[derive(Debug, Serialize)]
pub struct FormErrors {
    pub errors: Vec<FieldError>,
}

impl From<&ValidationError> for FieldError {
    fn from(err: &ValidationError) -> Self {
        Self {
            field: err.field(),
            message: err.to_string(),
        }
    }
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "account-rate-limiter",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

pub async fn register_page(headers: HeaderMap) -> Response {
    page("register", REGISTER_FIELDS, None, &headers)
}

pub async fn login_page(headers: HeaderMap) -> Response {
    page("login", LOGIN_FIELDS, None, &headers)
}

pub async fn dashboard(CurrentUser(user): CurrentUser, headers: HeaderMap) -> Response {
    page("dashboard", &[], Some(user), &headers)
}

/// Profile form for the logged-in user. An account without a profile gets
/// an empty one.
pub async fn profile_page(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    headers: HeaderMap,
) -> Response {
    match state.accounts.ensure_profile(user.id).await {
        Ok(user) => page("profile", PROFILE_FIELDS, Some(user), &headers),
        Err(err) => internal_error(&err),
    }
}

/// Save the profile form and come back to it.
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Form(form): Form<ProfileForm>,
) -> Response {
    if let Err(errors) = form.validate() {
        return form_errors(
            StatusCode::UNPROCESSABLE_ENTITY,
            errors.iter().map(FieldError::from).collect(),
        );
    }

    match state.accounts.update_account(user.id, &form).await {
        Ok(_) => redirect_with_notice(PROFILE_PATH, &Notice::success("Profile updated successfully!")),
        Err(err @ AccountError::EmailTaken) => form_errors(
            StatusCode::UNPROCESSABLE_ENTITY,
            vec![FieldError {
                field: err.field(),
                message: err.to_string(),
            }],
        ),
        Err(err) => internal_error(&err),
    }
}

/// Create an account, log it in and send the client to the dashboard.
pub async fn register(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<RegisterForm>,
) -> Response {
    if let Err(errors) = form.validate() {
        return form_errors(
            StatusCode::UNPROCESSABLE_ENTITY,
            errors.iter().map(FieldError::from).collect(),
        );
    }

    match state.accounts.register(&form).await {
        Ok(account) => {
            if let Some(metrics) = &state.metrics {
                metrics.record_registration();
            }
            info!(username = %account.username, "Registration complete");
            let response = redirect_with_notice(DASHBOARD_PATH, &Notice::success("Account created successfully!"));
            state.log_in(&headers, &account, response).await
        }
        Err(err @ AccountError::Password(_)) => internal_error(&err),
        Err(err) => form_errors(
            StatusCode::UNPROCESSABLE_ENTITY,
            vec![FieldError {
                field: err.field(),
                message: err.to_string(),
            }],
        ),
    }
}

/// Check credentials, start a session and send the client on.
///
/// The client goes to `next` when it names a local path, otherwise to the
/// dashboard.
pub async fn login(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> Response {
    if let Err(errors) = form.validate() {
        return form_errors(
            StatusCode::UNPROCESSABLE_ENTITY,
            errors.iter().map(FieldError::from).collect(),
        );
    }

    match state.accounts.authenticate(&form.username, &form.password).await {
        Ok(Some(account)) => {
            info!(username = %account.username, "Login succeeded");
            let notice = Notice::success(format!("Welcome back, {}!", account.display_name()));
            let target = form.next_path().unwrap_or(DASHBOARD_PATH);
            let response = redirect_with_notice(target, &notice);
            state.log_in(&headers, &account, response).await
        }
        Err(err) => internal_error(&err),
        Ok(None) => {
            info!(username = %form.username, "Login failed");
            form_errors(
                StatusCode::UNAUTHORIZED,
                vec![FieldError {
                    field: "__all__",
                    message: "Please enter a correct username and password.".to_string(),
                }],
            )
        }
    }
}

/// End the session and go back to the login form.
pub async fn logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Some(token) = cookies::find(&headers, SESSION_COOKIE) {
        state.sessions.revoke(token).await;
    }
    (
        StatusCode::FOUND,
        [
            (header::LOCATION, LOGIN_PATH),
            (header::SET_COOKIE, CLEAR_SESSION_COOKIE),
        ],
    )
        .into_response()
}

/// Prometheus text exposition.
pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    let Some(metrics) = &state.metrics else {
        return StatusCode::NOT_FOUND.into_response();
    };
    match metrics.render() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(err) => {
            error!(error = %err, "Failed to render metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn page(
    name: &'static str,
    fields: &'static [&'static str],
    user: Option<Account>,
    headers: &HeaderMap,
) -> Response {
    let notice = Notice::from_headers(headers);
    let shown = notice.is_some();
    let mut response = Json(PageResponse {
        page: name,
        fields,
        user: user.map(PageUser::from),
        notice,
    })
    .into_response();
    if shown {
        response
            .headers_mut()
            .insert(header::SET_COOKIE, HeaderValue::from_static(CLEAR_COOKIE));
    }
    response
}

fn no_fields(fields: &&[&str]) -> bool {
    fields.is_empty()
}

fn form_errors(status: StatusCode, errors: Vec<FieldError>) -> Response {
    (status, Json(FormErrors { errors })).into_response()
}

fn internal_error(err: &AccountError) -> Response {
    error!(error = %err, "Account operation failed");
    StatusCode::INTERNAL_SERVER_ERROR.into_response()
}

// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! JSON API over users and profiles.
//!
//! Every endpoint needs a session. Users are read-only and show their email
//! only to staff. Profiles can be read by anyone logged in and changed only
//! by their owner. Lists take `search`, `ordering` and `page` query
//! parameters and come back in pages of [`PAGE_SIZE`].

use crate::accounts::{Account, AccountError, Profile};
use crate::extract::ApiUser;
use crate::forms::{ProfilePatch, ValidationError};
use crate::handlers::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info};
use url::form_urlencoded;

pub const PAGE_SIZE: usize = 20;

const USERS_PATH: &str = "/api/users/";
const PROFILES_PATH: &str = "/api/profiles/";

/// List query parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub search: Option<String>,
    pub ordering: Option<String>,
    pub page: Option<String>,
}

/// One page of a list.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub count: usize,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileView {
    pub id: u64,
    pub username: String,
    pub bio: String,
    pub avatar_url: String,
    pub location: String,
    pub phone: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProfileView {
    fn new(username: &str, profile: &Profile) -> Self {
        Self {
            id: profile.id,
            username: username.to_string(),
            bio: profile.bio.clone(),
            avatar_url: profile.avatar_url.clone(),
            location: profile.location.clone(),
            phone: profile.phone.clone(),
            created_at: profile.created_at,
            updated_at: profile.updated_at,
        }
    }

    fn of(account: &Account) -> Option<Self> {
        account
            .profile
            .as_ref()
            .map(|profile| Self::new(&account.username, profile))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    pub id: u64,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub profile: Option<ProfileView>,
}

impl UserView {
    /// `account` as seen by `viewer`.
    fn new(account: &Account, viewer: &Account) -> Self {
        Self {
            id: account.id,
            username: account.username.clone(),
            email: viewer.is_staff.then(|| account.email.clone()),
            first_name: account.first_name.clone(),
            last_name: account.last_name.clone(),
            profile: ProfileView::of(account),
        }
    }
}

pub async fn list_users(
    State(state): State<Arc<AppState>>,
    ApiUser(viewer): ApiUser,
    Query(query): Query<ListQuery>,
) -> Response {
    let mut accounts: Vec<_> = state
        .accounts
        .list()
        .await
        .into_iter()
        .filter(|account| {
            matches_search(
                query.search.as_deref(),
                &[
                    account.username.as_str(),
                    account.first_name.as_str(),
                    account.last_name.as_str(),
                ],
            )
        })
        .collect();

    let (field, descending) = ordering(query.ordering.as_deref(), &["date_joined", "username"], "-date_joined");
    sort(&mut accounts, descending, |a, b| match field {
        "username" => a.username.cmp(&b.username),
        _ => a.date_joined.cmp(&b.date_joined).then(a.id.cmp(&b.id)),
    });

    let views = accounts.iter().map(|account| UserView::new(account, &viewer)).collect();
    paginate(views, USERS_PATH, &query)
}

pub async fn get_user(
    State(state): State<Arc<AppState>>,
    ApiUser(viewer): ApiUser,
    Path(id): Path<u64>,
) -> Response {
    match state.accounts.get(id).await {
        Some(account) => Json(UserView::new(&account, &viewer)).into_response(),
        None => not_found(),
    }
}

pub async fn list_profiles(
    State(state): State<Arc<AppState>>,
    ApiUser(_): ApiUser,
    Query(query): Query<ListQuery>,
) -> Response {
    let mut profiles: Vec<_> = state
        .accounts
        .list()
        .await
        .iter()
        .filter_map(ProfileView::of)
        .filter(|profile| {
            matches_search(
                query.search.as_deref(),
                &[
                    profile.username.as_str(),
                    profile.location.as_str(),
                    profile.bio.as_str(),
                ],
            )
        })
        .collect();

    let (field, descending) = ordering(query.ordering.as_deref(), &["created_at", "updated_at"], "-created_at");
    sort(&mut profiles, descending, |a, b| {
        let by = match field {
            "updated_at" => a.updated_at.cmp(&b.updated_at),
            _ => a.created_at.cmp(&b.created_at),
        };
        by.then(a.id.cmp(&b.id))
    });

    paginate(profiles, PROFILES_PATH, &query)
}

pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    ApiUser(_): ApiUser,
    Path(id): Path<u64>,
) -> Response {
    match state.accounts.profile_owner(id).await.as_ref().and_then(ProfileView::of) {
        Some(view) => Json(view).into_response(),
        None => not_found(),
    }
}

/// Give the caller a profile if they have none.
pub async fn create_profile(
    State(state): State<Arc<AppState>>,
    ApiUser(viewer): ApiUser,
    Json(patch): Json<ProfilePatch>,
) -> Response {
    if let Err(errors) = patch.validate() {
        return field_errors(&errors);
    }
    match state.accounts.create_profile(viewer.id, &patch).await {
        Ok(account) => match ProfileView::of(&account) {
            Some(view) => (StatusCode::CREATED, Json(view)).into_response(),
            None => not_found(),
        },
        Err(err @ AccountError::ProfileExists) => {
            (StatusCode::BAD_REQUEST, Json(json!({ "detail": err.to_string() }))).into_response()
        }
        Err(err) => internal_error(&err),
    }
}

/// Full and partial updates alike change only the fields present.
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    ApiUser(viewer): ApiUser,
    Path(id): Path<u64>,
    Json(patch): Json<ProfilePatch>,
) -> Response {
    if let Err(response) = check_owner(&state, &viewer, id).await {
        return response;
    }
    if let Err(errors) = patch.validate() {
        return field_errors(&errors);
    }
    match state.accounts.patch_profile(id, &patch).await {
        Ok(account) => match ProfileView::of(&account) {
            Some(view) => Json(view).into_response(),
            None => not_found(),
        },
        Err(AccountError::NotFound) => not_found(),
        Err(err) => internal_error(&err),
    }
}

pub async fn delete_profile(
    State(state): State<Arc<AppState>>,
    ApiUser(viewer): ApiUser,
    Path(id): Path<u64>,
) -> Response {
    if let Err(response) = check_owner(&state, &viewer, id).await {
        return response;
    }
    match state.accounts.delete_profile(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(AccountError::NotFound) => not_found(),
        Err(err) => internal_error(&err),
    }
}

async fn check_owner(state: &AppState, viewer: &Account, profile_id: u64) -> Result<(), Response> {
    let owner = state.accounts.profile_owner(profile_id).await.ok_or_else(not_found)?;
    if owner.id == viewer.id {
        return Ok(());
    }
    info!(user_id = viewer.id, profile_id, "Profile write by non-owner refused");
    Err((
        StatusCode::FORBIDDEN,
        Json(json!({ "detail": "You do not have permission to perform this action." })),
    )
        .into_response())
}

/// Case-insensitive substring match of `search` against any of `fields`.
/// A missing or blank search matches everything.
fn matches_search(search: Option<&str>, fields: &[&str]) -> bool {
    let Some(search) = search.map(str::trim).filter(|s| !s.is_empty()) else {
        return true;
    };
    let needle = search.to_lowercase();
    fields.iter().any(|field| field.to_lowercase().contains(&needle))
}

/// Requested ordering field and direction. Unknown fields fall back to
/// `default`.
fn ordering<'a>(requested: Option<&'a str>, allowed: &[&str], default: &'a str) -> (&'a str, bool) {
    let parse = |value: &'a str| {
        let field = value.trim_start_matches('-');
        (field, value.starts_with('-'))
    };
    match requested.map(str::trim).map(parse) {
        Some((field, descending)) if allowed.contains(&field) => (field, descending),
        _ => parse(default),
    }
}

fn sort<T>(items: &mut [T], descending: bool, compare: impl Fn(&T, &T) -> Ordering) {
    items.sort_by(|a, b| {
        let ord = compare(a, b);
        if descending {
            ord.reverse()
        } else {
            ord
        }
    });
}

fn paginate<T: Serialize>(items: Vec<T>, path: &str, query: &ListQuery) -> Response {
    let count = items.len();
    let pages = count.div_ceil(PAGE_SIZE).max(1);
    let page = match query.page.as_deref() {
        None => 1,
        Some("last") => pages,
        Some(raw) => match raw.parse::<usize>() {
            Ok(n) if (1..=pages).contains(&n) => n,
            _ => {
                debug!(page = raw, pages, "Invalid page requested");
                return (StatusCode::NOT_FOUND, Json(json!({ "detail": "Invalid page." }))).into_response();
            }
        },
    };

    let link = |page: usize| {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        if let Some(ordering) = &query.ordering {
            serializer.append_pair("ordering", ordering);
        }
        serializer.append_pair("page", &page.to_string());
        if let Some(search) = &query.search {
            serializer.append_pair("search", search);
        }
        format!("{path}?{}", serializer.finish())
    };

    let results = items
        .into_iter()
        .skip((page - 1) * PAGE_SIZE)
        .take(PAGE_SIZE)
        .collect();
    Json(Page {
        count,
        next: (page < pages).then(|| link(page + 1)),
        previous: (page > 1).then(|| link(page - 1)),
        results,
    })
    .into_response()
}

fn field_errors(errors: &[ValidationError]) -> Response {
    let mut body: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for err in errors {
        body.entry(err.field()).or_default().push(err.to_string());
    }
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "detail": "Not found." }))).into_response()
}

fn internal_error(err: &AccountError) -> Response {
    error!(error = %err, "Account operation failed");
    StatusCode::INTERNAL_SERVER_ERROR.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_is_case_insensitive() {
        assert!(matches_search(None, &["alice"]));
        assert!(matches_search(Some("  "), &["alice"]));
        assert!(matches_search(Some("STOCK"), &["alice", "Stockholm"]));
        assert!(!matches_search(Some("bob"), &["alice", "Stockholm"]));
    }

    #[test]
    fn test_ordering_falls_back_to_default() {
        let allowed = ["created_at", "updated_at"];
        assert_eq!(ordering(None, &allowed, "-created_at"), ("created_at", true));
        assert_eq!(ordering(Some("updated_at"), &allowed, "-created_at"), ("updated_at", false));
        assert_eq!(ordering(Some("-updated_at"), &allowed, "-created_at"), ("updated_at", true));
        assert_eq!(ordering(Some("phone"), &allowed, "-created_at"), ("created_at", true));
    }

    #[tokio::test]
    async fn test_paginate_pages_and_links() {
        let query = ListQuery {
            search: Some("a b".to_string()),
            page: Some("2".to_string()),
            ..ListQuery::default()
        };
        let response = paginate((0..45).collect::<Vec<u32>>(), PROFILES_PATH, &query);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(body["count"], 45);
        assert_eq!(body["results"].as_array().unwrap().len(), PAGE_SIZE);
        assert_eq!(body["results"][0], 20);
        assert_eq!(body["next"], "/api/profiles/?page=3&search=a+b");
        assert_eq!(body["previous"], "/api/profiles/?page=1&search=a+b");
    }

    #[test]
    fn test_paginate_rejects_out_of_range_page() {
        for page in ["0", "2", "x"] {
            let query = ListQuery {
                page: Some(page.to_string()),
                ..ListQuery::default()
            };
            let response = paginate(vec![1, 2, 3], USERS_PATH, &query);
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
        }
    }
}

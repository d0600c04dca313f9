// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Request and form data generators.

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, Method, Request};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Generate a pool of client addresses for testing.
pub fn generate_ips(count: usize) -> Vec<IpAddr> {
    (0..count)
        .map(|i| {
            // Use 10.x.x.x private range
            let a = ((i >> 16) & 0xFF) as u8;
            let b = ((i >> 8) & 0xFF) as u8;
            let c = (i & 0xFF) as u8;
            IpAddr::V4(Ipv4Addr::new(10, a, b, c))
        })
        .collect()
}

/// Form-encoded body for a valid registration of `username`.
pub fn register_body(username: &str) -> String {
    format!(
        "username={username}&first_name=Test&last_name=User&email={username}%40example.com\
         &password1=StrongPass123%21&password2=StrongPass123%21"
    )
}

/// Form-encoded login body.
pub fn login_body(username: &str, password: &str) -> String {
    format!("username={username}&password={password}")
}

/// Request as axum sees it when served with connect info from `ip`.
pub fn request_from(ip: IpAddr, method: Method, uri: &str, body: impl Into<Body>) -> Request<Body> {
    let mut request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(body.into())
        .unwrap();
    request
        .extensions_mut()
        .insert(ConnectInfo(SocketAddr::new(ip, 40000)));
    request
}

/// Form POST from `ip`.
pub fn post_from(ip: IpAddr, uri: &str, body: String) -> Request<Body> {
    request_from(ip, Method::POST, uri, body)
}

/// Browser-style `Cookie` header value echoing a `Set-Cookie` response header.
pub fn echo_cookie(set_cookie: &str) -> String {
    set_cookie.split(';').next().unwrap_or_default().to_string()
}

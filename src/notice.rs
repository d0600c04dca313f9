// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! One-shot user notices carried across a redirect in a cookie.
//!
//! The cookie value is `level:text`, form-urlencoded. A page that shows the
//! notice clears the cookie in the same response.

use crate::cookies;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use url::form_urlencoded;

/// Name of the cookie holding the pending notice.
pub const FLASH_COOKIE: &str = "flash";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Success,
    Error,
}

impl Level {
    fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(Self::Success),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// Message for the user, shown on the next page they load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: Level,
    pub text: String,
}

impl Notice {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            level: Level::Success,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: Level::Error,
            text: text.into(),
        }
    }

    /// `Set-Cookie` header value storing this notice.
    pub fn set_cookie(&self) -> String {
        let raw = format!("{}:{}", self.level.as_str(), self.text);
        let value: String = form_urlencoded::byte_serialize(raw.as_bytes()).collect();
        format!("{FLASH_COOKIE}={value}; Path=/; HttpOnly; SameSite=Lax")
    }

    /// Read the pending notice from the request's `Cookie` headers.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        cookies::find(headers, FLASH_COOKIE).and_then(Self::decode)
    }

    fn decode(value: &str) -> Option<Self> {
        // A bare encoded string parses as a single key with an empty value
        let (decoded, _) = form_urlencoded::parse(value.as_bytes()).next()?;
        let (level, text) = decoded.split_once(':')?;
        Some(Self {
            level: Level::parse(level)?,
            text: text.to_string(),
        })
    }
}

/// `Set-Cookie` header value that removes a shown notice.
pub const CLEAR_COOKIE: &str = "flash=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax";

/// `302 Found` to `location` carrying `notice` for the next page.
pub fn redirect_with_notice(location: impl Into<String>, notice: &Notice) -> Response {
    (
        StatusCode::FOUND,
        [
            (header::LOCATION, location.into()),
            (header::SET_COOKIE, notice.set_cookie()),
        ],
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn cookie_header(set_cookie: &str) -> HeaderMap {
        // Browsers send back only the name=value part
        let pair = set_cookie.split(';').next().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("sessionid=abc; {pair}")).unwrap(),
        );
        headers
    }

    #[test]
    fn test_notice_survives_cookie() {
        let notice = Notice::error("Too many attempts. Please try again later.");
        let headers = cookie_header(&notice.set_cookie());

        assert_eq!(Notice::from_headers(&headers), Some(notice));
    }

    #[test]
    fn test_special_characters_encoded() {
        let notice = Notice::success("Welcome; a=b & c:d!");
        let set_cookie = notice.set_cookie();
        let pair = set_cookie.split(';').next().unwrap();

        assert!(!pair.contains(' '));
        assert_eq!(Notice::from_headers(&cookie_header(&set_cookie)), Some(notice));
    }

    #[test]
    fn test_missing_or_malformed_cookie() {
        assert_eq!(Notice::from_headers(&HeaderMap::new()), None);

        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("flash=warning%3Ahi"));
        assert_eq!(Notice::from_headers(&headers), None);
    }

    #[test]
    fn test_clear_cookie_expires() {
        assert!(CLEAR_COOKIE.starts_with(&format!("{FLASH_COOKIE}=;")));
        assert!(CLEAR_COOKIE.contains("Max-Age=0"));
    }

    #[test]
    fn test_redirect_with_notice() {
        let response = redirect_with_notice("/dashboard/", &Notice::success("Saved"));
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(response.headers()[header::LOCATION], "/dashboard/");
        assert_eq!(
            response.headers()[header::SET_COOKIE],
            Notice::success("Saved").set_cookie().as_str()
        );
    }
}

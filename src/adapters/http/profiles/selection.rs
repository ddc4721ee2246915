//! Reading the requested profile slug off a request.

use axum::http::{header, HeaderMap};

/// Cookie a UI sets to remember the user's profile choice.
pub const PROFILE_COOKIE: &str = "chat_profile";

/// The slug a request asks for: explicit value first, then the cookie.
///
/// Blank values count as absent.
pub fn requested_profile(explicit: Option<&str>, headers: &HeaderMap) -> Option<String> {
    explicit
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| profile_from_cookies(headers))
}

fn profile_from_cookies(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|cookies| cookie_value(cookies, PROFILE_COOKIE))
        .map(str::to_string)
}

fn cookie_value<'a>(cookie_header: &'a str, name: &str) -> Option<&'a str> {
    cookie_header.split(';').map(str::trim).find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        if key.trim() == name && !value.trim().is_empty() {
            Some(value.trim())
        } else {
            None
        }
    })
}

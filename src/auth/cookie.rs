//! Cookie parsing and formatting for the refresh token.

use axum::http::header;

/// Cookie name for the refresh token (long-lived, revocable).
pub const REFRESH_COOKIE_NAME: &str = "refresh-token";

/// Extract a cookie value from the Cookie header.
pub fn get_cookie<'a>(headers: &'a axum::http::HeaderMap, name: &str) -> Option<&'a str> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    for part in cookie_header.split(';') {
        let part = part.trim();
        if let Some((key, value)) = part.split_once('=') {
            if key.trim() == name {
                return Some(value.trim());
            }
        }
    }
    None
}

/// Format the Set-Cookie value for a refresh token.
pub fn refresh_cookie(token: &str, max_age: u64, secure: bool) -> String {
    let secure = if secure { "; Secure" } else { "" };
    format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}{}",
        REFRESH_COOKIE_NAME, token, max_age, secure
    )
}

/// Format the Set-Cookie value that clears the refresh token.
pub fn clear_refresh_cookie(secure: bool) -> String {
    refresh_cookie("", 0, secure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_get_cookie_simple() {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("refresh-token=abc123"),
        );

        assert_eq!(get_cookie(&headers, "refresh-token"), Some("abc123"));
    }

    #[test]
    fn test_get_cookie_multiple() {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("foo=bar; refresh-token=abc123; theme=dark"),
        );

        assert_eq!(get_cookie(&headers, "refresh-token"), Some("abc123"));
        assert_eq!(get_cookie(&headers, "foo"), Some("bar"));
    }

    #[test]
    fn test_get_cookie_not_found() {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("foo=bar"));

        assert_eq!(get_cookie(&headers, "refresh-token"), None);
    }

    #[test]
    fn test_get_cookie_no_header() {
        let headers = axum::http::HeaderMap::new();
        assert_eq!(get_cookie(&headers, "refresh-token"), None);
    }

    #[test]
    fn test_get_cookie_with_spaces() {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("  refresh-token = abc123  ; foo=bar"),
        );

        assert_eq!(get_cookie(&headers, "refresh-token"), Some("abc123"));
    }

    #[test]
    fn test_refresh_cookie_format() {
        let cookie = refresh_cookie("tok", 604800, false);
        assert_eq!(
            cookie,
            "refresh-token=tok; HttpOnly; SameSite=Strict; Path=/; Max-Age=604800"
        );

        let cookie = refresh_cookie("tok", 604800, true);
        assert!(cookie.ends_with("; Secure"));
    }

    #[test]
    fn test_clear_refresh_cookie() {
        let cookie = clear_refresh_cookie(false);
        assert!(cookie.starts_with("refresh-token=;"));
        assert!(cookie.contains("Max-Age=0"));
    }
}

/// Cookie transport for sessions and OAuth state
///
/// - `parley.session-token`: session token, expires with the session
/// - `parley.oauth-state`: nonce pairing an OAuth callback with the browser
///   that started it, 10 minutes
///
/// Both are http-only, `SameSite=Lax` and path `/`; `Secure` is set in
/// production. Lax is required so the provider's top-level redirect back to
/// the callback still carries the state cookie.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Utc};
use parley_shared::identity::sessions::SESSION_COOKIE;
use time::OffsetDateTime;

pub const OAUTH_STATE_COOKIE: &str = "parley.oauth-state";

/// Lifetime of an OAuth round trip
pub const OAUTH_STATE_TTL_MINUTES: i64 = 10;

fn base(name: &'static str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
}

pub fn session_cookie(token: &str, expires_at: DateTime<Utc>, secure: bool) -> Cookie<'static> {
    let mut cookie = base(SESSION_COOKIE, token.to_string(), secure);
    if let Ok(at) = OffsetDateTime::from_unix_timestamp(expires_at.timestamp()) {
        cookie.set_expires(at);
    }
    cookie
}

pub fn oauth_state_cookie(nonce: &str, secure: bool) -> Cookie<'static> {
    let mut cookie = base(OAUTH_STATE_COOKIE, nonce.to_string(), secure);
    cookie.set_max_age(time::Duration::minutes(OAUTH_STATE_TTL_MINUTES));
    cookie
}

/// Expires the OAuth state cookie
pub fn clear_oauth_state(jar: CookieJar) -> CookieJar {
    jar.add(removal(OAUTH_STATE_COOKIE))
}

/// Expires every auth cookie, whether or not the request carried it
pub fn clear_auth_cookies(jar: CookieJar) -> CookieJar {
    jar.add(removal(SESSION_COOKIE)).add(removal(OAUTH_STATE_COOKIE))
}

fn removal(name: &'static str) -> Cookie<'static> {
    let mut cookie = base(name, String::new(), false);
    cookie.make_removal();
    cookie
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;
    use chrono::Duration;

    #[test]
    fn test_session_cookie_attributes() {
        let expires_at = Utc::now() + Duration::days(30);
        let cookie = session_cookie("tok", expires_at, true);

        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.value(), "tok");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(
            cookie.expires_datetime().map(|t| t.unix_timestamp()),
            Some(expires_at.timestamp())
        );
    }

    #[test]
    fn test_not_secure_in_development() {
        let cookie = session_cookie("tok", Utc::now(), false);
        assert_eq!(cookie.secure(), Some(false));
    }

    #[test]
    fn test_oauth_state_cookie_is_short_lived() {
        let cookie = oauth_state_cookie("nonce", false);
        assert_eq!(cookie.name(), OAUTH_STATE_COOKIE);
        assert_eq!(cookie.max_age(), Some(time::Duration::minutes(10)));
    }

    #[test]
    fn test_clear_emits_removals_for_absent_cookies() {
        let response = clear_auth_cookies(CookieJar::new()).into_response();
        let set_cookies: Vec<String> = response
            .headers()
            .get_all(axum::http::header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();

        assert_eq!(set_cookies.len(), 2);
        assert!(set_cookies.iter().any(|c| c.starts_with("parley.session-token=;")));
        assert!(set_cookies.iter().any(|c| c.starts_with("parley.oauth-state=;")));
        assert!(set_cookies.iter().all(|c| c.contains("Max-Age=0")));
    }
}

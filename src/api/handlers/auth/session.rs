//! Cookie and header plumbing for the token pair.

use super::state::AuthConfig;
use axum::http::{
    header::{InvalidHeaderValue, AUTHORIZATION, COOKIE, SET_COOKIE},
    HeaderMap, HeaderValue,
};

pub const ACCESS_COOKIE_NAME: &str = "accessToken";
pub const REFRESH_COOKIE_NAME: &str = "refreshToken";

// Some clients send this literal when they have no token in memory.
const UNDEFINED_TOKEN: &str = "undefined";

fn token_cookie(
    config: &AuthConfig,
    name: &str,
    value: &str,
    max_age_seconds: i64,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!(
        "{name}={value}; Domain={}; Path=/; HttpOnly; SameSite=Strict; Max-Age={max_age_seconds}",
        config.cookie_domain()
    );
    if config.cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Append `Set-Cookie` headers for both tokens.
///
/// # Errors
/// Returns an error if a token contains bytes that are not valid in a header.
pub(super) fn set_token_cookies(
    headers: &mut HeaderMap,
    config: &AuthConfig,
    access_token: &str,
    refresh_token: &str,
) -> Result<(), InvalidHeaderValue> {
    headers.append(
        SET_COOKIE,
        token_cookie(
            config,
            ACCESS_COOKIE_NAME,
            access_token,
            config.access_cookie_max_age_seconds(),
        )?,
    );
    headers.append(
        SET_COOKIE,
        token_cookie(
            config,
            REFRESH_COOKIE_NAME,
            refresh_token,
            config.refresh_cookie_max_age_seconds(),
        )?,
    );
    Ok(())
}

/// Append `Set-Cookie` headers that expire both tokens.
///
/// # Errors
/// Returns an error if the configured cookie domain is not a valid header value.
pub(super) fn clear_token_cookies(
    headers: &mut HeaderMap,
    config: &AuthConfig,
) -> Result<(), InvalidHeaderValue> {
    headers.append(SET_COOKIE, token_cookie(config, ACCESS_COOKIE_NAME, "", 0)?);
    headers.append(SET_COOKIE, token_cookie(config, REFRESH_COOKIE_NAME, "", 0)?);
    Ok(())
}

/// Access token from `Authorization: Bearer`, else from the access cookie.
pub(super) fn extract_access_token(headers: &HeaderMap) -> Option<String> {
    extract_bearer_token(headers).or_else(|| extract_cookie(headers, ACCESS_COOKIE_NAME))
}

/// Refresh token from the refresh cookie, else from `Authorization: Bearer`.
pub(super) fn extract_refresh_token(headers: &HeaderMap) -> Option<String> {
    extract_cookie(headers, REFRESH_COOKIE_NAME).or_else(|| extract_bearer_token(headers))
}

pub(super) fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    for header in headers.get_all(COOKIE) {
        let Ok(value) = header.to_str() else {
            continue;
        };
        for pair in value.split(';') {
            let mut parts = pair.trim().splitn(2, '=');
            let (Some(key), Some(val)) = (parts.next(), parts.next()) else {
                continue;
            };
            let val = val.trim();
            if key.trim() == name && !val.is_empty() && val != UNDEFINED_TOKEN {
                return Some(val.to_string());
            }
        }
    }
    None
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() || token == UNDEFINED_TOKEN {
        None
    } else {
        Some(token.to_string())
    }
}

//! # mecom-auth
//!
//! Token lifecycle service for the three principal kinds of the shop: customers, sellers
//! and administrators.
//!
//! - **Access tokens** are short-lived RS256 JWTs. They are verified statelessly, either with
//!   the local public key or with a key set fetched from a JWKS endpoint.
//! - **Refresh tokens** are HS256 JWTs whose `jti` names a row in the refresh table of the
//!   principal kind. Refreshing consumes the row and issues a new one; logout deletes it.
//!   A refresh token without a live row is rejected.
//!
//! Both tokens travel as `HttpOnly`, `SameSite=Strict` cookies. Access tokens are also
//! accepted as `Authorization: Bearer`.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

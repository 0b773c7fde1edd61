//! Token lifecycle for customers, sellers and admins.
//!
//! Access tokens are RS256, stateless, and verified against a public key that is either
//! derived locally or resolved from a JWKS endpoint. Refresh tokens are HS256 and each one
//! names a row (`jti`) in the refresh table of its principal kind.
//!
//! ## Refresh records
//!
//! A refresh token is valid only while its row exists. Refresh deletes the row and inserts
//! a new one in a single transaction, so a token can be exchanged once. Logout deletes the
//! row. If the record lookup fails or times out the token is rejected.
//!
//! ## Routes
//!
//! Every kind is served under `/v1/<customers|sellers|admins>` with `login`, `refresh`,
//! `logout` and `self`. Customers can also `register`; admins create sellers through
//! `POST /v1/sellers`.

mod error;
mod gate;
pub(crate) mod jwks;
pub(crate) mod keys;
pub(crate) mod login;
pub(crate) mod logout;
pub(crate) mod me;
mod password;
pub(crate) mod principal;
pub(crate) mod refresh;
pub(crate) mod register;
mod revocation;
mod routes;
mod service;
pub(crate) mod session;
mod state;
mod storage;
mod store;
mod sweeper;
mod tokens;
pub(crate) mod types;
mod utils;

pub use error::AuthError;
pub use gate::{authenticate, authenticate_refresh, require_any_role, RoleSet};
pub use jwks::{AccessKeyResolver, DependencyStatus, JwksResolver, StaticKeyResolver};
pub use keys::{Jwk, Jwks, KeyMaterialError, SigningKeyMaterial};
pub use password::PasswordHasher;
pub use principal::{Identity, NewPrincipal, Principal, PrincipalKind};
pub use routes::router;
pub use service::{AuthService, SessionTokens};
pub use state::AuthConfig;
pub use storage::PgStore;
pub use store::{CredentialStore, RefreshTokenRecord, StoreError, REFRESH_RECORD_TTL_SECONDS};
pub use types::{
    EmptyResponse, ErrorResponse, IdResponse, LoginRequest, PrincipalResponse, RegisterRequest,
};
pub use sweeper::spawn_refresh_token_sweeper;

#[cfg(test)]
pub(crate) mod memory;
#[cfg(test)]
mod tests;

//! HTTP handlers.
//!
//! `auth` holds the token lifecycle; the rest are operational endpoints.

pub mod auth;
pub mod health;
pub mod well_known;

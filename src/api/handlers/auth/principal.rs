//! Principal kinds and the records the auth flows read and write.
//!
//! Each kind owns its own principal table and its own refresh-token table. Nothing is shared
//! across kinds, so a lookup for one kind can never observe rows of another.

use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PrincipalKind {
    Customer,
    Seller,
    Admin,
}

impl PrincipalKind {
    pub const ALL: [Self; 3] = [Self::Customer, Self::Seller, Self::Admin];

    /// Role assigned to new principals of this kind.
    #[must_use]
    pub const fn default_role(self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Seller => "seller",
            Self::Admin => "admin",
        }
    }

    #[must_use]
    pub const fn principal_table(self) -> &'static str {
        match self {
            Self::Customer => "customers",
            Self::Seller => "sellers",
            Self::Admin => "admins",
        }
    }

    #[must_use]
    pub const fn refresh_table(self) -> &'static str {
        match self {
            Self::Customer => "customer_refresh_tokens",
            Self::Seller => "seller_refresh_tokens",
            Self::Admin => "admin_refresh_tokens",
        }
    }

    /// Route segment and refresh-token audience for this kind.
    #[must_use]
    pub const fn audience(self) -> &'static str {
        self.principal_table()
    }
}

impl fmt::Display for PrincipalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.default_role())
    }
}

/// A stored principal. `password_hash` is only populated by credential lookups.
#[derive(Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: i64,
    pub email: String,
    pub password_hash: Option<String>,
    pub role: String,
    pub name: String,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub avatar_url: Option<String>,
}

impl Principal {
    /// Drop the password hash so the value is safe to hand to response builders.
    #[must_use]
    pub fn without_secret(mut self) -> Self {
        self.password_hash = None;
        self
    }
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Principal")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("password_hash", &self.password_hash.as_ref().map(|_| "***"))
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

/// Input for principal creation. The email must already be normalized.
#[derive(Clone)]
pub struct NewPrincipal {
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub name: String,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub avatar_url: Option<String>,
}

impl fmt::Debug for NewPrincipal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewPrincipal")
            .field("email", &self.email)
            .field("password_hash", &"***")
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

/// Request-scoped identity populated by the authentication gates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub subject: i64,
    pub role: String,
    /// Refresh-record id, only set by the refresh gate.
    pub jti: Option<i64>,
}

//! Authentication and authorization middleware.
//!
//! Layer order on a protected route: [`authenticate`] (or [`authenticate_refresh`]) runs
//! first and inserts an [`Identity`] into the request extensions, then [`require_any_role`]
//! checks it. Every failure short-circuits before the handler.

use super::{
    error::AuthError,
    principal::{Identity, PrincipalKind},
    service::AuthService,
    session::{extract_access_token, extract_refresh_token},
};
use axum::{
    extract::{Extension, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

/// Access-token gate. Stateless: signature, issuer, audience and expiry only.
///
/// The token's audience must match the principal kind of the route.
pub async fn authenticate(
    Extension(service): Extension<Arc<AuthService>>,
    Extension(kind): Extension<PrincipalKind>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = extract_access_token(request.headers()) else {
        return AuthError::Unauthorized.into_response();
    };
    match service.authenticate_access(kind, &token).await {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(err) => err.into_response(),
    }
}

/// Refresh-route gate. Also proves the refresh record still exists.
pub async fn authenticate_refresh(
    Extension(service): Extension<Arc<AuthService>>,
    Extension(kind): Extension<PrincipalKind>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = extract_refresh_token(request.headers()) else {
        return AuthError::Unauthorized.into_response();
    };
    match service.authenticate_refresh(kind, &token).await {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(err) => err.into_response(),
    }
}

/// Roles allowed through [`require_any_role`].
#[derive(Debug, Clone)]
pub struct RoleSet(Arc<[String]>);

impl RoleSet {
    pub fn new<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(roles.into_iter().map(Into::into).collect())
    }

    #[must_use]
    pub fn allows(&self, role: &str) -> bool {
        self.0.iter().any(|allowed| allowed == role)
    }
}

/// 403 unless the authenticated role is in `roles`. No I/O.
pub async fn require_any_role(
    State(roles): State<RoleSet>,
    request: Request,
    next: Next,
) -> Response {
    let allowed = request
        .extensions()
        .get::<Identity>()
        .is_some_and(|identity| roles.allows(&identity.role));
    if !allowed {
        return AuthError::Forbidden.into_response();
    }
    next.run(request).await
}

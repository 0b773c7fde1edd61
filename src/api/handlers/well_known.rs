use super::auth::{AuthService, Jwks};
use axum::{extract::Extension, response::Json};
use std::sync::Arc;

/// Public key set for access tokens issued by this instance.
#[utoipa::path(
    get,
    path = "/.well-known/jwks.json",
    responses(
        (status = 200, description = "RSA public keys for RS256 access tokens", body = Jwks)
    ),
    tag = "auth"
)]
pub async fn jwks(Extension(service): Extension<Arc<AuthService>>) -> Json<Jwks> {
    Json(service.jwks())
}

use super::{
    principal::{Identity, PrincipalKind},
    service::AuthService,
    types::{ErrorResponse, PrincipalResponse},
};
use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

#[utoipa::path(
    get,
    path = "/v1/{kind}/self",
    params(("kind" = String, Path, description = "customers, sellers or admins")),
    responses(
        (status = 200, description = "Current principal without credentials", body = PrincipalResponse),
        (status = 401, description = "Access token invalid or principal gone", body = ErrorResponse),
        (status = 403, description = "Role not allowed for this kind", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn me(
    Extension(service): Extension<Arc<AuthService>>,
    Extension(kind): Extension<PrincipalKind>,
    Extension(identity): Extension<Identity>,
) -> Response {
    match service.current_principal(kind, &identity).await {
        Ok(principal) => (StatusCode::OK, Json(PrincipalResponse::from(principal))).into_response(),
        Err(err) => err.into_response(),
    }
}

use super::{
    login::session_response,
    principal::{Identity, PrincipalKind},
    service::AuthService,
    types::{ErrorResponse, IdResponse},
};
use axum::{extract::Extension, http::StatusCode, response::IntoResponse, response::Response};
use std::sync::Arc;

#[utoipa::path(
    post,
    path = "/v1/{kind}/refresh",
    params(("kind" = String, Path, description = "customers, sellers or admins")),
    responses(
        (status = 200, description = "Refresh token rotated; new cookies set", body = IdResponse),
        (status = 400, description = "Principal for this token could not be found", body = ErrorResponse),
        (status = 401, description = "Refresh token invalid, expired or revoked", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn refresh(
    Extension(service): Extension<Arc<AuthService>>,
    Extension(kind): Extension<PrincipalKind>,
    Extension(identity): Extension<Identity>,
) -> Response {
    match service.refresh(kind, &identity).await {
        Ok(tokens) => session_response(&service, StatusCode::OK, &tokens),
        Err(err) => err.into_response(),
    }
}

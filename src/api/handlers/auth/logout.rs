use super::{
    error::AuthError,
    principal::{Identity, PrincipalKind},
    service::AuthService,
    session::{clear_token_cookies, extract_cookie, REFRESH_COOKIE_NAME},
    types::{EmptyResponse, ErrorResponse},
};
use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

#[utoipa::path(
    post,
    path = "/v1/{kind}/logout",
    params(("kind" = String, Path, description = "customers, sellers or admins")),
    responses(
        (status = 200, description = "Refresh record deleted; cookies cleared", body = EmptyResponse),
        (status = 401, description = "Access or refresh token missing or invalid", body = ErrorResponse),
        (status = 403, description = "Role not allowed for this kind", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn logout(
    headers: HeaderMap,
    Extension(service): Extension<Arc<AuthService>>,
    Extension(kind): Extension<PrincipalKind>,
    Extension(identity): Extension<Identity>,
) -> Response {
    // The bearer header already carried the access token, so only the cookie is read here.
    let refresh_token = extract_cookie(&headers, REFRESH_COOKIE_NAME);
    if let Err(err) = service
        .logout(kind, &identity, refresh_token.as_deref())
        .await
    {
        return err.into_response();
    }

    let mut response_headers = HeaderMap::new();
    if let Err(err) = clear_token_cookies(&mut response_headers, service.config()) {
        return AuthError::from(err).into_response();
    }
    (StatusCode::OK, response_headers, Json(EmptyResponse {})).into_response()
}

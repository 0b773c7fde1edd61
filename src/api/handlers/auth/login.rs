use super::{
    error::AuthError,
    principal::PrincipalKind,
    service::{AuthService, SessionTokens},
    session::set_token_cookies,
    types::{ErrorResponse, IdResponse, LoginRequest},
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
    path = "/v1/{kind}/login",
    params(("kind" = String, Path, description = "customers, sellers or admins")),
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in; accessToken and refreshToken cookies set", body = IdResponse),
        (status = 400, description = "Email or password is incorrect", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn login(
    Extension(service): Extension<Arc<AuthService>>,
    Extension(kind): Extension<PrincipalKind>,
    payload: Option<Json<LoginRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return AuthError::Validation("Missing payload".to_string()).into_response();
    };
    match service.login(kind, &request.email, &request.password).await {
        Ok(tokens) => session_response(&service, StatusCode::OK, &tokens),
        Err(err) => err.into_response(),
    }
}

/// `{id}` body plus both token cookies.
pub(super) fn session_response(
    service: &AuthService,
    status: StatusCode,
    tokens: &SessionTokens,
) -> Response {
    let mut headers = HeaderMap::new();
    if let Err(err) = set_token_cookies(
        &mut headers,
        service.config(),
        &tokens.access_token,
        &tokens.refresh_token,
    ) {
        return AuthError::from(err).into_response();
    }
    (
        status,
        headers,
        Json(IdResponse {
            id: tokens.principal_id,
        }),
    )
        .into_response()
}

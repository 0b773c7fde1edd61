use super::{
    error::AuthError,
    login::session_response,
    service::AuthService,
    types::{ErrorResponse, IdResponse, RegisterRequest},
};
use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

#[utoipa::path(
    post,
    path = "/v1/customers/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Customer created and logged in", body = IdResponse),
        (status = 400, description = "Invalid payload or email already exists", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn register_customer(
    Extension(service): Extension<Arc<AuthService>>,
    payload: Option<Json<RegisterRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return AuthError::Validation("Missing payload".to_string()).into_response();
    };
    match service.register_customer(&request).await {
        Ok(tokens) => session_response(&service, StatusCode::CREATED, &tokens),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/v1/sellers",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Seller created", body = IdResponse),
        (status = 400, description = "Invalid payload or email already exists", body = ErrorResponse),
        (status = 401, description = "Access token missing or invalid", body = ErrorResponse),
        (status = 403, description = "Only admins may create sellers", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn create_seller(
    Extension(service): Extension<Arc<AuthService>>,
    payload: Option<Json<RegisterRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return AuthError::Validation("Missing payload".to_string()).into_response();
    };
    match service.create_seller(&request).await {
        Ok(seller) => (StatusCode::CREATED, Json(IdResponse { id: seller.id })).into_response(),
        Err(err) => err.into_response(),
    }
}

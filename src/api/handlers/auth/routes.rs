//! Route table for the token lifecycle.
//!
//! Each principal kind gets the same sub-router, nested under `/v1/<audience>`. The kind
//! travels as a request extension so handlers and gates stay generic.

use super::{
    gate::{authenticate, authenticate_refresh, require_any_role, RoleSet},
    login::login,
    logout::logout,
    me::me,
    principal::PrincipalKind,
    refresh::refresh,
    register::{create_seller, register_customer},
};
use axum::{
    extract::Extension,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};

/// All auth routes. Expects an `Extension<Arc<AuthService>>` layered above.
pub fn router() -> Router {
    let mut router = Router::new();
    for kind in PrincipalKind::ALL {
        router = router.nest(&format!("/v1/{}", kind.audience()), kind_router(kind));
    }

    // Seller creation is an admin route: it takes admin-audience tokens only.
    router.route(
        "/v1/sellers",
        post(create_seller)
            .route_layer(from_fn_with_state(
                RoleSet::new([PrincipalKind::Admin.default_role()]),
                require_any_role,
            ))
            .route_layer(from_fn(authenticate))
            .layer(Extension(PrincipalKind::Admin)),
    )
}

fn kind_router(kind: PrincipalKind) -> Router {
    // Later route layers wrap earlier ones, so authentication runs before the role check.
    let protected = Router::new()
        .route("/self", get(me))
        .route("/logout", post(logout))
        .route_layer(from_fn_with_state(
            RoleSet::new([kind.default_role()]),
            require_any_role,
        ))
        .route_layer(from_fn(authenticate));

    let refreshing = Router::new()
        .route("/refresh", post(refresh))
        .route_layer(from_fn(authenticate_refresh));

    let mut router = Router::new()
        .route("/login", post(login))
        .merge(protected)
        .merge(refreshing);
    if kind == PrincipalKind::Customer {
        router = router.route("/register", post(register_customer));
    }
    router.layer(Extension(kind))
}

//! Router-level tests for the token lifecycle, run against the in-memory store.

use super::error::INVALID_CREDENTIALS_MESSAGE;
use super::keys::test_keys::{TEST_PRIVATE_KEY_PEM, TEST_REFRESH_SECRET};
use super::memory::MemoryStore;
use super::principal::NewPrincipal;
use super::session::{ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME};
use super::tokens::verify_access_token;
use super::{
    router, AuthConfig, AuthError, AuthService, CredentialStore, Identity, PasswordHasher,
    PrincipalKind, SigningKeyMaterial, StaticKeyResolver,
};
use anyhow::{anyhow, Context, Result};
use axum::{
    body::{to_bytes, Body},
    extract::Extension,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE, COOKIE, SET_COOKIE},
        Request, Response, StatusCode,
    },
    Router,
};
use secrecy::SecretString;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const ISSUER: &str = "https://auth.mecom.test";
const TEST_COST: u32 = 4;

struct Harness {
    app: Router,
    store: Arc<MemoryStore>,
    service: Arc<AuthService>,
    keys: Arc<SigningKeyMaterial>,
}

impl Harness {
    fn new() -> Result<Self> {
        let keys = Arc::new(SigningKeyMaterial::new(
            TEST_PRIVATE_KEY_PEM.as_bytes(),
            None,
            &SecretString::from(TEST_REFRESH_SECRET),
            Some("test-key".to_string()),
        )?);
        let resolver = Arc::new(StaticKeyResolver::new(keys.access_verification_key()?));
        let store = Arc::new(MemoryStore::new());
        let service = Arc::new(
            AuthService::new(
                AuthConfig::new(ISSUER, "mecom.test"),
                keys.clone(),
                store.clone(),
                resolver,
            )
            .with_password_hasher(PasswordHasher::with_cost(TEST_COST)),
        );
        let app = router().layer(Extension(service.clone()));
        Ok(Self {
            app,
            store,
            service,
            keys,
        })
    }

    async fn seed(&self, kind: PrincipalKind, email: &str, password: &str) -> Result<i64> {
        let password_hash = PasswordHasher::with_cost(TEST_COST).hash(password).await?;
        let principal = self
            .store
            .insert_principal(
                kind,
                &NewPrincipal {
                    email: email.to_string(),
                    password_hash,
                    role: kind.default_role().to_string(),
                    name: "Test".to_string(),
                    phone_number: None,
                    address: None,
                    avatar_url: None,
                },
            )
            .await?;
        Ok(principal.id)
    }

    async fn send(&self, request: Request<Body>) -> Result<Response<Body>> {
        Ok(self.app.clone().oneshot(request).await?)
    }

    async fn login(&self, kind: PrincipalKind, email: &str, password: &str) -> Result<Session> {
        let response = self
            .send(json_request(
                "POST",
                &format!("/v1/{}/login", kind.audience()),
                &json!({ "email": email, "password": password }),
            )?)
            .await?;
        if response.status() != StatusCode::OK {
            return Err(anyhow!("login failed with {}", response.status()));
        }
        Session::from_response(response).await
    }

    async fn refresh(&self, kind: PrincipalKind, refresh_token: &str) -> Result<Response<Body>> {
        self.send(
            Request::builder()
                .method("POST")
                .uri(format!("/v1/{}/refresh", kind.audience()))
                .header(COOKIE, format!("{REFRESH_COOKIE_NAME}={refresh_token}"))
                .body(Body::empty())?,
        )
        .await
    }

    async fn get_self(&self, kind: PrincipalKind, access_token: &str) -> Result<Response<Body>> {
        self.send(
            Request::builder()
                .method("GET")
                .uri(format!("/v1/{}/self", kind.audience()))
                .header(AUTHORIZATION, format!("Bearer {access_token}"))
                .body(Body::empty())?,
        )
        .await
    }
}

struct Session {
    id: i64,
    access_token: String,
    refresh_token: String,
    cookies: Vec<String>,
}

impl Session {
    async fn from_response(response: Response<Body>) -> Result<Self> {
        let cookies = set_cookies(&response);
        let access_token = cookie_value(&cookies, ACCESS_COOKIE_NAME)
            .ok_or_else(|| anyhow!("missing access cookie"))?;
        let refresh_token = cookie_value(&cookies, REFRESH_COOKIE_NAME)
            .ok_or_else(|| anyhow!("missing refresh cookie"))?;
        let body = json_body(response).await?;
        let id = body["id"].as_i64().context("missing id")?;
        Ok(Self {
            id,
            access_token,
            refresh_token,
            cookies,
        })
    }
}

fn json_request(method: &str, uri: &str, body: &Value) -> Result<Request<Body>> {
    Ok(Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(body)?))?)
}

fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .map(str::to_string)
        .collect()
}

fn cookie_value(cookies: &[String], name: &str) -> Option<String> {
    cookies.iter().find_map(|cookie| {
        let (pair, _) = cookie.split_once(';')?;
        let (key, value) = pair.split_once('=')?;
        (key == name && !value.is_empty()).then(|| value.to_string())
    })
}

async fn json_body(response: Response<Body>) -> Result<Value> {
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[tokio::test]
async fn login_failures_are_indistinguishable() -> Result<()> {
    let harness = Harness::new()?;
    harness
        .seed(PrincipalKind::Customer, "ana@x.com", "correct")
        .await?;

    let unknown = harness
        .send(json_request(
            "POST",
            "/v1/customers/login",
            &json!({ "email": "nobody@x.com", "password": "correct" }),
        )?)
        .await?;
    let wrong = harness
        .send(json_request(
            "POST",
            "/v1/customers/login",
            &json!({ "email": "ana@x.com", "password": "wrong" }),
        )?)
        .await?;

    assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);
    assert_eq!(wrong.status(), StatusCode::BAD_REQUEST);
    assert!(set_cookies(&unknown).is_empty());
    let unknown_body = json_body(unknown).await?;
    let wrong_body = json_body(wrong).await?;
    assert_eq!(unknown_body, wrong_body);
    assert_eq!(unknown_body["message"], INVALID_CREDENTIALS_MESSAGE);
    Ok(())
}

#[tokio::test]
async fn login_issues_verifiable_tokens_in_strict_cookies() -> Result<()> {
    let harness = Harness::new()?;
    let id = harness
        .seed(PrincipalKind::Customer, "ana@x.com", "pw")
        .await?;

    let session = harness
        .login(PrincipalKind::Customer, " ANA@x.com ", "pw")
        .await?;

    assert_eq!(session.id, id);
    assert_eq!(session.access_token.split('.').count(), 3);
    assert_eq!(session.cookies.len(), 2);
    for cookie in &session.cookies {
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Strict"));
        assert!(cookie.contains("Domain=mecom.test"));
        assert!(cookie.contains("Secure"));
    }

    let key = harness.keys.access_verification_key()?;
    let claims = verify_access_token(
        &session.access_token,
        &key,
        ISSUER,
        PrincipalKind::Customer,
    )?;
    assert_eq!(claims.subject()?, id);
    assert_eq!(claims.role, "customer");
    assert_eq!(harness.store.record_count(PrincipalKind::Customer), 1);
    Ok(())
}

#[tokio::test]
async fn seller_refresh_rotates_and_spent_token_is_rejected() -> Result<()> {
    let harness = Harness::new()?;
    harness
        .seed(PrincipalKind::Admin, "root@x.com", "admin-pw")
        .await?;
    let admin = harness
        .login(PrincipalKind::Admin, "root@x.com", "admin-pw")
        .await?;

    let created = harness
        .send(
            Request::builder()
                .method("POST")
                .uri("/v1/sellers")
                .header(CONTENT_TYPE, "application/json")
                .header(AUTHORIZATION, format!("Bearer {}", admin.access_token))
                .body(Body::from(serde_json::to_vec(&json!({
                    "email": "shop@x.com",
                    "password": "S3cret!234",
                    "name": "Shop"
                }))?))?,
        )
        .await?;
    assert_eq!(created.status(), StatusCode::CREATED);
    let seller_id = json_body(created).await?["id"]
        .as_i64()
        .context("missing seller id")?;

    let login = harness
        .login(PrincipalKind::Seller, "shop@x.com", "S3cret!234")
        .await?;
    assert_eq!(login.id, seller_id);
    let first = login.refresh_token;

    let rotated = harness.refresh(PrincipalKind::Seller, &first).await?;
    assert_eq!(rotated.status(), StatusCode::OK);
    let second = Session::from_response(rotated).await?;
    assert_ne!(second.refresh_token, first);
    assert_eq!(second.id, seller_id);

    let replay = harness.refresh(PrincipalKind::Seller, &first).await?;
    assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);

    let again = harness
        .refresh(PrincipalKind::Seller, &second.refresh_token)
        .await?;
    assert_eq!(again.status(), StatusCode::OK);
    assert_eq!(harness.store.record_count(PrincipalKind::Seller), 1);
    Ok(())
}

#[tokio::test]
async fn refresh_picks_up_role_change() -> Result<()> {
    let harness = Harness::new()?;
    let id = harness
        .seed(PrincipalKind::Seller, "shop@x.com", "pw")
        .await?;
    let session = harness.login(PrincipalKind::Seller, "shop@x.com", "pw").await?;

    harness.store.set_role(PrincipalKind::Seller, id, "suspended");
    let response = harness
        .refresh(PrincipalKind::Seller, &session.refresh_token)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let rotated = Session::from_response(response).await?;

    let key = harness.keys.access_verification_key()?;
    let claims = verify_access_token(
        &rotated.access_token,
        &key,
        ISSUER,
        PrincipalKind::Seller,
    )?;
    assert_eq!(claims.role, "suspended");

    let denied = harness
        .get_self(PrincipalKind::Seller, &rotated.access_token)
        .await?;
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn logout_revokes_refresh_token_and_clears_cookies() -> Result<()> {
    let harness = Harness::new()?;
    harness
        .seed(PrincipalKind::Customer, "ana@x.com", "pw")
        .await?;
    let session = harness
        .login(PrincipalKind::Customer, "ana@x.com", "pw")
        .await?;

    let response = harness
        .send(
            Request::builder()
                .method("POST")
                .uri("/v1/customers/logout")
                .header(AUTHORIZATION, format!("Bearer {}", session.access_token))
                .header(
                    COOKIE,
                    format!("{REFRESH_COOKIE_NAME}={}", session.refresh_token),
                )
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let cleared = set_cookies(&response);
    assert_eq!(cleared.len(), 2);
    assert!(cleared.iter().all(|cookie| cookie.contains("Max-Age=0")));
    assert_eq!(json_body(response).await?, json!({}));
    assert_eq!(harness.store.record_count(PrincipalKind::Customer), 0);

    let replay = harness
        .refresh(PrincipalKind::Customer, &session.refresh_token)
        .await?;
    assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn logout_without_refresh_token_is_unauthorized() -> Result<()> {
    let harness = Harness::new()?;
    harness
        .seed(PrincipalKind::Customer, "ana@x.com", "pw")
        .await?;
    let session = harness
        .login(PrincipalKind::Customer, "ana@x.com", "pw")
        .await?;

    let response = harness
        .send(
            Request::builder()
                .method("POST")
                .uri("/v1/customers/logout")
                .header(AUTHORIZATION, format!("Bearer {}", session.access_token))
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(harness.store.record_count(PrincipalKind::Customer), 1);
    Ok(())
}

#[tokio::test]
async fn tokens_do_not_cross_principal_kinds() -> Result<()> {
    let harness = Harness::new()?;
    let customer_id = harness
        .seed(PrincipalKind::Customer, "ana@x.com", "pw")
        .await?;
    // Same numeric id on the seller side, with a record of the same id.
    let seller_id = harness
        .seed(PrincipalKind::Seller, "shop@x.com", "pw")
        .await?;
    assert_eq!(customer_id, seller_id);
    let session = harness
        .login(PrincipalKind::Customer, "ana@x.com", "pw")
        .await?;
    harness
        .store
        .insert_record_with_id(PrincipalKind::Seller, 1, seller_id);

    let refresh = harness
        .refresh(PrincipalKind::Seller, &session.refresh_token)
        .await?;
    assert_eq!(refresh.status(), StatusCode::UNAUTHORIZED);

    let lookup = harness
        .get_self(PrincipalKind::Seller, &session.access_token)
        .await?;
    assert_eq!(lookup.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn role_change_does_not_open_another_kinds_routes() -> Result<()> {
    let harness = Harness::new()?;
    harness
        .seed(PrincipalKind::Admin, "boss@x.com", "pw")
        .await?;
    let seller_id = harness
        .seed(PrincipalKind::Seller, "shop@x.com", "pw")
        .await?;
    harness.store.set_role(PrincipalKind::Seller, seller_id, "admin");
    let seller = harness.login(PrincipalKind::Seller, "shop@x.com", "pw").await?;

    let lookup = harness
        .get_self(PrincipalKind::Admin, &seller.access_token)
        .await?;
    assert_eq!(lookup.status(), StatusCode::UNAUTHORIZED);

    let create = harness
        .send(
            Request::builder()
                .method("POST")
                .uri("/v1/sellers")
                .header(CONTENT_TYPE, "application/json")
                .header(AUTHORIZATION, format!("Bearer {}", seller.access_token))
                .body(Body::from(serde_json::to_vec(&json!({
                    "email": "other@x.com",
                    "password": "pw",
                    "name": "Other"
                }))?))?,
        )
        .await?;
    assert_eq!(create.status(), StatusCode::UNAUTHORIZED);
    assert!(harness
        .store
        .find_principal_by_email(PrincipalKind::Seller, "other@x.com")
        .await?
        .is_none());
    Ok(())
}

#[tokio::test]
async fn concurrent_refresh_has_a_single_winner() -> Result<()> {
    let harness = Harness::new()?;
    harness
        .seed(PrincipalKind::Customer, "ana@x.com", "pw")
        .await?;
    let session = harness
        .login(PrincipalKind::Customer, "ana@x.com", "pw")
        .await?;

    let (first, second) = tokio::join!(
        harness.refresh(PrincipalKind::Customer, &session.refresh_token),
        harness.refresh(PrincipalKind::Customer, &session.refresh_token),
    );
    let mut statuses = [first?.status(), second?.status()];
    statuses.sort_by_key(|status| status.as_u16());
    assert_eq!(statuses, [StatusCode::OK, StatusCode::UNAUTHORIZED]);
    assert_eq!(harness.store.record_count(PrincipalKind::Customer), 1);
    // The login record was the first one issued for customers.
    assert!(!harness.store.contains_record(PrincipalKind::Customer, 1));
    Ok(())
}

#[tokio::test]
async fn self_returns_profile_without_password() -> Result<()> {
    let harness = Harness::new()?;
    let created = harness
        .send(json_request(
            "POST",
            "/v1/customers/register",
            &json!({
                "email": "Ana@X.com",
                "password": "pw",
                "name": "Ana",
                "phone_number": "+34 600 000 000"
            }),
        )?)
        .await?;
    assert_eq!(created.status(), StatusCode::CREATED);
    let session = Session::from_response(created).await?;

    let response = harness
        .get_self(PrincipalKind::Customer, &session.access_token)
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await?;
    assert_eq!(body["id"], session.id);
    assert_eq!(body["email"], "ana@x.com");
    assert_eq!(body["role"], "customer");
    assert_eq!(body["phone_number"], "+34 600 000 000");
    let fields = body.as_object().context("self body is not an object")?;
    assert!(fields.keys().all(|key| !key.contains("password")));
    Ok(())
}

#[tokio::test]
async fn register_rejects_duplicate_email() -> Result<()> {
    let harness = Harness::new()?;
    let body = json!({ "email": "ana@x.com", "password": "pw", "name": "Ana" });

    let first = harness
        .send(json_request("POST", "/v1/customers/register", &body)?)
        .await?;
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = harness
        .send(json_request(
            "POST",
            "/v1/customers/register",
            &json!({ "email": "ANA@x.com", "password": "other", "name": "Ana" }),
        )?)
        .await?;
    assert_eq!(second.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(second).await?["message"], "Email already exists");
    Ok(())
}

#[tokio::test]
async fn register_validates_body() -> Result<()> {
    let harness = Harness::new()?;

    let invalid = harness
        .send(json_request(
            "POST",
            "/v1/customers/register",
            &json!({ "email": "not-an-email", "password": "pw", "name": "Ana" }),
        )?)
        .await?;
    assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);

    let missing = harness
        .send(
            Request::builder()
                .method("POST")
                .uri("/v1/customers/register")
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn only_admins_create_sellers() -> Result<()> {
    let harness = Harness::new()?;
    harness
        .seed(PrincipalKind::Customer, "ana@x.com", "pw")
        .await?;
    let customer = harness
        .login(PrincipalKind::Customer, "ana@x.com", "pw")
        .await?;
    let body = serde_json::to_vec(&json!({
        "email": "shop@x.com",
        "password": "pw",
        "name": "Shop"
    }))?;

    let anonymous = harness
        .send(
            Request::builder()
                .method("POST")
                .uri("/v1/sellers")
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.clone()))?,
        )
        .await?;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let customer_token = harness
        .send(
            Request::builder()
                .method("POST")
                .uri("/v1/sellers")
                .header(CONTENT_TYPE, "application/json")
                .header(AUTHORIZATION, format!("Bearer {}", customer.access_token))
                .body(Body::from(body))?,
        )
        .await?;
    // A customer token is not an admin-audience token.
    assert_eq!(customer_token.status(), StatusCode::UNAUTHORIZED);
    assert!(harness
        .store
        .find_principal_by_email(PrincipalKind::Seller, "shop@x.com")
        .await?
        .is_none());
    Ok(())
}

#[tokio::test]
async fn deleted_principal_loses_access() -> Result<()> {
    let harness = Harness::new()?;
    let id = harness
        .seed(PrincipalKind::Customer, "ana@x.com", "pw")
        .await?;
    let session = harness
        .login(PrincipalKind::Customer, "ana@x.com", "pw")
        .await?;

    harness.store.remove_principal(PrincipalKind::Customer, id);

    let lookup = harness
        .get_self(PrincipalKind::Customer, &session.access_token)
        .await?;
    assert_eq!(lookup.status(), StatusCode::UNAUTHORIZED);

    // Records go with the principal, so the refresh gate already rejects the token.
    let refresh = harness
        .refresh(PrincipalKind::Customer, &session.refresh_token)
        .await?;
    assert_eq!(refresh.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn refresh_for_missing_principal_is_a_bad_request() -> Result<()> {
    let harness = Harness::new()?;
    let identity = Identity {
        subject: 42,
        role: "customer".to_string(),
        jti: Some(7),
    };

    let err = harness
        .service
        .refresh(PrincipalKind::Customer, &identity)
        .await
        .err()
        .context("refresh unexpectedly succeeded")?;
    assert!(matches!(err, AuthError::PrincipalGone { on_refresh: true }));
    assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn undefined_bearer_falls_back_to_cookie() -> Result<()> {
    let harness = Harness::new()?;
    harness
        .seed(PrincipalKind::Admin, "root@x.com", "pw")
        .await?;
    let session = harness.login(PrincipalKind::Admin, "root@x.com", "pw").await?;

    let response = harness
        .send(
            Request::builder()
                .method("GET")
                .uri("/v1/admins/self")
                .header(AUTHORIZATION, "Bearer undefined")
                .header(
                    COOKIE,
                    format!("{ACCESS_COOKIE_NAME}={}", session.access_token),
                )
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await?["role"], "admin");
    Ok(())
}

#[tokio::test]
async fn refresh_fails_closed_when_store_is_down() -> Result<()> {
    let harness = Harness::new()?;
    harness
        .seed(PrincipalKind::Customer, "ana@x.com", "pw")
        .await?;
    let session = harness
        .login(PrincipalKind::Customer, "ana@x.com", "pw")
        .await?;

    harness.store.fail_lookups(true);
    let failed = harness
        .refresh(PrincipalKind::Customer, &session.refresh_token)
        .await?;
    assert_eq!(failed.status(), StatusCode::UNAUTHORIZED);

    harness.store.fail_lookups(false);
    harness.store.time_out_lookups(true);
    let timed_out = harness
        .refresh(PrincipalKind::Customer, &session.refresh_token)
        .await?;
    assert_eq!(timed_out.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(harness.store.record_count(PrincipalKind::Customer), 1);
    Ok(())
}

#[tokio::test]
async fn garbage_tokens_are_unauthorized() -> Result<()> {
    let harness = Harness::new()?;

    let lookup = harness
        .get_self(PrincipalKind::Customer, "not.a.token")
        .await?;
    assert_eq!(lookup.status(), StatusCode::UNAUTHORIZED);

    let refresh = harness
        .refresh(PrincipalKind::Customer, "not.a.token")
        .await?;
    assert_eq!(refresh.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(refresh).await?["message"], "Unauthorized");
    Ok(())
}

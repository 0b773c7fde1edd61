//! Session orchestration: login, refresh, logout, self-lookup and principal creation.
//!
//! One service handles every principal kind; the kind is passed per call and selects the
//! tables the store touches.

use super::{
    error::AuthError,
    jwks::AccessKeyResolver,
    keys::{Jwks, SigningKeyMaterial},
    password::PasswordHasher,
    principal::{Identity, NewPrincipal, Principal, PrincipalKind},
    revocation::RevocationVerifier,
    state::AuthConfig,
    store::CredentialStore,
    tokens::{access_token_kid, verify_access_token, TokenIssuer},
    types::RegisterRequest,
    utils::{normalize_email, valid_email},
};
use std::{fmt, sync::Arc};
use tracing::{debug, info, instrument};

/// Token pair handed to the transport layer.
pub struct SessionTokens {
    pub principal_id: i64,
    pub access_token: String,
    pub refresh_token: String,
}

impl fmt::Debug for SessionTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionTokens")
            .field("principal_id", &self.principal_id)
            .field("access_token", &"***")
            .field("refresh_token", &"***")
            .finish()
    }
}

pub struct AuthService {
    config: AuthConfig,
    issuer: TokenIssuer,
    store: Arc<dyn CredentialStore>,
    access_keys: Arc<dyn AccessKeyResolver>,
    revocation: RevocationVerifier,
    passwords: PasswordHasher,
}

impl AuthService {
    #[must_use]
    pub fn new(
        config: AuthConfig,
        keys: Arc<SigningKeyMaterial>,
        store: Arc<dyn CredentialStore>,
        access_keys: Arc<dyn AccessKeyResolver>,
    ) -> Self {
        let issuer = TokenIssuer::new(
            keys,
            config.token_issuer(),
            config.access_token_ttl_hours(),
            config.refresh_token_ttl_days(),
        );
        let revocation = RevocationVerifier::new(issuer.clone(), store.clone());
        Self {
            config,
            issuer,
            store,
            access_keys,
            revocation,
            passwords: PasswordHasher::new(),
        }
    }

    #[must_use]
    pub fn with_password_hasher(mut self, passwords: PasswordHasher) -> Self {
        self.passwords = passwords;
        self
    }

    /// Prepare work that would otherwise land on the first request.
    ///
    /// # Errors
    /// Returns an error if the unknown-principal placeholder hash cannot be built.
    pub async fn warm_up(&self) -> Result<(), AuthError> {
        self.passwords.warm_up().await?;
        Ok(())
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    #[must_use]
    pub fn access_keys(&self) -> &Arc<dyn AccessKeyResolver> {
        &self.access_keys
    }

    /// Public key set for access-token verification.
    #[must_use]
    pub fn jwks(&self) -> Jwks {
        self.issuer.keys().jwks()
    }

    /// Verify an access token for the routes of `kind`: signature, audience and expiry only.
    ///
    /// # Errors
    /// Returns [`AuthError::Unauthorized`] for any verification failure.
    pub async fn authenticate_access(
        &self,
        kind: PrincipalKind,
        token: &str,
    ) -> Result<Identity, AuthError> {
        let kid = access_token_kid(token)?;
        let key = self
            .access_keys
            .resolve(kid.as_deref())
            .await
            .map_err(|err| {
                debug!(error = %err, "no verification key for access token");
                AuthError::Unauthorized
            })?;
        let claims = verify_access_token(token, &key, self.issuer.issuer(), kind)?;
        Ok(Identity {
            subject: claims.subject()?,
            role: claims.role,
            jti: None,
        })
    }

    /// Verify a refresh token and prove its backing record is still live.
    ///
    /// # Errors
    /// Returns [`AuthError::Unauthorized`] when the token is invalid or revoked.
    pub async fn authenticate_refresh(
        &self,
        kind: PrincipalKind,
        token: &str,
    ) -> Result<Identity, AuthError> {
        self.revocation.verify(kind, token).await.map_err(|err| {
            debug!(error = %err, "refresh token rejected");
            AuthError::Unauthorized
        })
    }

    /// # Errors
    /// Returns [`AuthError::InvalidCredentials`] for an unknown email or a wrong password.
    #[instrument(skip(self, email, password))]
    pub async fn login(
        &self,
        kind: PrincipalKind,
        email: &str,
        password: &str,
    ) -> Result<SessionTokens, AuthError> {
        let email = normalize_email(email);
        let found = self.store.find_principal_by_email(kind, &email).await?;

        let principal = match found {
            Some(principal) => {
                let verified = match principal.password_hash.as_deref() {
                    Some(hash) => self.passwords.compare(hash, password).await?,
                    None => self.passwords.compare_absent(password).await?,
                };
                verified.then_some(principal)
            }
            None => {
                self.passwords.compare_absent(password).await?;
                None
            }
        };
        let Some(principal) = principal else {
            debug!("login rejected");
            return Err(AuthError::InvalidCredentials);
        };

        let tokens = self.start_session(kind, &principal.without_secret()).await?;
        info!(principal_id = tokens.principal_id, "login succeeded");
        Ok(tokens)
    }

    /// Rotate the refresh record named by `identity.jti` and mint a new pair.
    ///
    /// # Errors
    /// Returns [`AuthError::PrincipalGone`] if the principal was deleted, or
    /// [`AuthError::Unauthorized`] if the record was already consumed.
    #[instrument(skip(self, identity), fields(principal_id = identity.subject))]
    pub async fn refresh(
        &self,
        kind: PrincipalKind,
        identity: &Identity,
    ) -> Result<SessionTokens, AuthError> {
        let jti = identity.jti.ok_or(AuthError::Unauthorized)?;
        let principal = self
            .store
            .find_principal_by_id(kind, identity.subject)
            .await?
            .ok_or(AuthError::PrincipalGone { on_refresh: true })?
            .without_secret();

        let access_token = self.issuer.issue_access_token(kind, principal.id, &principal.role)?;
        let Some(record) = self
            .store
            .rotate_refresh_token(kind, jti, principal.id)
            .await?
        else {
            debug!(jti, "refresh record consumed concurrently");
            return Err(AuthError::Unauthorized);
        };
        let refresh_token =
            self.issuer
                .issue_refresh_token(kind, principal.id, &principal.role, record.id)?;

        debug!(old_jti = jti, new_jti = record.id, "refresh token rotated");
        Ok(SessionTokens {
            principal_id: principal.id,
            access_token,
            refresh_token,
        })
    }

    /// Delete the refresh record behind `refresh_token`. Expired tokens are accepted.
    ///
    /// # Errors
    /// Returns [`AuthError::Unauthorized`] if the refresh token is missing, forged, or belongs
    /// to another principal.
    #[instrument(skip(self, identity, refresh_token), fields(principal_id = identity.subject))]
    pub async fn logout(
        &self,
        kind: PrincipalKind,
        identity: &Identity,
        refresh_token: Option<&str>,
    ) -> Result<(), AuthError> {
        let token = refresh_token.ok_or(AuthError::Unauthorized)?;
        let claims = self.issuer.parse_refresh_token(kind, token)?;
        if claims.subject()? != identity.subject {
            debug!("refresh token belongs to another principal");
            return Err(AuthError::Unauthorized);
        }
        self.store
            .delete_refresh_token(kind, claims.record_id()?)
            .await?;
        info!("logged out");
        Ok(())
    }

    /// Current principal state, never carrying a password hash.
    ///
    /// # Errors
    /// Returns [`AuthError::PrincipalGone`] if the principal no longer exists.
    pub async fn current_principal(
        &self,
        kind: PrincipalKind,
        identity: &Identity,
    ) -> Result<Principal, AuthError> {
        let principal = self
            .store
            .find_principal_by_id(kind, identity.subject)
            .await?
            .ok_or(AuthError::PrincipalGone { on_refresh: false })?;
        Ok(principal.without_secret())
    }

    /// Create a customer and log them in.
    ///
    /// # Errors
    /// Returns [`AuthError::EmailTaken`] on a duplicate email, or a validation error.
    #[instrument(skip(self, request))]
    pub async fn register_customer(
        &self,
        request: &RegisterRequest,
    ) -> Result<SessionTokens, AuthError> {
        let principal = self.create_principal(PrincipalKind::Customer, request).await?;
        self.start_session(PrincipalKind::Customer, &principal)
            .await
    }

    /// Create a seller. Callers must already hold the admin role.
    ///
    /// # Errors
    /// Returns [`AuthError::EmailTaken`] on a duplicate email, or a validation error.
    #[instrument(skip(self, request))]
    pub async fn create_seller(&self, request: &RegisterRequest) -> Result<Principal, AuthError> {
        self.create_principal(PrincipalKind::Seller, request).await
    }

    async fn create_principal(
        &self,
        kind: PrincipalKind,
        request: &RegisterRequest,
    ) -> Result<Principal, AuthError> {
        let email = normalize_email(&request.email);
        if !valid_email(&email) {
            return Err(AuthError::Validation("Invalid email".to_string()));
        }
        if request.password.is_empty() {
            return Err(AuthError::Validation("Password is required".to_string()));
        }
        let name = request.name.trim();
        if name.is_empty() {
            return Err(AuthError::Validation("Name is required".to_string()));
        }

        let password_hash = self.passwords.hash(&request.password).await?;
        let principal = self
            .store
            .insert_principal(
                kind,
                &NewPrincipal {
                    email,
                    password_hash,
                    role: kind.default_role().to_string(),
                    name: name.to_string(),
                    phone_number: request.phone_number.clone(),
                    address: request.address.clone(),
                    avatar_url: request.avatar_url.clone(),
                },
            )
            .await?;
        info!(principal_id = principal.id, kind = %kind, "principal created");
        Ok(principal.without_secret())
    }

    /// Access token first, then the record, then the refresh token naming that record.
    async fn start_session(
        &self,
        kind: PrincipalKind,
        principal: &Principal,
    ) -> Result<SessionTokens, AuthError> {
        let access_token = self.issuer.issue_access_token(kind, principal.id, &principal.role)?;
        let record = self.store.persist_refresh_token(kind, principal.id).await?;
        let refresh_token =
            self.issuer
                .issue_refresh_token(kind, principal.id, &principal.role, record.id)?;
        Ok(SessionTokens {
            principal_id: principal.id,
            access_token,
            refresh_token,
        })
    }
}

impl fmt::Debug for AuthService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthService")
            .field("config", &self.config)
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

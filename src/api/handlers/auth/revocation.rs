//! Refresh-token revocation checks.
//!
//! A refresh token is valid only while its backing record exists for the same principal.
//! Anything short of a positive lookup, including store errors and timeouts, counts as revoked.

use super::principal::{Identity, PrincipalKind};
use super::store::CredentialStore;
use super::tokens::{TokenError, TokenIssuer};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument, warn};

#[derive(Debug, Error)]
pub enum RevocationError {
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("refresh record is gone")]
    Revoked,
}

#[derive(Clone)]
pub struct RevocationVerifier {
    issuer: TokenIssuer,
    store: Arc<dyn CredentialStore>,
}

impl RevocationVerifier {
    #[must_use]
    pub fn new(issuer: TokenIssuer, store: Arc<dyn CredentialStore>) -> Self {
        Self { issuer, store }
    }

    /// Prove a refresh token is still live, or report it revoked.
    ///
    /// # Errors
    /// Returns an error if the token fails verification or no live record backs it.
    #[instrument(skip(self, token))]
    pub async fn verify(&self, kind: PrincipalKind, token: &str) -> Result<Identity, RevocationError> {
        let claims = self.issuer.verify_refresh_token(kind, token)?;
        let subject = claims.subject()?;
        let jti = claims.record_id()?;

        match self.store.find_refresh_token(kind, jti, subject).await {
            Ok(Some(_)) => Ok(Identity {
                subject,
                role: claims.role,
                jti: Some(jti),
            }),
            Ok(None) => {
                debug!(principal_id = subject, jti, "refresh record not found");
                Err(RevocationError::Revoked)
            }
            Err(err) => {
                warn!(principal_id = subject, jti, error = %err, "revocation lookup failed; treating token as revoked");
                Err(RevocationError::Revoked)
            }
        }
    }
}

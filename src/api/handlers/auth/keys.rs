//! Signing key material for both token families, loaded once at startup.
//!
//! Access tokens are signed with an RSA private key (RS256). The matching public key is
//! published as a JWK set so other services, or this one, can verify without the private half.
//! Refresh tokens are signed with a shared HMAC secret (HS256) that never leaves the process.

use base64ct::{Base64UrlUnpadded, Encoding};
use jsonwebtoken::{DecodingKey, EncodingKey};
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey, EncodeRsaPrivateKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Debug, Error)]
pub enum KeyMaterialError {
    #[error("private key could not be parsed as PKCS#8 or PKCS#1 RSA")]
    PrivateKey,
    #[error("public key could not be parsed as SPKI or PKCS#1 RSA")]
    PublicKey,
    #[error("configured public key does not match the private key")]
    KeyMismatch,
    #[error("refresh token secret is empty")]
    MissingSecret,
    #[error("failed to re-encode private key: {0}")]
    Encode(#[from] rsa::pkcs1::Error),
    #[error("invalid key for token signing: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct Jwks {
    pub keys: Vec<Jwk>,
}

impl Jwks {
    /// Key matching `kid`; without a `kid` the set must hold exactly one key.
    #[must_use]
    pub fn select(&self, kid: Option<&str>) -> Option<&Jwk> {
        match kid {
            Some(kid) => self.keys.iter().find(|key| key.kid.as_deref() == Some(kid)),
            None if self.keys.len() == 1 => self.keys.first(),
            None => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct Jwk {
    pub kty: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    #[serde(rename = "use", skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    pub n: String,
    pub e: String,
}

impl Jwk {
    #[must_use]
    pub fn from_rsa_public_key(public_key: &RsaPublicKey, kid: Option<String>) -> Self {
        Self {
            kty: "RSA".to_string(),
            alg: Some("RS256".to_string()),
            key_use: Some("sig".to_string()),
            kid,
            n: Base64UrlUnpadded::encode_string(&public_key.n().to_bytes_be()),
            e: Base64UrlUnpadded::encode_string(&public_key.e().to_bytes_be()),
        }
    }

    /// Only RSA signing keys are usable for access tokens.
    #[must_use]
    pub fn is_rs256_signing_key(&self) -> bool {
        self.kty == "RSA"
            && self.alg.as_deref().map_or(true, |alg| alg == "RS256")
            && self.key_use.as_deref().map_or(true, |key_use| key_use == "sig")
    }

    /// # Errors
    /// Returns an error if `n` or `e` are not valid base64url.
    pub fn decoding_key(&self) -> Result<DecodingKey, KeyMaterialError> {
        Ok(DecodingKey::from_rsa_components(&self.n, &self.e)?)
    }
}

pub struct SigningKeyMaterial {
    access_signing: EncodingKey,
    access_public: RsaPublicKey,
    key_id: Option<String>,
    refresh_signing: EncodingKey,
    refresh_verification: DecodingKey,
}

impl SigningKeyMaterial {
    /// Build key material from PEM (or DER) inputs.
    ///
    /// The public key is derived from the private key; when one is supplied it must match.
    ///
    /// # Errors
    /// Returns an error if a key cannot be parsed, the keys disagree, or the secret is empty.
    pub fn new(
        private_key: &[u8],
        public_key: Option<&[u8]>,
        refresh_secret: &SecretString,
        key_id: Option<String>,
    ) -> Result<Self, KeyMaterialError> {
        let secret = refresh_secret.expose_secret();
        if secret.trim().is_empty() {
            return Err(KeyMaterialError::MissingSecret);
        }

        let private_key = decode_private_key(private_key)?;
        let derived = RsaPublicKey::from(&private_key);
        if let Some(configured) = public_key {
            if decode_public_key(configured)? != derived {
                return Err(KeyMaterialError::KeyMismatch);
            }
        }

        // jsonwebtoken only takes PKCS#1 DER for RSA, whatever the input encoding was.
        let pkcs1 = private_key.to_pkcs1_der()?;
        let access_signing = EncodingKey::from_rsa_der(pkcs1.as_bytes());

        Ok(Self {
            access_signing,
            access_public: derived,
            key_id: key_id.filter(|kid| !kid.trim().is_empty()),
            refresh_signing: EncodingKey::from_secret(secret.as_bytes()),
            refresh_verification: DecodingKey::from_secret(secret.as_bytes()),
        })
    }

    #[must_use]
    pub fn access_signing_key(&self) -> &EncodingKey {
        &self.access_signing
    }

    #[must_use]
    pub fn refresh_signing_key(&self) -> &EncodingKey {
        &self.refresh_signing
    }

    #[must_use]
    pub fn refresh_verification_key(&self) -> &DecodingKey {
        &self.refresh_verification
    }

    #[must_use]
    pub fn key_id(&self) -> Option<&str> {
        self.key_id.as_deref()
    }

    #[must_use]
    pub fn public_jwk(&self) -> Jwk {
        Jwk::from_rsa_public_key(&self.access_public, self.key_id.clone())
    }

    #[must_use]
    pub fn jwks(&self) -> Jwks {
        Jwks {
            keys: vec![self.public_jwk()],
        }
    }

    /// # Errors
    /// Returns an error if the public components cannot be turned into a verification key.
    pub fn access_verification_key(&self) -> Result<DecodingKey, KeyMaterialError> {
        self.public_jwk().decoding_key()
    }
}

impl fmt::Debug for SigningKeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKeyMaterial")
            .field("key_id", &self.key_id)
            .field("access_signing", &"***")
            .field("refresh_secret", &"***")
            .finish_non_exhaustive()
    }
}

fn decode_private_key(pem_or_der: &[u8]) -> Result<RsaPrivateKey, KeyMaterialError> {
    if pem_or_der.starts_with(b"-----BEGIN") {
        let pem = std::str::from_utf8(pem_or_der).map_err(|_| KeyMaterialError::PrivateKey)?;
        return RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
            .map_err(|_| KeyMaterialError::PrivateKey);
    }
    RsaPrivateKey::from_pkcs8_der(pem_or_der)
        .or_else(|_| RsaPrivateKey::from_pkcs1_der(pem_or_der))
        .map_err(|_| KeyMaterialError::PrivateKey)
}

fn decode_public_key(pem_or_der: &[u8]) -> Result<RsaPublicKey, KeyMaterialError> {
    if pem_or_der.starts_with(b"-----BEGIN") {
        let pem = std::str::from_utf8(pem_or_der).map_err(|_| KeyMaterialError::PublicKey)?;
        return RsaPublicKey::from_public_key_pem(pem)
            .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
            .map_err(|_| KeyMaterialError::PublicKey);
    }
    RsaPublicKey::from_public_key_der(pem_or_der)
        .or_else(|_| RsaPublicKey::from_pkcs1_der(pem_or_der))
        .map_err(|_| KeyMaterialError::PublicKey)
}

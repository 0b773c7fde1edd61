//! bcrypt hashing, run on the blocking pool so request tasks never stall on it.

use std::sync::Arc;
use thiserror::Error;
use tokio::{sync::OnceCell, task};

pub const DEFAULT_COST: u32 = 10;

// Compared against when no principal matches, so both login failures cost one bcrypt verify.
const ABSENT_PRINCIPAL_PASSWORD: &str = "absent-principal-placeholder";

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("bcrypt failure: {0}")]
    Bcrypt(#[from] bcrypt::BcryptError),
    #[error("password task failed: {0}")]
    Join(#[from] task::JoinError),
}

#[derive(Debug, Clone)]
pub struct PasswordHasher {
    cost: u32,
    absent_hash: Arc<OnceCell<String>>,
}

impl PasswordHasher {
    #[must_use]
    pub fn new() -> Self {
        Self::with_cost(DEFAULT_COST)
    }

    #[must_use]
    pub fn with_cost(cost: u32) -> Self {
        Self {
            cost,
            absent_hash: Arc::new(OnceCell::new()),
        }
    }

    #[must_use]
    pub const fn cost(&self) -> u32 {
        self.cost
    }

    /// Salted one-way hash of `plaintext`.
    ///
    /// # Errors
    /// Returns an error if bcrypt fails or the blocking task panics.
    pub async fn hash(&self, plaintext: &str) -> Result<String, PasswordError> {
        let plaintext = plaintext.to_string();
        let cost = self.cost;
        let hashed = task::spawn_blocking(move || bcrypt::hash(plaintext, cost)).await??;
        Ok(hashed)
    }

    /// Compare `plaintext` with a stored bcrypt hash using bcrypt's own verify.
    ///
    /// # Errors
    /// Returns an error if the stored hash is malformed or the blocking task panics.
    pub async fn compare(&self, hashed: &str, plaintext: &str) -> Result<bool, PasswordError> {
        let hashed = hashed.to_string();
        let plaintext = plaintext.to_string();
        let matches = task::spawn_blocking(move || bcrypt::verify(plaintext, &hashed)).await??;
        Ok(matches)
    }

    /// Build the placeholder hash used by [`Self::compare_absent`].
    ///
    /// Run at startup so the first unknown-email login does not pay for a hash on top of the verify.
    ///
    /// # Errors
    /// Returns an error if bcrypt fails or the blocking task panics.
    pub async fn warm_up(&self) -> Result<(), PasswordError> {
        self.placeholder().await.map(|_| ())
    }

    /// Spend one verify against a placeholder hash. Always yields `false`.
    ///
    /// # Errors
    /// Returns an error if the placeholder hash cannot be built.
    pub async fn compare_absent(&self, plaintext: &str) -> Result<bool, PasswordError> {
        let placeholder = self.placeholder().await?;
        self.compare(placeholder, plaintext).await?;
        Ok(false)
    }

    async fn placeholder(&self) -> Result<&String, PasswordError> {
        self.absent_hash
            .get_or_try_init(|| self.hash(ABSENT_PRINCIPAL_PASSWORD))
            .await
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new()
    }
}

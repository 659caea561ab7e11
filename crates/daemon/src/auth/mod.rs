//! Authentication: the shared-password verifier and the token store.

pub mod credentials;
pub mod tokens;

use std::sync::Arc;
use std::time::Duration;

pub use credentials::{BcryptError, PasswordVerifier, DEFAULT_COST};
pub use tokens::TokenStore;

/// Login and token checks used by the HTTP layer.
#[derive(Debug)]
pub struct AuthService {
    verifier: PasswordVerifier,
    tokens: Arc<TokenStore>,
    token_ttl: Duration,
}

impl AuthService {
    /// Creates a service for `password` issuing tokens valid for `token_ttl`.
    pub fn new(password: &str, token_ttl: Duration) -> Result<Self, BcryptError> {
        Self::with_cost(password, token_ttl, DEFAULT_COST)
    }

    /// Like [`new`](Self::new) with an explicit bcrypt cost.
    pub fn with_cost(password: &str, token_ttl: Duration, cost: u32) -> Result<Self, BcryptError> {
        Ok(Self {
            verifier: PasswordVerifier::with_cost(password, cost)?,
            tokens: Arc::new(TokenStore::new()),
            token_ttl,
        })
    }

    /// Checks the password and issues a token on success.
    pub fn login(&self, password: &str) -> Option<String> {
        if !self.verifier.verify(password) {
            tracing::warn!("Login rejected: invalid password");
            return None;
        }
        let token = self.tokens.issue(self.token_ttl);
        tracing::info!(active_tokens = self.tokens.len(), "Login succeeded");
        Some(token)
    }

    /// Revokes a token.
    pub fn logout(&self, token: &str) {
        if self.tokens.revoke(token) {
            tracing::info!("Token revoked");
        }
    }

    /// Returns whether `token` is currently valid.
    pub fn validate(&self, token: &str) -> bool {
        self.tokens.validate(token)
    }

    /// Returns the token lifetime.
    pub fn token_ttl(&self) -> Duration {
        self.token_ttl
    }

    /// Returns the underlying token store.
    pub fn tokens(&self) -> &Arc<TokenStore> {
        &self.tokens
    }
}

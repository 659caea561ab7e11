//! Ephemeral access tokens.
//!
//! Tokens are 256-bit random values, hex encoded, mapped to an absolute
//! expiry. Expired entries are treated as absent on validation and evicted
//! by a periodic sweep.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use rand::RngCore;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Token entropy in bytes.
const TOKEN_BYTES: usize = 32;

/// Concurrent map of issued tokens to their expiry.
#[derive(Debug, Default)]
pub struct TokenStore {
    tokens: DashMap<String, Instant>,
}

impl TokenStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a fresh token valid for `ttl`.
    pub fn issue(&self, ttl: Duration) -> String {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        let token = hex::encode(bytes);
        self.tokens.insert(token.clone(), Instant::now() + ttl);
        token
    }

    /// Returns whether `token` was issued and has not expired.
    ///
    /// Validation never extends the expiry.
    pub fn validate(&self, token: &str) -> bool {
        self.tokens
            .get(token)
            .map(|expiry| Instant::now() < *expiry)
            .unwrap_or(false)
    }

    /// Removes a token. Returns whether it was present.
    pub fn revoke(&self, token: &str) -> bool {
        self.tokens.remove(token).is_some()
    }

    /// Evicts every expired token. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.tokens.len();
        self.tokens.retain(|_, expiry| now < *expiry);
        before.saturating_sub(self.tokens.len())
    }

    /// Returns the number of stored tokens, expired or not.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Returns whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Runs [`sweep`](Self::sweep) every `interval` until `shutdown` fires.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        tracing::debug!("Token sweeper stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let evicted = store.sweep();
                        if evicted > 0 {
                            tracing::debug!(
                                evicted,
                                remaining = store.len(),
                                "Swept expired tokens"
                            );
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    #[test]
    fn test_issued_tokens_are_unique_hex() {
        let store = TokenStore::new();
        let a = store.issue(TTL);
        let b = store.issue(TTL);
        assert_ne!(a, b);
        assert_eq!(a.len(), TOKEN_BYTES * 2);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(store.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_token_expires_at_ttl() {
        let store = TokenStore::new();
        let token = store.issue(TTL);
        assert!(store.validate(&token));

        tokio::time::advance(TTL - Duration::from_millis(1)).await;
        assert!(store.validate(&token));

        tokio::time::advance(Duration::from_millis(2)).await;
        assert!(!store.validate(&token));

        // Lazily treated as absent, but still counted until swept.
        assert_eq!(store.len(), 1);
        assert_eq!(store.sweep(), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_unknown_token_is_invalid() {
        let store = TokenStore::new();
        assert!(!store.validate("deadbeef"));
        assert!(!store.validate(""));
    }

    #[test]
    fn test_revoke() {
        let store = TokenStore::new();
        let token = store.issue(TTL);
        assert!(store.revoke(&token));
        assert!(!store.validate(&token));
        assert!(!store.revoke(&token));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_keeps_live_tokens() {
        let store = TokenStore::new();
        let short = store.issue(Duration::from_secs(1));
        let long = store.issue(Duration::from_secs(100));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(store.sweep(), 1);
        assert!(!store.validate(&short));
        assert!(store.validate(&long));
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_sweeper_evicts_and_stops() {
        let store = Arc::new(TokenStore::new());
        store.issue(Duration::from_secs(5));

        let shutdown = CancellationToken::new();
        let handle = store.spawn_sweeper(Duration::from_secs(10), shutdown.clone());

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert!(store.is_empty());

        shutdown.cancel();
        handle.await.unwrap();
    }
}

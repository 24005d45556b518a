//! Session lifecycle and credential hashing
//!
//! Bearer tokens are random 256-bit values handed out at login; only their
//! SHA-256 hash is persisted. The [`SessionManager`] also owns the
//! per-session realtime aggregators: logging in tears down any previous
//! session of the same user before the new one is established, and logging
//! out shuts the session's aggregator down before returning. Zero
//! aggregators exist for unauthenticated users by construction.

use rand::RngCore;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use lc_common::access::SessionIdentity;
use lc_common::models::UserProfile;
use lc_common::{Error, Result};

use crate::db::Store;
use crate::realtime::{self, RealtimeHandle, SessionSlices};

// ========================================
// Credential hashing (pure)
// ========================================

/// Random 256-bit value as 64 hex characters
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex_encode(&bytes)
}

/// Random 128-bit password salt as 32 hex characters
pub fn generate_salt() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex_encode(&bytes)
}

/// SHA-256 of a bearer token, the only form stored server-side
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// SHA-256 of salt + password
pub fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

// ========================================
// Session manager
// ========================================

fn identity_of(profile: &UserProfile) -> SessionIdentity {
    SessionIdentity {
        user_id: profile.user_id,
        role: profile.role,
        team_id: profile.team_id,
    }
}

/// Issues, resolves and revokes sessions, and owns their aggregators
#[derive(Clone)]
pub struct SessionManager {
    store: Store,
    active: Arc<Mutex<HashMap<String, RealtimeHandle>>>,
}

impl SessionManager {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            active: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Start a session for a user whose credentials already checked out
    ///
    /// Any previous session of the same user is fully torn down (store row
    /// removed, aggregator shut down) before the new session exists, so
    /// snapshot state can never leak across sessions.
    pub async fn login(&self, profile: &UserProfile) -> Result<String> {
        let stale = self.store.delete_sessions_for_user(profile.user_id).await?;
        for token_hash in stale {
            self.teardown(&token_hash).await;
        }

        let token = generate_token();
        let token_hash = hash_token(&token);
        self.store.insert_session(&token_hash, profile.user_id).await?;

        let handle = realtime::spawn(
            identity_of(profile),
            Arc::new(self.store.clone()),
            self.store.bus(),
        );
        self.active.lock().await.insert(token_hash, handle);

        debug!(user_id = %profile.user_id, "Session established");
        Ok(token)
    }

    /// Resolve a bearer token to a fresh identity
    ///
    /// The identity is re-read from the store on every call, so role or
    /// team changes take effect on the next request without re-login. An
    /// aggregator is (re)established if missing, which covers sessions
    /// persisted across a server restart.
    pub async fn authenticate(&self, token: &str) -> Result<Option<SessionIdentity>> {
        let token_hash = hash_token(token);

        let Some(user_id) = self.store.session_user(&token_hash).await? else {
            return Ok(None);
        };

        let Some(profile) = self.store.profile(user_id).await? else {
            // User deleted while the session row survived; revoke it
            self.store.delete_session(&token_hash).await?;
            self.teardown(&token_hash).await;
            return Ok(None);
        };

        let identity = identity_of(&profile);

        let mut active = self.active.lock().await;
        if !active.contains_key(&token_hash) {
            let handle = realtime::spawn(
                identity.clone(),
                Arc::new(self.store.clone()),
                self.store.bus(),
            );
            active.insert(token_hash, handle);
        }

        Ok(Some(identity))
    }

    /// Read-only view of the slices for a live session
    pub async fn slices(&self, token: &str) -> Option<tokio::sync::watch::Receiver<SessionSlices>> {
        let token_hash = hash_token(token);
        self.active
            .lock()
            .await
            .get(&token_hash)
            .map(|handle| handle.slices())
    }

    /// End a session: revoke the token and tear the aggregator down
    ///
    /// Returns once the aggregator has fully stopped; no slice mutation is
    /// observable afterwards.
    pub async fn logout(&self, token: &str) -> Result<()> {
        let token_hash = hash_token(token);
        self.store.delete_session(&token_hash).await?;
        self.teardown(&token_hash).await;
        debug!("Session ended");
        Ok(())
    }

    /// Revoke every session of one user (admin user deletion)
    pub async fn revoke_user(&self, user_id: Uuid) -> Result<()> {
        let stale = self.store.delete_sessions_for_user(user_id).await?;
        for token_hash in stale {
            self.teardown(&token_hash).await;
        }
        Ok(())
    }

    async fn teardown(&self, token_hash: &str) {
        let handle = self.active.lock().await.remove(token_hash);
        if let Some(handle) = handle {
            handle.shutdown().await;
        }
    }

    /// Number of live aggregators (test observability)
    pub async fn active_sessions(&self) -> usize {
        self.active.lock().await.len()
    }
}

/// Verify a password against stored salt + hash
pub fn verify_password(salt: &str, expected_hash: &str, password: &str) -> Result<()> {
    if hash_password(salt, password) == expected_hash {
        Ok(())
    } else {
        Err(Error::Unauthorized("Invalid credentials".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_is_64_hex_chars_and_unique() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_token_hash_is_stable() {
        let token = generate_token();
        assert_eq!(hash_token(&token), hash_token(&token));
        assert_ne!(hash_token(&token), token);
    }

    #[test]
    fn test_password_verification() {
        let salt = generate_salt();
        let hash = hash_password(&salt, "correct horse");

        assert!(verify_password(&salt, &hash, "correct horse").is_ok());
        assert!(verify_password(&salt, &hash, "wrong").is_err());

        // Same password, different salt, different hash
        let other_salt = generate_salt();
        assert_ne!(hash_password(&other_salt, "correct horse"), hash);
    }
}

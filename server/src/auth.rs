use crate::errors::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

const TOKEN_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

/// Session state bound to an active bearer token.
#[derive(Debug, Clone, Serialize)]
pub struct TokenMeta {
    pub username: String,
    pub role: Role,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

struct UserRecord {
    role: Role,
    salt: [u8; 16],
    digest: [u8; 32],
}

/// Issues, validates, and revokes opaque bearer tokens.
///
/// Passwords are stored as salted SHA-256 digests; tokens live in a
/// mutex-guarded active set and are lazily evicted once expired. The lock
/// is never held across an await point.
pub struct AuthGate {
    users: HashMap<String, UserRecord>,
    /// Stand-in credential checked on the unknown-user path so login does
    /// the same hashing work whether or not the username exists. Its
    /// digest is random, never derived from a password.
    decoy: UserRecord,
    tokens: Mutex<HashMap<String, TokenMeta>>,
    ttl: Duration,
}

impl AuthGate {
    /// Gate seeded with the built-in operator accounts.
    pub fn new() -> Self {
        Self::with_ttl(Duration::hours(TOKEN_TTL_HOURS))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        let mut users = HashMap::new();
        users.insert("admin".to_string(), make_user(Role::Admin, "admin123"));
        users.insert("user".to_string(), make_user(Role::User, "user123"));

        let mut decoy = make_user(Role::User, "");
        rand::thread_rng().fill_bytes(&mut decoy.digest);

        Self {
            users,
            decoy,
            tokens: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Verifies credentials and issues a fresh token.
    ///
    /// Unknown usernames and wrong passwords produce the identical error so
    /// callers learn nothing about which half failed.
    pub fn login(&self, username: &str, password: &str) -> Result<(String, TokenMeta)> {
        // Hash against the decoy when the username is unknown so both
        // rejection paths do the same work.
        let user = self.users.get(username);
        let candidate = user.unwrap_or(&self.decoy);

        if hash_password(&candidate.salt, password) != candidate.digest {
            warn!(username, "login rejected");
            return Err(Error::InvalidCredentials);
        }
        let user = user.ok_or(Error::InvalidCredentials)?;

        let issued_at = Utc::now();
        let meta = TokenMeta {
            username: username.to_string(),
            role: user.role,
            issued_at,
            expires_at: issued_at + self.ttl,
        };
        let token = Uuid::new_v4().to_string();

        self.tokens
            .lock()
            .expect("token lock poisoned")
            .insert(token.clone(), meta.clone());

        info!(username, "token issued");
        Ok((token, meta))
    }

    /// Fails closed: unknown, revoked, and expired tokens are all rejected
    /// with the same error. Expired tokens are evicted on first detection.
    pub fn validate(&self, token: &str, required_role: Option<Role>) -> Result<TokenMeta> {
        let mut tokens = self.tokens.lock().expect("token lock poisoned");

        let meta = match tokens.get(token) {
            Some(meta) => meta.clone(),
            None => return Err(Error::NotAuthorized),
        };

        if Utc::now() > meta.expires_at {
            tokens.remove(token);
            warn!(username = %meta.username, "expired token evicted");
            return Err(Error::NotAuthorized);
        }

        if let Some(required) = required_role {
            if meta.role != required {
                warn!(username = %meta.username, "insufficient role");
                return Err(Error::NotAuthorized);
            }
        }

        Ok(meta)
    }

    /// Removes the token from the active set; no-op if already gone.
    pub fn logout(&self, token: &str) -> bool {
        let removed = self
            .tokens
            .lock()
            .expect("token lock poisoned")
            .remove(token)
            .is_some();
        if removed {
            info!("token revoked");
        }
        removed
    }
}

fn make_user(role: Role, password: &str) -> UserRecord {
    let mut salt = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);
    let digest = hash_password(&salt, password);
    UserRecord { role, salt, digest }
}

fn hash_password(salt: &[u8], password: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_and_validate() {
        let gate = AuthGate::new();
        let (token, meta) = gate.login("admin", "admin123").unwrap();
        assert_eq!(meta.role, Role::Admin);

        let validated = gate.validate(&token, Some(Role::Admin)).unwrap();
        assert_eq!(validated.username, "admin");
    }

    #[test]
    fn test_wrong_password_and_unknown_user_same_error() {
        let gate = AuthGate::new();
        let wrong_password = gate.login("admin", "nope").unwrap_err();
        let unknown_user = gate.login("nobody", "admin123").unwrap_err();
        assert!(matches!(wrong_password, Error::InvalidCredentials));
        assert!(matches!(unknown_user, Error::InvalidCredentials));
    }

    #[test]
    fn test_unknown_user_never_matches_decoy() {
        let gate = AuthGate::new();
        // The decoy credential's digest is random, so no guess can satisfy
        // the unknown-user comparison, including the empty password.
        assert!(matches!(
            gate.login("nobody", ""),
            Err(Error::InvalidCredentials)
        ));
        assert!(matches!(
            gate.login("", "admin123"),
            Err(Error::InvalidCredentials)
        ));
    }

    #[test]
    fn test_role_mismatch_rejected() {
        let gate = AuthGate::new();
        let (token, _) = gate.login("user", "user123").unwrap();
        assert!(gate.validate(&token, None).is_ok());
        assert!(matches!(
            gate.validate(&token, Some(Role::Admin)),
            Err(Error::NotAuthorized)
        ));
    }

    #[test]
    fn test_logout_revokes_and_is_idempotent() {
        let gate = AuthGate::new();
        let (token, _) = gate.login("admin", "admin123").unwrap();
        assert!(gate.validate(&token, None).is_ok());

        assert!(gate.logout(&token));
        assert!(matches!(
            gate.validate(&token, None),
            Err(Error::NotAuthorized)
        ));
        // Second logout is a no-op.
        assert!(!gate.logout(&token));
    }

    #[test]
    fn test_expired_token_evicted() {
        let gate = AuthGate::with_ttl(Duration::seconds(-1));
        let (token, _) = gate.login("admin", "admin123").unwrap();

        assert!(matches!(
            gate.validate(&token, None),
            Err(Error::NotAuthorized)
        ));
        // Eviction happened on first detection.
        assert!(!gate.logout(&token));
    }

    #[test]
    fn test_unknown_token_rejected() {
        let gate = AuthGate::new();
        assert!(matches!(
            gate.validate("not-a-token", None),
            Err(Error::NotAuthorized)
        ));
    }
}

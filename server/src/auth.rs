use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use sha2::{Digest, Sha256};
use uuid::Uuid;

pub const TOKEN_TTL: Duration = Duration::from_secs(60 * 60);

pub fn new_salt() -> String {
    Uuid::new_v4().simple().to_string()
}

pub fn hash_password(password: &str, salt: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    hasher.finalize().to_vec()
}

pub fn verify_password(password: &str, salt: &str, digest: &[u8]) -> bool {
    hash_password(password, salt) == digest
}

struct TokenEntry {
    username: String,
    expires_at: SystemTime,
}

/// Opaque bearer tokens with a fixed TTL. Tokens live only in memory; a
/// restart logs everyone out.
#[derive(Default)]
pub struct TokenStore {
    tokens: HashMap<String, TokenEntry>,
}

impl TokenStore {
    pub fn issue(&mut self, username: &str) -> String {
        self.issue_at(username, SystemTime::now())
    }

    /// Returns the username the token belongs to, dropping it if expired.
    pub fn authorize(&mut self, token: &str) -> Option<String> {
        self.authorize_at(token, SystemTime::now())
    }

    fn issue_at(&mut self, username: &str, now: SystemTime) -> String {
        let token = Uuid::new_v4().simple().to_string();
        self.tokens.insert(
            token.clone(),
            TokenEntry {
                username: username.to_string(),
                expires_at: now + TOKEN_TTL,
            },
        );
        token
    }

    fn authorize_at(&mut self, token: &str, now: SystemTime) -> Option<String> {
        let entry = self.tokens.get(token)?;
        if entry.expires_at <= now {
            self.tokens.remove(token);
            return None;
        }
        Some(self.tokens[token].username.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_depends_on_salt_and_password() {
        let digest = hash_password("hunter2", "salt-a");
        assert!(verify_password("hunter2", "salt-a", &digest));
        assert!(!verify_password("hunter2", "salt-b", &digest));
        assert!(!verify_password("hunter3", "salt-a", &digest));
    }

    #[test]
    fn issued_tokens_authorize_their_user() {
        let mut tokens = TokenStore::default();
        let token = tokens.issue("ada");
        assert_eq!(tokens.authorize(&token), Some("ada".to_string()));
        assert_eq!(tokens.authorize("bogus"), None);
    }

    #[test]
    fn expired_tokens_are_dropped() {
        let mut tokens = TokenStore::default();
        let now = SystemTime::now();
        let token = tokens.issue_at("ada", now);
        let later = now + TOKEN_TTL + Duration::from_secs(1);
        assert_eq!(tokens.authorize_at(&token, later), None);
        // Gone for good, even if the clock rolls back.
        assert_eq!(tokens.authorize_at(&token, now), None);
    }
}

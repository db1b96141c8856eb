use std::collections::HashMap;
use std::num::NonZeroU32;
use std::path::Path;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};

use super::AuthError;

/// Hash a password using argon2id with a random salt, in PHC string form.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Username to argon2 hash map read from `users.json`.
pub struct StaticCredentials {
    users: HashMap<String, String>,
    // Verified against for unknown usernames so the response time is the same.
    dummy_hash: String,
}

impl StaticCredentials {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, AuthError> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|e| {
            AuthError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        let users: HashMap<String, String> = serde_json::from_str(&data).map_err(|e| {
            AuthError::Config(format!("failed to parse {}: {e}", path.display()))
        })?;

        let credentials = Self::from_users(users)?;
        tracing::info!(users = credentials.users.len(), "Loaded static credentials");
        Ok(credentials)
    }

    pub fn from_users(users: HashMap<String, String>) -> Result<Self, AuthError> {
        if users.is_empty() {
            return Err(AuthError::Config("no users configured".into()));
        }
        let dummy_hash =
            hash_password("linkdrop-dummy").map_err(|e| AuthError::Config(e.to_string()))?;
        Ok(Self { users, dummy_hash })
    }

    /// Check a username and password. Exactly one hash verification runs whether
    /// or not the user exists.
    pub fn verify(&self, username: &str, password: &str) -> bool {
        match self.users.get(username) {
            Some(hash) => {
                let ok = verify_password(password, hash);
                if !ok {
                    tracing::warn!(username, "Password mismatch");
                }
                ok
            }
            None => {
                verify_password(password, &self.dummy_hash);
                tracing::warn!(username, "Unknown user");
                false
            }
        }
    }
}

/// Process-wide throttle on static login attempts.
pub struct LoginLimiter {
    limiter: DefaultDirectRateLimiter,
}

impl LoginLimiter {
    pub fn per_second(attempts: u32) -> Self {
        let attempts = NonZeroU32::new(attempts).unwrap_or(NonZeroU32::MIN);
        Self {
            limiter: RateLimiter::direct(Quota::per_second(attempts)),
        }
    }

    pub fn check(&self) -> Result<(), AuthError> {
        self.limiter.check().map_err(|_| AuthError::RateLimited)
    }
}

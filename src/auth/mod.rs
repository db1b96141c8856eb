//! Admin authentication: cookie sessions, static credentials and Google sign-in.

mod google;
mod session;
mod static_auth;

use std::sync::Arc;

use async_trait::async_trait;
use axum_extra::extract::CookieJar;
use thiserror::Error;

use crate::clock::TokenSource;
use crate::config::{AuthType, Config};
use crate::storage::DatabaseError;

pub use google::GoogleProvider;
pub use session::{require_admin, SessionGate};
pub use static_auth::{hash_password, LoginLimiter, StaticCredentials};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Too many login attempts")]
    RateLimited,
    #[error("Invalid OAuth state")]
    InvalidState,
    #[error("Access denied: {0}")]
    Forbidden(String),
    #[error("Identity provider error: {0}")]
    Provider(String),
    #[error("Auth configuration error: {0}")]
    Config(String),
    #[error("Storage error: {0}")]
    Storage(#[from] DatabaseError),
}

impl From<reqwest::Error> for AuthError {
    fn from(e: reqwest::Error) -> Self {
        AuthError::Provider(e.to_string())
    }
}

/// An authenticated person, as reported by an identity provider.
#[derive(Debug, Clone)]
pub struct Identity {
    pub email: String,
}

/// External sign-in flow. The result only decides whether a session is issued.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Begin sign-in: returns the jar carrying any anti-forgery state and the URL
    /// to send the browser to.
    fn redirect(&self, jar: CookieJar) -> Result<(CookieJar, String), AuthError>;

    /// Finish sign-in from the provider's callback parameters.
    async fn callback(
        &self,
        jar: CookieJar,
        code: &str,
        state: &str,
    ) -> Result<(CookieJar, Identity), AuthError>;
}

/// How admins sign in, chosen by `AUTH_TYPE`.
pub enum LoginMethod {
    Static {
        credentials: StaticCredentials,
        limiter: LoginLimiter,
    },
    Provider(Box<dyn IdentityProvider>),
}

impl LoginMethod {
    pub fn from_config(config: &Config, tokens: Arc<dyn TokenSource>) -> Result<Self, AuthError> {
        match config.auth.auth_type {
            AuthType::Static => Ok(LoginMethod::Static {
                credentials: StaticCredentials::load(&config.auth.static_users_path)?,
                limiter: LoginLimiter::per_second(config.auth.login_rate_limit),
            }),
            AuthType::Google => {
                let provider = GoogleProvider::new(
                    config.auth.google.clone(),
                    tokens,
                    config.session.cookie.secure,
                )?;
                Ok(LoginMethod::Provider(Box::new(provider)))
            }
        }
    }
}

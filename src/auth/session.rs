use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::{Cookie, SameSite};
use axum_extra::extract::CookieJar;
use cookie::time::Duration as CookieDuration;

use super::AuthError;
use crate::clock::{Clock, TokenSource, TOKEN_LENGTH};
use crate::config::{SameSitePolicy, SessionConfig};
use crate::storage::Database;
use crate::AppState;

/// Issues, checks and revokes admin sessions carried in a cookie.
pub struct SessionGate {
    db: Database,
    clock: Arc<dyn Clock>,
    tokens: Arc<dyn TokenSource>,
    config: SessionConfig,
}

impl SessionGate {
    pub fn new(
        db: Database,
        clock: Arc<dyn Clock>,
        tokens: Arc<dyn TokenSource>,
        config: SessionConfig,
    ) -> Self {
        Self {
            db,
            clock,
            tokens,
            config,
        }
    }

    /// Store a new session and attach its cookie. The expiry is fixed here and
    /// never extended.
    pub fn create(&self, jar: CookieJar) -> Result<CookieJar, AuthError> {
        let now = self.clock.now();
        let lifetime = chrono::Duration::from_std(self.config.lifetime)
            .map_err(|e| AuthError::Config(format!("session lifetime: {e}")))?;

        let expires_at = now
            .checked_add_signed(lifetime)
            .ok_or_else(|| AuthError::Config("session lifetime is out of range".into()))?;

        let id = self.tokens.token(TOKEN_LENGTH);
        let session = self.db.create_session(&id, now, expires_at)?;
        tracing::debug!(expires_at = %session.expires_at, "Created admin session");

        let cookie = Cookie::build((self.config.cookie.name.clone(), id))
            .path(self.config.cookie.path.clone())
            .http_only(true)
            .secure(self.config.cookie.secure)
            .same_site(same_site(self.config.cookie.same_site))
            .max_age(CookieDuration::seconds(lifetime.num_seconds()))
            .build();
        Ok(jar.add(cookie))
    }

    /// True when the jar carries a live session. Expired sessions are removed
    /// as they are found.
    pub fn validate(&self, jar: &CookieJar) -> Result<bool, AuthError> {
        let Some(cookie) = jar.get(&self.config.cookie.name) else {
            return Ok(false);
        };
        let id = cookie.value();
        if id.is_empty() {
            return Ok(false);
        }

        match self.db.get_session(id)? {
            Some(session) if session.is_expired(self.clock.now()) => {
                self.db.delete_session(id)?;
                tracing::debug!("Removed expired admin session");
                Ok(false)
            }
            Some(_) => Ok(true),
            None => Ok(false),
        }
    }

    /// Delete the session, if any, and expire the cookie. Safe to call without one.
    pub fn destroy(&self, jar: CookieJar) -> Result<CookieJar, AuthError> {
        if let Some(cookie) = jar.get(&self.config.cookie.name) {
            if !cookie.value().is_empty() {
                self.db.delete_session(cookie.value())?;
            }
        }

        Ok(jar.remove(
            Cookie::build((self.config.cookie.name.clone(), ""))
                .path(self.config.cookie.path.clone())
                .build(),
        ))
    }
}

fn same_site(policy: SameSitePolicy) -> SameSite {
    match policy {
        SameSitePolicy::Lax => SameSite::Lax,
        SameSitePolicy::Strict => SameSite::Strict,
        SameSitePolicy::None => SameSite::None,
    }
}

/// Gate for everything under `/admin`. Reads without a session are sent back to
/// the landing page; anything else is refused.
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    req: Request,
    next: Next,
) -> Response {
    match state.sessions.validate(&jar) {
        Ok(true) => next.run(req).await,
        Ok(false) if req.method() == Method::GET => Redirect::to("/").into_response(),
        Ok(false) => (StatusCode::UNAUTHORIZED, "Unauthorized").into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to validate admin session");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
        }
    }
}

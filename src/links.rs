//! Business rules for upload and download links on top of the link tables.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::catalog::DirectoryCatalog;
use crate::clock::{Clock, TokenSource, TOKEN_LENGTH};
use crate::paths;
use crate::storage::{Database, DatabaseError, Link, LinkKind};

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("Invalid link: {0}")]
    Validation(String),
    #[error("No token provided")]
    TokenMissing,
    #[error("Token not found")]
    TokenNotFound,
    #[error("Token expired")]
    TokenExpired,
    #[error("Token exhausted")]
    TokenExhausted,
    #[error("Storage error: {0}")]
    Storage(#[from] DatabaseError),
}

impl LinkError {
    /// True for the failures an unauthenticated caller must not be able to tell apart.
    pub fn is_token_rejection(&self) -> bool {
        matches!(
            self,
            LinkError::TokenMissing
                | LinkError::TokenNotFound
                | LinkError::TokenExpired
                | LinkError::TokenExhausted
        )
    }
}

/// Link lifecycle for one [`LinkKind`].
pub struct LinkService {
    kind: LinkKind,
    db: Database,
    clock: Arc<dyn Clock>,
    tokens: Arc<dyn TokenSource>,
    catalog: Arc<DirectoryCatalog>,
}

impl LinkService {
    pub fn new(
        kind: LinkKind,
        db: Database,
        clock: Arc<dyn Clock>,
        tokens: Arc<dyn TokenSource>,
        catalog: Arc<DirectoryCatalog>,
    ) -> Self {
        Self {
            kind,
            db,
            clock,
            tokens,
            catalog,
        }
    }

    /// Mint a link for `directory`.
    ///
    /// The directory is reduced to a bare `[A-Za-z0-9_-]` name. Download links must
    /// point at a directory that already exists; upload directories are created on
    /// first use.
    pub fn create_link(
        &self,
        directory: &str,
        expires_at: DateTime<Utc>,
        remaining_uses: i64,
    ) -> Result<Link, LinkError> {
        if directory.is_empty() {
            return Err(LinkError::Validation("directory is required".into()));
        }
        let now = self.clock.now();
        if expires_at <= now {
            return Err(LinkError::Validation(
                "expiration must be in the future".into(),
            ));
        }
        if remaining_uses <= 0 {
            return Err(LinkError::Validation(
                "remaining uses must be greater than 0".into(),
            ));
        }
        let remaining_uses = u32::try_from(remaining_uses)
            .map_err(|_| LinkError::Validation("remaining uses is too large".into()))?;

        let directory = paths::sanitize_directory(directory)
            .ok_or_else(|| LinkError::Validation("invalid directory name".into()))?;

        if self.kind == LinkKind::Download && !self.catalog.directory_exists(&directory) {
            return Err(LinkError::Validation("directory does not exist".into()));
        }

        let token = self.tokens.token(TOKEN_LENGTH);
        let link = self
            .db
            .create_link(self.kind, &token, &directory, now, expires_at, remaining_uses)?;

        tracing::debug!(
            kind = ?self.kind,
            link_id = link.id,
            directory = %link.directory,
            remaining_uses,
            "Created link"
        );
        Ok(link)
    }

    /// Resolve a token to its link if it may be used right now.
    ///
    /// Read-only: no use is consumed. Expiry is checked before exhaustion, so an
    /// expired link always reports [`LinkError::TokenExpired`].
    pub fn validate_token(&self, token: &str) -> Result<Link, LinkError> {
        if token.is_empty() {
            return Err(LinkError::TokenMissing);
        }
        let link = self
            .db
            .get_link(self.kind, token)?
            .ok_or(LinkError::TokenNotFound)?;

        if link.is_expired(self.clock.now()) {
            return Err(LinkError::TokenExpired);
        }
        if link.is_exhausted() {
            return Err(LinkError::TokenExhausted);
        }
        Ok(link)
    }

    /// Atomically take one use. `Ok(false)` means the link was exhausted or expired
    /// by the time the update ran.
    pub fn consume(&self, token: &str) -> Result<bool, LinkError> {
        if token.is_empty() {
            return Err(LinkError::TokenMissing);
        }
        Ok(self.db.consume_link(self.kind, token, self.clock.now())?)
    }

    pub fn deactivate_link(&self, token: &str) -> Result<(), LinkError> {
        if token.is_empty() {
            return Err(LinkError::Validation("token is required".into()));
        }
        if !self.db.deactivate_link(self.kind, token)? {
            tracing::debug!(kind = ?self.kind, "Deactivate requested for unknown token");
        }
        Ok(())
    }

    pub fn delete_link(&self, token: &str) -> Result<(), LinkError> {
        if token.is_empty() {
            return Err(LinkError::Validation("token is required".into()));
        }
        if !self.db.delete_link(self.kind, token)? {
            tracing::debug!(kind = ?self.kind, "Delete requested for unknown token");
        }
        Ok(())
    }

    pub fn list_active(&self) -> Result<Vec<Link>, LinkError> {
        Ok(self.db.list_active_links(self.kind, self.clock.now())?)
    }
}

use chrono::{DateTime, Utc};
use redb::TableDefinition;
use serde::{Deserialize, Serialize};

use super::tables::{DOWNLOAD_LINKS, UPLOAD_LINKS};

/// The two link variants. They share a shape but live in disjoint tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    Upload,
    Download,
}

impl LinkKind {
    pub(crate) fn table(self) -> TableDefinition<'static, &'static str, &'static [u8]> {
        match self {
            LinkKind::Upload => UPLOAD_LINKS,
            LinkKind::Download => DOWNLOAD_LINKS,
        }
    }

    /// Name of the backing table, also the key of its id sequence.
    pub fn table_name(self) -> &'static str {
        match self {
            LinkKind::Upload => "upload_links",
            LinkKind::Download => "download_links",
        }
    }

    /// Caller-facing path for a token of this kind.
    pub fn url_for(self, token: &str) -> String {
        match self {
            LinkKind::Upload => format!("/upload/{token}"),
            LinkKind::Download => format!("/download/{token}"),
        }
    }
}

/// A token-backed grant to upload into or download from one directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub id: u64,
    pub token: String,
    pub directory: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub last_used_at: Option<DateTime<Utc>>,
    pub remaining_uses: u32,

    /// Caller-facing path, filled in on read and never persisted.
    #[serde(skip)]
    pub url: String,
}

impl Link {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining_uses == 0
    }

    /// Active iff uses remain and the expiry is still ahead.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.is_exhausted() && !self.is_expired(now)
    }
}

/// Server-side record behind an admin's session cookie.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

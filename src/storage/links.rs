use chrono::{DateTime, Utc};
use redb::ReadableTable;

use super::db::{Database, DatabaseError};
use super::models::{Link, LinkKind};
use super::tables::*;

impl Database {
    // ========================================================================
    // Link operations
    // ========================================================================

    /// Insert a new link. Business rules are the caller's job; this only persists,
    /// assigning the next surrogate id and refusing to overwrite an existing token.
    pub fn create_link(
        &self,
        kind: LinkKind,
        token: &str,
        directory: &str,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        remaining_uses: u32,
    ) -> Result<Link, DatabaseError> {
        debug_assert!(!token.is_empty(), "link token must not be empty");

        let write_txn = self.begin_write()?;
        let link = {
            let mut table = write_txn.open_table(kind.table())?;
            if table.get(token)?.is_some() {
                return Err(DatabaseError::Duplicate(format!(
                    "{} token already exists",
                    kind.table_name()
                )));
            }

            let mut ids = write_txn.open_table(LINK_IDS)?;
            let id = ids
                .get(kind.table_name())?
                .map(|v| v.value())
                .unwrap_or(0)
                + 1;
            ids.insert(kind.table_name(), id)?;

            let link = Link {
                id,
                token: token.to_string(),
                directory: directory.to_string(),
                created_at,
                expires_at,
                last_used_at: None,
                remaining_uses,
                url: kind.url_for(token),
            };
            let data = rmp_serde::to_vec_named(&link)?;
            table.insert(token, data.as_slice())?;
            link
        };
        write_txn.commit()?;
        Ok(link)
    }

    /// Exact lookup by token. Expired and exhausted links are returned as-is.
    pub fn get_link(&self, kind: LinkKind, token: &str) -> Result<Option<Link>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(kind.table())?;

        match table.get(token)? {
            Some(data) => Ok(Some(decode_link(kind, data.value())?)),
            None => Ok(None),
        }
    }

    /// Take one use of a link, if it has one to give.
    ///
    /// The check and the decrement happen inside one write transaction, and redb
    /// serialises writers, so N concurrent callers racing on a link with one use
    /// left see exactly one `true`. Returns `false` when the link is missing,
    /// exhausted, or expired at `now`.
    pub fn consume_link(
        &self,
        kind: LinkKind,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, DatabaseError> {
        let write_txn = self.begin_write()?;
        let consumed = {
            let mut table = write_txn.open_table(kind.table())?;
            let existing = match table.get(token)? {
                Some(data) => Some(decode_link(kind, data.value())?),
                None => None,
            };

            match existing {
                Some(mut link) if link.is_active(now) => {
                    link.remaining_uses -= 1;
                    link.last_used_at = Some(now);
                    let data = rmp_serde::to_vec_named(&link)?;
                    table.insert(token, data.as_slice())?;
                    true
                }
                _ => false,
            }
        };

        if consumed {
            write_txn.commit()?;
        } else {
            write_txn.abort()?;
        }
        Ok(consumed)
    }

    /// Force a link's remaining uses to zero. Returns whether the link existed.
    pub fn deactivate_link(&self, kind: LinkKind, token: &str) -> Result<bool, DatabaseError> {
        let write_txn = self.begin_write()?;
        let found = {
            let mut table = write_txn.open_table(kind.table())?;
            let existing = match table.get(token)? {
                Some(data) => Some(decode_link(kind, data.value())?),
                None => None,
            };

            match existing {
                Some(mut link) => {
                    link.remaining_uses = 0;
                    let data = rmp_serde::to_vec_named(&link)?;
                    table.insert(token, data.as_slice())?;
                    true
                }
                None => false,
            }
        };
        write_txn.commit()?;
        Ok(found)
    }

    /// Remove a link entirely. Returns whether the link existed.
    pub fn delete_link(&self, kind: LinkKind, token: &str) -> Result<bool, DatabaseError> {
        let write_txn = self.begin_write()?;
        let deleted = {
            let mut table = write_txn.open_table(kind.table())?;
            let removed = table.remove(token)?.is_some();
            removed
        };
        write_txn.commit()?;
        Ok(deleted)
    }

    /// Every link of a kind, active or not, ordered by id.
    pub fn list_links(&self, kind: LinkKind) -> Result<Vec<Link>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(kind.table())?;

        let mut links = Vec::new();
        for result in table.iter()? {
            let (_, value) = result?;
            links.push(decode_link(kind, value.value())?);
        }
        links.sort_by_key(|l| l.id);

        Ok(links)
    }

    /// Links that still have uses left and have not expired at `now`.
    pub fn list_active_links(
        &self,
        kind: LinkKind,
        now: DateTime<Utc>,
    ) -> Result<Vec<Link>, DatabaseError> {
        Ok(self
            .list_links(kind)?
            .into_iter()
            .filter(|l| l.is_active(now))
            .collect())
    }
}

fn decode_link(kind: LinkKind, data: &[u8]) -> Result<Link, DatabaseError> {
    let mut link: Link = rmp_serde::from_slice(data)?;
    link.url = kind.url_for(&link.token);
    Ok(link)
}

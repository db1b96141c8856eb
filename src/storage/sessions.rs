use chrono::{DateTime, Utc};
use redb::ReadableTable;

use super::db::{Database, DatabaseError};
use super::models::Session;
use super::tables::*;

impl Database {
    // ========================================================================
    // Session operations
    // ========================================================================

    pub fn create_session(
        &self,
        id: &str,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<Session, DatabaseError> {
        debug_assert!(!id.is_empty(), "session id must not be empty");

        let session = Session {
            id: id.to_string(),
            created_at,
            expires_at,
        };

        let write_txn = self.begin_write()?;
        {
            let mut table = write_txn.open_table(SESSIONS)?;
            if table.get(id)?.is_some() {
                return Err(DatabaseError::Duplicate("session id already exists".into()));
            }
            let data = rmp_serde::to_vec_named(&session)?;
            table.insert(id, data.as_slice())?;
        }
        write_txn.commit()?;
        Ok(session)
    }

    pub fn get_session(&self, id: &str) -> Result<Option<Session>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(SESSIONS)?;

        match table.get(id)? {
            Some(data) => Ok(Some(rmp_serde::from_slice(data.value())?)),
            None => Ok(None),
        }
    }

    /// Remove a session. Deleting an absent session is not an error.
    pub fn delete_session(&self, id: &str) -> Result<bool, DatabaseError> {
        let write_txn = self.begin_write()?;
        let deleted = {
            let mut table = write_txn.open_table(SESSIONS)?;
            let removed = table.remove(id)?.is_some();
            removed
        };
        write_txn.commit()?;
        Ok(deleted)
    }

    /// Drop every session that has expired at `now`. Expired sessions are also
    /// removed lazily when observed, so calling this is optional.
    pub fn purge_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64, DatabaseError> {
        let write_txn = self.begin_write()?;
        let mut purged = 0;
        {
            let mut table = write_txn.open_table(SESSIONS)?;
            let mut expired = Vec::new();
            for result in table.iter()? {
                let (key, value) = result?;
                let session: Session = rmp_serde::from_slice(value.value())?;
                if session.is_expired(now) {
                    expired.push(key.value().to_string());
                }
            }

            for id in expired {
                table.remove(id.as_str())?;
                purged += 1;
            }
        }
        write_txn.commit()?;
        Ok(purged)
    }
}

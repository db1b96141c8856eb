use redb::TableDefinition;

/// Upload links: token -> Link (msgpack)
pub const UPLOAD_LINKS: TableDefinition<&str, &[u8]> = TableDefinition::new("upload_links");

/// Download links: token -> Link (msgpack)
pub const DOWNLOAD_LINKS: TableDefinition<&str, &[u8]> = TableDefinition::new("download_links");

/// Surrogate key sequences: link table name -> last assigned id
pub const LINK_IDS: TableDefinition<&str, u64> = TableDefinition::new("link_ids");

/// Admin sessions: session id -> Session (msgpack)
pub const SESSIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("sessions");

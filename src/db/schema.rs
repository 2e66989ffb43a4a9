//! Schema DDL: a single `execute_batch` of `CREATE TABLE IF NOT EXISTS`
//! statements run on open. FTS4 (not FTS5) is used because `offsets()` —
//! required for search-match extraction — has the calling convention this
//! crate relies on; see DESIGN.md.

use rusqlite::Connection;

pub(crate) const SCHEMA_VERSION: i64 = 1;

pub(crate) const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS FolderTable (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    parent_id INTEGER REFERENCES FolderTable(id),
    name TEXT NOT NULL,
    attributes TEXT NOT NULL DEFAULT '[]',
    last_seen_total INTEGER NOT NULL DEFAULT 0,
    last_seen_status_total INTEGER NOT NULL DEFAULT 0,
    uid_validity INTEGER NOT NULL DEFAULT 0,
    uid_next INTEGER NOT NULL DEFAULT 0,
    unread_count INTEGER NOT NULL DEFAULT 0,
    UNIQUE (parent_id, name)
);

CREATE TABLE IF NOT EXISTS MessageTable (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    message_id TEXT,
    in_reply_to TEXT,
    internaldate_time_t INTEGER NOT NULL DEFAULT 0,
    subject TEXT,
    from_field TEXT,
    receivers TEXT,
    cc TEXT,
    bcc TEXT,
    body TEXT,
    attachment TEXT,
    flags TEXT NOT NULL DEFAULT '[]',
    fields_bitmask INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_message_internaldate ON MessageTable(internaldate_time_t);
CREATE INDEX IF NOT EXISTS idx_message_message_id ON MessageTable(message_id);
CREATE INDEX IF NOT EXISTS idx_message_in_reply_to ON MessageTable(in_reply_to);

CREATE TABLE IF NOT EXISTS MessageLocationTable (
    message_id INTEGER NOT NULL REFERENCES MessageTable(id),
    folder_id INTEGER NOT NULL REFERENCES FolderTable(id),
    remove_marker INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (message_id, folder_id)
);

CREATE INDEX IF NOT EXISTS idx_location_folder ON MessageLocationTable(folder_id, remove_marker);

CREATE VIRTUAL TABLE IF NOT EXISTS MessageSearchTable USING fts4(
    subject, from_field, receivers, cc, bcc, body, attachment
);

CREATE TABLE IF NOT EXISTS ContactTable (
    email TEXT PRIMARY KEY,
    real_name TEXT,
    highest_importance INTEGER NOT NULL DEFAULT 0,
    normalized_email TEXT NOT NULL,
    flags INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS SchemaVersion (
    version INTEGER NOT NULL
);
";

/// Run the DDL and stamp the schema version if this is a fresh database.
pub(crate) fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA)?;
    let has_version: bool = conn
        .query_row("SELECT COUNT(*) FROM SchemaVersion", [], |row| {
            row.get::<_, i64>(0).map(|c| c > 0)
        })
        .unwrap_or(false);
    if !has_version {
        conn.execute(
            "INSERT INTO SchemaVersion (version) VALUES (?1)",
            [SCHEMA_VERSION],
        )?;
    }
    Ok(())
}

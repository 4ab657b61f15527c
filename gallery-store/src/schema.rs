use rusqlite::{Connection, Result};

/// Initialize the store database schema
pub fn init_store_schema(conn: &Connection) -> Result<()> {
    // Enable foreign keys
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS store_schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    let current_version: i32 = conn
        .query_row(
            "SELECT version FROM store_schema_version ORDER BY version DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current_version < 1 {
        create_store_schema_v1(conn)?;
        conn.execute("INSERT INTO store_schema_version (version) VALUES (1)", [])?;
    }

    Ok(())
}

/// Create store schema version 1
fn create_store_schema_v1(conn: &Connection) -> Result<()> {
    // Table: blobs - file bodies keyed by SHA-256
    conn.execute(
        "CREATE TABLE IF NOT EXISTS blobs (
            hash TEXT PRIMARY KEY,
            content BLOB NOT NULL
        )",
        [],
    )?;

    // Table: entries - the working tree (staged view)
    conn.execute(
        "CREATE TABLE IF NOT EXISTS entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            partition TEXT NOT NULL CHECK(partition IN ('public', 'private')),
            path TEXT NOT NULL,
            hash TEXT NOT NULL,
            size INTEGER NOT NULL,
            mtime TEXT NOT NULL,
            UNIQUE(partition, path),
            FOREIGN KEY (hash) REFERENCES blobs(hash)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS directories (
            partition TEXT NOT NULL CHECK(partition IN ('public', 'private')),
            path TEXT NOT NULL,
            PRIMARY KEY (partition, path)
        )",
        [],
    )?;

    // Table: revisions - one row per publish that committed changes
    conn.execute(
        "CREATE TABLE IF NOT EXISTS revisions (
            id TEXT PRIMARY KEY,
            published_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS revision_entries (
            revision_id TEXT NOT NULL,
            entry_id INTEGER NOT NULL,
            partition TEXT NOT NULL,
            path TEXT NOT NULL,
            hash TEXT NOT NULL,
            size INTEGER NOT NULL,
            mtime TEXT NOT NULL,
            PRIMARY KEY (revision_id, partition, path),
            FOREIGN KEY (revision_id) REFERENCES revisions(id) ON DELETE CASCADE,
            FOREIGN KEY (hash) REFERENCES blobs(hash)
        )",
        [],
    )?;

    // Single row tracking whether the working tree changed since the last publish
    conn.execute(
        "CREATE TABLE IF NOT EXISTS working_state (
            id INTEGER PRIMARY KEY CHECK(id = 1),
            dirty INTEGER NOT NULL DEFAULT 0 CHECK(dirty IN (0,1))
        )",
        [],
    )?;
    conn.execute(
        "INSERT OR IGNORE INTO working_state (id, dirty) VALUES (1, 0)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_entries_partition ON entries(partition, path)",
        [],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_store_schema(&conn).unwrap();
        init_store_schema(&conn).unwrap();

        let versions: i32 = conn
            .query_row("SELECT COUNT(*) FROM store_schema_version", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(versions, 1);
    }
}

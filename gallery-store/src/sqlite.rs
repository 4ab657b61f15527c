//! SQLite-backed store
//!
//! File bodies are content-addressed in `blobs`; `entries` is the working
//! tree that reads and listings see. `publish` copies the working tree into a
//! new ULID-keyed revision inside a single transaction; `discard` copies one
//! entry back from the latest revision, keeping its listing position.

use crate::error::{StoreError, StoreResult};
use crate::memory::content_hash;
use crate::path::StorePath;
use crate::schema::init_store_schema;
use crate::store::{DirEntry, FileMetadata, Store, StoreFile};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Store persisted in a SQLite database
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a store database at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        init_store_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Other("SQLite store lock poisoned".to_string()))
    }

    /// Id of the latest published revision, if any
    pub fn latest_revision(&self) -> StoreResult<Option<String>> {
        let conn = self.lock()?;
        let id = conn
            .query_row(
                "SELECT id FROM revisions ORDER BY rowid DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    /// File names directly below `dir` in the latest published revision
    pub fn published_names(&self, dir: &StorePath) -> StoreResult<Vec<String>> {
        let Some(revision) = self.latest_revision()? else {
            return Ok(Vec::new());
        };
        let partition = dir.partition()?;
        let prefix = format!("{}/", dir.within_partition());

        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT path FROM revision_entries
             WHERE revision_id = ?1 AND partition = ?2 AND substr(path, 1, length(?3)) = ?3
             ORDER BY path",
        )?;
        let paths = stmt
            .query_map(params![revision, partition.as_str(), prefix], |row| {
                row.get::<_, String>(0)
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(paths
            .into_iter()
            .filter_map(|p| {
                let rest = p.strip_prefix(&prefix)?;
                (!rest.contains('/')).then(|| rest.to_string())
            })
            .collect())
    }
}

fn mark_dirty(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute("UPDATE working_state SET dirty = 1 WHERE id = 1", [])?;
    Ok(())
}

#[async_trait]
impl Store for SqliteStore {
    async fn list(&self, dir: &StorePath) -> StoreResult<Vec<DirEntry>> {
        let partition = dir.partition()?;
        let key = dir.within_partition();
        let conn = self.lock()?;

        let dir_exists: bool = key.is_empty()
            || conn.query_row(
                "SELECT COUNT(*) > 0 FROM directories WHERE partition = ?1 AND path = ?2",
                params![partition.as_str(), key],
                |row| row.get(0),
            )?;
        if !dir_exists {
            return Err(StoreError::NotFound(dir.to_string()));
        }

        let prefix = if key.is_empty() {
            String::new()
        } else {
            format!("{}/", key)
        };
        let mut stmt = conn.prepare(
            "SELECT path, size FROM entries
             WHERE partition = ?1 AND substr(path, 1, length(?2)) = ?2
             ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![partition.as_str(), prefix], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows
            .into_iter()
            .filter_map(|(path, size)| {
                let name = path.strip_prefix(&prefix)?;
                if name.contains('/') {
                    return None;
                }
                Some(DirEntry {
                    name: name.to_string(),
                    size: size.max(0) as u64,
                })
            })
            .collect())
    }

    async fn read(&self, path: &StorePath) -> StoreResult<StoreFile> {
        let partition = path.partition()?;
        let conn = self.lock()?;
        let row: Option<(Option<Vec<u8>>, Option<DateTime<Utc>>)> = conn
            .query_row(
                "SELECT b.content, e.mtime FROM entries e
                 LEFT JOIN blobs b ON b.hash = e.hash
                 WHERE e.partition = ?1 AND e.path = ?2",
                params![partition.as_str(), path.within_partition()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let (content, mtime) = row.ok_or_else(|| StoreError::NotFound(path.to_string()))?;
        Ok(StoreFile {
            content,
            metadata: FileMetadata { mtime },
        })
    }

    async fn exists(&self, path: &StorePath) -> StoreResult<bool> {
        let partition = path.partition()?;
        let key = path.within_partition();
        let conn = self.lock()?;
        let exists: bool = conn.query_row(
            "SELECT (SELECT COUNT(*) FROM entries WHERE partition = ?1 AND path = ?2)
                  + (SELECT COUNT(*) FROM directories WHERE partition = ?1 AND path = ?2) > 0",
            params![partition.as_str(), key],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    async fn write(&self, path: &StorePath, content: Vec<u8>) -> StoreResult<()> {
        let partition = path.partition()?;
        let key = path.within_partition();
        let hash = content_hash(&content);
        let size = content.len() as i64;

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT OR IGNORE INTO blobs (hash, content) VALUES (?1, ?2)",
            params![hash, content],
        )?;

        // Intermediate directories
        let parts: Vec<&str> = key.split('/').collect();
        for depth in 1..parts.len() {
            tx.execute(
                "INSERT OR IGNORE INTO directories (partition, path) VALUES (?1, ?2)",
                params![partition.as_str(), parts[..depth].join("/")],
            )?;
        }

        tx.execute(
            "INSERT INTO entries (partition, path, hash, size, mtime) VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(partition, path) DO UPDATE SET
                hash = excluded.hash, size = excluded.size, mtime = excluded.mtime",
            params![partition.as_str(), key, hash, size, Utc::now()],
        )?;
        mark_dirty(&tx)?;
        tx.commit()?;

        log::debug!("Staged write of {} ({} bytes)", path, size);
        Ok(())
    }

    async fn remove(&self, path: &StorePath) -> StoreResult<()> {
        let partition = path.partition()?;
        let conn = self.lock()?;
        let rows = conn.execute(
            "DELETE FROM entries WHERE partition = ?1 AND path = ?2",
            params![partition.as_str(), path.within_partition()],
        )?;
        if rows == 0 {
            return Err(StoreError::NotFound(path.to_string()));
        }
        mark_dirty(&conn)?;
        log::debug!("Staged removal of {}", path);
        Ok(())
    }

    async fn publish(&self) -> StoreResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let dirty: bool = tx.query_row(
            "SELECT dirty FROM working_state WHERE id = 1",
            [],
            |row| row.get(0),
        )?;
        if !dirty {
            log::debug!("Nothing to publish");
            return Ok(());
        }

        let revision = ulid::Ulid::new().to_string();
        tx.execute(
            "INSERT INTO revisions (id, published_at) VALUES (?1, ?2)",
            params![revision, Utc::now()],
        )?;
        tx.execute(
            "INSERT INTO revision_entries (revision_id, entry_id, partition, path, hash, size, mtime)
             SELECT ?1, id, partition, path, hash, size, mtime FROM entries",
            params![revision],
        )?;
        tx.execute("UPDATE working_state SET dirty = 0 WHERE id = 1", [])?;
        tx.commit()?;

        log::info!("Published revision {}", revision);
        Ok(())
    }

    async fn discard(&self, path: &StorePath) -> StoreResult<()> {
        let partition = path.partition()?;
        let key = path.within_partition();
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        tx.execute(
            "DELETE FROM entries WHERE partition = ?1 AND path = ?2",
            params![partition.as_str(), key],
        )?;
        let restored = tx.execute(
            "INSERT INTO entries (id, partition, path, hash, size, mtime)
             SELECT entry_id, partition, path, hash, size, mtime FROM revision_entries
             WHERE revision_id = (SELECT id FROM revisions ORDER BY rowid DESC LIMIT 1)
               AND partition = ?1 AND path = ?2",
            params![partition.as_str(), key],
        )?;
        tx.commit()?;

        log::debug!(
            "Discarded staged change to {} ({} entry restored)",
            path,
            restored
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(p: &str) -> StorePath {
        StorePath::parse(p).unwrap()
    }

    #[tokio::test]
    async fn test_write_then_list_in_insertion_order() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.write(&path("public/gallery/b.jpg"), vec![1, 2]).await.unwrap();
        store.write(&path("public/gallery/a.jpg"), vec![3]).await.unwrap();
        store.write(&path("public/gallery/nested/c.jpg"), vec![4]).await.unwrap();

        let entries = store.list(&path("public/gallery")).await.unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["b.jpg", "a.jpg"]);
        assert_eq!(entries[0].size, 2);
    }

    #[tokio::test]
    async fn test_read_returns_content_and_mtime() {
        let store = SqliteStore::open_in_memory().unwrap();
        let file = path("private/gallery/a.jpg");
        store.write(&file, vec![9, 8, 7]).await.unwrap();

        let read = store.read(&file).await.unwrap();
        assert_eq!(read.content, Some(vec![9, 8, 7]));
        assert!(read.metadata.mtime.is_some());

        assert!(matches!(
            store.read(&path("public/gallery/a.jpg")).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_directory_fails_listing() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(matches!(
            store.list(&path("public/gallery")).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_publish_creates_revision_only_when_dirty() {
        let store = SqliteStore::open_in_memory().unwrap();
        let dir = path("public/gallery");
        assert_eq!(store.latest_revision().unwrap(), None);

        store.write(&dir.join("a.jpg").unwrap(), vec![1]).await.unwrap();
        assert!(store.published_names(&dir).unwrap().is_empty());

        store.publish().await.unwrap();
        let first = store.latest_revision().unwrap();
        assert!(first.is_some());
        assert_eq!(store.published_names(&dir).unwrap(), vec!["a.jpg"]);

        store.publish().await.unwrap();
        assert_eq!(store.latest_revision().unwrap(), first);

        store.remove(&dir.join("a.jpg").unwrap()).await.unwrap();
        store.publish().await.unwrap();
        assert_ne!(store.latest_revision().unwrap(), first);
        assert!(store.published_names(&dir).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_discard_restores_published_entry() {
        let store = SqliteStore::open_in_memory().unwrap();
        let dir = path("public/gallery");
        let first = dir.join("a.jpg").unwrap();
        let second = dir.join("b.jpg").unwrap();
        store.write(&first, vec![1]).await.unwrap();
        store.write(&second, vec![2]).await.unwrap();
        store.publish().await.unwrap();
        let before = store.read(&first).await.unwrap();

        store.remove(&first).await.unwrap();
        store.discard(&first).await.unwrap();
        assert_eq!(store.read(&first).await.unwrap(), before);

        // listing position survives the round trip
        let names: Vec<_> = store
            .list(&dir)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.jpg"]);

        let fresh = dir.join("c.jpg").unwrap();
        store.write(&fresh, vec![3]).await.unwrap();
        store.discard(&fresh).await.unwrap();
        assert!(!store.exists(&fresh).await.unwrap());
    }

    #[tokio::test]
    async fn test_exists_and_remove() {
        let store = SqliteStore::open_in_memory().unwrap();
        let file = path("public/gallery/a.jpg");
        assert!(!store.exists(&file).await.unwrap());
        store.write(&file, vec![1]).await.unwrap();
        assert!(store.exists(&file).await.unwrap());
        assert!(store.exists(&path("public/gallery")).await.unwrap());

        store.remove(&file).await.unwrap();
        assert!(!store.exists(&file).await.unwrap());
        assert!(matches!(
            store.remove(&file).await,
            Err(StoreError::NotFound(_))
        ));
    }
}

//! In-process store
//!
//! Content-addressed: file bodies live in a blob map keyed by their SHA-256,
//! the per-partition trees only reference hashes. `publish` snapshots the
//! working trees as a new revision. Every call is counted and journaled, and
//! single calls can be made to fail, so the store doubles as a test fake.

use crate::error::{StoreError, StoreResult};
use crate::path::{Partition, StorePath};
use crate::store::{DirEntry, FileMetadata, Store, StoreFile};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

/// Store operation kinds, used for call accounting and failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    List,
    Read,
    Exists,
    Write,
    Remove,
    Publish,
    Discard,
}

/// Number of calls made per operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreCalls {
    pub list: usize,
    pub read: usize,
    pub exists: usize,
    pub write: usize,
    pub remove: usize,
    pub publish: usize,
    pub discard: usize,
}

#[derive(Debug, Clone, PartialEq)]
struct Node {
    hash: String,
    size: u64,
    mtime: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Tree {
    files: BTreeMap<String, Node>,
    dirs: BTreeSet<String>,
}

impl Tree {
    fn add_ancestors(&mut self, path: &str) {
        let mut current = String::new();
        let parts: Vec<&str> = path.split('/').collect();
        for part in &parts[..parts.len().saturating_sub(1)] {
            if !current.is_empty() {
                current.push('/');
            }
            current.push_str(part);
            self.dirs.insert(current.clone());
        }
    }
}

#[derive(Default)]
struct Inner {
    blobs: HashMap<String, Vec<u8>>,
    working: HashMap<Partition, Tree>,
    published: HashMap<Partition, Tree>,
    revision: u64,
    dirty: bool,
    calls: StoreCalls,
    journal: Vec<StoreOp>,
    failures: HashSet<StoreOp>,
}

impl Inner {
    /// Counts the call and consumes an injected failure, if any
    fn record(&mut self, op: StoreOp) -> StoreResult<()> {
        match op {
            StoreOp::List => self.calls.list += 1,
            StoreOp::Read => self.calls.read += 1,
            StoreOp::Exists => self.calls.exists += 1,
            StoreOp::Write => self.calls.write += 1,
            StoreOp::Remove => self.calls.remove += 1,
            StoreOp::Publish => self.calls.publish += 1,
            StoreOp::Discard => self.calls.discard += 1,
        }
        self.journal.push(op);

        if self.failures.remove(&op) {
            return Err(StoreError::Other(format!("Injected {:?} failure", op)));
        }
        Ok(())
    }

    fn tree(&mut self, partition: Partition) -> &mut Tree {
        self.working.entry(partition).or_default()
    }
}

/// Content-addressed in-memory store
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Other("Memory store lock poisoned".to_string()))
    }

    /// Writes a file with an explicit modification time, without counting the call
    pub fn write_at(
        &self,
        path: &StorePath,
        content: Vec<u8>,
        mtime: DateTime<Utc>,
    ) -> StoreResult<()> {
        let partition = path.partition()?;
        let key = path.within_partition();
        let hash = content_hash(&content);
        let size = content.len() as u64;

        let mut inner = self.lock()?;
        inner.blobs.entry(hash.clone()).or_insert(content);
        let tree = inner.tree(partition);
        tree.add_ancestors(&key);
        tree.files.insert(key, Node { hash, size, mtime });
        inner.dirty = true;
        Ok(())
    }

    /// Creates an empty directory, without counting the call
    pub fn create_dir(&self, path: &StorePath) -> StoreResult<()> {
        let partition = path.partition()?;
        let key = path.within_partition();
        let mut inner = self.lock()?;
        let tree = inner.tree(partition);
        tree.add_ancestors(&format!("{}/_", key));
        inner.dirty = true;
        Ok(())
    }

    /// Makes the next call of `op` fail with a store error
    pub fn fail_next(&self, op: StoreOp) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.failures.insert(op);
        }
    }

    pub fn calls(&self) -> StoreCalls {
        self.inner
            .lock()
            .map(|inner| inner.calls.clone())
            .unwrap_or_default()
    }

    /// Every operation in call order
    pub fn journal(&self) -> Vec<StoreOp> {
        self.inner
            .lock()
            .map(|inner| inner.journal.clone())
            .unwrap_or_default()
    }

    /// Number of publishes that committed changes
    pub fn published_revision(&self) -> u64 {
        self.inner.lock().map(|inner| inner.revision).unwrap_or(0)
    }

    /// File names directly below `dir` in the last published revision
    pub fn published_names(&self, dir: &StorePath) -> Vec<String> {
        let Ok(partition) = dir.partition() else {
            return Vec::new();
        };
        let prefix = format!("{}/", dir.within_partition());
        self.inner
            .lock()
            .map(|inner| {
                inner
                    .published
                    .get(&partition)
                    .map(|tree| direct_children(tree, &prefix).map(|(n, _)| n).collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    /// Number of distinct content blobs held
    pub fn blob_count(&self) -> usize {
        self.inner.lock().map(|inner| inner.blobs.len()).unwrap_or(0)
    }
}

fn direct_children<'a>(
    tree: &'a Tree,
    prefix: &'a str,
) -> impl Iterator<Item = (String, &'a Node)> + 'a {
    tree.files.iter().filter_map(move |(key, node)| {
        let rest = key.strip_prefix(prefix)?;
        if rest.contains('/') {
            None
        } else {
            Some((rest.to_string(), node))
        }
    })
}

pub(crate) fn content_hash(content: &[u8]) -> String {
    let digest = Sha256::digest(content);
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

#[async_trait]
impl Store for MemoryStore {
    async fn list(&self, dir: &StorePath) -> StoreResult<Vec<DirEntry>> {
        let partition = dir.partition()?;
        let key = dir.within_partition();
        let mut inner = self.lock()?;
        inner.record(StoreOp::List)?;

        let tree = inner.tree(partition);
        if !key.is_empty() && !tree.dirs.contains(&key) {
            return Err(StoreError::NotFound(dir.to_string()));
        }
        let prefix = if key.is_empty() {
            String::new()
        } else {
            format!("{}/", key)
        };
        Ok(direct_children(tree, &prefix)
            .map(|(name, node)| DirEntry {
                name,
                size: node.size,
            })
            .collect())
    }

    async fn read(&self, path: &StorePath) -> StoreResult<StoreFile> {
        let partition = path.partition()?;
        let key = path.within_partition();
        let mut inner = self.lock()?;
        inner.record(StoreOp::Read)?;

        let node = inner
            .tree(partition)
            .files
            .get(&key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(path.to_string()))?;
        Ok(StoreFile {
            content: inner.blobs.get(&node.hash).cloned(),
            metadata: FileMetadata {
                mtime: Some(node.mtime),
            },
        })
    }

    async fn exists(&self, path: &StorePath) -> StoreResult<bool> {
        let partition = path.partition()?;
        let key = path.within_partition();
        let mut inner = self.lock()?;
        inner.record(StoreOp::Exists)?;
        let tree = inner.tree(partition);
        Ok(tree.files.contains_key(&key) || tree.dirs.contains(&key))
    }

    async fn write(&self, path: &StorePath, content: Vec<u8>) -> StoreResult<()> {
        path.partition()?;
        self.lock()?.record(StoreOp::Write)?;
        self.write_at(path, content, Utc::now())
    }

    async fn remove(&self, path: &StorePath) -> StoreResult<()> {
        let partition = path.partition()?;
        let key = path.within_partition();
        let mut inner = self.lock()?;
        inner.record(StoreOp::Remove)?;
        if inner.tree(partition).files.remove(&key).is_none() {
            return Err(StoreError::NotFound(path.to_string()));
        }
        inner.dirty = true;
        Ok(())
    }

    async fn publish(&self) -> StoreResult<()> {
        let mut inner = self.lock()?;
        inner.record(StoreOp::Publish)?;
        if !inner.dirty {
            log::debug!("Nothing to publish at revision {}", inner.revision);
            return Ok(());
        }
        inner.published = inner.working.clone();
        inner.revision += 1;
        inner.dirty = false;
        log::debug!("Published revision {}", inner.revision);
        Ok(())
    }

    async fn discard(&self, path: &StorePath) -> StoreResult<()> {
        let partition = path.partition()?;
        let key = path.within_partition();
        let mut inner = self.lock()?;
        inner.record(StoreOp::Discard)?;

        let published = inner
            .published
            .get(&partition)
            .and_then(|tree| tree.files.get(&key))
            .cloned();
        let tree = inner.tree(partition);
        match published {
            Some(node) => {
                tree.files.insert(key, node);
            }
            None => {
                tree.files.remove(&key);
            }
        }
        log::debug!("Discarded staged change to {}", path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn path(p: &str) -> StorePath {
        StorePath::parse(p).unwrap()
    }

    #[tokio::test]
    async fn test_write_list_read() {
        let store = MemoryStore::new();
        store.write(&path("public/gallery/b.jpg"), vec![1, 2]).await.unwrap();
        store.write(&path("public/gallery/a.jpg"), vec![3]).await.unwrap();

        let entries = store.list(&path("public/gallery")).await.unwrap();
        assert_eq!(
            entries,
            vec![
                DirEntry { name: "a.jpg".into(), size: 1 },
                DirEntry { name: "b.jpg".into(), size: 2 },
            ]
        );

        let file = store.read(&path("public/gallery/b.jpg")).await.unwrap();
        assert_eq!(file.content, Some(vec![1, 2]));
        assert!(file.metadata.mtime.is_some());
    }

    #[tokio::test]
    async fn test_partitions_are_separate() {
        let store = MemoryStore::new();
        store.write(&path("public/gallery/a.jpg"), vec![1]).await.unwrap();

        assert!(!store.exists(&path("private/gallery/a.jpg")).await.unwrap());
        assert!(matches!(
            store.list(&path("private/gallery")).await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.write(&path("shared/gallery/a.jpg"), vec![1]).await,
            Err(StoreError::InvalidPath(_))
        ));
    }

    #[tokio::test]
    async fn test_identical_content_is_stored_once() {
        let store = MemoryStore::new();
        store.write(&path("public/gallery/a.jpg"), vec![7; 16]).await.unwrap();
        store.write(&path("private/gallery/a.jpg"), vec![7; 16]).await.unwrap();
        assert_eq!(store.blob_count(), 1);
    }

    #[tokio::test]
    async fn test_publish_snapshots_working_tree() {
        let store = MemoryStore::new();
        let dir = path("public/gallery");
        store.write(&dir.join("a.jpg").unwrap(), vec![1]).await.unwrap();
        assert!(store.published_names(&dir).is_empty());

        store.publish().await.unwrap();
        assert_eq!(store.published_revision(), 1);
        assert_eq!(store.published_names(&dir), vec!["a.jpg".to_string()]);

        // clean publish keeps the revision
        store.publish().await.unwrap();
        assert_eq!(store.published_revision(), 1);

        store.remove(&dir.join("a.jpg").unwrap()).await.unwrap();
        store.publish().await.unwrap();
        assert_eq!(store.published_revision(), 2);
        assert!(store.published_names(&dir).is_empty());
        // directory survives its last file
        assert!(store.list(&dir).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_missing_fails() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.remove(&path("public/gallery/none.jpg")).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_failure_injection_and_journal() {
        let store = MemoryStore::new();
        let file = path("public/gallery/a.jpg");
        store
            .write_at(&file, vec![1], Utc.timestamp_opt(10, 0).unwrap())
            .unwrap();

        store.fail_next(StoreOp::Read);
        assert!(store.read(&file).await.is_err());
        assert!(store.read(&file).await.is_ok());

        assert_eq!(store.calls().read, 2);
        assert_eq!(store.journal(), vec![StoreOp::Read, StoreOp::Read]);
    }

    #[tokio::test]
    async fn test_discard_restores_published_state() {
        let store = MemoryStore::new();
        let kept = path("public/gallery/kept.jpg");
        let fresh = path("public/gallery/fresh.jpg");
        store
            .write_at(&kept, vec![1], Utc.timestamp_opt(10, 0).unwrap())
            .unwrap();
        store.publish().await.unwrap();
        let before = store.read(&kept).await.unwrap();

        store.remove(&kept).await.unwrap();
        store.write(&fresh, vec![2]).await.unwrap();
        store.discard(&kept).await.unwrap();
        store.discard(&fresh).await.unwrap();

        assert_eq!(store.read(&kept).await.unwrap(), before);
        assert!(!store.exists(&fresh).await.unwrap());
        assert_eq!(store.calls().discard, 2);

        store.publish().await.unwrap();
        assert_eq!(
            store.published_names(&path("public/gallery")),
            vec!["kept.jpg".to_string()]
        );
    }

    #[tokio::test]
    async fn test_create_dir_lists_empty() {
        let store = MemoryStore::new();
        let dir = path("private/gallery");
        store.create_dir(&dir).unwrap();
        assert!(store.list(&dir).await.unwrap().is_empty());
        assert!(store.exists(&dir).await.unwrap());
    }
}

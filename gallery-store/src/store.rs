use crate::error::StoreResult;
use crate::path::StorePath;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// One file row of a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub size: u64,
}

/// Store-side metadata for a file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileMetadata {
    pub mtime: Option<DateTime<Utc>>,
}

/// Result of reading a file. Backends leave `content` empty if the body
/// could not be materialised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreFile {
    pub content: Option<Vec<u8>>,
    pub metadata: FileMetadata,
}

/// A versioned file store with a public and a private partition
///
/// `write` and `remove` are staged; they become durable only after `publish`
/// and can be dropped again with `discard`.
#[async_trait]
pub trait Store: Send + Sync {
    /// Lists the files directly inside `dir`, in the backend's listing order.
    /// Fails with `NotFound` if the directory does not exist.
    async fn list(&self, dir: &StorePath) -> StoreResult<Vec<DirEntry>>;

    /// Reads a file's content and metadata. Fails with `NotFound` if missing.
    async fn read(&self, path: &StorePath) -> StoreResult<StoreFile>;

    async fn exists(&self, path: &StorePath) -> StoreResult<bool>;

    /// Writes a file, creating intermediate directories as needed
    async fn write(&self, path: &StorePath, content: Vec<u8>) -> StoreResult<()>;

    /// Removes a file. Fails with `NotFound` if missing.
    async fn remove(&self, path: &StorePath) -> StoreResult<()>;

    /// Durably commits every staged write and removal
    async fn publish(&self) -> StoreResult<()>;

    /// Drops the unpublished change to `path`, restoring what the last
    /// publish left there (or nothing)
    async fn discard(&self, path: &StorePath) -> StoreResult<()>;
}

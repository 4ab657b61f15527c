//! # Gallery Store
//!
//! Storage backends for the image gallery.
//!
//! A store holds two independent file trees, `public/` and `private/`, and
//! separates staging from durability: `write` and `remove` change the local
//! view, `publish` commits every pending change to the authoritative copy.
//!
//! This crate provides:
//! - The [`Store`] trait consumed by the gallery sync layer
//! - [`MemoryStore`], a content-addressed in-process store (also used as a test double)
//! - [`SqliteStore`], a content-addressed store with published revisions in SQLite
//! - `WebDavStore` (feature `webdav`), staging changes locally and pushing them to
//!   a WebDAV server such as Nextcloud on publish
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use gallery_store::{MemoryStore, Store, StorePath};
//!
//! let store = MemoryStore::new();
//! let path = StorePath::parse("public/gallery/cat.jpg")?;
//! store.write(&path, bytes).await?;
//! store.publish().await?;
//! ```

pub mod error;
pub mod memory;
pub mod path;
pub mod schema;
pub mod sqlite;
pub mod store;

#[cfg(feature = "webdav")]
pub mod webdav;

pub use error::{StoreError, StoreResult};
pub use memory::{MemoryStore, StoreCalls, StoreOp};
pub use path::{Partition, StorePath};
pub use sqlite::SqliteStore;
pub use store::{DirEntry, FileMetadata, Store, StoreFile};

#[cfg(feature = "webdav")]
pub use webdav::{WebDavConfig, WebDavStore};

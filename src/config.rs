use crate::error::GalleryError;
use gallery_store::{MemoryStore, SqliteStore, Store, WebDavConfig, WebDavStore};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// How a listing treats files that fail to load
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ListingPolicy {
    /// One failing file fails the whole listing
    #[default]
    AllOrNothing,
    /// Publish the images that loaded and report the rest
    Partial,
}

/// Store backend selection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StoreBackend {
    Memory,
    Sqlite { path: String },
    Webdav(WebDavConfig),
}

impl Default for StoreBackend {
    fn default() -> Self {
        StoreBackend::Sqlite {
            path: "./data/gallery.db".to_string(),
        }
    }
}

/// Gallery configuration, usually read from `gallery.toml`
///
/// ```toml
/// max_upload_mib = 5
/// max_concurrent_fetches = 8
/// listing_policy = "all_or_nothing"
///
/// [store]
/// backend = "webdav"
/// server_url = "https://cloud.example.org"
/// username = "alice"
/// app_password = "..."
/// remote_path = "Gallery"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GalleryConfig {
    /// Largest accepted upload; a file of exactly this size is accepted
    pub max_upload_mib: u64,
    /// Reads in flight while listing an area
    pub max_concurrent_fetches: usize,
    pub listing_policy: ListingPolicy,
    pub store: StoreBackend,
}

impl Default for GalleryConfig {
    fn default() -> Self {
        Self {
            max_upload_mib: 5,
            max_concurrent_fetches: 8,
            listing_policy: ListingPolicy::AllOrNothing,
            store: StoreBackend::default(),
        }
    }
}

impl GalleryConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, GalleryError> {
        toml::from_str(content).map_err(|e| GalleryError::Config(e.to_string()))
    }

    /// Reads a TOML config file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, GalleryError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            GalleryError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&content)?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_mib.saturating_mul(1024 * 1024)
    }

    /// Opens the configured store backend
    pub fn open_store(&self) -> Result<Arc<dyn Store>, GalleryError> {
        let store: Arc<dyn Store> = match &self.store {
            StoreBackend::Memory => Arc::new(MemoryStore::new()),
            StoreBackend::Sqlite { path } => Arc::new(SqliteStore::open(path)?),
            StoreBackend::Webdav(webdav) => Arc::new(WebDavStore::new(webdav.clone())?),
        };
        log::info!("Opened {} store", self.store.name());
        Ok(store)
    }
}

impl StoreBackend {
    pub fn name(&self) -> &'static str {
        match self {
            StoreBackend::Memory => "memory",
            StoreBackend::Sqlite { .. } => "sqlite",
            StoreBackend::Webdav(_) => "webdav",
        }
    }
}

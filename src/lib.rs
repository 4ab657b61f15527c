//! Gallery sync
//!
//! Keeps a two-area (public/private) image gallery in sync with a
//! partitioned, publishable store from the `gallery-store` crate.

pub mod config;
pub mod error;
pub mod image_processing;
pub mod models;
pub mod services;

pub use config::{GalleryConfig, ListingPolicy, StoreBackend};
pub use error::GalleryError;
pub use models::{Area, GalleryState, Image, ImageList};
pub use services::{GallerySyncManager, PendingUpload, WatchStateStore};

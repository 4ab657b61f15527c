pub mod gallery_paths;
pub mod gallery_sync;
pub mod path_queue;
pub mod state_store;

pub use gallery_paths::{gallery_dir, gallery_file};
pub use gallery_sync::{
    BatchUploadReport, FileFailure, GallerySyncManager, LoadReport, PendingUpload, UploadOutcome,
};
pub use path_queue::PathQueue;
pub use state_store::{GalleryStateStore, WatchStateStore};

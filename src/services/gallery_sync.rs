//! Gallery sync manager
//!
//! Reconciles the in-memory gallery state with the store. Listing fans out one
//! read per file (bounded by `max_concurrent_fetches`), uploads and deletes are
//! serialized per target path and always followed by a publish. A failed
//! publish discards the staged change, so the user can simply try again.
//! Every operation logs its failures and returns them; nothing is retried.

use crate::config::{GalleryConfig, ListingPolicy};
use crate::error::GalleryError;
use crate::image_processing::{self, CodecError};
use crate::models::{Area, Image};
use crate::services::gallery_paths;
use crate::services::path_queue::PathQueue;
use crate::services::state_store::GalleryStateStore;
use gallery_store::{DirEntry, Store, StorePath};
use std::sync::Arc;
use tokio::task::{JoinError, JoinSet};
use uuid::Uuid;

/// A file picked for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpload {
    pub name: String,
    pub bytes: Vec<u8>,
    pub size_bytes: u64,
}

impl PendingUpload {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let size_bytes = bytes.len() as u64;
        Self {
            name: name.into(),
            bytes,
            size_bytes,
        }
    }
}

/// A file left out of a partial listing
#[derive(Debug)]
pub struct FileFailure {
    pub name: String,
    pub error: GalleryError,
}

/// Result of a successful listing
#[derive(Debug)]
pub struct LoadReport {
    pub area: Area,
    pub loaded: usize,
    /// Always empty with `ListingPolicy::AllOrNothing`
    pub failures: Vec<FileFailure>,
}

#[derive(Debug)]
pub struct UploadOutcome {
    pub name: String,
    pub result: Result<(), GalleryError>,
}

/// Per-file outcomes of a batch upload plus its single refresh
#[derive(Debug)]
pub struct BatchUploadReport {
    /// In the order the files were given
    pub uploads: Vec<UploadOutcome>,
    pub refresh: Result<LoadReport, GalleryError>,
}

impl BatchUploadReport {
    pub fn succeeded(&self) -> usize {
        self.uploads.iter().filter(|u| u.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.uploads.len() - self.succeeded()
    }
}

type FetchResult = (usize, Result<Image, GalleryError>);

/// Lowers `loading` when dropped unless disarmed
struct LoadingFlag<'a, G: GalleryStateStore> {
    state: &'a G,
    armed: bool,
}

impl<'a, G: GalleryStateStore> LoadingFlag<'a, G> {
    fn raise(state: &'a G) -> Self {
        state.update(|s| s.with_loading(true));
        Self { state, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl<G: GalleryStateStore> Drop for LoadingFlag<'_, G> {
    fn drop(&mut self) {
        if self.armed {
            self.state.update(|s| s.with_loading(false));
        }
    }
}

/// Keeps a gallery state in sync with a store
pub struct GallerySyncManager<G: GalleryStateStore> {
    store: Arc<dyn Store>,
    state: Arc<G>,
    config: Arc<GalleryConfig>,
    queue: Arc<PathQueue>,
}

impl<G: GalleryStateStore> Clone for GallerySyncManager<G> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            state: self.state.clone(),
            config: self.config.clone(),
            queue: self.queue.clone(),
        }
    }
}

impl<G: GalleryStateStore> GallerySyncManager<G> {
    pub fn new(store: Arc<dyn Store>, state: Arc<G>, config: GalleryConfig) -> Self {
        Self {
            store,
            state,
            config: Arc::new(config),
            queue: Arc::new(PathQueue::new()),
        }
    }

    pub fn state(&self) -> &Arc<G> {
        &self.state
    }

    pub fn config(&self) -> &GalleryConfig {
        &self.config
    }

    /// Switches the current area and loads it
    pub async fn select_area(&self, area: Area) -> Result<LoadReport, GalleryError> {
        self.state.update(|s| s.with_selected_area(area));
        self.load_images().await
    }

    /// Reloads the currently selected area
    pub async fn load_images(&self) -> Result<LoadReport, GalleryError> {
        let area = self.state.get().selected_area;
        self.load_area(area).await
    }

    /// Lists `area` from the store and replaces its image list
    ///
    /// On failure both lists keep their previous value. `loading` is raised
    /// only if `area` is the selected one, and always lowered again.
    pub async fn load_area(&self, area: Area) -> Result<LoadReport, GalleryError> {
        let mut loading = if self.state.get().selected_area == area {
            Some(LoadingFlag::raise(self.state.as_ref()))
        } else {
            None
        };
        log::debug!("Loading {} gallery", area);

        match self.fetch_area(area).await {
            Ok((images, failures)) => {
                let loaded = images.len();
                let lower = loading.is_some();
                self.state.update(move |s| {
                    let s = s.with_images(area, images);
                    if lower {
                        s.with_loading(false)
                    } else {
                        s
                    }
                });
                if let Some(flag) = loading.as_mut() {
                    flag.disarm();
                }

                log::info!(
                    "Loaded {} images for {} gallery ({} skipped)",
                    loaded,
                    area,
                    failures.len()
                );
                Ok(LoadReport {
                    area,
                    loaded,
                    failures,
                })
            }
            Err(e) => {
                log::error!("Loading {} gallery failed: {}", area, e);
                Err(e)
            }
        }
    }

    async fn fetch_area(
        &self,
        area: Area,
    ) -> Result<(Vec<Image>, Vec<FileFailure>), GalleryError> {
        let dir = gallery_paths::gallery_dir(area);
        let entries = self.store.list(&dir).await?;
        let names: Vec<String> = entries.iter().map(|e| e.name.clone()).collect();
        log::debug!("Listed {} entries in {}", names.len(), dir);

        let limit = self.config.max_concurrent_fetches.max(1);
        let policy = self.config.listing_policy;
        let mut slots: Vec<Option<Result<Image, GalleryError>>> = Vec::new();
        slots.resize_with(names.len(), || None);

        let mut join_set = JoinSet::new();
        for (index, entry) in entries.into_iter().enumerate() {
            // Limit concurrent reads
            while join_set.len() >= limit {
                if let Some(done) = join_set.join_next().await {
                    settle(done, policy, &mut slots)?;
                }
            }

            let store = self.store.clone();
            let dir = dir.clone();
            join_set.spawn(async move { (index, fetch_image(store, dir, area, entry).await) });
        }

        // Wait for remaining reads
        while let Some(done) = join_set.join_next().await {
            settle(done, policy, &mut slots)?;
        }

        let mut images = Vec::with_capacity(names.len());
        let mut failures = Vec::new();
        for (name, slot) in names.into_iter().zip(slots) {
            match slot {
                Some(Ok(image)) => images.push(image),
                Some(Err(error)) => {
                    log::warn!("Skipping {}: {}", name, error);
                    failures.push(FileFailure { name, error });
                }
                None => failures.push(FileFailure {
                    name,
                    error: GalleryError::Other("Image fetch did not complete".to_string()),
                }),
            }
        }

        // Newest first, stable for equal mtimes
        images.sort_by(|a, b| b.mtime.cmp(&a.mtime));
        Ok((images, failures))
    }

    /// Adds a new image to `area` and publishes it
    ///
    /// The caller refreshes the gallery afterwards (see `handle_batch_upload`).
    pub async fn upload_image(
        &self,
        area: Area,
        file_name: &str,
        file_bytes: Vec<u8>,
        file_size_bytes: u64,
    ) -> Result<(), GalleryError> {
        match self
            .store_new_image(area, file_name, file_bytes, file_size_bytes)
            .await
        {
            Ok(()) => {
                log::info!("Uploaded {} to {} gallery", file_name, area);
                Ok(())
            }
            Err(e) => {
                log::error!("Upload of {} to {} gallery failed: {}", file_name, area, e);
                Err(e)
            }
        }
    }

    async fn store_new_image(
        &self,
        area: Area,
        file_name: &str,
        file_bytes: Vec<u8>,
        file_size_bytes: u64,
    ) -> Result<(), GalleryError> {
        if file_size_bytes > self.config.max_upload_bytes() {
            return Err(GalleryError::SizeLimitExceeded {
                size_bytes: file_size_bytes,
                limit_mib: self.config.max_upload_mib,
            });
        }

        let path = gallery_paths::gallery_file(area, file_name)?;
        let _ticket = self.queue.acquire(&path).await;

        if self.store.exists(&path).await? {
            return Err(GalleryError::DuplicateName(file_name.to_string()));
        }
        self.store.write(&path, file_bytes).await?;
        self.publish_or_discard(&path).await
    }

    /// Removes an image from `area`, publishes, then reloads `area`
    pub async fn delete_image(&self, area: Area, file_name: &str) -> Result<(), GalleryError> {
        if let Err(e) = self.remove_image(area, file_name).await {
            log::error!("Delete of {} from {} gallery failed: {}", file_name, area, e);
            return Err(e);
        }
        log::info!("Deleted {} from {} gallery", file_name, area);

        if let Err(e) = self.load_area(area).await {
            log::warn!("Refresh after deleting {} failed: {}", file_name, e);
        }
        Ok(())
    }

    async fn remove_image(&self, area: Area, file_name: &str) -> Result<(), GalleryError> {
        let path = gallery_paths::gallery_file(area, file_name)?;
        let _ticket = self.queue.acquire(&path).await;

        if !self.store.exists(&path).await? {
            return Err(GalleryError::NotFound(file_name.to_string()));
        }
        self.store.remove(&path).await?;
        self.publish_or_discard(&path).await
    }

    /// Publishes, or drops the staged change to `path` if publishing fails
    async fn publish_or_discard(&self, path: &StorePath) -> Result<(), GalleryError> {
        let Err(e) = self.store.publish().await else {
            return Ok(());
        };
        match self.store.discard(path).await {
            Ok(()) => log::warn!("Publish failed, discarded staged change to {}", path),
            Err(discard) => log::error!(
                "Publish failed and staged change to {} could not be discarded: {}",
                path,
                discard
            ),
        }
        Err(e.into())
    }

    /// Uploads all files concurrently, then refreshes `area` exactly once
    pub async fn handle_batch_upload(
        &self,
        area: Area,
        files: Vec<PendingUpload>,
    ) -> BatchUploadReport {
        let mut uploads: Vec<UploadOutcome> = files
            .iter()
            .map(|file| UploadOutcome {
                name: file.name.clone(),
                result: Err(GalleryError::Other("Upload did not complete".to_string())),
            })
            .collect();

        let mut join_set = JoinSet::new();
        for (index, file) in files.into_iter().enumerate() {
            let manager = self.clone();
            join_set.spawn(async move {
                let PendingUpload {
                    name,
                    bytes,
                    size_bytes,
                } = file;
                let result = manager.upload_image(area, &name, bytes, size_bytes).await;
                (index, result)
            });
        }

        while let Some(done) = join_set.join_next().await {
            match done {
                Ok((index, result)) => uploads[index].result = result,
                Err(e) => log::error!("Upload task failed: {}", e),
            }
        }

        let report_uploads = uploads.len();
        let refresh = self.load_area(area).await;
        let report = BatchUploadReport { uploads, refresh };
        log::info!(
            "Batch upload to {} gallery: {} of {} files uploaded",
            area,
            report.succeeded(),
            report_uploads
        );
        report
    }
}

/// Stores one finished fetch in its listing slot
fn settle(
    done: Result<FetchResult, JoinError>,
    policy: ListingPolicy,
    slots: &mut [Option<Result<Image, GalleryError>>],
) -> Result<(), GalleryError> {
    match done {
        Ok((index, Ok(image))) => slots[index] = Some(Ok(image)),
        Ok((index, Err(e))) => {
            if policy == ListingPolicy::AllOrNothing {
                return Err(e);
            }
            slots[index] = Some(Err(e));
        }
        Err(e) => {
            log::error!("Image fetch task failed: {}", e);
            if policy == ListingPolicy::AllOrNothing {
                return Err(GalleryError::Other(format!("Image fetch task failed: {}", e)));
            }
        }
    }
    Ok(())
}

async fn fetch_image(
    store: Arc<dyn Store>,
    dir: StorePath,
    area: Area,
    entry: DirEntry,
) -> Result<Image, GalleryError> {
    let path = dir.join(&entry.name)?;
    let file = store.read(&path).await?;
    let metadata = image_processing::extract_metadata(&file, &entry)?;
    let raw = file.content.as_deref().ok_or(CodecError::MissingContent)?;
    let src = image_processing::decode(raw)?;
    log::debug!("Fetched {} ({} bytes)", path, metadata.size);

    Ok(Image {
        id: Uuid::new_v4(),
        name: entry.name,
        mtime: metadata.mtime,
        size: metadata.size,
        private: area.is_private(),
        src,
    })
}

//! Holder of the process-wide gallery state
//!
//! The sync manager only ever replaces the whole state through `update`; UI
//! consumers read snapshots or subscribe to changes.

use crate::models::GalleryState;
use tokio::sync::watch;

/// Read and atomically replace the gallery state
pub trait GalleryStateStore: Send + Sync + 'static {
    /// Snapshot of the current state
    fn get(&self) -> GalleryState;

    /// Replace the state with `transform(current)` in one step
    fn update<F>(&self, transform: F)
    where
        F: FnOnce(GalleryState) -> GalleryState;
}

/// State store broadcasting every replacement over a watch channel
pub struct WatchStateStore {
    tx: watch::Sender<GalleryState>,
}

impl WatchStateStore {
    pub fn new() -> Self {
        Self::with_state(GalleryState::default())
    }

    pub fn with_state(state: GalleryState) -> Self {
        let (tx, _rx) = watch::channel(state);
        Self { tx }
    }

    /// Receiver notified on every state replacement
    pub fn subscribe(&self) -> watch::Receiver<GalleryState> {
        self.tx.subscribe()
    }
}

impl Default for WatchStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GalleryStateStore for WatchStateStore {
    fn get(&self) -> GalleryState {
        self.tx.borrow().clone()
    }

    fn update<F>(&self, transform: F)
    where
        F: FnOnce(GalleryState) -> GalleryState,
    {
        self.tx.send_modify(|state| {
            let current = std::mem::take(state);
            *state = transform(current);
        });
    }
}

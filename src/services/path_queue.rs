//! Per-path serialization of store mutations
//!
//! Each target path maps to an async token. An operation holds the token for
//! its whole check-then-write sequence, so two uploads of the same name run one
//! after the other while unrelated paths proceed in parallel. Tokens are
//! removed once nobody holds or waits for them.

use gallery_store::StorePath;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One path's token and the number of tickets holding or waiting for it
struct Slot {
    token: Arc<AsyncMutex<()>>,
    users: usize,
}

#[derive(Default)]
pub struct PathQueue {
    slots: Mutex<HashMap<StorePath, Slot>>,
}

/// Exclusive access to one path until dropped
///
/// A ticket exists from the moment `acquire` starts waiting, so a cancelled
/// wait still gives its slot back.
pub struct PathTicket<'a> {
    queue: &'a PathQueue,
    path: StorePath,
    guard: Option<OwnedMutexGuard<()>>,
}

impl PathQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<StorePath, Slot>> {
        match self.slots.lock() {
            Ok(slots) => slots,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Waits until every earlier operation on `path` has finished
    pub async fn acquire(&self, path: &StorePath) -> PathTicket<'_> {
        let token = {
            let mut slots = self.slots();
            let slot = slots.entry(path.clone()).or_insert_with(|| Slot {
                token: Arc::new(AsyncMutex::new(())),
                users: 0,
            });
            slot.users += 1;
            slot.token.clone()
        };

        let mut ticket = PathTicket {
            queue: self,
            path: path.clone(),
            guard: None,
        };
        ticket.guard = Some(token.lock_owned().await);
        ticket
    }

    /// Number of paths with a pending or running operation
    pub fn active_paths(&self) -> usize {
        self.slots().len()
    }
}

impl Drop for PathTicket<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut slots = self.queue.slots();
        let idle = match slots.get_mut(&self.path) {
            Some(slot) => {
                slot.users = slot.users.saturating_sub(1);
                slot.users == 0
            }
            None => false,
        };
        if idle {
            slots.remove(&self.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_path_is_serialized() {
        let queue = Arc::new(PathQueue::new());
        let path = StorePath::parse("public/gallery/a.jpg").unwrap();
        let order = Arc::new(Mutex::new(Vec::new()));

        let first = queue.acquire(&path).await;

        let waiter = {
            let queue = queue.clone();
            let path = path.clone();
            let order = order.clone();
            tokio::spawn(async move {
                let _ticket = queue.acquire(&path).await;
                order.lock().unwrap().push("second");
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        order.lock().unwrap().push("first");
        drop(first);

        waiter.await.unwrap();
        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
        assert_eq!(queue.active_paths(), 0);
    }

    #[tokio::test]
    async fn test_abandoned_wait_releases_its_slot() {
        let queue = PathQueue::new();
        let path = StorePath::parse("public/gallery/a.jpg").unwrap();

        let held = queue.acquire(&path).await;
        let waited = tokio::time::timeout(Duration::from_millis(20), queue.acquire(&path)).await;
        assert!(waited.is_err());
        assert_eq!(queue.active_paths(), 1);

        drop(held);
        assert_eq!(queue.active_paths(), 0);

        // the path is usable again right away
        let again = tokio::time::timeout(Duration::from_millis(100), queue.acquire(&path)).await;
        assert!(again.is_ok());
    }

    #[tokio::test]
    async fn test_different_paths_do_not_block() {
        let queue = PathQueue::new();
        let a = StorePath::parse("public/gallery/a.jpg").unwrap();
        let b = StorePath::parse("private/gallery/a.jpg").unwrap();

        let _first = queue.acquire(&a).await;
        let second = tokio::time::timeout(Duration::from_millis(100), queue.acquire(&b)).await;
        assert!(second.is_ok());
        assert_eq!(queue.active_paths(), 2);
    }
}

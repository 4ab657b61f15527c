//! WebDAV-backed store
//!
//! Typically used with Nextcloud. Writes and removals are staged in memory and
//! overlay what the server reports; `publish` pushes them with PUT and DELETE.
//! A failed publish keeps every operation that was not committed yet.

use crate::error::{StoreError, StoreResult};
use crate::path::StorePath;
use crate::store::{DirEntry, FileMetadata, Store, StoreFile};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

/// Connection settings for a WebDAV store
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct WebDavConfig {
    pub server_url: String,
    pub username: String,
    pub app_password: String,
    /// Folder below the user's files that holds the `public/` and `private/` trees
    pub remote_path: String,
}

#[derive(Debug, Clone)]
enum Staged {
    Write {
        content: Vec<u8>,
        mtime: DateTime<Utc>,
    },
    Remove,
}

/// Store that commits to a WebDAV server on publish
pub struct WebDavStore {
    config: WebDavConfig,
    client: reqwest_dav::Client,
    staged: Mutex<BTreeMap<StorePath, Staged>>,
}

impl WebDavStore {
    pub fn new(config: WebDavConfig) -> StoreResult<Self> {
        let webdav_url = format!(
            "{}/remote.php/dav/files/{}",
            config.server_url.trim_end_matches('/'),
            config.username
        );

        let client = reqwest_dav::ClientBuilder::new()
            .set_host(webdav_url)
            .set_auth(reqwest_dav::Auth::Basic(
                config.username.clone(),
                config.app_password.clone(),
            ))
            .build()
            .map_err(|e| StoreError::WebDavError(format!("WebDAV client error: {:?}", e)))?;

        Ok(Self {
            config,
            client,
            staged: Mutex::new(BTreeMap::new()),
        })
    }

    /// Number of staged writes and removals waiting for `publish`
    pub fn pending_changes(&self) -> usize {
        self.staged.lock().map(|s| s.len()).unwrap_or(0)
    }

    fn staged(&self) -> StoreResult<MutexGuard<'_, BTreeMap<StorePath, Staged>>> {
        self.staged
            .lock()
            .map_err(|_| StoreError::Other("WebDAV staging lock poisoned".to_string()))
    }

    fn remote_path(&self, path: &StorePath) -> String {
        let base = self.config.remote_path.trim_matches('/');
        if base.is_empty() {
            path.to_string()
        } else {
            format!("{}/{}", base, path)
        }
    }

    /// Only a 404 from the server means absent; transport and auth errors fail
    async fn remote_exists(&self, path: &StorePath) -> StoreResult<bool> {
        match self
            .client
            .list(&self.remote_path(path), reqwest_dav::Depth::Number(0))
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(StoreError::WebDavError(format!(
                "Checking {} failed: {:?}",
                path, e
            ))),
        }
    }

    async fn remote_mtime(&self, path: &StorePath) -> StoreResult<Option<DateTime<Utc>>> {
        let list = self
            .client
            .list(&self.remote_path(path), reqwest_dav::Depth::Number(0))
            .await
            .map_err(|e| {
                StoreError::WebDavError(format!("Reading metadata of {} failed: {:?}", path, e))
            })?;
        Ok(list.into_iter().find_map(|item| match item {
            reqwest_dav::list_cmd::ListEntity::File(file) => Some(file.last_modified),
            _ => None,
        }))
    }

    /// Ensure a directory exists on the remote server
    async fn ensure_directory(&self, dir: &StorePath) {
        let mut current_path = self.config.remote_path.trim_matches('/').to_string();

        for part in dir.segments() {
            if current_path.is_empty() {
                current_path = part.to_string();
            } else {
                current_path = format!("{}/{}", current_path, part);
            }

            // Fails if it already exists
            if let Err(e) = self.client.mkcol(&current_path).await {
                log::debug!("MKCOL '{}' note: {:?}", current_path, e);
            }
        }
    }

    async fn commit(&self, path: &StorePath, op: Staged) -> StoreResult<()> {
        let remote_path = self.remote_path(path);
        match op {
            Staged::Write { content, .. } => {
                if let Some(parent) = path.parent() {
                    self.ensure_directory(&parent).await;
                }
                self.client
                    .put(&remote_path, content)
                    .await
                    .map_err(|e| StoreError::WebDavError(format!("Upload failed: {:?}", e)))?;
                log::info!("Uploaded {}", remote_path);
            }
            Staged::Remove => {
                self.client
                    .delete(&remote_path)
                    .await
                    .map_err(|e| StoreError::WebDavError(format!("Delete failed: {:?}", e)))?;
                log::info!("Deleted {}", remote_path);
            }
        }
        Ok(())
    }
}

/// Last segment of a (percent-encoded) href
fn name_from_href(href: &str) -> String {
    let raw = href.trim_end_matches('/').split('/').last().unwrap_or("");
    match urlencoding::decode(raw) {
        Ok(name) => name.into_owned(),
        Err(e) => {
            log::warn!("Undecodable href segment '{}': {}", raw, e);
            raw.to_string()
        }
    }
}

/// Whether the server answered 404
fn is_not_found(error: &reqwest_dav::Error) -> bool {
    match error {
        reqwest_dav::Error::Decode(reqwest_dav::DecodeError::StatusMismatched(e)) => {
            e.response_code == 404
        }
        reqwest_dav::Error::Decode(reqwest_dav::DecodeError::Server(e)) => e.response_code == 404,
        _ => false,
    }
}

#[async_trait]
impl Store for WebDavStore {
    async fn list(&self, dir: &StorePath) -> StoreResult<Vec<DirEntry>> {
        dir.partition()?;

        let remote = self
            .client
            .list(&self.remote_path(dir), reqwest_dav::Depth::Number(1))
            .await;

        let staged: Vec<(StorePath, Staged)> = self
            .staged()?
            .iter()
            .filter(|(path, _)| dir.is_parent_of(path))
            .map(|(path, op)| (path.clone(), op.clone()))
            .collect();

        let mut entries = match remote {
            Ok(items) => items
                .into_iter()
                .filter_map(|item| match item {
                    reqwest_dav::list_cmd::ListEntity::File(file) => {
                        let name = name_from_href(&file.href);
                        (!name.is_empty()).then(|| DirEntry {
                            name,
                            size: file.content_length.max(0) as u64,
                        })
                    }
                    _ => None,
                })
                .collect::<Vec<_>>(),
            Err(e) if is_not_found(&e) => {
                // A directory that only exists in staged writes
                if !staged.iter().any(|(_, op)| matches!(op, Staged::Write { .. })) {
                    return Err(StoreError::NotFound(dir.to_string()));
                }
                log::debug!("Remote directory {} not created yet", dir);
                Vec::new()
            }
            Err(e) => {
                return Err(StoreError::WebDavError(format!(
                    "Listing {} failed: {:?}",
                    dir, e
                )))
            }
        };

        for (path, op) in staged {
            entries.retain(|entry| entry.name != path.name());
            if let Staged::Write { content, .. } = op {
                entries.push(DirEntry {
                    name: path.name().to_string(),
                    size: content.len() as u64,
                });
            }
        }

        Ok(entries)
    }

    async fn read(&self, path: &StorePath) -> StoreResult<StoreFile> {
        path.partition()?;

        let staged = self.staged()?.get(path).cloned();
        match staged {
            Some(Staged::Write { content, mtime }) => {
                return Ok(StoreFile {
                    content: Some(content),
                    metadata: FileMetadata { mtime: Some(mtime) },
                })
            }
            Some(Staged::Remove) => return Err(StoreError::NotFound(path.to_string())),
            None => {}
        }

        let remote_path = self.remote_path(path);
        let response = self
            .client
            .get(&remote_path)
            .await
            .map_err(|e| StoreError::WebDavError(format!("Download failed: {:?}", e)))?;

        if response.status().as_u16() == 404 {
            return Err(StoreError::NotFound(path.to_string()));
        }
        if !response.status().is_success() {
            return Err(StoreError::WebDavError(format!(
                "Download of {} failed with status {}",
                remote_path,
                response.status()
            )));
        }

        let bytes = response.bytes().await.map_err(|e| {
            StoreError::WebDavError(format!("Failed to read response bytes: {}", e))
        })?;

        Ok(StoreFile {
            content: Some(bytes.to_vec()),
            metadata: FileMetadata {
                mtime: self.remote_mtime(path).await?,
            },
        })
    }

    async fn exists(&self, path: &StorePath) -> StoreResult<bool> {
        path.partition()?;
        let staged = self.staged()?.get(path).cloned();
        match staged {
            Some(Staged::Write { .. }) => Ok(true),
            Some(Staged::Remove) => Ok(false),
            None => self.remote_exists(path).await,
        }
    }

    async fn write(&self, path: &StorePath, content: Vec<u8>) -> StoreResult<()> {
        path.partition()?;
        log::debug!("Staging write of {} ({} bytes)", path, content.len());
        self.staged()?.insert(
            path.clone(),
            Staged::Write {
                content,
                mtime: Utc::now(),
            },
        );
        Ok(())
    }

    async fn remove(&self, path: &StorePath) -> StoreResult<()> {
        path.partition()?;
        let staged = self.staged()?.get(path).cloned();
        let on_server = match staged {
            Some(Staged::Remove) => return Err(StoreError::NotFound(path.to_string())),
            Some(Staged::Write { .. }) => self.remote_exists(path).await?,
            None => {
                if !self.remote_exists(path).await? {
                    return Err(StoreError::NotFound(path.to_string()));
                }
                true
            }
        };

        let mut staged = self.staged()?;
        if on_server {
            log::debug!("Staging removal of {}", path);
            staged.insert(path.clone(), Staged::Remove);
        } else {
            // Never published, nothing to delete remotely
            staged.remove(path);
        }
        Ok(())
    }

    async fn publish(&self) -> StoreResult<()> {
        let pending: Vec<(StorePath, Staged)> = self
            .staged()?
            .iter()
            .map(|(path, op)| (path.clone(), op.clone()))
            .collect();

        if pending.is_empty() {
            log::debug!("Nothing to publish");
            return Ok(());
        }

        let total = pending.len();
        for (path, op) in pending {
            self.commit(&path, op).await?;
            self.staged()?.remove(&path);
        }

        log::info!("Published {} changes to {}", total, self.config.server_url);
        Ok(())
    }

    async fn discard(&self, path: &StorePath) -> StoreResult<()> {
        path.partition()?;
        if self.staged()?.remove(path).is_some() {
            log::debug!("Discarded staged change to {}", path);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> WebDavStore {
        WebDavStore::new(WebDavConfig {
            server_url: "http://127.0.0.1:9/".to_string(),
            username: "alice".to_string(),
            app_password: "secret".to_string(),
            remote_path: "/Gallery/".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn test_remote_path() {
        let store = store();
        let path = StorePath::parse("private/gallery/a.jpg").unwrap();
        assert_eq!(store.remote_path(&path), "Gallery/private/gallery/a.jpg");
    }

    #[test]
    fn test_name_from_href() {
        assert_eq!(
            name_from_href("/remote.php/dav/files/alice/Gallery/public/gallery/a.jpg"),
            "a.jpg"
        );
        assert_eq!(name_from_href("/remote.php/dav/files/alice/Gallery/"), "Gallery");
        assert_eq!(
            name_from_href("/remote.php/dav/files/alice/Gallery/public/gallery/my%20cat.jpg"),
            "my cat.jpg"
        );
    }

    #[test]
    fn test_only_404_counts_as_not_found() {
        let status = |code| {
            reqwest_dav::Error::Decode(reqwest_dav::DecodeError::StatusMismatched(
                reqwest_dav::StatusMismatchedError {
                    response_code: code,
                    expected_code: 207,
                },
            ))
        };
        assert!(is_not_found(&status(404)));
        assert!(!is_not_found(&status(401)));
        assert!(!is_not_found(&status(503)));
        assert!(!is_not_found(&reqwest_dav::Error::MissingAuthContext));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_an_error() {
        let store = store();
        let path = StorePath::parse("public/gallery/a.jpg").unwrap();

        assert!(matches!(
            store.exists(&path).await,
            Err(StoreError::WebDavError(_))
        ));
        assert!(matches!(
            store.remove(&path).await,
            Err(StoreError::WebDavError(_))
        ));
        assert!(matches!(
            store.list(&StorePath::parse("public/gallery").unwrap()).await,
            Err(StoreError::WebDavError(_))
        ));
        assert_eq!(store.pending_changes(), 0);
    }

    #[tokio::test]
    async fn test_discard_drops_staged_write() {
        let store = store();
        let path = StorePath::parse("public/gallery/a.jpg").unwrap();
        store.write(&path, vec![1]).await.unwrap();

        store.discard(&path).await.unwrap();
        assert_eq!(store.pending_changes(), 0);
        // nothing staged is left to publish
        store.publish().await.unwrap();
    }

    #[tokio::test]
    async fn test_staged_write_is_visible_before_publish() {
        let store = store();
        let path = StorePath::parse("public/gallery/a.jpg").unwrap();
        store.write(&path, vec![1, 2, 3]).await.unwrap();

        assert!(store.exists(&path).await.unwrap());
        let file = store.read(&path).await.unwrap();
        assert_eq!(file.content, Some(vec![1, 2, 3]));
        assert!(file.metadata.mtime.is_some());
        assert_eq!(store.pending_changes(), 1);
    }

    #[tokio::test]
    async fn test_rejects_paths_outside_partitions() {
        let store = store();
        let path = StorePath::parse("shared/gallery/a.jpg").unwrap();
        assert!(matches!(
            store.write(&path, vec![1]).await,
            Err(StoreError::InvalidPath(_))
        ));
        assert_eq!(store.pending_changes(), 0);
    }
}

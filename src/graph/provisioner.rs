use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::graph::client::GraphClient;
use crate::graph::errors::{GraphError, Result};
use crate::graph::types::{DriveItem, FolderRef};

/// Fixed delay before the single re-fetch when URL resolution hits the
/// service's read-after-write lag. Deliberately not a backoff policy.
const URL_RESOLVE_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Idempotently materializes nested folder paths on a remote drive.
///
/// Paths are walked one segment at a time so a prior partial run (or a
/// concurrent sibling call sharing a prefix) never causes duplicate creation:
/// each segment is looked up first and only created on not-found, with the
/// creation call set to fail on a name conflict.
pub struct FolderProvisioner {
    client: Arc<GraphClient>,
    retry_delay: Duration,
}

impl FolderProvisioner {
    pub fn new(client: Arc<GraphClient>) -> Self {
        Self {
            client,
            retry_delay: URL_RESOLVE_RETRY_DELAY,
        }
    }

    /// Ensure every folder along `path` exists in `drive_id` and return the
    /// deepest one. An empty (or all-separator) path resolves the drive root.
    ///
    /// Idempotent: a second call with the same arguments issues lookups only.
    pub async fn ensure(&self, drive_id: &str, path: &str) -> Result<DriveItem> {
        let clean = normalize_path(path);
        if clean.is_empty() {
            return self.client.get_root(drive_id).await;
        }

        let mut parent = String::new();
        let mut resolved: Option<DriveItem> = None;

        for segment in clean.split('/') {
            let current = if parent.is_empty() {
                segment.to_string()
            } else {
                format!("{parent}/{segment}")
            };

            let item = match self.client.get_item_by_path(drive_id, &current).await {
                Ok(item) => item,
                Err(GraphError::NotFound { .. }) => {
                    self.create_segment(drive_id, &parent, segment, &current).await?
                }
                Err(other) => return Err(other),
            };

            parent = current;
            resolved = Some(item);
        }

        Ok(resolved.expect("non-empty path yields at least one segment"))
    }

    async fn create_segment(
        &self,
        drive_id: &str,
        parent: &str,
        name: &str,
        full_path: &str,
    ) -> Result<DriveItem> {
        match self.client.create_folder(drive_id, parent, name).await {
            Ok(item) => {
                debug!(drive = drive_id, path = full_path, "created remote folder");
                Ok(item)
            }
            Err(GraphError::Conflict { .. }) => {
                // Lost a race against a concurrent creator; the folder exists
                // now, so re-resolve it instead of failing the walk.
                debug!(
                    drive = drive_id,
                    path = full_path,
                    "creation conflict, re-resolving existing folder"
                );
                self.client.get_item_by_path(drive_id, full_path).await
            }
            Err(other) => Err(other),
        }
    }

    /// Ensure the folder exists *and* return a reference carrying its
    /// canonical URL.
    ///
    /// A freshly created folder's metadata may not include the URL yet, so
    /// resolution proceeds: item from the walk, re-fetch by id, re-fetch by
    /// path — each re-fetch retried exactly once after a fixed short delay.
    /// "Exists but URL unknown" is an error, never a placeholder.
    pub async fn ensure_with_url(&self, drive_id: &str, path: &str) -> Result<FolderRef> {
        let clean = normalize_path(path);
        let mut item = self.ensure(drive_id, &clean).await?;

        if let Some(folder) = folder_ref(drive_id, &item) {
            return Ok(folder);
        }

        if let Some(item_id) = item.id.clone() {
            let fetched = match self.client.get_item(drive_id, &item_id).await {
                Ok(fetched) => fetched,
                Err(first) => {
                    warn!(
                        drive = drive_id,
                        path = %clean,
                        error = %first,
                        "by-id URL resolution failed, retrying once"
                    );
                    sleep(self.retry_delay).await;
                    self.client.get_item(drive_id, &item_id).await?
                }
            };
            if let Some(folder) = folder_ref(drive_id, &fetched) {
                return Ok(folder);
            }
            item = fetched;
        }

        let fetched = match self.client.get_item_by_path(drive_id, &clean).await {
            Ok(fetched) => fetched,
            Err(first) => {
                warn!(
                    drive = drive_id,
                    path = %clean,
                    error = %first,
                    "by-path URL resolution failed, retrying once"
                );
                sleep(self.retry_delay).await;
                self.client.get_item_by_path(drive_id, &clean).await?
            }
        };
        if let Some(folder) = folder_ref(drive_id, &fetched) {
            return Ok(folder);
        }
        item = fetched;

        debug!(drive = drive_id, path = %clean, item_id = ?item.id, "no web URL after all resolution steps");
        Err(GraphError::UnresolvableReference { path: clean })
    }

    /// Ensure `base_path` plus one child folder per name. Children are walked
    /// sequentially here; callers needing parallel fan-out issue independent
    /// `ensure_with_url` calls per child instead.
    pub async fn create_subfolders(
        &self,
        drive_id: &str,
        base_path: &str,
        names: &[&str],
    ) -> Result<Vec<DriveItem>> {
        let clean_base = normalize_path(base_path);
        self.ensure(drive_id, &clean_base).await?;

        let mut folders = Vec::with_capacity(names.len());
        for name in names {
            let target = if clean_base.is_empty() {
                (*name).to_string()
            } else {
                format!("{clean_base}/{name}")
            };
            folders.push(self.ensure(drive_id, &target).await?);
        }
        Ok(folders)
    }
}

/// Strip leading/trailing separators and collapse empty segments.
pub fn normalize_path(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

fn folder_ref(drive_id: &str, item: &DriveItem) -> Option<FolderRef> {
    match (&item.id, &item.web_url) {
        (Some(id), Some(url)) => Some(FolderRef {
            drive_id: drive_id.to_string(),
            item_id: id.clone(),
            web_url: url.clone(),
        }),
        _ => None,
    }
}

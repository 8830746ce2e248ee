use serde::{Deserialize, Serialize};

/// Drive item metadata as returned by the remote storage API.
///
/// Only the fields the provisioner depends on are modeled. `web_url` can be
/// absent on a freshly created folder until the service catches up; see
/// `FolderProvisioner::ensure_with_url` for the resolution policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveItem {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub web_url: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// A fully resolved remote folder: identifier plus canonical URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderRef {
    pub drive_id: String,
    pub item_id: String,
    pub web_url: String,
}

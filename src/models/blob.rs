use serde::{Deserialize, Serialize};

/// One stored media file, as returned by a folder listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobItem {
    /// File name within its folder.
    pub name: String,
    /// Retrievable address of the file.
    pub url: String,
    /// Creation time in milliseconds since the epoch.
    pub created_ms: i64,
    /// Size in bytes.
    pub size: u64,
}

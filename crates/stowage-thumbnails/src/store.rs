//! Thumbnail records
//!
//! A record links a parent attachment and a spec name to the attachment
//! holding the encoded thumbnail bytes.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use stowage_attachments::StorageResult;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Thumbnail {
    /// Spec name
    pub name: String,
    pub parent_id: String,
    /// Attachment holding the encoded bytes
    pub body_id: String,
    pub width: u32,
    pub height: u32,
}

#[async_trait]
pub trait ThumbnailStorage: Send + Sync {
    async fn thumbnail_by_name(
        &self,
        parent_id: &str,
        name: &str,
    ) -> StorageResult<Option<Thumbnail>>;

    /// Insert, replacing any record for the same parent and spec name
    async fn put(&self, thumbnail: &Thumbnail) -> StorageResult<()>;

    /// All records of a parent
    async fn thumbnails(&self, parent_id: &str) -> StorageResult<Vec<Thumbnail>>;
}

#[derive(Default)]
pub struct MemoryThumbnailStorage {
    thumbnails: RwLock<HashMap<(String, String), Thumbnail>>,
}

impl MemoryThumbnailStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ThumbnailStorage for MemoryThumbnailStorage {
    async fn thumbnail_by_name(
        &self,
        parent_id: &str,
        name: &str,
    ) -> StorageResult<Option<Thumbnail>> {
        let thumbnails = self.thumbnails.read().await;
        Ok(thumbnails
            .get(&(parent_id.to_string(), name.to_string()))
            .cloned())
    }

    async fn put(&self, thumbnail: &Thumbnail) -> StorageResult<()> {
        let key = (thumbnail.parent_id.clone(), thumbnail.name.clone());
        self.thumbnails.write().await.insert(key, thumbnail.clone());
        Ok(())
    }

    async fn thumbnails(&self, parent_id: &str) -> StorageResult<Vec<Thumbnail>> {
        let thumbnails = self.thumbnails.read().await;
        let mut found: Vec<_> = thumbnails
            .values()
            .filter(|t| t.parent_id == parent_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(found)
    }
}

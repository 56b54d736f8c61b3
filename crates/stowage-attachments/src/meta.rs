//! Attachment metadata storage

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::model::Attachment;
use crate::storage::StorageResult;

/// Attachment metadata store trait
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetaStorage: Send + Sync {
    /// Insert or replace the record with the attachment's id
    async fn put(&self, attachment: &Attachment) -> StorageResult<()>;

    /// Remove a record. No-op if absent.
    async fn remove(&self, id: &str) -> StorageResult<()>;

    async fn attachment_by_id(&self, id: &str) -> StorageResult<Option<Attachment>>;

    /// Records for `ids`, in the requested order; unknown ids are skipped
    async fn attachments_by_ids(&self, ids: &[String]) -> StorageResult<Vec<Attachment>>;

    /// Records owned by `owner_id`
    async fn attachments(&self, owner_id: &str) -> StorageResult<Vec<Attachment>>;

    /// Records owned by any of `owner_ids`
    async fn attachments_by_owner_ids(&self, owner_ids: &[String])
        -> StorageResult<Vec<Attachment>>;

    async fn attachments_count_by_owner_ids(&self, owner_ids: &[String]) -> StorageResult<usize>;

    async fn attachments_by_group_id(&self, group_id: &str) -> StorageResult<Vec<Attachment>>;
}

/// In-memory metadata store, records kept in insertion order
pub struct MemoryMetaStorage {
    attachments: RwLock<Vec<Attachment>>,
}

impl Default for MemoryMetaStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryMetaStorage {
    pub fn new() -> Self {
        Self {
            attachments: RwLock::new(Vec::new()),
        }
    }

    fn owned_by_any(attachment: &Attachment, owner_ids: &[String]) -> bool {
        owner_ids.iter().any(|owner| attachment.has_owner(owner))
    }
}

#[async_trait]
impl MetaStorage for MemoryMetaStorage {
    async fn put(&self, attachment: &Attachment) -> StorageResult<()> {
        let mut attachments = self.attachments.write().await;
        match attachments.iter().position(|a| a.id == attachment.id) {
            Some(pos) => attachments[pos] = attachment.clone(),
            None => attachments.push(attachment.clone()),
        }
        Ok(())
    }

    async fn remove(&self, id: &str) -> StorageResult<()> {
        let mut attachments = self.attachments.write().await;
        attachments.retain(|a| a.id != id);
        Ok(())
    }

    async fn attachment_by_id(&self, id: &str) -> StorageResult<Option<Attachment>> {
        let attachments = self.attachments.read().await;
        Ok(attachments.iter().find(|a| a.id == id).cloned())
    }

    async fn attachments_by_ids(&self, ids: &[String]) -> StorageResult<Vec<Attachment>> {
        let attachments = self.attachments.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| attachments.iter().find(|a| &a.id == id).cloned())
            .collect())
    }

    async fn attachments(&self, owner_id: &str) -> StorageResult<Vec<Attachment>> {
        let attachments = self.attachments.read().await;
        Ok(attachments
            .iter()
            .filter(|a| a.has_owner(owner_id))
            .cloned()
            .collect())
    }

    async fn attachments_by_owner_ids(
        &self,
        owner_ids: &[String],
    ) -> StorageResult<Vec<Attachment>> {
        let attachments = self.attachments.read().await;
        Ok(attachments
            .iter()
            .filter(|a| Self::owned_by_any(a, owner_ids))
            .cloned()
            .collect())
    }

    async fn attachments_count_by_owner_ids(&self, owner_ids: &[String]) -> StorageResult<usize> {
        let attachments = self.attachments.read().await;
        Ok(attachments
            .iter()
            .filter(|a| Self::owned_by_any(a, owner_ids))
            .count())
    }

    async fn attachments_by_group_id(&self, group_id: &str) -> StorageResult<Vec<Attachment>> {
        let attachments = self.attachments.read().await;
        Ok(attachments
            .iter()
            .filter(|a| a.in_group(group_id))
            .cloned()
            .collect())
    }
}

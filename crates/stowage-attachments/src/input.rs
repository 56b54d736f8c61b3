//! Request adapter contract
//!
//! An [`Input`] is built per request. It tells the coordinator what the
//! caller asked for and decides how records are shaped on create and delete.

use async_trait::async_trait;
use stowage_core::StowResult;

use crate::meta::MetaStorage;
use crate::model::Attachment;

/// What the caller asked for
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMeta {
    /// Target attachment id
    pub id: String,
    pub filename: String,
    pub content_type: String,
    /// Thumbnail spec name
    pub thumbnail: String,
    /// Serve as a download (`application/octet-stream`)
    pub download: bool,
}

/// Headers of one multipart part
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartInfo {
    pub field_name: Option<String>,
    pub filename: Option<String>,
    pub content_type: Option<String>,
}

/// How a delete request mutates the target record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteAction {
    /// Persist the mutated record; content stays
    Update,
    /// Remove content, then the record
    Delete,
    /// Nothing to do
    Skip,
}

#[async_trait]
pub trait Input: Send + Sync {
    fn request(&self) -> &RequestMeta;

    /// Mutate `attachment` for a delete and choose the action.
    ///
    /// `attachment` is `None` when no record exists for the target id.
    fn set_attrs_for_delete(&mut self, attachment: Option<&mut Attachment>)
        -> StowResult<DeleteAction>;

    /// Fill create-time attributes (owners, category, groups)
    fn set_attrs_for_create(&mut self, attachment: &mut Attachment) -> StowResult<()>;

    /// Record the headers of a multipart part; returns whether it is a file
    fn set_multipart(&mut self, part: &PartInfo) -> bool;

    /// Load the attachments the caller wants bundled
    async fn load_attachments(&self, meta: &dyn MetaStorage) -> StowResult<Vec<Attachment>>;
}

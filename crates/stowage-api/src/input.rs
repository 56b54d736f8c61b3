//! Query-driven request adapter
//!
//! Attachments are scoped by owner: creating needs an `owner_id`, deleting
//! drops the requesting owner and only removes the attachment once nobody
//! owns it any more.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use stowage_attachments::{Attachment, DeleteAction, Input, MetaStorage, PartInfo, RequestMeta};
use stowage_core::{StowError, StowResult};

/// Query parameters understood by [`RequestInput`]
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InputParams {
    pub owner_id: Option<String>,
    pub category: Option<String>,
    pub group_id: Option<String>,
    /// Comma separated attachment ids
    pub ids: Option<String>,
    pub download: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RequestInput {
    request: RequestMeta,
    owner_id: Option<String>,
    category: String,
    group_id: Option<String>,
    ids: Vec<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

impl RequestInput {
    /// Build from path parameters (`id`, `spec`) and query parameters
    pub fn new(path: &HashMap<String, String>, params: InputParams) -> Self {
        let ids = params
            .ids
            .as_deref()
            .map(|ids| {
                ids.split(',')
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            request: RequestMeta {
                id: path.get("id").cloned().unwrap_or_default(),
                thumbnail: path.get("spec").cloned().unwrap_or_default(),
                download: params.download.as_deref().is_some_and(is_truthy),
                ..RequestMeta::default()
            },
            owner_id: non_empty(params.owner_id),
            category: params.category.unwrap_or_default(),
            group_id: non_empty(params.group_id),
            ids,
        }
    }

    pub fn owner_id(&self) -> Option<&str> {
        self.owner_id.as_deref()
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }
}

#[async_trait]
impl Input for RequestInput {
    fn request(&self) -> &RequestMeta {
        &self.request
    }

    fn set_attrs_for_delete(&mut self, attachment: Option<&mut Attachment>) -> StowResult<DeleteAction> {
        let Some(attachment) = attachment else {
            return Err(StowError::not_found("Attachment", &self.request.id));
        };

        let Some(owner) = &self.owner_id else {
            return Ok(DeleteAction::Delete);
        };
        if !attachment.remove_owner(owner) {
            return Ok(DeleteAction::Skip);
        }
        if attachment.owner_ids.is_empty() {
            Ok(DeleteAction::Delete)
        } else {
            Ok(DeleteAction::Update)
        }
    }

    fn set_attrs_for_create(&mut self, attachment: &mut Attachment) -> StowResult<()> {
        let owner = self
            .owner_id
            .clone()
            .ok_or_else(|| StowError::validation("owner_id required."))?;

        attachment.add_owner(owner);
        attachment.category = self.category.clone();
        if let Some(group) = &self.group_id {
            attachment.add_group(group.clone());
        }
        Ok(())
    }

    fn set_multipart(&mut self, part: &PartInfo) -> bool {
        let Some(filename) = part.filename.as_deref().filter(|f| !f.is_empty()) else {
            return false;
        };

        self.request.filename = filename.to_string();
        self.request.content_type = match part.content_type.as_deref() {
            Some(content_type) if !content_type.is_empty() => content_type.to_string(),
            _ => mime_guess::from_path(filename)
                .first_or_octet_stream()
                .to_string(),
        };
        true
    }

    /// By `ids` when given, else everything of the owner, else of the group
    async fn load_attachments(&self, meta: &dyn MetaStorage) -> StowResult<Vec<Attachment>> {
        if !self.ids.is_empty() {
            return Ok(meta.attachments_by_ids(&self.ids).await?);
        }
        if let Some(owner) = &self.owner_id {
            return Ok(meta.attachments(owner).await?);
        }
        if let Some(group) = &self.group_id {
            return Ok(meta.attachments_by_group_id(group).await?);
        }
        Err(StowError::validation("ids required."))
    }
}

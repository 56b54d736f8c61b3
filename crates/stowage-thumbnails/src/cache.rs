//! Thumbnail lookup with lazy generation
//!
//! A request for `(parent, spec)` is served from a stored thumbnail when one
//! exists. Otherwise the parent's bytes are resized, the result is stored as
//! a new attachment and linked with a [`Thumbnail`] record. Any failure while
//! generating degrades to the fallback image instead of an error.

use std::sync::Arc;

use chrono::Utc;
use stowage_attachments::{byte_stream, Attachment, BlobStorage, MetaStorage};
use stowage_core::{StowError, StowResult};
use tracing::{debug, info, instrument, warn};

use crate::fallback::{FallbackBody, FallbackImage};
use crate::resize::{ImageResizer, Resizer};
use crate::spec::{SpecRegistry, ThumbnailSpec};
use crate::store::{Thumbnail, ThumbnailStorage};

/// Upper bound on the buffer reserved up front from a recorded length
const SOURCE_CAPACITY_HINT: usize = 64 << 20;

#[derive(Debug, Clone, PartialEq)]
pub enum ThumbnailBody {
    Stored {
        thumbnail: Thumbnail,
        attachment: Attachment,
    },
    Fallback(FallbackBody),
}

#[derive(Clone)]
pub struct ThumbnailCache {
    blob: Arc<dyn BlobStorage>,
    meta: Arc<dyn MetaStorage>,
    thumbnails: Arc<dyn ThumbnailStorage>,
    specs: Arc<SpecRegistry>,
    resizer: Arc<dyn Resizer>,
    fallback: Arc<FallbackImage>,
}

impl ThumbnailCache {
    pub fn new(
        blob: Arc<dyn BlobStorage>,
        meta: Arc<dyn MetaStorage>,
        thumbnails: Arc<dyn ThumbnailStorage>,
        specs: Arc<SpecRegistry>,
        fallback: Arc<FallbackImage>,
    ) -> Self {
        Self {
            blob,
            meta,
            thumbnails,
            specs,
            resizer: Arc::new(ImageResizer::new()),
            fallback,
        }
    }

    pub fn with_resizer(mut self, resizer: Arc<dyn Resizer>) -> Self {
        self.resizer = resizer;
        self
    }

    pub fn specs(&self) -> &SpecRegistry {
        &self.specs
    }

    pub fn blob(&self) -> &Arc<dyn BlobStorage> {
        &self.blob
    }

    /// Thumbnail of `parent_id` for the spec named `spec_name`
    #[instrument(skip(self))]
    pub async fn get(&self, parent_id: &str, spec_name: &str) -> StowResult<ThumbnailBody> {
        if parent_id.is_empty() || spec_name.is_empty() {
            return Err(StowError::validation("id and thumbnail spec required."));
        }
        let spec = self
            .specs
            .get(spec_name)
            .ok_or_else(|| StowError::not_found("Thumbnail spec", spec_name))?;

        if let Some(thumbnail) = self.thumbnails.thumbnail_by_name(parent_id, spec_name).await? {
            match self.meta.attachment_by_id(&thumbnail.body_id).await? {
                Some(attachment) => {
                    return Ok(ThumbnailBody::Stored {
                        thumbnail,
                        attachment,
                    })
                }
                None => debug!(body_id = %thumbnail.body_id, "Thumbnail body missing, regenerating"),
            }
        }

        let parent = self
            .meta
            .attachment_by_id(parent_id)
            .await?
            .filter(|a| !a.has_error())
            .ok_or_else(|| StowError::not_found("Attachment", parent_id))?;

        match self.generate(&parent, spec).await {
            Ok(body) => Ok(body),
            Err(e) => {
                warn!(error = %e, "Thumbnail generation failed, serving fallback");
                Ok(ThumbnailBody::Fallback(self.fallback.body().await))
            }
        }
    }

    async fn generate(&self, parent: &Attachment, spec: &ThumbnailSpec) -> StowResult<ThumbnailBody> {
        let hint = usize::try_from(parent.content_length).unwrap_or(usize::MAX);
        let mut source = Vec::with_capacity(hint.min(SOURCE_CAPACITY_HINT));
        self.blob.copy(parent, &mut source).await?;
        if source.is_empty() {
            return Err(StowError::Decode("empty source image".to_string()));
        }

        let resizer = self.resizer.clone();
        let task_spec = spec.clone();
        let resized = tokio::task::spawn_blocking(move || resizer.resize(&source, &task_spec))
            .await
            .map_err(|e| StowError::Decode(format!("resize task failed: {e}")))??;

        let mut body = Attachment {
            owner_ids: parent.owner_ids.clone(),
            category: parent.category.clone(),
            width: resized.width,
            height: resized.height,
            upload_time: Utc::now(),
            ..Attachment::new()
        };
        body.add_group(parent.id.clone());
        body.add_group(spec.name());

        self.blob
            .put(
                &parent.filename,
                resized.content_type,
                byte_stream(resized.data),
                &mut body,
            )
            .await?;
        self.meta.put(&body).await?;

        let thumbnail = Thumbnail {
            name: spec.name().to_string(),
            parent_id: parent.id.clone(),
            body_id: body.id.clone(),
            width: resized.width,
            height: resized.height,
        };
        self.thumbnails.put(&thumbnail).await?;

        let attachment = self
            .meta
            .attachment_by_id(&thumbnail.body_id)
            .await?
            .ok_or_else(|| StowError::storage("thumbnail body vanished after write"))?;

        info!(
            parent_id = %parent.id,
            spec = spec.name(),
            width = thumbnail.width,
            height = thumbnail.height,
            "Thumbnail generated"
        );
        Ok(ThumbnailBody::Stored {
            thumbnail,
            attachment,
        })
    }
}

//! Multipart bodies as upload part sources

use async_trait::async_trait;
use axum::extract::Multipart;
use futures::{StreamExt, TryStreamExt};
use stowage_attachments::{PartInfo, PartSource, UploadPart};
use stowage_core::{StowError, StowResult};

pub struct MultipartParts {
    multipart: Multipart,
}

impl MultipartParts {
    pub fn new(multipart: Multipart) -> Self {
        Self { multipart }
    }
}

#[async_trait]
impl PartSource for MultipartParts {
    async fn next_part<'a>(&'a mut self) -> StowResult<Option<UploadPart<'a>>> {
        let field = self
            .multipart
            .next_field()
            .await
            .map_err(|e| StowError::validation(format!("Invalid multipart body: {e}")))?;
        let Some(field) = field else {
            return Ok(None);
        };

        let info = PartInfo {
            field_name: field.name().map(str::to_string),
            filename: field.file_name().map(str::to_string),
            content_type: field.content_type().map(str::to_string),
        };
        let body = field.map_err(std::io::Error::other).boxed();

        Ok(Some(UploadPart { info, body }))
    }
}

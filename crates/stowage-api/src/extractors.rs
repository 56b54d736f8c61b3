//! Axum extractors for API handlers

use std::collections::HashMap;

use axum::{
    async_trait,
    extract::{FromRequestParts, Path, Query},
    http::request::Parts,
};
use stowage_attachments::AttachmentService;
use stowage_thumbnails::ThumbnailCache;

use crate::error::ApiError;
use crate::input::{InputParams, RequestInput};

pub const DEFAULT_CACHE_DAYS: u32 = 30;

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub attachments: AttachmentService,
    pub thumbnails: ThumbnailCache,
    /// Client cache window for attachment and thumbnail bodies
    pub cache_days: u32,
}

impl AppState {
    pub fn new(attachments: AttachmentService, thumbnails: ThumbnailCache) -> Self {
        Self {
            attachments,
            thumbnails,
            cache_days: DEFAULT_CACHE_DAYS,
        }
    }

    pub fn with_cache_days(mut self, days: u32) -> Self {
        self.cache_days = days;
        self
    }
}

/// Path and query parameters never reject: missing values stay empty and
/// the operation reports what it needs.
#[async_trait]
impl<S> FromRequestParts<S> for RequestInput
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(path) = Path::<HashMap<String, String>>::from_request_parts(parts, state)
            .await
            .unwrap_or_else(|_| Path(HashMap::new()));
        let Query(params) = Query::<InputParams>::from_request_parts(parts, state)
            .await
            .unwrap_or_else(|_| Query(InputParams::default()));

        Ok(RequestInput::new(&path, params))
    }
}

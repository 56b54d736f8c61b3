//! Thumbnail handler

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderValue},
    response::IntoResponse,
};
use chrono::Utc;
use stowage_attachments::Input;
use stowage_thumbnails::ThumbnailBody;

use super::{content_body, set_content_type};
use crate::error::ApiResult;
use crate::extractors::AppState;
use crate::headers::{set_cache_control, set_no_cache};
use crate::input::RequestInput;

/// Thumbnail of an attachment, generated on first request
///
/// GET /attachments/:id/thumbnails/:spec
///
/// Generation failures answer 200 with the fallback image, uncached so the
/// client retries later.
pub async fn load_thumbnail(
    State(state): State<AppState>,
    input: RequestInput,
) -> ApiResult<impl IntoResponse> {
    let request = input.request();
    let thumbnail = state
        .thumbnails
        .get(&request.id, &request.thumbnail)
        .await?;

    let mut headers = HeaderMap::new();
    let body = match thumbnail {
        ThumbnailBody::Stored { attachment, .. } => {
            set_content_type(&mut headers, &attachment.content_type);
            headers.insert(
                header::CONTENT_LENGTH,
                HeaderValue::from(attachment.content_length),
            );
            set_cache_control(&mut headers, state.cache_days, Utc::now());
            content_body(state.thumbnails.blob().clone(), attachment)
        }
        ThumbnailBody::Fallback(fallback) => {
            set_content_type(&mut headers, &fallback.content_type);
            set_no_cache(&mut headers);
            Body::from(fallback.data)
        }
    };

    Ok((headers, body))
}

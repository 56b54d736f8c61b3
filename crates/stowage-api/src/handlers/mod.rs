//! API request handlers

pub mod attachments;
pub mod thumbnails;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue};
use stowage_attachments::{Attachment, BlobStorage};
use tokio_util::io::ReaderStream;
use tracing::warn;

pub use attachments::*;
pub use thumbnails::*;

const STREAM_BUFFER: usize = 64 * 1024;

pub(crate) const OCTET_STREAM: &str = "application/octet-stream";

/// Response body fed from `copy` on a background task.
///
/// The status line is already sent when the copy runs, so a copy failure
/// ends the body early and is only logged.
pub(crate) fn content_body(blob: Arc<dyn BlobStorage>, attachment: Attachment) -> Body {
    let (mut writer, reader) = tokio::io::duplex(STREAM_BUFFER);
    tokio::spawn(async move {
        if let Err(e) = blob.copy(&attachment, &mut writer).await {
            warn!(id = %attachment.id, error = %e, "Streaming attachment content failed");
        }
    });
    Body::from_stream(ReaderStream::new(reader))
}

/// Response body fed from `bundle` on a background task
pub(crate) fn archive_body(blob: Arc<dyn BlobStorage>, attachments: Vec<Attachment>) -> Body {
    let (mut writer, reader) = tokio::io::duplex(STREAM_BUFFER);
    tokio::spawn(async move {
        if let Err(e) = blob.bundle(&attachments, &mut writer).await {
            warn!(count = attachments.len(), error = %e, "Streaming archive failed");
        }
    });
    Body::from_stream(ReaderStream::new(reader))
}

pub(crate) fn set_content_type(headers: &mut HeaderMap, content_type: &str) {
    let value = HeaderValue::from_str(content_type)
        .ok()
        .filter(|_| !content_type.is_empty())
        .unwrap_or_else(|| HeaderValue::from_static(OCTET_STREAM));
    headers.insert(header::CONTENT_TYPE, value);
}

//! Attachment handlers
//!
//! File and archive downloads stream content from the byte store. Upload and
//! delete answer with the `{Error, Attachments}` envelope, even on failure.

use axum::{
    extract::{Multipart, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use stowage_attachments::{Attachment, Input};
use stowage_core::{StowError, StowResult};
use tracing::error;

use super::{archive_body, content_body, set_content_type};
use crate::error::ApiResult;
use crate::extractors::AppState;
use crate::headers::{content_disposition, set_cache_control};
use crate::input::RequestInput;
use crate::multipart::MultipartParts;

pub const ARCHIVE_FILENAME: &str = "attachments.tar.gz";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AttachmentsEnvelope {
    pub error: String,
    pub attachments: Vec<Attachment>,
}

impl AttachmentsEnvelope {
    pub fn ok(attachments: Vec<Attachment>) -> Self {
        Self {
            error: String::new(),
            attachments,
        }
    }

    pub fn failed(error: impl Into<String>, attachments: Vec<Attachment>) -> Self {
        Self {
            error: error.into(),
            attachments,
        }
    }
}

/// User errors travel in the envelope with 200; system errors also set the status
fn envelope_error(err: StowError, attachments: Vec<Attachment>) -> Response {
    let status = if err.is_user_error() {
        StatusCode::OK
    } else {
        error!(error = %err, "Attachment request failed");
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    };
    (status, Json(AttachmentsEnvelope::failed(err.to_string(), attachments))).into_response()
}

fn envelope(result: StowResult<Vec<Attachment>>) -> Response {
    match result {
        Ok(attachments) => Json(AttachmentsEnvelope::ok(attachments)).into_response(),
        Err(e) => envelope_error(e, Vec::new()),
    }
}

/// Download one attachment
///
/// GET /attachments/:id
pub async fn load_file(
    State(state): State<AppState>,
    input: RequestInput,
) -> ApiResult<impl IntoResponse> {
    let request = input.request();
    let attachment = state.attachments.find(&request.id).await?;

    let mut headers = HeaderMap::new();
    if request.download {
        set_content_type(&mut headers, mime::APPLICATION_OCTET_STREAM.as_ref());
        headers.insert(
            header::CONTENT_DISPOSITION,
            content_disposition(&attachment.filename),
        );
    } else {
        set_content_type(&mut headers, &attachment.content_type);
    }
    headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from(attachment.content_length),
    );
    set_cache_control(&mut headers, state.cache_days, Utc::now());

    let body = content_body(state.attachments.blob().clone(), attachment);
    Ok((headers, body))
}

/// Download several attachments as one gzip-compressed tar archive
///
/// GET /archive?ids=a,b
pub async fn load_archive(
    State(state): State<AppState>,
    input: RequestInput,
) -> ApiResult<impl IntoResponse> {
    let attachments = state.attachments.load_bundle(&input).await?;

    let mut headers = HeaderMap::new();
    set_content_type(&mut headers, "application/gzip");
    headers.insert(
        header::CONTENT_DISPOSITION,
        content_disposition(ARCHIVE_FILENAME),
    );

    let body = archive_body(state.attachments.blob().clone(), attachments);
    Ok((headers, body))
}

/// Store every file part of a multipart body
///
/// POST /attachments
///
/// On full success the envelope lists all attachments of the first
/// attachment's owners, not only the new ones.
pub async fn upload(
    State(state): State<AppState>,
    mut input: RequestInput,
    multipart: Multipart,
) -> Response {
    let mut parts = MultipartParts::new(multipart);
    let outcome = match state.attachments.upload(&mut input, &mut parts).await {
        Ok(outcome) => outcome,
        Err(e) => return envelope_error(e, Vec::new()),
    };

    if let Some(error) = outcome.error() {
        return Json(AttachmentsEnvelope::failed(error, outcome.attachments)).into_response();
    }

    let owners = outcome
        .attachments
        .first()
        .map(|a| a.owner_ids.clone())
        .unwrap_or_default();
    match state.attachments.meta().attachments_by_owner_ids(&owners).await {
        Ok(attachments) => Json(AttachmentsEnvelope::ok(attachments)).into_response(),
        Err(e) => envelope_error(e.into(), outcome.attachments),
    }
}

/// Delete an attachment, or drop the requesting owner from it
///
/// POST /attachments/:id/delete, DELETE /attachments/:id
pub async fn delete(State(state): State<AppState>, mut input: RequestInput) -> Response {
    envelope(state.attachments.delete(&mut input).await)
}

//! API routes

use axum::{
    routing::{get, post},
    Router,
};

use crate::extractors::AppState;
use crate::handlers::{attachments, thumbnails};

/// Create the attachment and thumbnail router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/attachments", post(attachments::upload))
        .route(
            "/attachments/:id",
            get(attachments::load_file).delete(attachments::delete),
        )
        .route("/attachments/:id/delete", post(attachments::delete))
        .route(
            "/attachments/:id/thumbnails/:spec",
            get(thumbnails::load_thumbnail),
        )
        .route("/archive", get(attachments::load_archive))
}

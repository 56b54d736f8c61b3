//! # stowage-api
//!
//! HTTP surface for attachments and thumbnails: file, archive and thumbnail
//! downloads, multipart upload, and owner-scoped delete.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod headers;
pub mod input;
pub mod multipart;
pub mod routes;

pub use extractors::AppState;
pub use input::RequestInput;
pub use routes::router;

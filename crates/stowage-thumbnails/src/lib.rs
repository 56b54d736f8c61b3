//! Thumbnail generation and caching
//!
//! Thumbnails are produced on first request per `(attachment, spec)` pair
//! and stored as ordinary attachments, linked through [`Thumbnail`] records.

pub mod cache;
pub mod fallback;
pub mod resize;
pub mod spec;
pub mod store;

pub use cache::{ThumbnailBody, ThumbnailCache};
pub use fallback::{FallbackBody, FallbackImage};
pub use resize::{ImageResizer, Resized, Resizer};
pub use spec::{SpecRegistry, ThumbnailSpec};
pub use store::{MemoryThumbnailStorage, Thumbnail, ThumbnailStorage};

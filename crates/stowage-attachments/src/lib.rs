//! # stowage-attachments
//!
//! Attachment lifecycle for Stowage.
//!
//! ## Features
//!
//! - Byte storage abstraction (local filesystem, in-memory) with archive bundling
//! - Metadata storage abstraction with owner and group queries
//! - Request adapter contract deciding how records are shaped
//! - Create, bulk upload and delete across both stores
//!
//! ## Example
//!
//! ```rust,ignore
//! use stowage_attachments::{byte_stream, AttachmentService, MemoryMetaStorage, MemoryStorage};
//! use std::sync::Arc;
//!
//! let service = AttachmentService::new(
//!     Arc::new(MemoryStorage::new()),
//!     Arc::new(MemoryMetaStorage::new()),
//! );
//!
//! let attachment = service.create(&mut input, byte_stream(file_data)).await?;
//! ```

pub mod archive;
pub mod input;
pub mod meta;
pub mod model;
pub mod service;
pub mod storage;

pub use input::{DeleteAction, Input, PartInfo, RequestMeta};
pub use meta::{MemoryMetaStorage, MetaStorage};
pub use model::Attachment;
pub use service::{
    AttachmentService, PartSource, UploadOutcome, UploadPart, NO_ATTACHMENTS_UPLOADED,
    SOME_ATTACHMENT_HAS_ERROR,
};
pub use storage::{
    byte_stream, BlobStorage, ByteStream, LocalStorage, MemoryStorage, Sink, StorageError,
    StorageResult,
};

//! Byte storage
//!
//! Provides a unified interface for attachment content backends. A backend
//! owns identity assignment: `put` generates the attachment id and records
//! the stored length and digest on the attachment.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use sha2::{Digest, Sha256};
use stowage_core::StowError;
use thiserror::Error;
use tokio::fs;
use tokio::io::{AsyncWrite, AsyncWriteExt, DuplexStream};
use tokio::sync::{mpsc, RwLock};
use tokio_util::io::SyncIoBridge;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::archive::{ArchiveEntry, ArchiveWriter};
use crate::model::Attachment;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Invalid path: {0}")]
    InvalidPath(String),
    #[error("Storage backend error: {0}")]
    BackendError(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

const BUNDLE_BUFFER: usize = 64 * 1024;

impl From<StorageError> for StowError {
    fn from(err: StorageError) -> Self {
        StowError::Storage(err.to_string())
    }
}

/// Attachment content as it arrives from a request body or another store
pub type ByteStream<'a> = BoxStream<'a, std::io::Result<Bytes>>;

/// Wrap an in-memory buffer as a single-chunk [`ByteStream`]
pub fn byte_stream(data: impl Into<Bytes>) -> ByteStream<'static> {
    stream::once(futures::future::ready(Ok(data.into()))).boxed()
}

/// Destination for attachment content (response body, buffer, archive)
pub type Sink<'a> = dyn AsyncWrite + Send + Unpin + 'a;

/// Byte storage trait - unified interface for content backends
#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// Store content and assign identity, length and digest on `attachment`
    async fn put(
        &self,
        filename: &str,
        content_type: &str,
        body: ByteStream<'_>,
        attachment: &mut Attachment,
    ) -> StorageResult<()>;

    /// Delete the content of an attachment. No-op if already absent.
    async fn delete(&self, attachment: &Attachment) -> StorageResult<()>;

    /// Write the content of an attachment into `sink`
    async fn copy(&self, attachment: &Attachment, sink: &mut Sink<'_>) -> StorageResult<()>;

    /// Write a gzip-compressed tar archive of `attachments` into `sink`
    ///
    /// Content flows through a blocking archive writer one entry at a time;
    /// each entry must match its recorded `content_length`.
    async fn bundle(&self, attachments: &[Attachment], sink: &mut Sink<'_>) -> StorageResult<()> {
        let handle = tokio::runtime::Handle::current();
        let (archive_writer, mut archive_reader) = tokio::io::duplex(BUNDLE_BUFFER);
        let (tx, mut rx) = mpsc::channel::<(ArchiveEntry, DuplexStream)>(1);

        let writer = SyncIoBridge::new_with_handle(archive_writer, handle.clone());
        let archive = tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut archive = ArchiveWriter::new(writer);
            while let Some((entry, reader)) = rx.blocking_recv() {
                archive.append(&entry, SyncIoBridge::new_with_handle(reader, handle.clone()))?;
            }
            std::io::Write::flush(&mut archive.finish()?)
        });

        let feed = async move {
            for attachment in attachments {
                let (mut writer, reader) = tokio::io::duplex(BUNDLE_BUFFER);
                tx.send((ArchiveEntry::new(attachment), reader))
                    .await
                    .map_err(|_| StorageError::BackendError("archive writer stopped".to_string()))?;
                self.copy(attachment, &mut writer).await?;
            }
            Ok::<_, StorageError>(())
        };
        let build = async {
            archive
                .await
                .map_err(|e| StorageError::BackendError(format!("archive task failed: {e}")))??;
            Ok::<_, StorageError>(())
        };
        let pump = async {
            tokio::io::copy(&mut archive_reader, &mut *sink).await?;
            sink.flush().await?;
            Ok::<_, StorageError>(())
        };

        tokio::try_join!(feed, build, pump)?;
        Ok(())
    }

    /// Get storage name for logging
    fn name(&self) -> &str;
}

fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn fill_attachment(
    attachment: &mut Attachment,
    id: String,
    filename: &str,
    content_type: &str,
    length: u64,
    hasher: Sha256,
) {
    attachment.id = id;
    attachment.filename = filename.to_string();
    attachment.content_type = content_type.to_string();
    attachment.content_length = length;
    attachment.digest = hex::encode(hasher.finalize());
}

/// Local filesystem storage
///
/// Content lives at `<root>/<first two id chars>/<id>`.
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve an attachment id to a full path
    fn resolve_path(&self, id: &str) -> StorageResult<PathBuf> {
        // Ids are generated by `put`; anything else never reaches the disk
        if id.len() < 3 || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(StorageError::InvalidPath(id.to_string()));
        }

        Ok(self.root.join(&id[..2]).join(id))
    }

    async fn write_stream(
        path: &Path,
        mut body: ByteStream<'_>,
        hasher: &mut Sha256,
    ) -> StorageResult<u64> {
        let mut file = fs::File::create(path).await?;
        let mut length = 0u64;

        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            hasher.update(&chunk);
            length += chunk.len() as u64;
            file.write_all(&chunk).await?;
        }

        file.sync_all().await?;
        Ok(length)
    }
}

#[async_trait]
impl BlobStorage for LocalStorage {
    #[instrument(skip(self, body, attachment), fields(storage = "local"))]
    async fn put(
        &self,
        filename: &str,
        content_type: &str,
        body: ByteStream<'_>,
        attachment: &mut Attachment,
    ) -> StorageResult<()> {
        let id = new_id();
        let path = self.resolve_path(&id)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut hasher = Sha256::new();
        let length = match Self::write_stream(&path, body, &mut hasher).await {
            Ok(length) => length,
            Err(e) => {
                if let Err(cleanup) = fs::remove_file(&path).await {
                    warn!(path = ?path, error = %cleanup, "Failed to remove partial upload");
                }
                return Err(e);
            }
        };

        debug!(path = ?path, size = length, "File stored");
        fill_attachment(attachment, id, filename, content_type, length, hasher);
        Ok(())
    }

    #[instrument(skip(self, attachment), fields(storage = "local", id = %attachment.id))]
    async fn delete(&self, attachment: &Attachment) -> StorageResult<()> {
        let path = self.resolve_path(&attachment.id)?;

        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(path = ?path, "File deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn copy(&self, attachment: &Attachment, sink: &mut Sink<'_>) -> StorageResult<()> {
        let path = self.resolve_path(&attachment.id)?;

        let mut file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(attachment.id.clone()));
            }
            Err(e) => return Err(e.into()),
        };

        tokio::io::copy(&mut file, sink).await?;
        sink.flush().await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "local"
    }
}

/// In-memory storage for testing
pub struct MemoryStorage {
    files: RwLock<HashMap<String, Bytes>>,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            files: RwLock::new(HashMap::new()),
        }
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.files.read().await.contains_key(id)
    }

    pub async fn len(&self) -> usize {
        self.files.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.files.read().await.is_empty()
    }
}

#[async_trait]
impl BlobStorage for MemoryStorage {
    async fn put(
        &self,
        filename: &str,
        content_type: &str,
        mut body: ByteStream<'_>,
        attachment: &mut Attachment,
    ) -> StorageResult<()> {
        let mut hasher = Sha256::new();
        let mut data = Vec::new();
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            hasher.update(&chunk);
            data.extend_from_slice(&chunk);
        }

        let id = new_id();
        let length = data.len() as u64;
        self.files.write().await.insert(id.clone(), Bytes::from(data));

        fill_attachment(attachment, id, filename, content_type, length, hasher);
        Ok(())
    }

    async fn delete(&self, attachment: &Attachment) -> StorageResult<()> {
        self.files.write().await.remove(&attachment.id);
        Ok(())
    }

    async fn copy(&self, attachment: &Attachment, sink: &mut Sink<'_>) -> StorageResult<()> {
        let data = self
            .files
            .read()
            .await
            .get(&attachment.id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(attachment.id.clone()))?;

        sink.write_all(&data).await?;
        sink.flush().await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

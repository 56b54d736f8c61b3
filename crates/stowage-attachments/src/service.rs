//! Attachment Service
//!
//! Orchestrates create and delete across the byte store and the metadata
//! store. The two stores fail independently and nothing here compensates:
//! if content is stored but the metadata write fails, the content stays
//! behind without a record and the error is returned to the caller.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use stowage_core::{StowError, StowResult};
use tracing::{debug, info, instrument, warn};

use crate::input::{DeleteAction, Input, PartInfo};
use crate::meta::MetaStorage;
use crate::model::Attachment;
use crate::storage::{BlobStorage, ByteStream};

/// Reported when a multipart request carried no file parts
pub const NO_ATTACHMENTS_UPLOADED: &str = "No attachments uploaded.";

/// Reported when at least one part of a bulk upload failed
pub const SOME_ATTACHMENT_HAS_ERROR: &str = "Some attachment has error";

/// One part of a multipart body
pub struct UploadPart<'a> {
    pub info: PartInfo,
    pub body: ByteStream<'a>,
}

/// Sequential reader over the parts of a multipart body
#[async_trait]
pub trait PartSource: Send {
    /// Next part, `None` at the end of the body
    async fn next_part<'a>(&'a mut self) -> StowResult<Option<UploadPart<'a>>>;
}

/// Result of a bulk upload
#[derive(Debug)]
pub struct UploadOutcome {
    /// Every attachment attempted, failed ones carry their own error
    pub attachments: Vec<Attachment>,
    /// Set when reading the body stopped before its end
    pub interrupted: Option<StowError>,
}

impl UploadOutcome {
    pub fn has_errors(&self) -> bool {
        self.attachments.iter().any(Attachment::has_error)
    }

    /// Batch-level error message, `None` when every part was stored
    pub fn error(&self) -> Option<String> {
        if self.has_errors() {
            return Some(SOME_ATTACHMENT_HAS_ERROR.to_string());
        }
        self.interrupted.as_ref().map(ToString::to_string)
    }
}

/// Attachment service
#[derive(Clone)]
pub struct AttachmentService {
    blob: Arc<dyn BlobStorage>,
    meta: Arc<dyn MetaStorage>,
}

impl AttachmentService {
    pub fn new(blob: Arc<dyn BlobStorage>, meta: Arc<dyn MetaStorage>) -> Self {
        Self { blob, meta }
    }

    pub fn blob(&self) -> &Arc<dyn BlobStorage> {
        &self.blob
    }

    pub fn meta(&self) -> &Arc<dyn MetaStorage> {
        &self.meta
    }

    /// Create an attachment from one content stream
    pub async fn create(
        &self,
        input: &mut dyn Input,
        body: ByteStream<'_>,
    ) -> StowResult<Attachment> {
        let mut attachment = Attachment::new();
        self.create_into(input, body, &mut attachment).await?;
        Ok(attachment)
    }

    /// Fill and persist `attachment`; on failure it keeps whatever was set
    #[instrument(skip_all, fields(storage = self.blob.name()))]
    async fn create_into(
        &self,
        input: &mut dyn Input,
        body: ByteStream<'_>,
        attachment: &mut Attachment,
    ) -> StowResult<()> {
        input.set_attrs_for_create(attachment)?;

        let request = input.request();
        let (filename, content_type) = (request.filename.clone(), request.content_type.clone());

        attachment.upload_time = Utc::now();
        self.blob
            .put(&filename, &content_type, body, attachment)
            .await?;

        if let Err(e) = self.meta.put(attachment).await {
            warn!(id = %attachment.id, error = %e, "Content stored without a metadata record");
            return Err(e.into());
        }

        info!(id = %attachment.id, filename = %attachment.filename, "Attachment created");
        Ok(())
    }

    /// Create one attachment per file part.
    ///
    /// Reading stops at the first error from `parts`. A part whose creation
    /// fails is kept with its error set; nothing is rolled back.
    #[instrument(skip_all)]
    pub async fn upload(
        &self,
        input: &mut dyn Input,
        parts: &mut dyn PartSource,
    ) -> StowResult<UploadOutcome> {
        let mut attachments = Vec::new();
        let mut interrupted = None;

        loop {
            let part = match parts.next_part().await {
                Ok(Some(part)) => part,
                Ok(None) => break,
                Err(e) => {
                    debug!(error = %e, "Stopped reading multipart body");
                    interrupted = Some(e);
                    break;
                }
            };

            if !input.set_multipart(&part.info) {
                continue;
            }

            let mut attachment = Attachment::new();
            if let Err(e) = self.create_into(input, part.body, &mut attachment).await {
                warn!(filename = ?part.info.filename, error = %e, "Upload part failed");
                attachment.error = e.to_string();
            }
            attachments.push(attachment);
        }

        if attachments.is_empty() {
            return Err(StowError::validation(NO_ATTACHMENTS_UPLOADED));
        }

        Ok(UploadOutcome {
            attachments,
            interrupted,
        })
    }

    /// Delete, or soft-update, the attachment the input targets
    #[instrument(skip_all, fields(id = %input.request().id))]
    pub async fn delete(&self, input: &mut dyn Input) -> StowResult<Vec<Attachment>> {
        let id = input.request().id.clone();
        if id.is_empty() {
            return Err(StowError::validation("id required."));
        }

        let mut found = self.meta.attachment_by_id(&id).await?;
        let action = input.set_attrs_for_delete(found.as_mut())?;

        let attachment = match (action, found) {
            (DeleteAction::Skip, _) => return Ok(Vec::new()),
            (_, None) => return Err(StowError::not_found("Attachment", &id)),
            (_, Some(attachment)) => attachment,
        };

        if action == DeleteAction::Update {
            self.meta.put(&attachment).await?;
            info!(id = %id, owners = attachment.owner_ids.len(), "Attachment updated");
            return Ok(vec![attachment]);
        }

        // Content before record
        self.blob.delete(&attachment).await?;
        self.meta.remove(&id).await?;

        info!(id = %id, filename = %attachment.filename, "Attachment deleted");
        Ok(vec![attachment])
    }

    /// Load a retrievable attachment by id
    pub async fn find(&self, id: &str) -> StowResult<Attachment> {
        if id.is_empty() {
            return Err(StowError::validation("id required."));
        }

        match self.meta.attachment_by_id(id).await? {
            Some(attachment) if !attachment.has_error() => Ok(attachment),
            _ => Err(StowError::not_found("Attachment", id)),
        }
    }

    /// Attachments the input asks to bundle; an empty selection is not found
    pub async fn load_bundle(&self, input: &dyn Input) -> StowResult<Vec<Attachment>> {
        let attachments: Vec<Attachment> = input
            .load_attachments(self.meta.as_ref())
            .await?
            .into_iter()
            .filter(|a| !a.has_error())
            .collect();

        if attachments.is_empty() {
            return Err(StowError::not_found("Attachments", "requested ids"));
        }
        Ok(attachments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::RequestMeta;
    use crate::meta::{MemoryMetaStorage, MockMetaStorage};
    use crate::storage::{byte_stream, MemoryStorage, Sink, StorageError, StorageResult};
    use bytes::Bytes;
    use futures::stream::{self, StreamExt};
    use std::collections::VecDeque;

    /// Owner-scoped adapter: create needs an owner, delete drops that owner
    struct TestInput {
        request: RequestMeta,
        owner: Option<String>,
        ids: Vec<String>,
    }

    impl TestInput {
        fn new(owner: Option<&str>) -> Self {
            Self {
                request: RequestMeta {
                    filename: "notes.txt".to_string(),
                    content_type: "text/plain".to_string(),
                    ..RequestMeta::default()
                },
                owner: owner.map(str::to_string),
                ids: Vec::new(),
            }
        }

        fn targeting(mut self, id: &str) -> Self {
            self.request.id = id.to_string();
            self
        }
    }

    #[async_trait]
    impl Input for TestInput {
        fn request(&self) -> &RequestMeta {
            &self.request
        }

        fn set_attrs_for_delete(
            &mut self,
            attachment: Option<&mut Attachment>,
        ) -> StowResult<DeleteAction> {
            let Some(attachment) = attachment else {
                return Ok(DeleteAction::Skip);
            };
            if let Some(owner) = &self.owner {
                attachment.remove_owner(owner);
                if !attachment.owner_ids.is_empty() {
                    return Ok(DeleteAction::Update);
                }
            }
            Ok(DeleteAction::Delete)
        }

        fn set_attrs_for_create(&mut self, attachment: &mut Attachment) -> StowResult<()> {
            let owner = self
                .owner
                .clone()
                .ok_or_else(|| StowError::validation("owner_id required"))?;
            attachment.add_owner(owner);
            attachment.category = "notes".to_string();
            Ok(())
        }

        fn set_multipart(&mut self, part: &PartInfo) -> bool {
            match &part.filename {
                Some(filename) => {
                    self.request.filename = filename.clone();
                    self.request.content_type = part.content_type.clone().unwrap_or_default();
                    true
                }
                None => false,
            }
        }

        async fn load_attachments(&self, meta: &dyn MetaStorage) -> StowResult<Vec<Attachment>> {
            Ok(meta.attachments_by_ids(&self.ids).await?)
        }
    }

    /// Scripted multipart body; `Err` entries end the body with an error
    struct ScriptedParts {
        parts: VecDeque<Result<(PartInfo, ByteStream<'static>), StowError>>,
    }

    impl ScriptedParts {
        fn new() -> Self {
            Self {
                parts: VecDeque::new(),
            }
        }

        fn file(mut self, filename: &str, body: ByteStream<'static>) -> Self {
            let info = PartInfo {
                field_name: Some("files".to_string()),
                filename: Some(filename.to_string()),
                content_type: Some("text/plain".to_string()),
            };
            self.parts.push_back(Ok((info, body)));
            self
        }

        fn field(mut self, name: &str) -> Self {
            let info = PartInfo {
                field_name: Some(name.to_string()),
                ..PartInfo::default()
            };
            self.parts.push_back(Ok((info, byte_stream("value"))));
            self
        }

        fn broken(mut self) -> Self {
            self.parts
                .push_back(Err(StowError::validation("malformed multipart body")));
            self
        }
    }

    #[async_trait]
    impl PartSource for ScriptedParts {
        async fn next_part<'a>(&'a mut self) -> StowResult<Option<UploadPart<'a>>> {
            match self.parts.pop_front() {
                None => Ok(None),
                Some(Ok((info, body))) => Ok(Some(UploadPart { info, body })),
                Some(Err(e)) => {
                    self.parts.clear();
                    Err(e)
                }
            }
        }
    }

    /// Byte store whose deletes always fail
    struct UndeletableStorage(MemoryStorage);

    #[async_trait]
    impl BlobStorage for UndeletableStorage {
        async fn put(
            &self,
            filename: &str,
            content_type: &str,
            body: ByteStream<'_>,
            attachment: &mut Attachment,
        ) -> StorageResult<()> {
            self.0.put(filename, content_type, body, attachment).await
        }

        async fn delete(&self, _attachment: &Attachment) -> StorageResult<()> {
            Err(StorageError::BackendError("volume is read-only".to_string()))
        }

        async fn copy(&self, attachment: &Attachment, sink: &mut Sink<'_>) -> StorageResult<()> {
            self.0.copy(attachment, sink).await
        }

        fn name(&self) -> &str {
            "undeletable"
        }
    }

    fn broken_body() -> ByteStream<'static> {
        stream::iter(vec![
            Ok(Bytes::from_static(b"half a fi")),
            Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "body ended early",
            )),
        ])
        .boxed()
    }

    fn create_service() -> (AttachmentService, Arc<MemoryStorage>, Arc<MemoryMetaStorage>) {
        let blob = Arc::new(MemoryStorage::new());
        let meta = Arc::new(MemoryMetaStorage::new());
        (AttachmentService::new(blob.clone(), meta.clone()), blob, meta)
    }

    async fn create_shared(service: &AttachmentService, owners: &[&str]) -> Attachment {
        let mut input = TestInput::new(Some(owners[0]));
        let mut attachment = service.create(&mut input, byte_stream("shared")).await.unwrap();
        for owner in &owners[1..] {
            attachment.add_owner(*owner);
        }
        service.meta().put(&attachment).await.unwrap();
        attachment
    }

    #[tokio::test]
    async fn test_create_attachment() {
        let (service, blob, meta) = create_service();
        let mut input = TestInput::new(Some("alice"));

        let attachment = service
            .create(&mut input, byte_stream("Hello, World!"))
            .await
            .unwrap();

        assert!(attachment.is_stored());
        assert_eq!(attachment.filename, "notes.txt");
        assert_eq!(attachment.content_type, "text/plain");
        assert_eq!(attachment.content_length, 13);
        assert_eq!(attachment.owner_ids, vec!["alice".to_string()]);
        assert_eq!(attachment.category, "notes");
        assert!(!attachment.digest.is_empty());

        assert!(blob.contains(&attachment.id).await);
        let stored = meta.attachment_by_id(&attachment.id).await.unwrap();
        assert_eq!(stored, Some(attachment));
    }

    #[tokio::test]
    async fn test_create_rejected_by_adapter() {
        let (service, blob, _) = create_service();
        let mut input = TestInput::new(None);

        let result = service.create(&mut input, byte_stream("data")).await;

        assert!(matches!(result, Err(StowError::Validation(_))));
        assert!(blob.is_empty().await);
    }

    #[tokio::test]
    async fn test_create_content_failure_writes_no_metadata() {
        let blob = Arc::new(MemoryStorage::new());
        let mut meta = MockMetaStorage::new();
        meta.expect_put().times(0);
        let service = AttachmentService::new(blob.clone(), Arc::new(meta));

        let mut input = TestInput::new(Some("alice"));
        let result = service.create(&mut input, broken_body()).await;

        assert!(matches!(result, Err(StowError::Storage(_))));
        assert!(blob.is_empty().await);
    }

    #[tokio::test]
    async fn test_create_metadata_failure_leaves_content() {
        let blob = Arc::new(MemoryStorage::new());
        let mut meta = MockMetaStorage::new();
        meta.expect_put()
            .times(1)
            .returning(|_| Err(StorageError::BackendError("connection refused".to_string())));
        let service = AttachmentService::new(blob.clone(), Arc::new(meta));

        let mut input = TestInput::new(Some("alice"));
        let result = service.create(&mut input, byte_stream("orphan")).await;

        match result {
            Err(StowError::Storage(message)) => assert!(message.contains("connection refused")),
            other => panic!("expected storage error, got {other:?}"),
        }
        assert_eq!(blob.len().await, 1);
    }

    #[tokio::test]
    async fn test_delete_requires_id() {
        let (service, _, _) = create_service();
        let mut input = TestInput::new(Some("alice"));

        let result = service.delete(&mut input).await;
        assert_eq!(result.unwrap_err(), StowError::validation("id required."));
    }

    #[tokio::test]
    async fn test_delete_missing_record_follows_adapter() {
        let (service, _, _) = create_service();
        let mut input = TestInput::new(Some("alice")).targeting("nope");

        let affected = service.delete(&mut input).await.unwrap();
        assert!(affected.is_empty());
    }

    #[tokio::test]
    async fn test_delete_missing_record_with_action_is_not_found() {
        let (service, _, _) = create_service();
        let mut meta = MockMetaStorage::new();
        meta.expect_attachment_by_id().returning(|_| Ok(None));
        let service = AttachmentService::new(service.blob().clone(), Arc::new(meta));

        struct Stubborn(RequestMeta);

        #[async_trait]
        impl Input for Stubborn {
            fn request(&self) -> &RequestMeta {
                &self.0
            }
            fn set_attrs_for_delete(
                &mut self,
                _attachment: Option<&mut Attachment>,
            ) -> StowResult<DeleteAction> {
                Ok(DeleteAction::Delete)
            }
            fn set_attrs_for_create(&mut self, _attachment: &mut Attachment) -> StowResult<()> {
                Ok(())
            }
            fn set_multipart(&mut self, _part: &PartInfo) -> bool {
                false
            }
            async fn load_attachments(
                &self,
                _meta: &dyn MetaStorage,
            ) -> StowResult<Vec<Attachment>> {
                Ok(Vec::new())
            }
        }

        let mut input = Stubborn(RequestMeta {
            id: "gone".to_string(),
            ..RequestMeta::default()
        });
        let result = service.delete(&mut input).await;
        assert_eq!(result.unwrap_err(), StowError::not_found("Attachment", "gone"));
    }

    #[tokio::test]
    async fn test_delete_soft_update_keeps_content() {
        let (service, blob, meta) = create_service();
        let shared = create_shared(&service, &["alice", "bob"]).await;

        let mut input = TestInput::new(Some("alice")).targeting(&shared.id);
        let affected = service.delete(&mut input).await.unwrap();

        assert_eq!(affected.len(), 1);
        assert_eq!(affected[0].owner_ids, vec!["bob".to_string()]);
        assert!(blob.contains(&shared.id).await);

        let stored = meta.attachment_by_id(&shared.id).await.unwrap().unwrap();
        assert_eq!(stored.owner_ids, vec!["bob".to_string()]);
    }

    #[tokio::test]
    async fn test_delete_last_owner_removes_everything() {
        let (service, blob, meta) = create_service();
        let shared = create_shared(&service, &["alice", "bob"]).await;

        let mut input = TestInput::new(Some("alice")).targeting(&shared.id);
        service.delete(&mut input).await.unwrap();

        let mut input = TestInput::new(Some("bob")).targeting(&shared.id);
        let affected = service.delete(&mut input).await.unwrap();

        assert_eq!(affected.len(), 1);
        assert!(affected[0].owner_ids.is_empty());
        assert!(!blob.contains(&shared.id).await);
        assert!(meta.attachment_by_id(&shared.id).await.unwrap().is_none());
        assert!(matches!(
            service.find(&shared.id).await,
            Err(StowError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_content_failure_keeps_record() {
        let blob = Arc::new(UndeletableStorage(MemoryStorage::new()));
        let meta = Arc::new(MemoryMetaStorage::new());
        let service = AttachmentService::new(blob, meta.clone());

        let mut input = TestInput::new(Some("alice"));
        let attachment = service.create(&mut input, byte_stream("sticky")).await.unwrap();

        let mut input = TestInput::new(Some("alice")).targeting(&attachment.id);
        let result = service.delete(&mut input).await;

        assert!(matches!(result, Err(StowError::Storage(_))));
        assert!(meta.attachment_by_id(&attachment.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_upload_without_file_parts() {
        let (service, _, _) = create_service();
        let mut input = TestInput::new(Some("alice"));
        let mut parts = ScriptedParts::new().field("title").field("description");

        let result = service.upload(&mut input, &mut parts).await;

        let err = result.unwrap_err();
        assert_eq!(err, StowError::validation(NO_ATTACHMENTS_UPLOADED));
        assert!(err.is_user_error());
    }

    #[tokio::test]
    async fn test_upload_skips_form_fields() {
        let (service, _, meta) = create_service();
        let mut input = TestInput::new(Some("alice"));
        let mut parts = ScriptedParts::new()
            .field("title")
            .file("a.txt", byte_stream("a"))
            .field("description")
            .file("b.txt", byte_stream("bb"));

        let outcome = service.upload(&mut input, &mut parts).await.unwrap();

        assert_eq!(outcome.attachments.len(), 2);
        assert_eq!(outcome.attachments[0].filename, "a.txt");
        assert_eq!(outcome.attachments[1].content_length, 2);
        assert!(outcome.error().is_none());
        assert_eq!(meta.attachments("alice").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_upload_stops_at_broken_part() {
        let (service, _, meta) = create_service();
        let mut input = TestInput::new(Some("alice"));
        let mut parts = ScriptedParts::new()
            .file("one.txt", byte_stream("first"))
            .file("two.txt", broken_body())
            .broken()
            .file("three.txt", byte_stream("third"));

        let outcome = service.upload(&mut input, &mut parts).await.unwrap();

        assert_eq!(outcome.attachments.len(), 2);
        let (one, two) = (&outcome.attachments[0], &outcome.attachments[1]);
        assert!(one.is_stored());
        assert!(!one.has_error());
        assert!(two.has_error());
        assert!(outcome.interrupted.is_some());
        assert_eq!(outcome.error().as_deref(), Some(SOME_ATTACHMENT_HAS_ERROR));

        let stored = meta.attachments("alice").await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].filename, "one.txt");
    }

    #[tokio::test]
    async fn test_upload_keeps_parts_after_failed_one() {
        let (service, _, _) = create_service();
        let mut input = TestInput::new(Some("alice"));
        let mut parts = ScriptedParts::new()
            .file("bad.txt", broken_body())
            .file("good.txt", byte_stream("fine"));

        let outcome = service.upload(&mut input, &mut parts).await.unwrap();

        assert_eq!(outcome.attachments.len(), 2);
        assert!(outcome.attachments[0].has_error());
        assert!(!outcome.attachments[1].has_error());
        assert!(outcome.interrupted.is_none());
        assert!(outcome.has_errors());
    }

    #[tokio::test]
    async fn test_upload_interrupted_before_any_file() {
        let (service, _, _) = create_service();
        let mut input = TestInput::new(Some("alice"));
        let mut parts = ScriptedParts::new().broken();

        let result = service.upload(&mut input, &mut parts).await;
        assert_eq!(result.unwrap_err(), StowError::validation(NO_ATTACHMENTS_UPLOADED));
    }

    #[tokio::test]
    async fn test_find_hides_failed_uploads() {
        let (service, _, meta) = create_service();
        let failed = Attachment {
            id: "failed".to_string(),
            error: "disk full".to_string(),
            ..Attachment::new()
        };
        meta.put(&failed).await.unwrap();

        assert!(matches!(
            service.find("failed").await,
            Err(StowError::NotFound { .. })
        ));
        assert!(matches!(service.find("").await, Err(StowError::Validation(_))));
    }

    #[tokio::test]
    async fn test_load_bundle() {
        let (service, _, _) = create_service();
        let mut input = TestInput::new(Some("alice"));
        let a = service.create(&mut input, byte_stream("a")).await.unwrap();
        let b = service.create(&mut input, byte_stream("b")).await.unwrap();

        input.ids = vec![b.id.clone(), "missing".to_string(), a.id.clone()];
        let bundle = service.load_bundle(&input).await.unwrap();
        assert_eq!(bundle, vec![b, a]);

        input.ids = vec!["missing".to_string()];
        assert!(matches!(
            service.load_bundle(&input).await,
            Err(StowError::NotFound { .. })
        ));
    }
}

//! Attachment Model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Content types that thumbnails can be generated for
const IMAGE_CONTENT_TYPES: &[&str] = &["image/png", "image/jpeg", "image/gif"];

/// An uploaded or derived binary object.
///
/// Serialized with PascalCase keys, which is the shape upload and delete
/// responses have always had on the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Attachment {
    /// Identity assigned by the byte store on `put`. Empty until then.
    pub id: String,
    /// Logical owners. Order carries no meaning.
    pub owner_ids: Vec<String>,
    pub category: String,
    /// Original filename
    pub filename: String,
    /// MIME content type
    pub content_type: String,
    /// SHA256 digest of the stored bytes
    pub digest: String,
    /// Stored size in bytes
    pub content_length: u64,
    /// Logical groups. Order carries no meaning.
    pub group_ids: Vec<String>,
    /// Non-empty when the upload attempt that produced this record failed
    pub error: String,
    pub upload_time: DateTime<Utc>,
    /// Only set for image content
    pub width: u32,
    pub height: u32,
}

impl Attachment {
    /// An empty record, before the request adapter and byte store fill it in
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the byte store has assigned an identity
    pub fn is_stored(&self) -> bool {
        !self.id.is_empty()
    }

    /// Whether this record marks a failed upload
    pub fn has_error(&self) -> bool {
        !self.error.is_empty()
    }

    /// Check if thumbnails can be generated from this content
    pub fn is_image(&self) -> bool {
        IMAGE_CONTENT_TYPES.contains(&self.content_type.as_str())
    }

    /// Get file extension without the dot
    pub fn extension(&self) -> Option<&str> {
        std::path::Path::new(&self.filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty())
    }

    pub fn has_owner(&self, owner_id: &str) -> bool {
        self.owner_ids.iter().any(|o| o == owner_id)
    }

    /// Add an owner; adding an existing owner is a no-op
    pub fn add_owner(&mut self, owner_id: impl Into<String>) {
        let owner_id = owner_id.into();
        if !self.has_owner(&owner_id) {
            self.owner_ids.push(owner_id);
        }
    }

    /// Remove an owner, returning whether it was present
    pub fn remove_owner(&mut self, owner_id: &str) -> bool {
        let before = self.owner_ids.len();
        self.owner_ids.retain(|o| o != owner_id);
        self.owner_ids.len() != before
    }

    pub fn in_group(&self, group_id: &str) -> bool {
        self.group_ids.iter().any(|g| g == group_id)
    }

    /// Add a group; adding an existing group is a no-op
    pub fn add_group(&mut self, group_id: impl Into<String>) {
        let group_id = group_id.into();
        if !self.in_group(&group_id) {
            self.group_ids.push(group_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attachment(filename: &str, content_type: &str) -> Attachment {
        Attachment {
            filename: filename.to_string(),
            content_type: content_type.to_string(),
            ..Attachment::new()
        }
    }

    #[test]
    fn test_new_attachment_is_not_stored() {
        let att = Attachment::new();
        assert!(!att.is_stored());
        assert!(!att.has_error());
    }

    #[test]
    fn test_is_image() {
        assert!(attachment("a.png", "image/png").is_image());
        assert!(attachment("a.jpg", "image/jpeg").is_image());
        assert!(attachment("a.gif", "image/gif").is_image());
        assert!(!attachment("a.webp", "image/webp").is_image());
        assert!(!attachment("a.pdf", "application/pdf").is_image());
    }

    #[test]
    fn test_extension() {
        assert_eq!(attachment("report.pdf", "").extension(), Some("pdf"));
        assert_eq!(attachment("archive.tar.gz", "").extension(), Some("gz"));
        assert_eq!(attachment("noextension", "").extension(), None);
        assert_eq!(attachment("trailing.", "").extension(), None);
    }

    #[test]
    fn test_owner_set_semantics() {
        let mut att = Attachment::new();
        att.add_owner("alice");
        att.add_owner("bob");
        att.add_owner("alice");
        assert_eq!(att.owner_ids.len(), 2);
        assert!(att.has_owner("bob"));

        assert!(att.remove_owner("alice"));
        assert!(!att.remove_owner("alice"));
        assert_eq!(att.owner_ids, vec!["bob".to_string()]);
    }

    #[test]
    fn test_group_set_semantics() {
        let mut att = Attachment::new();
        att.add_group("gallery");
        att.add_group("gallery");
        assert_eq!(att.group_ids.len(), 1);
        assert!(att.in_group("gallery"));
        assert!(!att.in_group("other"));
    }

    #[test]
    fn test_wire_shape() {
        let mut att = attachment("cat.png", "image/png");
        att.id = "abc".to_string();
        let json = serde_json::to_value(&att).unwrap();
        assert_eq!(json["Id"], "abc");
        assert_eq!(json["ContentType"], "image/png");
        assert_eq!(json["Error"], "");
        assert!(json["OwnerIds"].is_array());
    }
}

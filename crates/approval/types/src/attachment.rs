//! Attachments, compared by content hash rather than filename

use serde::{Deserialize, Serialize};

/// BLAKE3 hash of attachment bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub [u8; 32]);

impl ContentHash {
    /// Compute the BLAKE3 hash of arbitrary data.
    pub fn hash(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Hex-encode for display.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Metadata for a stored attachment
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub file_name: String,
    pub content_hash: ContentHash,
    pub size: u64,
}

impl Attachment {
    /// Two attachments carry the same content regardless of their names.
    pub fn same_content(&self, other: &Attachment) -> bool {
        self.content_hash == other.content_hash
    }
}

/// Raw attachment bytes as supplied by the caller.
///
/// Uploads are replaced whole; there is no partial upload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttachmentUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl AttachmentUpload {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }

    /// Hash the bytes and produce the stored metadata.
    pub fn to_attachment(&self) -> Attachment {
        Attachment {
            file_name: self.file_name.clone(),
            content_hash: ContentHash::hash(&self.bytes),
            size: self.bytes.len() as u64,
        }
    }
}

/// Whether two optional attachments differ in content.
pub fn attachment_changed(before: Option<&Attachment>, after: Option<&Attachment>) -> bool {
    match (before, after) {
        (None, None) => false,
        (Some(a), Some(b)) => !a.same_content(b),
        _ => true,
    }
}

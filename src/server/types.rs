//! Server communication types.
//!
//! Wire shapes for the REST endpoints and the transcript messages they
//! return, plus attachment content-type inference.

// Rust guideline compliant 2026-02

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Who wrote a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The local user.
    User,
    /// The remote assistant.
    Assistant,
}

/// A file attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    /// Server id, or a `temp_` id while the file only exists locally.
    pub id: String,
    /// Remote URL, or the local path for pending uploads.
    pub url: String,
    /// Declared content type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Original file name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

/// One transcript entry, as returned by the history endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Message id; also the cursor for older history.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Author.
    pub role: Role,
    /// Message text (markdown).
    #[serde(default)]
    pub content: String,
    /// Attached files.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    /// Whether the reply is still being streamed.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_streaming: bool,
}

/// A page of history, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MessagePage {
    /// Messages in chronological order. Empty when no older history exists.
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

/// Response of the upload endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadResponse {
    /// Id to reference the file in a stream request.
    pub attachment_id: String,
}

/// What to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentSource {
    /// Bytes already in memory.
    Memory {
        /// File content.
        bytes: Vec<u8>,
        /// Name reported to the server.
        file_name: String,
        /// Content type; inferred from `file_name` when absent.
        mime_type: Option<String>,
    },
    /// A file on disk.
    Path {
        /// Location of the file.
        path: PathBuf,
        /// Name reported to the server; defaults to the last path segment.
        file_name: Option<String>,
    },
}

/// Content type and extension inferred from a file name or URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MimeInfo {
    /// Content type.
    pub mime_type: &'static str,
    /// Lower-cased text after the last `.`, or empty.
    pub extension: String,
}

/// Infer the content type of `uri` from its extension.
pub fn mime_info(uri: &str) -> MimeInfo {
    let extension = uri
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default();

    let mime_type = match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "heic" => "image/heic",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    };

    MimeInfo {
        mime_type,
        extension,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_info_known_extensions() {
        let cases = [
            ("photo.jpg", "image/jpeg"),
            ("photo.JPEG", "image/jpeg"),
            ("shot.png", "image/png"),
            ("IMG_0001.HEIC", "image/heic"),
            ("anim.gif", "image/gif"),
            ("sticker.webp", "image/webp"),
        ];
        for (uri, expected) in cases {
            assert_eq!(mime_info(uri).mime_type, expected, "{uri}");
        }
    }

    #[test]
    fn test_mime_info_unknown_and_missing_extension() {
        let pdf = mime_info("/tmp/report.pdf");
        assert_eq!(pdf.mime_type, "application/octet-stream");
        assert_eq!(pdf.extension, "pdf");

        let bare = mime_info("README");
        assert_eq!(bare.mime_type, "application/octet-stream");
        assert_eq!(bare.extension, "");
    }

    #[test]
    fn test_history_message_deserializes_with_defaults() {
        let page: MessagePage = serde_json::from_str(
            r#"{"messages":[{"id":"m1","role":"user","content":"hi"},
                            {"role":"assistant","content":"hello","attachments":[
                                {"id":"a1","url":"https://cdn/x.png","mimeType":"image/png"}]}]}"#,
        )
        .unwrap();

        assert_eq!(page.messages.len(), 2);
        assert_eq!(page.messages[0].id.as_deref(), Some("m1"));
        assert!(!page.messages[0].is_streaming);
        assert_eq!(page.messages[1].role, Role::Assistant);
        assert_eq!(
            page.messages[1].attachments[0].mime_type.as_deref(),
            Some("image/png")
        );
    }

    #[test]
    fn test_empty_page() {
        let page: MessagePage = serde_json::from_str("{}").unwrap();
        assert!(page.messages.is_empty());
    }
}

//! Attachment and view-request models

use serde::{Deserialize, Serialize};

/// One attachment within one message, as declared by the message source.
///
/// Request-scoped: built when a message is loaded, discarded when the
/// request ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentDescriptor {
    /// Opaque part handle into the source message.
    pub mime_id: String,
    /// Declared MIME type.
    #[serde(rename = "mimetype")]
    pub mime_type: String,
    /// Original filename.
    pub filename: String,
}

impl AttachmentDescriptor {
    pub fn new(
        mime_id: impl Into<String>,
        mime_type: impl Into<String>,
        filename: impl Into<String>,
    ) -> Self {
        Self {
            mime_id: mime_id.into(),
            mime_type: mime_type.into(),
            filename: filename.into(),
        }
    }

    /// Lower-cased text after the last `.` of the filename; empty if none.
    pub fn extension(&self) -> String {
        match self.filename.rsplit_once('.') {
            Some((_, ext)) if !ext.is_empty() => ext.to_ascii_lowercase(),
            _ => String::new(),
        }
    }
}

/// Document family an attachment belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentClass {
    TextDocument,
    Spreadsheet,
    Presentation,
    Pdf,
    Unsupported,
}

impl DocumentClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TextDocument => "text_document",
            Self::Spreadsheet => "spreadsheet",
            Self::Presentation => "presentation",
            Self::Pdf => "pdf",
            Self::Unsupported => "unsupported",
        }
    }

    /// Icon the host UI renders next to the attachment.
    pub fn icon(&self) -> Option<&'static str> {
        match self {
            Self::TextDocument => Some("x-office-document.png"),
            Self::Spreadsheet => Some("x-office-spreadsheet.png"),
            Self::Presentation => Some("x-office-presentation.png"),
            Self::Pdf => Some("x-application-pdf.png"),
            Self::Unsupported => None,
        }
    }

    pub fn is_viewable(&self) -> bool {
        !matches!(self, Self::Unsupported)
    }
}

impl std::fmt::Display for DocumentClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payload round-tripped to the client inside a link and posted back on
/// click. Field order is the canonical serialization order; cache keys
/// depend on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewRequest {
    pub message_id: String,
    pub document: AttachmentDescriptor,
}

impl ViewRequest {
    pub fn new(message_id: impl Into<String>, document: AttachmentDescriptor) -> Self {
        Self {
            message_id: message_id.into(),
            document,
        }
    }

    /// Canonical JSON rendition used for cache-key derivation. Struct
    /// field order keeps this stable for logically equal requests.
    pub fn canonical_json(&self) -> String {
        serde_json::to_string(self).expect("view request serializes")
    }
}

/// A loaded message as handed over by the host, pre-classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadedMessage {
    pub message_id: String,
    pub attachments: Vec<AttachmentDescriptor>,
}

/// One viewable attachment with everything the host UI needs to render
/// a clickable element.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewableAttachment {
    pub document: AttachmentDescriptor,
    pub class: DocumentClass,
    pub icon: String,
    /// Serialized [`ViewRequest`] the client posts back on click.
    pub info: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension() {
        let pdf = AttachmentDescriptor::new("2", "application/pdf", "Report.PDF");
        assert_eq!(pdf.extension(), "pdf");

        let none = AttachmentDescriptor::new("2", "text/plain", "README");
        assert_eq!(none.extension(), "");

        let double = AttachmentDescriptor::new("2", "application/gzip", "archive.tar.gz");
        assert_eq!(double.extension(), "gz");

        let trailing_dot = AttachmentDescriptor::new("2", "text/plain", "odd.");
        assert_eq!(trailing_dot.extension(), "");
    }

    #[test]
    fn test_document_class_icons() {
        assert_eq!(
            DocumentClass::Spreadsheet.icon(),
            Some("x-office-spreadsheet.png")
        );
        assert_eq!(DocumentClass::Unsupported.icon(), None);
        assert!(DocumentClass::Pdf.is_viewable());
        assert!(!DocumentClass::Unsupported.is_viewable());
    }

    #[test]
    fn test_canonical_json_is_stable() {
        let request = ViewRequest::new(
            "4711",
            AttachmentDescriptor::new("2.1", "application/pdf", "contract.pdf"),
        );
        assert_eq!(request.canonical_json(), request.canonical_json());

        // round-trips through the wire format unchanged
        let parsed: ViewRequest = serde_json::from_str(&request.canonical_json()).unwrap();
        assert_eq!(parsed.canonical_json(), request.canonical_json());
    }

    #[test]
    fn test_wire_field_names() {
        let descriptor = AttachmentDescriptor::new("2.1", "application/pdf", "contract.pdf");
        let json = serde_json::to_value(&descriptor).unwrap();
        assert!(json.get("mimetype").is_some());
        assert!(json.get("mime_id").is_some());
    }
}

//! Attachment classification
//!
//! Maps an attachment's declared MIME type (with a filename-extension
//! fallback) to a supported document family.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::model::{AttachmentDescriptor, DocumentClass, LoadedMessage, ViewRequest, ViewableAttachment};

/// Extension -> MIME lookup used when the declared type is unreliable.
pub type ExtensionMap = HashMap<String, String>;

static DEFAULT_EXTENSION_MAP: Lazy<ExtensionMap> = Lazy::new(|| {
    [
        ("doc", "application/msword"),
        (
            "docx",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        ),
        ("odt", "application/vnd.oasis.opendocument.text"),
        ("rtf", "application/rtf"),
        ("xls", "application/vnd.ms-excel"),
        (
            "xlsx",
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        ),
        ("ods", "application/vnd.oasis.opendocument.spreadsheet"),
        ("csv", "text/csv"),
        ("ppt", "application/vnd.ms-powerpoint"),
        (
            "pptx",
            "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        ),
        ("odp", "application/vnd.oasis.opendocument.presentation"),
        ("pdf", "application/pdf"),
    ]
    .into_iter()
    .map(|(ext, mime)| (ext.to_string(), mime.to_string()))
    .collect()
});

/// The built-in extension map with deployment overrides applied on top.
pub fn default_extension_map(overrides: &[(String, String)]) -> ExtensionMap {
    let mut map = DEFAULT_EXTENSION_MAP.clone();
    for (ext, mime) in overrides {
        map.insert(ext.clone(), mime.clone());
    }
    map
}

/// Strip parameters and normalize case, `Text/CSV; charset=utf-8` -> `text/csv`.
fn normalize_mime(mime: &str) -> String {
    mime.split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn is_text_document(mime: &str) -> bool {
    matches!(
        mime,
        "application/msword"
            | "application/vnd.oasis.opendocument.text"
            | "application/rtf"
            | "text/rtf"
    ) || mime.contains("wordprocessingml")
}

fn is_spreadsheet(mime: &str) -> bool {
    matches!(
        mime,
        "application/vnd.ms-excel"
            | "application/vnd.oasis.opendocument.spreadsheet"
            | "text/csv"
    ) || mime.contains("spreadsheetml")
}

fn is_presentation(mime: &str) -> bool {
    matches!(
        mime,
        "application/vnd.ms-powerpoint" | "application/vnd.oasis.opendocument.presentation"
    ) || mime.contains("presentationml")
}

fn is_pdf(mime: &str) -> bool {
    matches!(mime, "application/pdf" | "application/x-pdf")
}

/// Classify a MIME type alone.
///
/// The priority order (documents, spreadsheets, presentations, PDF) is an
/// observable contract: a type matching several predicates resolves to
/// the earliest family.
pub fn classify_mime(mime: &str) -> DocumentClass {
    let mime = normalize_mime(mime);
    if is_text_document(&mime) {
        DocumentClass::TextDocument
    } else if is_spreadsheet(&mime) {
        DocumentClass::Spreadsheet
    } else if is_presentation(&mime) {
        DocumentClass::Presentation
    } else if is_pdf(&mime) {
        DocumentClass::Pdf
    } else {
        DocumentClass::Unsupported
    }
}

/// Classify an attachment from its declared MIME type, falling back to the
/// filename extension through `extension_map` when the declared type
/// matches no family (generic binary types land here too).
pub fn classify(descriptor: &AttachmentDescriptor, extension_map: &ExtensionMap) -> DocumentClass {
    let class = classify_mime(&descriptor.mime_type);
    if class.is_viewable() {
        return class;
    }

    let extension = descriptor.extension();
    match extension_map.get(&extension) {
        Some(mapped) => classify_mime(mapped),
        None => DocumentClass::Unsupported,
    }
}

/// Filter a loaded message down to its viewable attachments, emitting per
/// attachment the class, icon, and serialized payload the host UI posts
/// back on click.
pub fn classify_attachments(
    message: &LoadedMessage,
    extension_map: &ExtensionMap,
) -> Vec<ViewableAttachment> {
    message
        .attachments
        .iter()
        .filter_map(|descriptor| {
            let class = classify(descriptor, extension_map);
            let icon = class.icon()?;
            let request = ViewRequest::new(message.message_id.clone(), descriptor.clone());
            Some(ViewableAttachment {
                document: descriptor.clone(),
                class,
                icon: icon.to_string(),
                info: request.canonical_json(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(mime_type: &str, filename: &str) -> AttachmentDescriptor {
        AttachmentDescriptor::new("2", mime_type, filename)
    }

    #[test]
    fn test_classify_mime_families() {
        assert_eq!(
            classify_mime("application/msword"),
            DocumentClass::TextDocument
        );
        assert_eq!(
            classify_mime(
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            ),
            DocumentClass::Spreadsheet
        );
        assert_eq!(
            classify_mime("application/vnd.ms-powerpoint"),
            DocumentClass::Presentation
        );
        assert_eq!(classify_mime("application/pdf"), DocumentClass::Pdf);
        assert_eq!(classify_mime("image/png"), DocumentClass::Unsupported);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let map = default_extension_map(&[]);
        let d = descriptor("text/csv", "data.csv");
        for _ in 0..3 {
            assert_eq!(classify(&d, &map), DocumentClass::Spreadsheet);
        }
    }

    #[test]
    fn test_documents_win_over_spreadsheets() {
        // matches both the document and spreadsheet predicates
        let ambiguous = "application/x-wordprocessingml-spreadsheetml";
        assert!(is_text_document(ambiguous));
        assert!(is_spreadsheet(ambiguous));
        assert_eq!(classify_mime(ambiguous), DocumentClass::TextDocument);
    }

    #[test]
    fn test_mime_parameters_are_ignored() {
        assert_eq!(
            classify_mime("Text/CSV; charset=utf-8"),
            DocumentClass::Spreadsheet
        );
    }

    #[test]
    fn test_extension_fallback() {
        let map = default_extension_map(&[]);
        assert_eq!(
            classify(&descriptor("application/octet-stream", "report.pdf"), &map),
            DocumentClass::Pdf
        );
        assert_eq!(
            classify(&descriptor("application/octet-stream", "report.bin"), &map),
            DocumentClass::Unsupported
        );
        // upper-case extensions are looked up lower-cased
        assert_eq!(
            classify(&descriptor("application/octet-stream", "SLIDES.PPTX"), &map),
            DocumentClass::Presentation
        );
    }

    #[test]
    fn test_extension_overrides() {
        let map = default_extension_map(&[(
            "pages".to_string(),
            "application/vnd.oasis.opendocument.text".to_string(),
        )]);
        assert_eq!(
            classify(&descriptor("application/octet-stream", "essay.pages"), &map),
            DocumentClass::TextDocument
        );
    }

    #[test]
    fn test_classify_attachments_filters_and_serializes() {
        let map = default_extension_map(&[]);
        let message = LoadedMessage {
            message_id: "4711".into(),
            attachments: vec![
                descriptor("application/pdf", "contract.pdf"),
                descriptor("image/png", "photo.png"),
                descriptor("application/vnd.ms-excel", "sheet.xls"),
            ],
        };

        let viewable = classify_attachments(&message, &map);
        assert_eq!(viewable.len(), 2);
        assert_eq!(viewable[0].class, DocumentClass::Pdf);
        assert_eq!(viewable[0].icon, "x-application-pdf.png");
        assert_eq!(viewable[1].class, DocumentClass::Spreadsheet);

        let request: ViewRequest = serde_json::from_str(&viewable[0].info).unwrap();
        assert_eq!(request.message_id, "4711");
        assert_eq!(request.document.filename, "contract.pdf");
    }
}

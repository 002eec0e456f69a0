//! Viewable-attachments listing handler
//!
//! POST /plugin/cloudview/attachments

use axum::{extract::State, Json};
use cv_viewer::{classify_attachments, LoadedMessage, ViewableAttachment};
use serde::Serialize;
use tracing::debug;

use crate::extractors::AppState;

#[derive(Debug, Serialize)]
pub struct ViewableAttachments {
    pub attachments: Vec<ViewableAttachment>,
}

/// Filter a loaded message's attachments down to the viewable ones,
/// returning per attachment the class, icon and the payload the client
/// posts back on click. Disabled deployments list nothing.
pub async fn list_viewable(
    State(state): State<AppState>,
    Json(message): Json<LoadedMessage>,
) -> Json<ViewableAttachments> {
    if !state.config.viewer.enabled {
        return Json(ViewableAttachments {
            attachments: vec![],
        });
    }

    let attachments = classify_attachments(&message, &state.extension_map);
    debug!(
        message_id = %message.message_id,
        total = message.attachments.len(),
        viewable = attachments.len(),
        "Message attachments classified"
    );

    Json(ViewableAttachments { attachments })
}

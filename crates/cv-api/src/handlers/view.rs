//! View action handler
//!
//! POST /plugin/cloudview/view

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Form, Json,
};
use cv_viewer::ViewRequest;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ApiResult;
use crate::extractors::{AppState, SiteUrl};

/// Form posted by the webmail client on an attachment click. Field names
/// match the wire format the client round-trips.
#[derive(Debug, Deserialize)]
pub struct ViewActionForm {
    #[serde(rename = "_uid", default)]
    pub uid: Option<String>,
    #[serde(rename = "_info", default)]
    pub info: Option<String>,
}

/// Client command envelope carrying the viewer URL.
#[derive(Debug, Serialize)]
struct CommandResponse {
    command: &'static str,
    message: UrlPayload,
}

#[derive(Debug, Serialize)]
struct UrlPayload {
    url: String,
}

/// Resolve a posted view request to a viewer URL.
///
/// An absent or malformed request is a silent no-op: nothing is written
/// and the response carries no body. Resolution failures surface as
/// regular API errors.
pub async fn view_document(
    State(state): State<AppState>,
    SiteUrl(base): SiteUrl,
    Form(form): Form<ViewActionForm>,
) -> ApiResult<Response> {
    if !state.config.viewer.enabled {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let (Some(uid), Some(info)) = (
        form.uid.filter(|v| !v.is_empty()),
        form.info.filter(|v| !v.is_empty()),
    ) else {
        debug!("View action without uid/info, ignoring");
        return Ok(StatusCode::NO_CONTENT.into_response());
    };

    let request: ViewRequest = match serde_json::from_str(&info) {
        Ok(request) => request,
        Err(e) => {
            debug!(uid = %uid, error = %e, "Unparseable view request, ignoring");
            return Ok(StatusCode::NO_CONTENT.into_response());
        }
    };
    if request.message_id.is_empty() || request.document.mime_id.is_empty() {
        debug!(uid = %uid, "Incomplete view request, ignoring");
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let view = state
        .resolver
        .resolve(&request, state.store.as_ref(), &base)
        .await?;

    Ok(Json(CommandResponse {
        command: "plugin.cloudview",
        message: UrlPayload { url: view.url },
    })
    .into_response())
}

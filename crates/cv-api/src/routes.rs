//! Plugin routes

use axum::{routing::post, Router};

use crate::extractors::AppState;
use crate::handlers::{attachments, view};

/// Create the plugin router
pub fn router() -> Router<AppState> {
    Router::new().nest("/plugin/cloudview", plugin_router())
}

fn plugin_router() -> Router<AppState> {
    Router::new()
        .route("/view", post(view::view_document))
        .route("/attachments", post(attachments::list_viewable))
}

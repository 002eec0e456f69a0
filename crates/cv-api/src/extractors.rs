//! Axum extractors and shared application state

use std::sync::Arc;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use cv_core::config::AppConfig;
use cv_viewer::{
    classify::default_extension_map, ExtensionMap, MessageStore, RenditionCache, ViewerResolver,
};

use crate::error::ApiError;

/// Route prefix every plugin endpoint lives under; the public base URL is
/// whatever precedes it in the request path.
pub const PLUGIN_ROUTE_PREFIX: &str = "/plugin/cloudview";

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn MessageStore>,
    pub resolver: Arc<ViewerResolver>,
    pub extension_map: Arc<ExtensionMap>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn MessageStore>) -> Self {
        let resolver = ViewerResolver::new(
            RenditionCache::new(&config.cache.root),
            config.viewer.clone(),
            config.cache.public_path.clone(),
        );
        let extension_map = default_extension_map(&config.viewer.extension_overrides);
        Self {
            config: Arc::new(config),
            store,
            resolver: Arc::new(resolver),
            extension_map: Arc::new(extension_map),
        }
    }
}

/// Public base URL of the deployment, derived from the incoming request:
/// scheme + host + the request path up to the plugin route, with any
/// trailing `index.php` stripped and query/fragment discarded.
pub struct SiteUrl(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for SiteUrl
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let scheme = parts
            .headers
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("http");

        let host = parts
            .headers
            .get("host")
            .and_then(|v| v.to_str().ok())
            .or_else(|| parts.uri.authority().map(|a| a.as_str()))
            .ok_or_else(|| ApiError::bad_request("Missing Host header"))?;

        let requested = format!("{}://{}{}", scheme, host, parts.uri.path());
        let base = normalize_site_url(&requested)
            .map_err(|e| ApiError::bad_request(format!("Bad request URL: {e}")))?;

        Ok(SiteUrl(base))
    }
}

/// Normalize a requested URL into the deployment's public base URL.
///
/// Drops query and fragment, cuts the path at the plugin route prefix,
/// strips a trailing `index.php` segment, and keeps the trailing slash.
pub fn normalize_site_url(requested: &str) -> Result<String, url::ParseError> {
    let mut url = url::Url::parse(requested)?;
    url.set_query(None);
    url.set_fragment(None);

    let mut path = url.path().to_string();
    if let Some(idx) = path.find(PLUGIN_ROUTE_PREFIX) {
        path.truncate(idx);
    }
    if path.to_ascii_lowercase().ends_with("/index.php") {
        path.truncate(path.len() - "index.php".len());
    }
    if !path.ends_with('/') {
        path.push('/');
    }
    url.set_path(&path);

    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_trailing_index_php() {
        assert_eq!(
            normalize_site_url("https://mail.example.com/webmail/index.php").unwrap(),
            "https://mail.example.com/webmail/"
        );
        // case-insensitive, like the deployments that serve Index.PHP
        assert_eq!(
            normalize_site_url("https://mail.example.com/Index.PHP").unwrap(),
            "https://mail.example.com/"
        );
    }

    #[test]
    fn test_drops_query_and_fragment() {
        assert_eq!(
            normalize_site_url("https://mail.example.com/index.php?task=mail#top").unwrap(),
            "https://mail.example.com/"
        );
    }

    #[test]
    fn test_cuts_at_plugin_route() {
        assert_eq!(
            normalize_site_url("https://mail.example.com/plugin/cloudview/view").unwrap(),
            "https://mail.example.com/"
        );
        assert_eq!(
            normalize_site_url("http://mail.example.com:8090/webmail/plugin/cloudview/view")
                .unwrap(),
            "http://mail.example.com:8090/webmail/"
        );
    }

    #[test]
    fn test_plain_root_is_untouched() {
        assert_eq!(
            normalize_site_url("https://mail.example.com/").unwrap(),
            "https://mail.example.com/"
        );
    }
}

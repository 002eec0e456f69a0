//! Viewer resolution
//!
//! Turns a view request into the URL the client navigates to: ensure the
//! cached rendition exists, build its public file URL, and route to the
//! bundled PDF viewer or the configured external viewer.

use std::sync::atomic::{AtomicU64, Ordering};

use cv_core::config::{ViewerConfig, DOCUMENT_URL_PLACEHOLDER};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::cache::{CacheError, RenditionCache};
use crate::model::ViewRequest;
use crate::store::{MessageStore, StoreError};

/// Resolution errors
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Which viewer a rendition is routed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerSelection {
    LocalPdfViewer,
    ExternalViewer(String),
}

impl ViewerSelection {
    /// PDF renditions go to the bundled viewer, everything else to the
    /// external viewer template.
    pub fn for_extension(extension: &str, config: &ViewerConfig) -> Self {
        if extension == "pdf" {
            Self::LocalPdfViewer
        } else {
            Self::ExternalViewer(config.external_viewer_url_template.clone())
        }
    }
}

/// Resolver counters, exported by the server metrics endpoint.
#[derive(Debug, Default)]
pub struct ViewerStats {
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
}

impl ViewerStats {
    pub fn record_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn cache_misses(&self) -> u64 {
        self.cache_misses.load(Ordering::Relaxed)
    }
}

/// A resolved view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedView {
    /// URL the client navigates the viewer to.
    pub url: String,
    /// Whether the rendition was already cached.
    pub cache_hit: bool,
}

/// Viewer resolver
pub struct ViewerResolver {
    cache: RenditionCache,
    config: ViewerConfig,
    cache_public_path: String,
    stats: ViewerStats,
}

impl ViewerResolver {
    pub fn new(cache: RenditionCache, config: ViewerConfig, cache_public_path: String) -> Self {
        Self {
            cache,
            config,
            cache_public_path,
            stats: ViewerStats::default(),
        }
    }

    pub fn stats(&self) -> &ViewerStats {
        &self.stats
    }

    pub fn cache(&self) -> &RenditionCache {
        &self.cache
    }

    /// Resolve a view request against the message store.
    ///
    /// The store is hit at most once per cache slot: a populated slot is
    /// served as-is for the lifetime of the cache entry.
    #[instrument(
        skip(self, store),
        fields(message_id = %request.message_id, part = %request.document.mime_id)
    )]
    pub async fn resolve(
        &self,
        request: &ViewRequest,
        store: &dyn MessageStore,
        public_base_url: &str,
    ) -> Result<ResolvedView, ResolveError> {
        let rendition = self.cache.rendition(request, &self.config.salt_secret);

        let cache_hit = self.cache.contains(&rendition).await;
        if cache_hit {
            self.stats.record_hit();
        } else {
            let data = store
                .fetch_part(&request.message_id, &request.document.mime_id)
                .await?;
            self.cache.write(&rendition, &data).await?;
            self.stats.record_miss();
        }

        let file_url = self.public_file_url(&rendition.file_name, public_base_url);

        let url = match ViewerSelection::for_extension(&rendition.file_extension, &self.config) {
            ViewerSelection::LocalPdfViewer => format!(
                "{}{}?file={}",
                public_base_url.trim_end_matches('/'),
                self.config.pdf_viewer_path,
                url_encode(&file_url)
            ),
            ViewerSelection::ExternalViewer(template) => {
                template.replace(DOCUMENT_URL_PLACEHOLDER, &url_encode(&file_url))
            }
        };

        debug!(cache_hit, url = %url, "View resolved");
        Ok(ResolvedView { url, cache_hit })
    }

    /// Public URL of a cached file. Dev mode swaps in the alternate base
    /// so cached files can be served from a different origin.
    fn public_file_url(&self, file_name: &str, public_base_url: &str) -> String {
        let base = if self.config.dev_mode {
            self.config
                .dev_mode_file_base_url
                .as_deref()
                .unwrap_or(public_base_url)
        } else {
            public_base_url
        };
        format!(
            "{}{}/{}",
            base.trim_end_matches('/'),
            self.cache_public_path,
            file_name
        )
    }
}

/// Url-encode a value for use in a query string.
fn url_encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

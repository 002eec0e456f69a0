//! # cv-viewer
//!
//! Attachment classification and viewer resolution for Cloudview RS.
//!
//! ## Features
//!
//! - MIME-type classification of message attachments into document families
//! - Message store abstraction (spool directory, in-memory)
//! - Write-once rendition cache keyed by salted request hashes
//! - Viewer URL assembly (bundled PDF viewer, external viewer template)
//!
//! ## Example
//!
//! ```rust,ignore
//! use cv_viewer::{MemoryMessageStore, RenditionCache, ViewerResolver};
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryMessageStore::new());
//! let cache = RenditionCache::new("/var/cloudview/cache");
//! let resolver = ViewerResolver::new(cache, config.viewer, config.cache.public_path);
//!
//! let view = resolver
//!     .resolve(&request, store.as_ref(), "https://mail.example.com/")
//!     .await?;
//! ```

pub mod cache;
pub mod classify;
pub mod model;
pub mod resolve;
pub mod store;

pub use cache::{CacheError, CachedRendition, RenditionCache};
pub use classify::{
    classify, classify_attachments, classify_mime, default_extension_map, ExtensionMap,
};
pub use model::{
    AttachmentDescriptor, DocumentClass, LoadedMessage, ViewRequest, ViewableAttachment,
};
pub use resolve::{ResolveError, ResolvedView, ViewerResolver, ViewerSelection, ViewerStats};
pub use store::{MemoryMessageStore, MessageStore, SpoolMessageStore, StoreError, StoreResult};

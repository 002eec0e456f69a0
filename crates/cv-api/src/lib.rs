//! # cv-api
//!
//! HTTP surface for Cloudview RS: the view action the webmail client
//! posts attachment clicks to, and the viewable-attachments listing the
//! host UI renders icons from.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod routes;

pub use extractors::AppState;
pub use routes::router;

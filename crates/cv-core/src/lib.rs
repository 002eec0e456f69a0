//! # cv-core
//!
//! Configuration types and loading for Cloudview RS.
//!
//! Every recognized option is an explicit struct field with a default;
//! the whole configuration is validated once at startup.

pub mod config;

pub use config::*;

//! HTTP adapters.

mod catalog;

pub use catalog::{ARCHIVE_DIGEST_HEADER, HttpCatalogClient};

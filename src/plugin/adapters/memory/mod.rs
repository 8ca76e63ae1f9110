//! In-memory adapters for tests and offline tooling.

mod catalog;
mod host;
mod store;

pub use catalog::InMemoryCatalog;
pub use host::InMemoryHostApp;
pub use store::InMemoryPluginStore;

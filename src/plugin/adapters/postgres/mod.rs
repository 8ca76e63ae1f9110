//! `PostgreSQL` adapters for plugin lifecycle persistence.

mod models;
mod repository;
mod schema;

pub use repository::{PluginPgPool, PostgresPluginStore};

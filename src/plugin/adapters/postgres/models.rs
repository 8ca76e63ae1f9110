//! Diesel row models for plugin lifecycle persistence.

use super::schema::{plugin_activations, plugin_catalog_cache, plugin_status_flags};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;

/// Activation record row, used for reads and upserts.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = plugin_activations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ActivationRow {
    /// Plugin identifier.
    pub plugin_id: String,
    /// Whether the plugin is active.
    pub is_active: bool,
    /// Last activation timestamp.
    pub activated_at: Option<DateTime<Utc>>,
    /// Actor who last activated the plugin.
    pub activated_by: Option<uuid::Uuid>,
    /// Last deactivation timestamp.
    pub deactivated_at: Option<DateTime<Utc>>,
}

/// Status flag row.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = plugin_status_flags)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct StatusFlagRow {
    /// Flag key.
    pub key: String,
    /// Serialized value.
    pub value: String,
    /// Last write timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Catalog cache row.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = plugin_catalog_cache)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CatalogCacheRow {
    /// Plugin identifier.
    pub plugin_id: String,
    /// Icon reference.
    pub icon: Option<String>,
    /// Categories payload.
    pub categories: Value,
    /// Price in minor units.
    pub price_cents: i64,
    /// Release phase.
    pub phase: String,
    /// Refresh timestamp.
    pub cached_at: DateTime<Utc>,
}

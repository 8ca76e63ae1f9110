//! `PostgreSQL` store for activation records, status flags, and the catalog
//! cache.

use super::{
    models::{ActivationRow, CatalogCacheRow, StatusFlagRow},
    schema::{plugin_activations, plugin_catalog_cache, plugin_status_flags},
};
use crate::plugin::{
    domain::{
        ActivationRecord, ActorId, CatalogCacheEntry, CatalogPresentation,
        PersistedActivationData, PluginId, ReleasePhase, StatusFlag,
    },
    ports::{
        ActivationRepository, CatalogCacheRepository, PluginStoreError, PluginStoreResult,
        StatusFlagRepository,
    },
};
use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::upsert::excluded;

/// `PostgreSQL` connection pool type for plugin adapters.
pub type PluginPgPool = Pool<ConnectionManager<PgConnection>>;

/// `PostgreSQL`-backed plugin state store.
///
/// Upserts use `ON CONFLICT DO UPDATE`; there is no row versioning, so
/// concurrent read-modify-write callers are last-write-wins.
#[derive(Debug, Clone)]
pub struct PostgresPluginStore {
    pool: PluginPgPool,
}

impl PostgresPluginStore {
    /// Creates a new store from a `PostgreSQL` pool.
    #[must_use]
    pub const fn new(pool: PluginPgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, operation: F) -> PluginStoreResult<T>
    where
        F: FnOnce(&mut PgConnection) -> PluginStoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(PluginStoreError::persistence)?;
            operation(&mut connection)
        })
        .await
        .map_err(PluginStoreError::persistence)?
    }
}

#[async_trait]
impl ActivationRepository for PostgresPluginStore {
    async fn find_activation(
        &self,
        plugin_id: &PluginId,
    ) -> PluginStoreResult<Option<ActivationRecord>> {
        let key = plugin_id.as_str().to_owned();
        self.run_blocking(move |connection| {
            let row = plugin_activations::table
                .filter(plugin_activations::plugin_id.eq(&key))
                .select(ActivationRow::as_select())
                .first::<ActivationRow>(connection)
                .optional()
                .map_err(PluginStoreError::persistence)?;
            row.map(row_to_activation).transpose()
        })
        .await
    }

    async fn upsert_activation(&self, record: &ActivationRecord) -> PluginStoreResult<()> {
        let row = activation_to_row(record);
        self.run_blocking(move |connection| {
            diesel::insert_into(plugin_activations::table)
                .values(&row)
                .on_conflict(plugin_activations::plugin_id)
                .do_update()
                .set((
                    plugin_activations::is_active.eq(excluded(plugin_activations::is_active)),
                    plugin_activations::activated_at
                        .eq(excluded(plugin_activations::activated_at)),
                    plugin_activations::activated_by
                        .eq(excluded(plugin_activations::activated_by)),
                    plugin_activations::deactivated_at
                        .eq(excluded(plugin_activations::deactivated_at)),
                ))
                .execute(connection)
                .map_err(PluginStoreError::persistence)?;
            Ok(())
        })
        .await
    }

    async fn list_active(&self) -> PluginStoreResult<Vec<ActivationRecord>> {
        self.run_blocking(move |connection| {
            let rows = plugin_activations::table
                .filter(plugin_activations::is_active.eq(true))
                .order(plugin_activations::plugin_id.asc())
                .select(ActivationRow::as_select())
                .load::<ActivationRow>(connection)
                .map_err(PluginStoreError::persistence)?;
            rows.into_iter().map(row_to_activation).collect()
        })
        .await
    }

    async fn list_activations(&self) -> PluginStoreResult<Vec<ActivationRecord>> {
        self.run_blocking(move |connection| {
            let rows = plugin_activations::table
                .order(plugin_activations::plugin_id.asc())
                .select(ActivationRow::as_select())
                .load::<ActivationRow>(connection)
                .map_err(PluginStoreError::persistence)?;
            rows.into_iter().map(row_to_activation).collect()
        })
        .await
    }
}

#[async_trait]
impl StatusFlagRepository for PostgresPluginStore {
    async fn get_flag(&self, key: &str) -> PluginStoreResult<Option<StatusFlag>> {
        let flag_key = key.to_owned();
        self.run_blocking(move |connection| {
            let row = plugin_status_flags::table
                .filter(plugin_status_flags::key.eq(&flag_key))
                .select(StatusFlagRow::as_select())
                .first::<StatusFlagRow>(connection)
                .optional()
                .map_err(PluginStoreError::persistence)?;
            Ok(row.map(|found| StatusFlag::new(found.key, found.value, found.updated_at)))
        })
        .await
    }

    async fn set_flag(&self, flag: &StatusFlag) -> PluginStoreResult<()> {
        let row = StatusFlagRow {
            key: flag.key.clone(),
            value: flag.value.clone(),
            updated_at: flag.updated_at,
        };
        self.run_blocking(move |connection| {
            diesel::insert_into(plugin_status_flags::table)
                .values(&row)
                .on_conflict(plugin_status_flags::key)
                .do_update()
                .set((
                    plugin_status_flags::value.eq(excluded(plugin_status_flags::value)),
                    plugin_status_flags::updated_at.eq(excluded(plugin_status_flags::updated_at)),
                ))
                .execute(connection)
                .map_err(PluginStoreError::persistence)?;
            Ok(())
        })
        .await
    }

    async fn delete_flag(&self, key: &str) -> PluginStoreResult<bool> {
        let flag_key = key.to_owned();
        self.run_blocking(move |connection| {
            let deleted = diesel::delete(
                plugin_status_flags::table.filter(plugin_status_flags::key.eq(&flag_key)),
            )
            .execute(connection)
            .map_err(PluginStoreError::persistence)?;
            Ok(deleted > 0)
        })
        .await
    }
}

#[async_trait]
impl CatalogCacheRepository for PostgresPluginStore {
    async fn find_cache_entry(
        &self,
        plugin_id: &PluginId,
    ) -> PluginStoreResult<Option<CatalogCacheEntry>> {
        let key = plugin_id.as_str().to_owned();
        self.run_blocking(move |connection| {
            let row = plugin_catalog_cache::table
                .filter(plugin_catalog_cache::plugin_id.eq(&key))
                .select(CatalogCacheRow::as_select())
                .first::<CatalogCacheRow>(connection)
                .optional()
                .map_err(PluginStoreError::persistence)?;
            row.map(row_to_cache_entry).transpose()
        })
        .await
    }

    async fn upsert_cache_entry(&self, entry: &CatalogCacheEntry) -> PluginStoreResult<()> {
        let row = cache_entry_to_row(entry)?;
        self.run_blocking(move |connection| {
            diesel::insert_into(plugin_catalog_cache::table)
                .values(&row)
                .on_conflict(plugin_catalog_cache::plugin_id)
                .do_update()
                .set((
                    plugin_catalog_cache::icon.eq(excluded(plugin_catalog_cache::icon)),
                    plugin_catalog_cache::categories
                        .eq(excluded(plugin_catalog_cache::categories)),
                    plugin_catalog_cache::price_cents
                        .eq(excluded(plugin_catalog_cache::price_cents)),
                    plugin_catalog_cache::phase.eq(excluded(plugin_catalog_cache::phase)),
                    plugin_catalog_cache::cached_at.eq(excluded(plugin_catalog_cache::cached_at)),
                ))
                .execute(connection)
                .map_err(PluginStoreError::persistence)?;
            Ok(())
        })
        .await
    }

    async fn delete_cache_entry(&self, plugin_id: &PluginId) -> PluginStoreResult<bool> {
        let key = plugin_id.as_str().to_owned();
        self.run_blocking(move |connection| {
            let deleted = diesel::delete(
                plugin_catalog_cache::table.filter(plugin_catalog_cache::plugin_id.eq(&key)),
            )
            .execute(connection)
            .map_err(PluginStoreError::persistence)?;
            Ok(deleted > 0)
        })
        .await
    }
}

fn activation_to_row(record: &ActivationRecord) -> ActivationRow {
    ActivationRow {
        plugin_id: record.plugin_id().as_str().to_owned(),
        is_active: record.is_active(),
        activated_at: record.activated_at(),
        activated_by: record.activated_by().map(ActorId::into_inner),
        deactivated_at: record.deactivated_at(),
    }
}

fn row_to_activation(row: ActivationRow) -> PluginStoreResult<ActivationRecord> {
    let ActivationRow {
        plugin_id,
        is_active,
        activated_at,
        activated_by,
        deactivated_at,
    } = row;
    let parsed_id = PluginId::new(plugin_id).map_err(PluginStoreError::invalid_persisted_data)?;

    Ok(ActivationRecord::from_persisted(PersistedActivationData {
        plugin_id: parsed_id,
        is_active,
        activated_at,
        activated_by: activated_by.map(ActorId::from_uuid),
        deactivated_at,
    }))
}

fn cache_entry_to_row(entry: &CatalogCacheEntry) -> PluginStoreResult<CatalogCacheRow> {
    let presentation = &entry.presentation;
    let categories = serde_json::to_value(&presentation.categories)
        .map_err(PluginStoreError::persistence)?;
    let price_cents =
        i64::try_from(presentation.price_cents).map_err(PluginStoreError::persistence)?;

    Ok(CatalogCacheRow {
        plugin_id: entry.plugin_id.as_str().to_owned(),
        icon: presentation.icon.clone(),
        categories,
        price_cents,
        phase: presentation.phase.as_str().to_owned(),
        cached_at: entry.cached_at,
    })
}

fn row_to_cache_entry(row: CatalogCacheRow) -> PluginStoreResult<CatalogCacheEntry> {
    let CatalogCacheRow {
        plugin_id,
        icon,
        categories,
        price_cents,
        phase,
        cached_at,
    } = row;
    let parsed_id = PluginId::new(plugin_id).map_err(PluginStoreError::invalid_persisted_data)?;
    let parsed_categories: Vec<String> =
        serde_json::from_value(categories).map_err(PluginStoreError::invalid_persisted_data)?;
    let parsed_price =
        u64::try_from(price_cents).map_err(PluginStoreError::invalid_persisted_data)?;

    Ok(CatalogCacheEntry {
        plugin_id: parsed_id,
        presentation: CatalogPresentation {
            icon,
            categories: parsed_categories,
            price_cents: parsed_price,
            phase: ReleasePhase::parse_or_default(&phase),
        },
        cached_at,
    })
}

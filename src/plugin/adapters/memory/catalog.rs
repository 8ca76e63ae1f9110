//! Deterministic in-memory plugin catalog.

use crate::plugin::{
    domain::{
        CatalogCategory, CatalogEntry, CatalogProfile, LicenceRecord, PluginArchive, PluginId,
    },
    ports::{CatalogClient, CatalogError, CatalogResult},
};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// In-memory catalog with a reachability switch.
///
/// Entries are listed in id order. Downloads require the entry to be both
/// licensed and downloadable, and are counted per plugin.
#[derive(Debug, Clone)]
pub struct InMemoryCatalog {
    state: Arc<RwLock<InMemoryCatalogState>>,
}

#[derive(Debug)]
struct InMemoryCatalogState {
    reachable: bool,
    entries: BTreeMap<PluginId, CatalogEntry>,
    archives: HashMap<PluginId, PluginArchive>,
    downloads: HashMap<PluginId, usize>,
    categories: Vec<CatalogCategory>,
    profile: CatalogProfile,
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCatalog {
    /// Creates an empty, reachable catalog.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(InMemoryCatalogState {
                reachable: true,
                entries: BTreeMap::new(),
                archives: HashMap::new(),
                downloads: HashMap::new(),
                categories: Vec::new(),
                profile: CatalogProfile {
                    account: String::from("local"),
                    privileged: false,
                },
            })),
        }
    }

    /// Adds a listed entry.
    #[must_use]
    pub fn with_entry(self, entry: CatalogEntry) -> Self {
        if let Ok(mut state) = self.state.write() {
            state.entries.insert(entry.id.clone(), entry);
        }
        self
    }

    /// Adds a downloadable archive.
    #[must_use]
    pub fn with_archive(self, plugin_id: PluginId, archive: PluginArchive) -> Self {
        if let Ok(mut state) = self.state.write() {
            state.archives.insert(plugin_id, archive);
        }
        self
    }

    /// Adds a category.
    #[must_use]
    pub fn with_category(self, category: CatalogCategory) -> Self {
        if let Ok(mut state) = self.state.write() {
            state.categories.push(category);
        }
        self
    }

    /// Switches reachability; an unreachable catalog fails every call.
    pub fn set_reachable(&self, reachable: bool) {
        if let Ok(mut state) = self.state.write() {
            state.reachable = reachable;
        }
    }

    /// Adds or replaces an entry.
    ///
    /// # Errors
    ///
    /// Returns a protocol error when lock acquisition fails.
    pub fn upsert_entry(&self, entry: CatalogEntry) -> CatalogResult<()> {
        self.write()?.entries.insert(entry.id.clone(), entry);
        Ok(())
    }

    /// Adds or replaces the archive served for `plugin_id`.
    ///
    /// # Errors
    ///
    /// Returns a protocol error when lock acquisition fails.
    pub fn upsert_archive(&self, plugin_id: PluginId, archive: PluginArchive) -> CatalogResult<()> {
        self.write()?.archives.insert(plugin_id, archive);
        Ok(())
    }

    /// Returns how many archives were served for `plugin_id`.
    #[must_use]
    pub fn download_count(&self, plugin_id: &PluginId) -> usize {
        self.state
            .read()
            .ok()
            .and_then(|state| state.downloads.get(plugin_id).copied())
            .unwrap_or(0)
    }

    fn read(&self) -> CatalogResult<RwLockReadGuard<'_, InMemoryCatalogState>> {
        let state = self
            .state
            .read()
            .map_err(|err| CatalogError::protocol(std::io::Error::other(err.to_string())))?;
        if state.reachable {
            Ok(state)
        } else {
            Err(CatalogError::Unreachable(String::from("in-memory catalog is offline")))
        }
    }

    fn write(&self) -> CatalogResult<RwLockWriteGuard<'_, InMemoryCatalogState>> {
        self.state
            .write()
            .map_err(|err| CatalogError::protocol(std::io::Error::other(err.to_string())))
    }
}

#[async_trait]
impl CatalogClient for InMemoryCatalog {
    async fn list_plugins(&self) -> CatalogResult<Vec<CatalogEntry>> {
        Ok(self.read()?.entries.values().cloned().collect())
    }

    async fn get_plugin(&self, plugin_id: &PluginId) -> CatalogResult<Option<CatalogEntry>> {
        Ok(self.read()?.entries.get(plugin_id).cloned())
    }

    async fn download_archive(&self, plugin_id: &PluginId) -> CatalogResult<PluginArchive> {
        let archive = {
            let state = self.read()?;
            let entry = state
                .entries
                .get(plugin_id)
                .ok_or_else(|| CatalogError::NotFound(plugin_id.clone()))?;
            if !entry.licensed || !entry.can_download {
                return Err(CatalogError::LicenceRequired(plugin_id.clone()));
            }
            state
                .archives
                .get(plugin_id)
                .cloned()
                .ok_or_else(|| CatalogError::NotFound(plugin_id.clone()))?
        };
        *self.write()?.downloads.entry(plugin_id.clone()).or_default() += 1;
        Ok(archive)
    }

    async fn list_categories(&self) -> CatalogResult<Vec<CatalogCategory>> {
        Ok(self.read()?.categories.clone())
    }

    async fn own_licences(&self) -> CatalogResult<Vec<LicenceRecord>> {
        Ok(self
            .read()?
            .entries
            .values()
            .filter(|entry| entry.licensed)
            .map(|entry| LicenceRecord {
                plugin_id: entry.id.clone(),
                expires_at: None,
            })
            .collect())
    }

    async fn own_profile(&self) -> CatalogResult<CatalogProfile> {
        Ok(self.read()?.profile.clone())
    }
}

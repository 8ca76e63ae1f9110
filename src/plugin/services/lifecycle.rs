//! Plugin lifecycle orchestration.
//!
//! Provides [`LifecycleManager`], which owns activation state and the
//! restart and pending-migration flags, merges installed packages with the
//! catalog, and loads activated plugins into a [`DependencyRegistry`] at
//! boot.
//!
//! Activation state moves NOT_INSTALLED → INSTALLED → ACTIVE. A deactivated
//! plugin is INSTALLED with a historical activation record.

use crate::plugin::{
    domain::{
        ActivationRecord, ActorId, CatalogEntry, InstalledPackage, PENDING_MIGRATIONS_KEY,
        PackageStatus, PendingMigrations, PluginId, PluginMetadata, RESTART_REQUIRED_KEY,
        StatusFlag, encode_bool,
    },
    ports::{CatalogClient, CatalogError, PluginStore, PluginStoreError},
    services::{
        catalog::{CachedCatalog, CachedCatalogError, CatalogListing, CatalogLookup},
        installer::{ArchiveInstaller, InstallerError},
        registry::DependencyRegistry,
    },
    descriptor::CapabilityDescriptor,
    units::PluginUnits,
};
use mockable::Clock;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Operational errors raised by [`LifecycleManager`].
///
/// Validation errors are raised before any write.
#[derive(Debug, Clone, Error)]
pub enum LifecycleError {
    /// Neither the catalog nor the local manifest describes the plugin.
    #[error("plugin {0} was not found in the catalog or its local manifest")]
    PluginNotFound(PluginId),

    /// The plugin's package is not installed.
    #[error("plugin {0} is not installed")]
    PackageNotInstalled(PluginId),

    /// A declared dependency is not active.
    #[error("plugin {plugin} requires {dependency}, which is not activated")]
    DependencyNotActivated {
        /// Plugin being activated.
        plugin: PluginId,
        /// Inactive dependency.
        dependency: PluginId,
    },

    /// Package installation or removal failed.
    #[error(transparent)]
    Installer(#[from] InstallerError),

    /// The catalog answered with an error other than being unreachable.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Plugin state could not be read or written.
    #[error(transparent)]
    Store(#[from] PluginStoreError),
}

impl From<CachedCatalogError> for LifecycleError {
    fn from(err: CachedCatalogError) -> Self {
        match err {
            CachedCatalogError::Catalog(source) => Self::Catalog(source),
            CachedCatalogError::Store(source) => Self::Store(source),
        }
    }
}

/// Result type for lifecycle operations.
pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Merged view of one plugin returned by [`LifecycleManager::discover`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredPlugin {
    /// Identity from the local manifest when installed, otherwise from the
    /// catalog, plus catalog presentation.
    pub metadata: PluginMetadata,
    /// Whether a package exists locally.
    pub installed: bool,
    /// Whether the package ships with the host.
    pub bundled: bool,
    /// Whether the plugin is activated.
    pub active: bool,
    /// Whether the plugin can be downloaded and installed now.
    pub installable: bool,
}

/// Result of [`LifecycleManager::discover`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discovery {
    /// Whether the catalog answered.
    pub catalog_reachable: bool,
    /// Plugins sorted by id.
    pub plugins: Vec<DiscoveredPlugin>,
}

impl Discovery {
    /// Returns the entry for `plugin_id`.
    #[must_use]
    pub fn plugin(&self, plugin_id: &PluginId) -> Option<&DiscoveredPlugin> {
        self.plugins
            .iter()
            .find(|plugin| &plugin.metadata.id == plugin_id)
    }
}

/// A plugin left out at boot and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedPlugin {
    /// Plugin id.
    pub plugin_id: PluginId,
    /// Human-readable reason.
    pub reason: String,
}

/// Outcome of [`LifecycleManager::load_activated_plugins`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootReport {
    /// Plugins registered, in activation-record order.
    pub loaded: Vec<PluginId>,
    /// Plugins skipped.
    pub skipped: Vec<SkippedPlugin>,
}

impl BootReport {
    fn skip(&mut self, plugin_id: &PluginId, reason: String) {
        tracing::warn!(%plugin_id, %reason, "skipping plugin at boot");
        self.skipped.push(SkippedPlugin {
            plugin_id: plugin_id.clone(),
            reason,
        });
    }

    /// Returns whether `plugin_id` was skipped.
    #[must_use]
    pub fn is_skipped(&self, plugin_id: &PluginId) -> bool {
        self.skipped
            .iter()
            .any(|skipped| &skipped.plugin_id == plugin_id)
    }
}

/// Lifecycle orchestration service.
pub struct LifecycleManager<S, C, K>
where
    S: PluginStore,
    C: CatalogClient,
    K: Clock + Send + Sync,
{
    store: Arc<S>,
    catalog: CachedCatalog<C, S, K>,
    installer: ArchiveInstaller<C>,
    units: PluginUnits,
    clock: Arc<K>,
}

impl<S, C, K> LifecycleManager<S, C, K>
where
    S: PluginStore,
    C: CatalogClient,
    K: Clock + Send + Sync,
{
    /// Creates a lifecycle manager.
    #[must_use]
    pub fn new(
        store: Arc<S>,
        catalog: Arc<C>,
        clock: Arc<K>,
        installer: ArchiveInstaller<C>,
        units: PluginUnits,
    ) -> Self {
        Self {
            catalog: CachedCatalog::new(catalog, Arc::clone(&store), Arc::clone(&clock)),
            store,
            installer,
            units,
            clock,
        }
    }

    /// Returns the package installer.
    #[must_use]
    pub const fn installer(&self) -> &ArchiveInstaller<C> {
        &self.installer
    }

    /// Merges installed packages with the catalog listing.
    ///
    /// While the catalog is reachable, cache rows of installed plugins are
    /// refreshed from the listing. While it is not, catalog-only plugins are
    /// left out. Installed plugins always take their presentation from the
    /// cache, so the offline result matches the last online one.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError`] when packages cannot be scanned, state
    /// cannot be read, or the catalog fails other than by being unreachable.
    pub async fn discover(&self) -> LifecycleResult<Discovery> {
        let packages = self.installer.scan_packages().await?;
        let listing = self.catalog.listing().await?;
        let installed: BTreeSet<PluginId> =
            packages.iter().map(|package| package.id.clone()).collect();
        self.catalog.refresh(&listing, &installed).await?;
        let active = self.active_ids().await?;

        let mut plugins = BTreeMap::new();
        for package in &packages {
            let presentation = self.catalog.cached_presentation(&package.id).await?;
            plugins.insert(
                package.id.clone(),
                DiscoveredPlugin {
                    metadata: PluginMetadata::from_package(package, presentation),
                    installed: true,
                    bundled: package.bundled,
                    active: active.contains(&package.id),
                    installable: false,
                },
            );
        }
        for entry in &listing.entries {
            if installed.contains(&entry.id) {
                continue;
            }
            plugins.insert(
                entry.id.clone(),
                DiscoveredPlugin {
                    metadata: PluginMetadata::from_catalog(entry),
                    installed: false,
                    bundled: false,
                    active: active.contains(&entry.id),
                    installable: entry.licensed && entry.can_download,
                },
            );
        }

        tracing::debug!(
            catalog_reachable = listing.reachable,
            count = plugins.len(),
            "discovered plugins"
        );
        Ok(Discovery {
            catalog_reachable: listing.reachable,
            plugins: plugins.into_values().collect(),
        })
    }

    /// Returns the target's dependency closure, dependencies first and the
    /// target last.
    ///
    /// Dependencies come from the catalog listing, falling back to the local
    /// manifest. The visited set keeps each plugin to one entry; cycles are
    /// not reported here.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError`] when the listing or the local packages
    /// cannot be read.
    pub async fn resolve_activation_order(
        &self,
        target: &PluginId,
    ) -> LifecycleResult<Vec<PluginId>> {
        let listing = self.catalog.listing().await?;
        let packages: HashMap<PluginId, InstalledPackage> = self
            .installer
            .scan_packages()
            .await?
            .into_iter()
            .map(|package| (package.id.clone(), package))
            .collect();
        let mut visited = HashSet::new();
        let mut order = Vec::new();
        visit_dependencies(&listing, &packages, target, &mut visited, &mut order);
        Ok(order)
    }

    /// Activates the target and every inactive plugin in its dependency
    /// closure, returning the newly activated ids in order.
    ///
    /// All pending plugins are validated before the first write.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::PackageNotInstalled`] or
    /// [`LifecycleError::PluginNotFound`] for any pending plugin, or
    /// persistence errors.
    pub async fn activate_with_dependencies(
        &self,
        target: &PluginId,
        actor: Option<ActorId>,
    ) -> LifecycleResult<Vec<PluginId>> {
        let order = self.resolve_activation_order(target).await?;
        let active = self.active_ids().await?;
        let pending: Vec<PluginId> = order
            .into_iter()
            .filter(|plugin_id| !active.contains(plugin_id))
            .collect();

        for plugin_id in &pending {
            self.require_known_package(plugin_id).await?;
        }
        for plugin_id in &pending {
            self.record_activation(plugin_id, actor).await?;
        }
        Ok(pending)
    }

    /// Activates one plugin whose dependencies are already active.
    ///
    /// Sets the restart flag and queues the plugin for migrations.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::PackageNotInstalled`],
    /// [`LifecycleError::PluginNotFound`], or
    /// [`LifecycleError::DependencyNotActivated`] before any write, or
    /// persistence errors.
    pub async fn activate(
        &self,
        plugin_id: &PluginId,
        actor: Option<ActorId>,
    ) -> LifecycleResult<()> {
        let dependencies = self.require_known_package(plugin_id).await?;
        let active = self.active_ids().await?;
        if let Some(missing) = dependencies
            .into_iter()
            .find(|dependency| !active.contains(dependency))
        {
            return Err(LifecycleError::DependencyNotActivated {
                plugin: plugin_id.clone(),
                dependency: missing,
            });
        }
        self.record_activation(plugin_id, actor).await
    }

    /// Deactivates a plugin and sets the restart flag. Returns whether an
    /// activation record existed.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Store`] when state cannot be written.
    pub async fn deactivate(&self, plugin_id: &PluginId) -> LifecycleResult<bool> {
        let existing = self.store.find_activation(plugin_id).await?;
        let found = existing.is_some();
        if let Some(mut record) = existing {
            record.deactivate(&*self.clock);
            self.store.upsert_activation(&record).await?;
        }
        self.set_restart_required(true).await?;
        tracing::info!(%plugin_id, found, "deactivated plugin");
        Ok(found)
    }

    /// Returns whether activation changes await a process restart.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Store`] when the flag cannot be read or
    /// holds an unparsable value.
    pub async fn is_restart_required(&self) -> LifecycleResult<bool> {
        self.store
            .get_flag(RESTART_REQUIRED_KEY)
            .await?
            .map_or(Ok(false), |flag| {
                flag.as_bool().map_err(PluginStoreError::invalid_persisted_data)
            })
            .map_err(LifecycleError::from)
    }

    /// Clears the restart flag. The row is kept with value `false`.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Store`] when the flag cannot be written.
    pub async fn mark_restart_complete(&self) -> LifecycleResult<()> {
        self.set_restart_required(false).await
    }

    /// Returns plugins waiting for schema migrations, in queue order.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Store`] when the list cannot be read.
    pub async fn get_pending_migrations(&self) -> LifecycleResult<Vec<PluginId>> {
        Ok(self.pending_migrations().await?.into_ids())
    }

    /// Removes one plugin from the migration queue. The row is deleted when
    /// the queue empties. Returns whether the plugin was queued.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Store`] when the list cannot be updated.
    pub async fn clear_pending_migration(&self, plugin_id: &PluginId) -> LifecycleResult<bool> {
        let mut pending = self.pending_migrations().await?;
        if !pending.remove(plugin_id) {
            return Ok(false);
        }
        self.save_pending_migrations(&pending).await?;
        Ok(true)
    }

    /// Empties the migration queue. Returns whether a queue existed.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Store`] when the row cannot be deleted.
    pub async fn clear_all_pending_migrations(&self) -> LifecycleResult<bool> {
        Ok(self.store.delete_flag(PENDING_MIGRATIONS_KEY).await?)
    }

    /// Installs a package and caches its catalog presentation.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Installer`] for install failures, including
    /// `AlreadyInstalled` and `InvalidArchive`.
    pub async fn install(&self, plugin_id: &PluginId, force: bool) -> LifecycleResult<PathBuf> {
        let target = self.installer.install(plugin_id, force).await?;
        if let CatalogLookup::Online(Some(entry)) = self.catalog.lookup(plugin_id).await? {
            self.catalog.remember(&entry).await?;
        }
        Ok(target)
    }

    /// Removes the plugin's package from the install root. Returns whether
    /// a package was removed.
    ///
    /// Once no copy of the code remains the plugin is deactivated if active
    /// and its cache row is dropped. A bundled copy keeps the plugin
    /// installed, so its activation and cache row are left alone.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError`] when state cannot be written or the
    /// package cannot be removed.
    pub async fn uninstall(&self, plugin_id: &PluginId) -> LifecycleResult<bool> {
        let removed = self.installer.uninstall(plugin_id).await?;
        if let Some(remaining) = self.installer.locate_package(plugin_id).await? {
            tracing::info!(
                %plugin_id,
                path = %remaining.root.display(),
                "bundled copy remains; keeping activation"
            );
            return Ok(removed);
        }
        let is_active = self
            .store
            .find_activation(plugin_id)
            .await?
            .is_some_and(|record| record.is_active());
        if is_active {
            self.deactivate(plugin_id).await?;
        }
        self.catalog.forget(plugin_id).await?;
        Ok(removed)
    }

    /// Returns the package's installed and licensing status.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Installer`] when status cannot be
    /// determined.
    pub async fn status(&self, plugin_id: &PluginId) -> LifecycleResult<PackageStatus> {
        Ok(self.installer.status(plugin_id).await?)
    }

    /// Instantiates every active plugin and registers it.
    ///
    /// A plugin that cannot be located, instantiated, or registered is
    /// logged and skipped; the rest still load. Plugins depending on a
    /// skipped or inactive plugin are skipped too, so the registry never
    /// holds a plugin whose dependencies are missing.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Store`] only when the active set cannot be
    /// read.
    pub async fn load_activated_plugins(
        &self,
        registry: &mut DependencyRegistry,
    ) -> LifecycleResult<BootReport> {
        let records = self.store.list_active().await?;
        let listing = match self.catalog.listing().await {
            Ok(listing) => listing,
            Err(err) => {
                tracing::warn!(error = %err, "catalog unavailable at boot; using local manifests");
                CatalogListing::default()
            }
        };

        let mut report = BootReport::default();
        let mut candidates = Vec::new();
        for record in records {
            let plugin_id = record.plugin_id();
            match self.instantiate(&listing, plugin_id, registry).await {
                Ok(descriptor) => candidates.push(descriptor),
                Err(reason) => report.skip(plugin_id, reason),
            }
        }

        for descriptor in prune_unmet(candidates, registry, &mut report) {
            let plugin_id = descriptor.id().clone();
            match registry.register(descriptor) {
                Ok(()) => report.loaded.push(plugin_id),
                Err(err) => report.skip(&plugin_id, err.to_string()),
            }
        }
        tracing::info!(
            loaded = report.loaded.len(),
            skipped = report.skipped.len(),
            "loaded activated plugins"
        );
        Ok(report)
    }

    async fn instantiate(
        &self,
        listing: &CatalogListing,
        plugin_id: &PluginId,
        registry: &DependencyRegistry,
    ) -> Result<CapabilityDescriptor, String> {
        if registry.contains(plugin_id) {
            return Err(String::from("plugin is already registered"));
        }
        let package = self
            .installer
            .locate_package(plugin_id)
            .await
            .map_err(|err| err.to_string())?
            .ok_or_else(|| String::from("package is not installed"))?;
        let (unit, entry_point) = unit_of(listing.entry(plugin_id), &package)
            .ok_or_else(|| String::from("no unit or entry point is declared"))?;
        let descriptor = self
            .units
            .instantiate(&unit, &entry_point)
            .map_err(|err| err.to_string())?;
        if descriptor.id() != plugin_id {
            return Err(format!(
                "unit '{unit}::{entry_point}' built plugin {}",
                descriptor.id()
            ));
        }
        Ok(descriptor)
    }

    /// Checks the package exists and some metadata describes it, returning
    /// its declared dependencies.
    async fn require_known_package(
        &self,
        plugin_id: &PluginId,
    ) -> LifecycleResult<Vec<PluginId>> {
        let package = self
            .installer
            .locate_package(plugin_id)
            .await?
            .ok_or_else(|| LifecycleError::PackageNotInstalled(plugin_id.clone()))?;
        let dependencies = match self.catalog.lookup(plugin_id).await? {
            CatalogLookup::Online(entry) => entry.map(|listed| listed.dependencies),
            CatalogLookup::Offline => package.manifest.map(|manifest| manifest.dependencies),
        };
        dependencies.ok_or_else(|| LifecycleError::PluginNotFound(plugin_id.clone()))
    }

    async fn record_activation(
        &self,
        plugin_id: &PluginId,
        actor: Option<ActorId>,
    ) -> LifecycleResult<()> {
        let record = match self.store.find_activation(plugin_id).await? {
            Some(mut existing) => {
                existing.reactivate(actor, &*self.clock);
                existing
            }
            None => ActivationRecord::activated(plugin_id.clone(), actor, &*self.clock),
        };
        self.store.upsert_activation(&record).await?;
        self.set_restart_required(true).await?;

        let mut pending = self.pending_migrations().await?;
        if pending.push(plugin_id.clone()) {
            self.save_pending_migrations(&pending).await?;
        }
        tracing::info!(%plugin_id, "activated plugin");
        Ok(())
    }

    async fn active_ids(&self) -> LifecycleResult<HashSet<PluginId>> {
        Ok(self
            .store
            .list_active()
            .await?
            .into_iter()
            .map(|record| record.plugin_id().clone())
            .collect())
    }

    async fn set_restart_required(&self, required: bool) -> LifecycleResult<()> {
        let flag = StatusFlag::new(RESTART_REQUIRED_KEY, encode_bool(required), self.clock.utc());
        Ok(self.store.set_flag(&flag).await?)
    }

    async fn pending_migrations(&self) -> LifecycleResult<PendingMigrations> {
        self.store
            .get_flag(PENDING_MIGRATIONS_KEY)
            .await?
            .map_or(Ok(PendingMigrations::default()), |flag| {
                flag.as_pending_migrations()
                    .map_err(PluginStoreError::invalid_persisted_data)
            })
            .map_err(LifecycleError::from)
    }

    async fn save_pending_migrations(&self, pending: &PendingMigrations) -> LifecycleResult<()> {
        if pending.is_empty() {
            self.store.delete_flag(PENDING_MIGRATIONS_KEY).await?;
            return Ok(());
        }
        let encoded = pending.encode().map_err(PluginStoreError::persistence)?;
        let flag = StatusFlag::new(PENDING_MIGRATIONS_KEY, encoded, self.clock.utc());
        Ok(self.store.set_flag(&flag).await?)
    }
}

fn visit_dependencies(
    listing: &CatalogListing,
    packages: &HashMap<PluginId, InstalledPackage>,
    plugin_id: &PluginId,
    visited: &mut HashSet<PluginId>,
    order: &mut Vec<PluginId>,
) {
    if !visited.insert(plugin_id.clone()) {
        return;
    }
    for dependency in declared_dependencies(listing, packages, plugin_id) {
        visit_dependencies(listing, packages, &dependency, visited, order);
    }
    order.push(plugin_id.clone());
}

/// Dependencies from the catalog listing, else from the local manifest.
fn declared_dependencies(
    listing: &CatalogListing,
    packages: &HashMap<PluginId, InstalledPackage>,
    plugin_id: &PluginId,
) -> Vec<PluginId> {
    if let Some(entry) = listing.entry(plugin_id) {
        return entry.dependencies.clone();
    }
    packages
        .get(plugin_id)
        .and_then(|package| package.manifest.as_ref())
        .map(|manifest| manifest.dependencies.clone())
        .unwrap_or_default()
}

/// Drops candidates with a dependency that is neither another candidate nor
/// already registered, repeating until every remaining candidate is
/// satisfied.
fn prune_unmet(
    mut candidates: Vec<CapabilityDescriptor>,
    registry: &DependencyRegistry,
    report: &mut BootReport,
) -> Vec<CapabilityDescriptor> {
    loop {
        let available: HashSet<PluginId> = candidates
            .iter()
            .map(|descriptor| descriptor.id().clone())
            .collect();
        let mut kept = Vec::with_capacity(candidates.len());
        let mut pruned = false;
        for descriptor in candidates {
            let Some(dependency) = unmet_dependency(&descriptor, &available, registry) else {
                kept.push(descriptor);
                continue;
            };
            let reason = if report.is_skipped(dependency) {
                format!("dependency {dependency} was skipped")
            } else {
                format!("dependency {dependency} is not active")
            };
            report.skip(descriptor.id(), reason);
            pruned = true;
        }
        if !pruned {
            return kept;
        }
        candidates = kept;
    }
}

/// Returns the first dependency that is neither among `available` nor
/// already registered.
fn unmet_dependency<'a>(
    descriptor: &'a CapabilityDescriptor,
    available: &HashSet<PluginId>,
    registry: &DependencyRegistry,
) -> Option<&'a PluginId> {
    descriptor
        .dependencies()
        .iter()
        .find(|dependency| !available.contains(*dependency) && !registry.contains(dependency))
}

fn unit_of(entry: Option<&CatalogEntry>, package: &InstalledPackage) -> Option<(String, String)> {
    let from_catalog = entry.and_then(|listed| listed.unit.clone().zip(listed.entry_point.clone()));
    from_catalog.or_else(|| {
        package
            .manifest
            .as_ref()
            .and_then(|manifest| manifest.unit.clone().zip(manifest.entry_point.clone()))
    })
}

//! Dependency-ordered registration of plugin descriptors.
//!
//! Provides [`DependencyRegistry`], which collects descriptors at boot,
//! computes a deterministic load order, and wires each plugin into the host
//! exactly once.

use crate::plugin::descriptor::{CapabilityDescriptor, PluginHookError};
use crate::plugin::domain::PluginId;
use crate::plugin::ports::{HostApp, HostError};
use crate::plugin::services::slots::UiSlotComposer;
use crate::plugin::templates::TemplateLink;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use thiserror::Error;

/// Structural errors that abort boot.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A descriptor with the same id is already registered.
    #[error("plugin {0} is already registered")]
    DuplicateId(PluginId),

    /// Registration was attempted after [`DependencyRegistry::finalize`].
    #[error("cannot register plugin {0} after the registry has been initialised")]
    CannotRegisterAfterInit(PluginId),

    /// A declared dependency is not registered.
    #[error("plugin {dependent} depends on {dependency}, which is not registered")]
    MissingDependency {
        /// Missing plugin.
        dependency: PluginId,
        /// Plugin declaring the dependency.
        dependent: PluginId,
    },

    /// The dependency graph contains a cycle.
    ///
    /// Holds every plugin left unresolved, not a minimal cycle.
    #[error("circular dependency among plugins: {}", format_ids(.0))]
    CircularDependency(Vec<PluginId>),

    /// [`DependencyRegistry::finalize`] already ran.
    #[error("plugin registry has already been initialised")]
    AlreadyInitialized,

    /// The host rejected one of the plugin's declarations.
    #[error("host rejected declarations of plugin {plugin}: {source}")]
    Host {
        /// Plugin being initialised.
        plugin: PluginId,
        /// Host failure.
        source: HostError,
    },

    /// The plugin's initialisation hook failed.
    #[error("initialisation hook of plugin {plugin} failed: {source}")]
    InitHook {
        /// Plugin being initialised.
        plugin: PluginId,
        /// Hook failure.
        source: PluginHookError,
    },
}

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

fn format_ids(ids: &[PluginId]) -> String {
    ids.iter()
        .map(PluginId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Boot-time plugin registry.
#[derive(Debug, Default)]
pub struct DependencyRegistry {
    descriptors: BTreeMap<PluginId, Arc<CapabilityDescriptor>>,
    load_order: Vec<PluginId>,
    initialized: bool,
}

impl DependencyRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::CannotRegisterAfterInit`] once the registry
    /// has been finalised, or [`RegistryError::DuplicateId`] when the id is
    /// already present.
    pub fn register(&mut self, descriptor: CapabilityDescriptor) -> RegistryResult<()> {
        let plugin_id = descriptor.id().clone();
        if self.initialized {
            return Err(RegistryError::CannotRegisterAfterInit(plugin_id));
        }
        if self.descriptors.contains_key(&plugin_id) {
            return Err(RegistryError::DuplicateId(plugin_id));
        }
        self.descriptors.insert(plugin_id, Arc::new(descriptor));
        Ok(())
    }

    /// Returns whether a descriptor with `plugin_id` is registered.
    #[must_use]
    pub fn contains(&self, plugin_id: &PluginId) -> bool {
        self.descriptors.contains_key(plugin_id)
    }

    /// Returns a registered descriptor.
    #[must_use]
    pub fn get(&self, plugin_id: &PluginId) -> Option<&Arc<CapabilityDescriptor>> {
        self.descriptors.get(plugin_id)
    }

    /// Returns the number of registered descriptors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Returns whether no descriptor is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Returns whether [`Self::finalize`] has completed dependency resolution.
    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Returns the order plugins were initialised in, empty before
    /// finalisation.
    #[must_use]
    pub fn load_order(&self) -> &[PluginId] {
        &self.load_order
    }

    /// Computes the load order.
    ///
    /// Every plugin comes after all of its dependencies. Among plugins that
    /// become ready at the same time, ascending id wins, so the output is
    /// reproducible for a given descriptor set.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::MissingDependency`] for the first undeclared
    /// dependency found (plugins and dependencies visited in id order), or
    /// [`RegistryError::CircularDependency`] with every unresolved plugin.
    pub fn resolve_order(&self) -> RegistryResult<Vec<PluginId>> {
        self.ensure_dependencies_registered()?;

        let mut in_degree: BTreeMap<&PluginId, usize> = BTreeMap::new();
        let mut dependents: BTreeMap<&PluginId, Vec<&PluginId>> = BTreeMap::new();
        for (plugin_id, descriptor) in &self.descriptors {
            in_degree.insert(plugin_id, descriptor.dependencies().len());
            for dependency in descriptor.dependencies() {
                dependents.entry(dependency).or_default().push(plugin_id);
            }
        }

        let mut ready: BTreeSet<&PluginId> = in_degree
            .iter()
            .filter(|&(_, degree)| *degree == 0)
            .map(|(plugin_id, _)| *plugin_id)
            .collect();
        let mut order = Vec::with_capacity(self.descriptors.len());

        while let Some(plugin_id) = ready.pop_first() {
            order.push(plugin_id.clone());
            for dependent in dependents.get(plugin_id).into_iter().flatten() {
                if let Some(degree) = in_degree.get_mut(dependent) {
                    *degree = degree.saturating_sub(1);
                    if *degree == 0 {
                        ready.insert(dependent);
                    }
                }
            }
        }

        if order.len() < self.descriptors.len() {
            let resolved: BTreeSet<&PluginId> = order.iter().collect();
            let remaining = self
                .descriptors
                .keys()
                .filter(|plugin_id| !resolved.contains(plugin_id))
                .cloned()
                .collect();
            return Err(RegistryError::CircularDependency(remaining));
        }

        Ok(order)
    }

    /// Wires every registered plugin into the host in dependency order.
    ///
    /// For each plugin: entities, route groups, commands, template chain,
    /// help content (only missing keys, failures ignored), UI slots, and
    /// finally its initialisation hook. Returns the load order.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::AlreadyInitialized`] on a second call,
    /// dependency resolution errors, or the first host or hook failure.
    pub fn finalize(
        &mut self,
        host: &mut dyn HostApp,
        slots: &mut UiSlotComposer,
    ) -> RegistryResult<Vec<PluginId>> {
        if self.initialized {
            return Err(RegistryError::AlreadyInitialized);
        }
        let order = self.resolve_order()?;
        self.initialized = true;
        tracing::debug!(load_order = %format_ids(&order), "resolved plugin load order");

        for plugin_id in &order {
            let Some(descriptor) = self.descriptors.get(plugin_id) else {
                continue;
            };
            initialize_plugin(descriptor, host, slots)?;
            self.load_order.push(plugin_id.clone());
        }

        tracing::info!(count = order.len(), "plugin registry initialised");
        Ok(order)
    }

    fn ensure_dependencies_registered(&self) -> RegistryResult<()> {
        for (plugin_id, descriptor) in &self.descriptors {
            let mut dependencies: Vec<&PluginId> = descriptor.dependencies().iter().collect();
            dependencies.sort();
            if let Some(missing) = dependencies
                .into_iter()
                .find(|dependency| !self.descriptors.contains_key(*dependency))
            {
                return Err(RegistryError::MissingDependency {
                    dependency: missing.clone(),
                    dependent: plugin_id.clone(),
                });
            }
        }
        Ok(())
    }
}

fn initialize_plugin(
    descriptor: &Arc<CapabilityDescriptor>,
    host: &mut dyn HostApp,
    slots: &mut UiSlotComposer,
) -> RegistryResult<()> {
    let plugin_id = descriptor.id();
    let host_error = |source: HostError| RegistryError::Host {
        plugin: plugin_id.clone(),
        source,
    };

    if !descriptor.entities().is_empty() {
        host.declare_entities(plugin_id, descriptor.entities())
            .map_err(host_error)?;
    }
    for group in descriptor.route_groups() {
        host.mount_route_group(plugin_id, group).map_err(host_error)?;
    }
    for command in descriptor.commands() {
        host.register_command(plugin_id, command).map_err(host_error)?;
    }
    if let Some(source_root) = descriptor.source_root() {
        let link = TemplateLink::from_source_root(plugin_id.clone(), source_root);
        if !host.template_chain_mut().append(link) {
            tracing::debug!(%plugin_id, "no new template or static directories to chain");
        }
    }
    seed_help_content(descriptor, host);
    slots.register_plugin(Arc::clone(descriptor));

    if let Some(hook) = descriptor.on_init() {
        hook(host).map_err(|source| RegistryError::InitHook {
            plugin: plugin_id.clone(),
            source,
        })?;
    }
    tracing::debug!(%plugin_id, version = descriptor.version(), "plugin initialised");
    Ok(())
}

fn seed_help_content(descriptor: &CapabilityDescriptor, host: &mut dyn HostApp) {
    let plugin_id = descriptor.id();
    for entry in descriptor.help_entries() {
        let seeded = host.has_help_entry(&entry.key).and_then(|exists| {
            if exists {
                Ok(false)
            } else {
                host.insert_help_entry(plugin_id, entry).map(|()| true)
            }
        });
        match seeded {
            Ok(true) => tracing::debug!(%plugin_id, key = %entry.key, "seeded help content"),
            Ok(false) => {}
            Err(err) => tracing::warn!(
                %plugin_id,
                key = %entry.key,
                error = %err,
                "help content seeding failed; continuing"
            ),
        }
    }
}

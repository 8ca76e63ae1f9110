//! Capability descriptors: the contract every plugin implements.
//!
//! A [`CapabilityDescriptor`] is code, not data. It is built once when a
//! plugin unit is instantiated, handed to the
//! [`DependencyRegistry`](crate::plugin::services::DependencyRegistry), and
//! never changes after the registry finalises.

use crate::plugin::domain::{
    AdminCategory, CommandDeclaration, EntityDeclaration, HelpEntry, PluginDomainError, PluginId,
    RouteGroup, SlotItem, SlotName,
};
use crate::plugin::ports::HostApp;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Failure raised by a plugin's own initialisation hook.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct PluginHookError(pub String);

impl PluginHookError {
    /// Creates a hook error from any message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Hook invoked once the plugin's declarations have been wired into the host.
pub type InitHook = Arc<dyn Fn(&mut dyn HostApp) -> Result<(), PluginHookError> + Send + Sync>;

/// Identity, dependencies, declarations, and UI contributions of one plugin.
#[derive(Clone)]
pub struct CapabilityDescriptor {
    id: PluginId,
    version: String,
    name: String,
    dependencies: Vec<PluginId>,
    admin_category: AdminCategory,
    slots: BTreeMap<SlotName, Vec<SlotItem>>,
    settings_schema: serde_json::Value,
    entities: Vec<EntityDeclaration>,
    route_groups: Vec<RouteGroup>,
    commands: Vec<CommandDeclaration>,
    help_entries: Vec<HelpEntry>,
    source_root: Option<PathBuf>,
    on_init: Option<InitHook>,
}

impl CapabilityDescriptor {
    /// Starts building a descriptor.
    #[must_use]
    pub fn builder(id: PluginId, version: impl Into<String>) -> CapabilityDescriptorBuilder {
        CapabilityDescriptorBuilder::new(id, version.into())
    }

    /// Returns the plugin identifier.
    #[must_use]
    pub const fn id(&self) -> &PluginId {
        &self.id
    }

    /// Returns the free-form version string.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns declared dependencies in declaration order.
    #[must_use]
    pub fn dependencies(&self) -> &[PluginId] {
        &self.dependencies
    }

    /// Returns the administration menu group.
    #[must_use]
    pub const fn admin_category(&self) -> AdminCategory {
        self.admin_category
    }

    /// Returns contributions for `slot`, in declaration order.
    #[must_use]
    pub fn slot_items(&self, slot: SlotName) -> &[SlotItem] {
        self.slots
            .get(&slot)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Returns the settings JSON schema, `null` when the plugin has none.
    #[must_use]
    pub const fn settings_schema(&self) -> &serde_json::Value {
        &self.settings_schema
    }

    /// Returns persisted entity declarations.
    #[must_use]
    pub fn entities(&self) -> &[EntityDeclaration] {
        &self.entities
    }

    /// Returns route groups to mount.
    #[must_use]
    pub fn route_groups(&self) -> &[RouteGroup] {
        &self.route_groups
    }

    /// Returns management commands.
    #[must_use]
    pub fn commands(&self) -> &[CommandDeclaration] {
        &self.commands
    }

    /// Returns help content to seed.
    #[must_use]
    pub fn help_entries(&self) -> &[HelpEntry] {
        &self.help_entries
    }

    /// Returns the directory holding the plugin's `templates/` and `static/`.
    #[must_use]
    pub fn source_root(&self) -> Option<&Path> {
        self.source_root.as_deref()
    }

    /// Returns the initialisation hook.
    #[must_use]
    pub const fn on_init(&self) -> Option<&InitHook> {
        self.on_init.as_ref()
    }
}

impl fmt::Debug for CapabilityDescriptor {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("CapabilityDescriptor")
            .field("id", &self.id)
            .field("version", &self.version)
            .field("dependencies", &self.dependencies)
            .field("admin_category", &self.admin_category)
            .field("slots", &self.slots)
            .field("entities", &self.entities)
            .field("route_groups", &self.route_groups)
            .field("commands", &self.commands)
            .field("source_root", &self.source_root)
            .field("on_init", &self.on_init.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder for [`CapabilityDescriptor`].
#[derive(Clone)]
pub struct CapabilityDescriptorBuilder {
    descriptor: CapabilityDescriptor,
}

impl CapabilityDescriptorBuilder {
    fn new(id: PluginId, version: String) -> Self {
        Self {
            descriptor: CapabilityDescriptor {
                name: id.as_str().to_owned(),
                id,
                version,
                dependencies: Vec::new(),
                admin_category: AdminCategory::default(),
                slots: BTreeMap::new(),
                settings_schema: serde_json::Value::Null,
                entities: Vec::new(),
                route_groups: Vec::new(),
                commands: Vec::new(),
                help_entries: Vec::new(),
                source_root: None,
                on_init: None,
            },
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.descriptor.name = name.into();
        self
    }

    /// Appends a dependency; duplicates are ignored.
    #[must_use]
    pub fn dependency(mut self, dependency: PluginId) -> Self {
        if !self.descriptor.dependencies.contains(&dependency) {
            self.descriptor.dependencies.push(dependency);
        }
        self
    }

    /// Sets the administration category by name, falling back to the default
    /// group when unrecognised.
    #[must_use]
    pub fn admin_category(mut self, category: &str) -> Self {
        self.descriptor.admin_category = AdminCategory::parse_or_default(category);
        self
    }

    /// Appends a contribution to `slot`.
    #[must_use]
    pub fn slot_item(mut self, slot: SlotName, item: SlotItem) -> Self {
        self.descriptor.slots.entry(slot).or_default().push(item);
        self
    }

    /// Sets the settings JSON schema.
    #[must_use]
    pub fn settings_schema(mut self, schema: serde_json::Value) -> Self {
        self.descriptor.settings_schema = schema;
        self
    }

    /// Declares a persisted entity.
    #[must_use]
    pub fn entity(mut self, entity: EntityDeclaration) -> Self {
        self.descriptor.entities.push(entity);
        self
    }

    /// Adds a route group.
    #[must_use]
    pub fn route_group(mut self, group: RouteGroup) -> Self {
        self.descriptor.route_groups.push(group);
        self
    }

    /// Adds a management command.
    #[must_use]
    pub fn command(mut self, command: CommandDeclaration) -> Self {
        self.descriptor.commands.push(command);
        self
    }

    /// Adds help content to seed.
    #[must_use]
    pub fn help_entry(mut self, entry: HelpEntry) -> Self {
        self.descriptor.help_entries.push(entry);
        self
    }

    /// Sets the directory holding `templates/` and `static/`.
    #[must_use]
    pub fn source_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.descriptor.source_root = Some(root.into());
        self
    }

    /// Sets the initialisation hook.
    #[must_use]
    pub fn on_init(
        mut self,
        hook: impl Fn(&mut dyn HostApp) -> Result<(), PluginHookError> + Send + Sync + 'static,
    ) -> Self {
        self.descriptor.on_init = Some(Arc::new(hook));
        self
    }

    /// Finishes the descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`PluginDomainError::SelfDependency`] when the plugin lists
    /// itself as a dependency.
    pub fn build(self) -> Result<CapabilityDescriptor, PluginDomainError> {
        let descriptor = self.descriptor;
        if descriptor.dependencies.contains(&descriptor.id) {
            return Err(PluginDomainError::SelfDependency(
                descriptor.id.as_str().to_owned(),
            ));
        }
        Ok(descriptor)
    }
}

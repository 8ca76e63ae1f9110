//! Host application seams consumed by plugin registration.

use crate::plugin::domain::{CommandDeclaration, EntityDeclaration, HelpEntry, PluginId, RouteGroup};
use crate::plugin::templates::TemplateChain;
use std::sync::Arc;
use thiserror::Error;

/// Result type for host integration calls.
pub type HostResult<T> = Result<T, HostError>;

/// Resolves endpoint names to URLs in the running host.
pub trait RouteResolver {
    /// Returns the URL path for `endpoint`, or `None` when no mounted route
    /// has that name.
    fn resolve_route(&self, endpoint: &str) -> Option<String>;
}

/// The web application a plugin is wired into.
///
/// The registry calls these methods in a fixed order per plugin: entities,
/// route groups, commands, template chain, help content.
pub trait HostApp: RouteResolver {
    /// Declares persisted entities owned by `plugin`.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::EntityConflict`] when an entity name is taken.
    fn declare_entities(
        &mut self,
        plugin: &PluginId,
        entities: &[EntityDeclaration],
    ) -> HostResult<()>;

    /// Mounts a route group under its prefix with its guard chain.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::RouteConflict`] when an endpoint is already
    /// mounted.
    fn mount_route_group(&mut self, plugin: &PluginId, group: &RouteGroup) -> HostResult<()>;

    /// Registers a management command.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::CommandConflict`] when the name is taken.
    fn register_command(
        &mut self,
        plugin: &PluginId,
        command: &CommandDeclaration,
    ) -> HostResult<()>;

    /// Returns the composite template and static lookup chain.
    fn template_chain_mut(&mut self) -> &mut TemplateChain;

    /// Returns whether help content with `key` already exists.
    ///
    /// # Errors
    ///
    /// Returns host runtime errors when the content store is unavailable.
    fn has_help_entry(&self, key: &str) -> HostResult<bool>;

    /// Stores help content.
    ///
    /// # Errors
    ///
    /// Returns host runtime errors when the content store is unavailable.
    fn insert_help_entry(&mut self, plugin: &PluginId, entry: &HelpEntry) -> HostResult<()>;
}

/// Errors returned by host integration adapters.
#[derive(Debug, Clone, Error)]
pub enum HostError {
    /// An endpoint with the same qualified name is already mounted.
    #[error("endpoint '{endpoint}' is already mounted (requested by plugin {plugin})")]
    RouteConflict {
        /// Qualified endpoint name.
        endpoint: String,
        /// Plugin that requested the mount.
        plugin: PluginId,
    },

    /// An entity with the same name is already declared.
    #[error("entity '{entity}' is already declared (requested by plugin {plugin})")]
    EntityConflict {
        /// Entity name.
        entity: String,
        /// Plugin that requested the declaration.
        plugin: PluginId,
    },

    /// A command with the same name is already registered.
    #[error("command '{command}' is already registered (requested by plugin {plugin})")]
    CommandConflict {
        /// Command name.
        command: String,
        /// Plugin that requested the registration.
        plugin: PluginId,
    },

    /// Generic host failure.
    #[error("host runtime error: {0}")]
    Runtime(Arc<dyn std::error::Error + Send + Sync>),
}

impl HostError {
    /// Wraps a runtime error from the host adapter.
    pub fn runtime(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Runtime(Arc::new(err))
    }
}

//! In-memory host application for registry and slot tests.
//!
//! Records every declaration it receives and enforces the same uniqueness
//! rules a real web host would, without serving anything.

use crate::plugin::{
    domain::{
        Actor, CommandDeclaration, EntityDeclaration, GuardDenial, HelpEntry, PluginId,
        RouteGroup,
    },
    ports::{HostApp, HostError, HostResult, RouteResolver},
    templates::TemplateChain,
};
use std::collections::{BTreeMap, HashMap};

/// A mounted route and the group it belongs to.
#[derive(Debug, Clone)]
struct MountedRoute {
    owner: Option<PluginId>,
    path: String,
    group: Option<usize>,
}

/// In-memory [`HostApp`].
#[derive(Debug, Default)]
pub struct InMemoryHostApp {
    routes: BTreeMap<String, MountedRoute>,
    groups: Vec<RouteGroup>,
    entities: BTreeMap<String, PluginId>,
    commands: BTreeMap<String, (PluginId, CommandDeclaration)>,
    help: HashMap<String, HelpEntry>,
    help_store_available: bool,
    template_chain: TemplateChain,
}

impl InMemoryHostApp {
    /// Creates an empty host with a working help store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            help_store_available: true,
            ..Self::default()
        }
    }

    /// Creates a host whose template chain starts with the given links.
    #[must_use]
    pub fn with_template_chain(mut self, chain: TemplateChain) -> Self {
        self.template_chain = chain;
        self
    }

    /// Mounts a host-owned route, such as the plugin management page.
    #[must_use]
    pub fn with_route(mut self, endpoint: impl Into<String>, path: impl Into<String>) -> Self {
        self.routes.insert(
            endpoint.into(),
            MountedRoute {
                owner: None,
                path: path.into(),
                group: None,
            },
        );
        self
    }

    /// Pre-populates help content, as an operator edit would.
    #[must_use]
    pub fn with_help_entry(mut self, entry: HelpEntry) -> Self {
        self.help.insert(entry.key.clone(), entry);
        self
    }

    /// Makes every help-store call fail.
    pub const fn set_help_store_available(&mut self, available: bool) {
        self.help_store_available = available;
    }

    /// Returns the plugin owning a mounted endpoint, `None` for host routes
    /// and unknown endpoints.
    #[must_use]
    pub fn route_owner(&self, endpoint: &str) -> Option<&PluginId> {
        self.routes.get(endpoint).and_then(|route| route.owner.as_ref())
    }

    /// Runs the guard chain of the group that mounted `endpoint`.
    ///
    /// Host routes and unknown endpoints have no guards.
    ///
    /// # Errors
    ///
    /// Returns the first [`GuardDenial`].
    pub fn authorize(&self, endpoint: &str, actor: &Actor) -> Result<(), GuardDenial> {
        self.routes
            .get(endpoint)
            .and_then(|route| route.group)
            .and_then(|index| self.groups.get(index))
            .map_or(Ok(()), |group| group.authorize(actor))
    }

    /// Returns the owner of a declared entity.
    #[must_use]
    pub fn entity_owner(&self, entity: &str) -> Option<&PluginId> {
        self.entities.get(entity)
    }

    /// Returns registered command names in name order.
    #[must_use]
    pub fn command_names(&self) -> Vec<&str> {
        self.commands.keys().map(String::as_str).collect()
    }

    /// Returns stored help content.
    #[must_use]
    pub fn help_entry(&self, key: &str) -> Option<&HelpEntry> {
        self.help.get(key)
    }

    /// Returns the template chain.
    #[must_use]
    pub const fn template_chain(&self) -> &TemplateChain {
        &self.template_chain
    }

    fn help_store_error() -> HostError {
        HostError::runtime(std::io::Error::other("help store unavailable"))
    }
}

impl RouteResolver for InMemoryHostApp {
    fn resolve_route(&self, endpoint: &str) -> Option<String> {
        self.routes.get(endpoint).map(|route| route.path.clone())
    }
}

impl HostApp for InMemoryHostApp {
    fn declare_entities(
        &mut self,
        plugin: &PluginId,
        entities: &[EntityDeclaration],
    ) -> HostResult<()> {
        if let Some(taken) = entities
            .iter()
            .find(|entity| self.entities.contains_key(&entity.name))
        {
            return Err(HostError::EntityConflict {
                entity: taken.name.clone(),
                plugin: plugin.clone(),
            });
        }
        for entity in entities {
            self.entities.insert(entity.name.clone(), plugin.clone());
        }
        Ok(())
    }

    fn mount_route_group(&mut self, plugin: &PluginId, group: &RouteGroup) -> HostResult<()> {
        let endpoints: Vec<(String, String)> = group
            .routes()
            .iter()
            .map(|route| (group.qualified_endpoint(route), group.full_path(route)))
            .collect();
        if let Some((taken, _)) = endpoints
            .iter()
            .find(|(endpoint, _)| self.routes.contains_key(endpoint))
        {
            return Err(HostError::RouteConflict {
                endpoint: taken.clone(),
                plugin: plugin.clone(),
            });
        }
        let index = self.groups.len();
        self.groups.push(group.clone());
        for (endpoint, path) in endpoints {
            self.routes.insert(
                endpoint,
                MountedRoute {
                    owner: Some(plugin.clone()),
                    path,
                    group: Some(index),
                },
            );
        }
        Ok(())
    }

    fn register_command(
        &mut self,
        plugin: &PluginId,
        command: &CommandDeclaration,
    ) -> HostResult<()> {
        if self.commands.contains_key(&command.name) {
            return Err(HostError::CommandConflict {
                command: command.name.clone(),
                plugin: plugin.clone(),
            });
        }
        self.commands
            .insert(command.name.clone(), (plugin.clone(), command.clone()));
        Ok(())
    }

    fn template_chain_mut(&mut self) -> &mut TemplateChain {
        &mut self.template_chain
    }

    fn has_help_entry(&self, key: &str) -> HostResult<bool> {
        if !self.help_store_available {
            return Err(Self::help_store_error());
        }
        Ok(self.help.contains_key(key))
    }

    fn insert_help_entry(&mut self, _plugin: &PluginId, entry: &HelpEntry) -> HostResult<()> {
        if !self.help_store_available {
            return Err(Self::help_store_error());
        }
        self.help.insert(entry.key.clone(), entry.clone());
        Ok(())
    }
}

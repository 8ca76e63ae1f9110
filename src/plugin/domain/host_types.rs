//! Declarations a plugin hands to the host application.
//!
//! These are the data half of the host integration seams: persisted entity
//! declarations, route groups with their guard chains, management commands,
//! and seeded help content. The host decides how to realise them.

use super::{ActorId, PluginDomainError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Permission that grants every other permission.
pub const ADMIN_WILDCARD_PERMISSION: &str = "*";

/// The user on whose behalf a request or lifecycle operation runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Actor {
    id: Option<ActorId>,
    permissions: BTreeSet<String>,
}

impl Actor {
    /// Creates an unauthenticated actor with no permissions.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Creates an authenticated actor with no permissions.
    #[must_use]
    pub fn authenticated(id: ActorId) -> Self {
        Self {
            id: Some(id),
            permissions: BTreeSet::new(),
        }
    }

    /// Creates an authenticated actor holding the wildcard admin permission.
    #[must_use]
    pub fn administrator(id: ActorId) -> Self {
        Self::authenticated(id).with_permission(ADMIN_WILDCARD_PERMISSION)
    }

    /// Grants an additional permission.
    #[must_use]
    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permissions.insert(permission.into());
        self
    }

    /// Returns the actor identifier when authenticated.
    #[must_use]
    pub const fn id(&self) -> Option<ActorId> {
        self.id
    }

    /// Returns whether the actor is logged in.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.id.is_some()
    }

    /// Returns whether the actor holds the wildcard admin permission.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.permissions.contains(ADMIN_WILDCARD_PERMISSION)
    }

    /// Returns whether the actor holds `permission`, directly or through the
    /// wildcard.
    #[must_use]
    pub fn has_permission(&self, permission: &str) -> bool {
        self.is_admin() || self.permissions.contains(permission)
    }
}

/// Reason a guard refused access to a route group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDenial {
    /// The actor is not logged in.
    NotAuthenticated,
    /// The actor lacks a required permission.
    MissingPermission(String),
    /// A custom guard rejected the actor.
    Rejected(String),
}

impl fmt::Display for GuardDenial {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAuthenticated => formatter.write_str("login required"),
            Self::MissingPermission(permission) => {
                write!(formatter, "missing permission '{permission}'")
            }
            Self::Rejected(guard) => write!(formatter, "rejected by guard '{guard}'"),
        }
    }
}

/// Predicate used by [`Guard::Custom`].
pub type GuardPredicate = Arc<dyn Fn(&Actor) -> bool + Send + Sync>;

/// A single access check applied to every route in a group.
#[derive(Clone)]
pub enum Guard {
    /// The actor must be logged in.
    LoginRequired,
    /// The actor must hold the named permission.
    Permission(String),
    /// Named host-specific predicate.
    Custom {
        /// Guard name reported on denial.
        name: String,
        /// Predicate returning `true` when access is allowed.
        check: GuardPredicate,
    },
}

impl Guard {
    /// Creates a permission guard.
    #[must_use]
    pub fn permission(permission: impl Into<String>) -> Self {
        Self::Permission(permission.into())
    }

    /// Creates a named custom guard.
    #[must_use]
    pub fn custom(
        name: impl Into<String>,
        check: impl Fn(&Actor) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self::Custom {
            name: name.into(),
            check: Arc::new(check),
        }
    }

    /// Evaluates the guard for `actor`.
    ///
    /// # Errors
    ///
    /// Returns the [`GuardDenial`] describing why access was refused.
    pub fn check(&self, actor: &Actor) -> Result<(), GuardDenial> {
        match self {
            Self::LoginRequired if !actor.is_authenticated() => Err(GuardDenial::NotAuthenticated),
            Self::Permission(permission) if !actor.has_permission(permission) => {
                Err(GuardDenial::MissingPermission(permission.clone()))
            }
            Self::Custom { name, check } if !check(actor) => {
                Err(GuardDenial::Rejected(name.clone()))
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Debug for Guard {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoginRequired => formatter.write_str("LoginRequired"),
            Self::Permission(permission) => {
                formatter.debug_tuple("Permission").field(permission).finish()
            }
            Self::Custom { name, .. } => formatter
                .debug_struct("Custom")
                .field("name", name)
                .finish_non_exhaustive(),
        }
    }
}

/// A single route inside a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteDeclaration {
    /// Endpoint name, unique within the group.
    pub endpoint: String,
    /// Path relative to the group prefix.
    pub path: String,
    /// Accepted HTTP methods.
    pub methods: Vec<String>,
}

/// A set of routes mounted together under one URL prefix.
///
/// Guards run in declaration order and the first denial wins.
#[derive(Debug, Clone)]
pub struct RouteGroup {
    name: String,
    url_prefix: String,
    routes: Vec<RouteDeclaration>,
    guards: Vec<Guard>,
}

impl RouteGroup {
    /// Creates an empty route group.
    ///
    /// # Errors
    ///
    /// Returns [`PluginDomainError`] when the name is empty or the prefix does
    /// not start with `/`.
    pub fn new(
        name: impl Into<String>,
        url_prefix: impl Into<String>,
    ) -> Result<Self, PluginDomainError> {
        let group_name = name.into().trim().to_owned();
        if group_name.is_empty() {
            return Err(PluginDomainError::EmptyDeclarationName { kind: "route group" });
        }
        let prefix = url_prefix.into();
        if !prefix.starts_with('/') {
            return Err(PluginDomainError::InvalidRoutePrefix(prefix));
        }
        Ok(Self {
            name: group_name,
            url_prefix: prefix.trim_end_matches('/').to_owned(),
            routes: Vec::new(),
            guards: Vec::new(),
        })
    }

    /// Adds a `GET` route.
    #[must_use]
    pub fn route(self, endpoint: impl Into<String>, path: impl Into<String>) -> Self {
        self.route_with_methods(endpoint, path, ["GET"])
    }

    /// Adds a route accepting the given methods.
    #[must_use]
    pub fn route_with_methods<'a>(
        mut self,
        endpoint: impl Into<String>,
        path: impl Into<String>,
        methods: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        self.routes.push(RouteDeclaration {
            endpoint: endpoint.into(),
            path: path.into(),
            methods: methods.into_iter().map(str::to_owned).collect(),
        });
        self
    }

    /// Appends a guard to the end of the guard chain.
    #[must_use]
    pub fn guard(mut self, guard: Guard) -> Self {
        self.guards.push(guard);
        self
    }

    /// Returns the group name, used as the endpoint namespace.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the URL prefix without a trailing slash.
    #[must_use]
    pub fn url_prefix(&self) -> &str {
        &self.url_prefix
    }

    /// Returns the declared routes.
    #[must_use]
    pub fn routes(&self) -> &[RouteDeclaration] {
        &self.routes
    }

    /// Returns the guard chain.
    #[must_use]
    pub fn guards(&self) -> &[Guard] {
        &self.guards
    }

    /// Returns the host-wide endpoint name `group.endpoint`.
    #[must_use]
    pub fn qualified_endpoint(&self, route: &RouteDeclaration) -> String {
        format!("{}.{}", self.name, route.endpoint)
    }

    /// Returns the full URL path of a route.
    #[must_use]
    pub fn full_path(&self, route: &RouteDeclaration) -> String {
        let relative = route.path.trim_start_matches('/');
        if relative.is_empty() {
            format!("{}/", self.url_prefix)
        } else {
            format!("{}/{relative}", self.url_prefix)
        }
    }

    /// Runs the guard chain for `actor`.
    ///
    /// # Errors
    ///
    /// Returns the first [`GuardDenial`] raised by the chain.
    pub fn authorize(&self, actor: &Actor) -> Result<(), GuardDenial> {
        self.guards.iter().try_for_each(|guard| guard.check(actor))
    }
}

/// A persisted entity a plugin needs the host to declare.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDeclaration {
    /// Entity name.
    pub name: String,
    /// Backing table name.
    pub table: String,
}

impl EntityDeclaration {
    /// Creates an entity declaration.
    #[must_use]
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
        }
    }
}

/// A management command exposed by a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandDeclaration {
    /// Command name.
    pub name: String,
    /// One-line description.
    pub description: String,
}

impl CommandDeclaration {
    /// Creates a command declaration.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// Help or documentation content seeded on first initialisation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelpEntry {
    /// Unique content key.
    pub key: String,
    /// Display title.
    pub title: String,
    /// Body text.
    pub body: String,
}

impl HelpEntry {
    /// Creates a help entry.
    #[must_use]
    pub fn new(key: impl Into<String>, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            title: title.into(),
            body: body.into(),
        }
    }
}

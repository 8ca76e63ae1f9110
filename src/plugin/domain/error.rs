//! Error types for plugin domain validation and parsing.

use thiserror::Error;

/// Errors returned while constructing plugin domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PluginDomainError {
    /// The plugin identifier is empty after trimming.
    #[error("plugin id must not be empty")]
    EmptyPluginId,

    /// The plugin identifier contains characters outside `[a-z0-9_-]`.
    #[error(
        "plugin id '{0}' contains invalid characters (only lowercase alphanumeric, '_' and '-' allowed)"
    )]
    InvalidPluginId(String),

    /// The plugin identifier exceeds the 100-character storage limit.
    #[error("plugin id exceeds 100 character limit: {0}")]
    PluginIdTooLong(String),

    /// A UI slot item label is empty after trimming.
    #[error("slot item label must not be empty")]
    EmptySlotLabel,

    /// A UI slot item target endpoint is empty after trimming.
    #[error("slot item target must not be empty")]
    EmptySlotTarget,

    /// A route group URL prefix does not start with `/`.
    #[error("route group prefix '{0}' must start with '/'")]
    InvalidRoutePrefix(String),

    /// A declaration name (entity, command, endpoint) is empty.
    #[error("{kind} name must not be empty")]
    EmptyDeclarationName {
        /// Kind of declaration being validated.
        kind: &'static str,
    },

    /// A plugin dependency list names the plugin itself.
    #[error("plugin {0} cannot depend on itself")]
    SelfDependency(String),
}

/// Error returned while parsing a slot name.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown UI slot: {0}")]
pub struct ParseSlotNameError(pub String);

/// Error returned while parsing a status flag from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid value for status flag '{key}': {value}")]
pub struct ParseStatusFlagError {
    /// Flag key.
    pub key: String,
    /// Stored value that failed to parse.
    pub value: String,
}

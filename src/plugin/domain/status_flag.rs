//! Generic key/value status flags and the two flags the lifecycle uses.

use super::{ParseStatusFlagError, PluginId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Flag recording that the process must restart to pick up activation changes.
pub const RESTART_REQUIRED_KEY: &str = "plugins.restart_required";

/// Flag holding the JSON list of plugins awaiting schema migration.
pub const PENDING_MIGRATIONS_KEY: &str = "plugins.pending_migrations";

/// One row of the status-flag table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusFlag {
    /// Unique flag key.
    pub key: String,
    /// Stored value.
    pub value: String,
    /// Last write timestamp.
    pub updated_at: DateTime<Utc>,
}

impl StatusFlag {
    /// Creates a flag row.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>, updated_at: DateTime<Utc>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            updated_at,
        }
    }

    /// Interprets the value as a boolean.
    ///
    /// # Errors
    ///
    /// Returns [`ParseStatusFlagError`] when the value is not `true` or
    /// `false`.
    pub fn as_bool(&self) -> Result<bool, ParseStatusFlagError> {
        match self.value.trim() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(self.parse_error()),
        }
    }

    /// Interprets the value as a pending-migrations list.
    ///
    /// # Errors
    ///
    /// Returns [`ParseStatusFlagError`] when the value is not a JSON array of
    /// plugin identifiers.
    pub fn as_pending_migrations(&self) -> Result<PendingMigrations, ParseStatusFlagError> {
        serde_json::from_str::<Vec<PluginId>>(&self.value)
            .map(PendingMigrations::from_ids)
            .map_err(|_| self.parse_error())
    }

    fn parse_error(&self) -> ParseStatusFlagError {
        ParseStatusFlagError {
            key: self.key.clone(),
            value: self.value.clone(),
        }
    }
}

/// Encodes a boolean flag value.
#[must_use]
pub const fn encode_bool(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

/// Ordered, duplicate-free list of plugins awaiting schema migration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingMigrations(Vec<PluginId>);

impl PendingMigrations {
    /// Builds a list, dropping repeated identifiers.
    #[must_use]
    pub fn from_ids(ids: impl IntoIterator<Item = PluginId>) -> Self {
        let mut pending = Self::default();
        for id in ids {
            pending.push(id);
        }
        pending
    }

    /// Appends `id` unless already present. Returns whether it was added.
    pub fn push(&mut self, id: PluginId) -> bool {
        if self.0.contains(&id) {
            return false;
        }
        self.0.push(id);
        true
    }

    /// Removes `id`. Returns whether it was present.
    pub fn remove(&mut self, id: &PluginId) -> bool {
        let before = self.0.len();
        self.0.retain(|pending| pending != id);
        self.0.len() != before
    }

    /// Returns whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the identifiers in insertion order.
    #[must_use]
    pub fn ids(&self) -> &[PluginId] {
        &self.0
    }

    /// Consumes the list.
    #[must_use]
    pub fn into_ids(self) -> Vec<PluginId> {
        self.0
    }

    /// Encodes the list as a JSON array.
    ///
    /// # Errors
    ///
    /// Returns a serialisation error; plugin identifiers are plain strings so
    /// this only fails on allocation failure inside `serde_json`.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.0)
    }
}

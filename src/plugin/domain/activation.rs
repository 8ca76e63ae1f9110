//! Persisted activation decision for one plugin.

use super::{ActorId, PluginId};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};

/// Host-wide record of whether a plugin's code should be loaded.
///
/// There is one record per plugin. Re-activation and deactivation update
/// the record in place; no history is kept beyond the latest timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationRecord {
    plugin_id: PluginId,
    is_active: bool,
    activated_at: Option<DateTime<Utc>>,
    activated_by: Option<ActorId>,
    deactivated_at: Option<DateTime<Utc>>,
}

/// Parameter object for reconstructing a persisted activation record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedActivationData {
    /// Plugin identifier.
    pub plugin_id: PluginId,
    /// Whether the plugin is currently active.
    pub is_active: bool,
    /// Last activation timestamp.
    pub activated_at: Option<DateTime<Utc>>,
    /// Actor who last activated the plugin.
    pub activated_by: Option<ActorId>,
    /// Last deactivation timestamp.
    pub deactivated_at: Option<DateTime<Utc>>,
}

impl ActivationRecord {
    /// Creates the first activation record for a plugin.
    #[must_use]
    pub fn activated(plugin_id: PluginId, actor: Option<ActorId>, clock: &impl Clock) -> Self {
        Self {
            plugin_id,
            is_active: true,
            activated_at: Some(clock.utc()),
            activated_by: actor,
            deactivated_at: None,
        }
    }

    /// Reconstructs a record from persistence.
    #[must_use]
    pub fn from_persisted(data: PersistedActivationData) -> Self {
        Self {
            plugin_id: data.plugin_id,
            is_active: data.is_active,
            activated_at: data.activated_at,
            activated_by: data.activated_by,
            deactivated_at: data.deactivated_at,
        }
    }

    /// Returns the plugin identifier.
    #[must_use]
    pub const fn plugin_id(&self) -> &PluginId {
        &self.plugin_id
    }

    /// Returns whether the plugin is active.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.is_active
    }

    /// Returns the last activation timestamp.
    #[must_use]
    pub const fn activated_at(&self) -> Option<DateTime<Utc>> {
        self.activated_at
    }

    /// Returns the actor who last activated the plugin.
    #[must_use]
    pub const fn activated_by(&self) -> Option<ActorId> {
        self.activated_by
    }

    /// Returns the last deactivation timestamp.
    #[must_use]
    pub const fn deactivated_at(&self) -> Option<DateTime<Utc>> {
        self.deactivated_at
    }

    /// Marks the plugin active again.
    ///
    /// The previous deactivation timestamp is kept so the record still shows
    /// when the plugin was last switched off.
    pub fn reactivate(&mut self, actor: Option<ActorId>, clock: &impl Clock) {
        self.is_active = true;
        self.activated_at = Some(clock.utc());
        self.activated_by = actor;
    }

    /// Marks the plugin inactive.
    pub fn deactivate(&mut self, clock: &impl Clock) {
        self.is_active = false;
        self.deactivated_at = Some(clock.utc());
    }
}

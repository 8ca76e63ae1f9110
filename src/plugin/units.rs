//! Build-time registration of plugin implementations.
//!
//! Catalog metadata names a unit and an entry point; [`PluginUnits`] maps that
//! pair to a factory compiled into the host binary. Loading stays late-bound
//! (which plugins load is decided by persisted activation state) without any
//! lookup by type name at runtime.

use crate::plugin::descriptor::{CapabilityDescriptor, PluginHookError};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Factory building a plugin's descriptor.
pub type PluginFactory =
    Arc<dyn Fn() -> Result<CapabilityDescriptor, PluginHookError> + Send + Sync>;

/// Errors raised while instantiating a plugin unit.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UnitLoadError {
    /// No unit with the given name was registered.
    #[error("plugin unit '{0}' is not available")]
    UnitMissing(String),

    /// The unit exists but does not export the entry point.
    #[error("plugin unit '{unit}' has no entry point '{entry_point}'")]
    EntryPointMissing {
        /// Unit name.
        unit: String,
        /// Requested entry point.
        entry_point: String,
    },

    /// The factory ran and failed.
    #[error("plugin unit '{unit}::{entry_point}' failed to instantiate: {source}")]
    Instantiation {
        /// Unit name.
        unit: String,
        /// Entry point.
        entry_point: String,
        /// Factory failure.
        source: PluginHookError,
    },
}

/// Registry of plugin factories keyed by unit and entry point.
#[derive(Clone, Default)]
pub struct PluginUnits {
    units: HashMap<String, HashMap<String, PluginFactory>>,
}

impl PluginUnits {
    /// Creates an empty unit registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory, replacing any previous one for the same pair.
    #[must_use]
    pub fn with_factory(
        mut self,
        unit: impl Into<String>,
        entry_point: impl Into<String>,
        factory: impl Fn() -> Result<CapabilityDescriptor, PluginHookError> + Send + Sync + 'static,
    ) -> Self {
        self.units
            .entry(unit.into())
            .or_default()
            .insert(entry_point.into(), Arc::new(factory));
        self
    }

    /// Returns whether `unit` has been registered.
    #[must_use]
    pub fn contains_unit(&self, unit: &str) -> bool {
        self.units.contains_key(unit)
    }

    /// Builds the descriptor exported by `unit::entry_point`.
    ///
    /// # Errors
    ///
    /// Returns [`UnitLoadError`] when the unit or entry point is missing, or
    /// when the factory fails.
    pub fn instantiate(
        &self,
        unit: &str,
        entry_point: &str,
    ) -> Result<CapabilityDescriptor, UnitLoadError> {
        let entry_points = self
            .units
            .get(unit)
            .ok_or_else(|| UnitLoadError::UnitMissing(unit.to_owned()))?;
        let factory =
            entry_points
                .get(entry_point)
                .ok_or_else(|| UnitLoadError::EntryPointMissing {
                    unit: unit.to_owned(),
                    entry_point: entry_point.to_owned(),
                })?;
        factory().map_err(|source| UnitLoadError::Instantiation {
            unit: unit.to_owned(),
            entry_point: entry_point.to_owned(),
            source,
        })
    }
}

impl fmt::Debug for PluginUnits {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self
            .units
            .iter()
            .flat_map(|(unit, entry_points)| {
                entry_points
                    .keys()
                    .map(move |entry_point| format!("{unit}::{entry_point}"))
            })
            .collect();
        names.sort();
        formatter
            .debug_struct("PluginUnits")
            .field("factories", &names)
            .finish()
    }
}

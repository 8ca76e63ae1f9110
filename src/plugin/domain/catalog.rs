//! Records exchanged with the remote plugin catalog.

use super::PluginId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Release phase advertised by the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReleasePhase {
    /// Generally available.
    #[default]
    Stable,
    /// Feature complete, still being hardened.
    Beta,
    /// Early preview.
    Alpha,
    /// No longer maintained.
    Deprecated,
}

impl ReleasePhase {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stable => "stable",
            Self::Beta => "beta",
            Self::Alpha => "alpha",
            Self::Deprecated => "deprecated",
        }
    }

    /// Parses a stored phase, treating unknown values as stable.
    #[must_use]
    pub fn parse_or_default(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "beta" => Self::Beta,
            "alpha" => Self::Alpha,
            "deprecated" => Self::Deprecated,
            _ => Self::Stable,
        }
    }
}

/// Catalog fields shown next to a plugin and mirrored in the local cache.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CatalogPresentation {
    /// Icon name or URL.
    #[serde(default)]
    pub icon: Option<String>,
    /// Catalog category slugs.
    #[serde(default)]
    pub categories: Vec<String>,
    /// Price in minor currency units; `0` for free plugins.
    #[serde(default)]
    pub price_cents: u64,
    /// Release phase.
    #[serde(default)]
    pub phase: ReleasePhase,
}

/// One plugin as described by the remote catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Plugin identifier.
    pub id: PluginId,
    /// Display name.
    pub name: String,
    /// Latest published version.
    pub version: String,
    /// Short description.
    #[serde(default)]
    pub description: String,
    /// Declared dependencies.
    #[serde(default)]
    pub dependencies: Vec<PluginId>,
    /// Name of the unit implementing the plugin.
    #[serde(default)]
    pub unit: Option<String>,
    /// Entry point inside the unit that builds the descriptor.
    #[serde(default)]
    pub entry_point: Option<String>,
    /// Fields mirrored in the local cache.
    #[serde(flatten)]
    pub presentation: CatalogPresentation,
    /// Whether the caller holds a licence for the plugin.
    #[serde(default)]
    pub licensed: bool,
    /// Whether the caller may download the archive.
    #[serde(default)]
    pub can_download: bool,
}

impl CatalogEntry {
    /// Creates a free, downloadable entry with no dependencies.
    #[must_use]
    pub fn new(id: PluginId, version: impl Into<String>) -> Self {
        Self {
            name: id.as_str().to_owned(),
            id,
            version: version.into(),
            description: String::new(),
            dependencies: Vec::new(),
            unit: None,
            entry_point: None,
            presentation: CatalogPresentation::default(),
            licensed: true,
            can_download: true,
        }
    }

    /// Sets the declared dependencies.
    #[must_use]
    pub fn with_dependencies(mut self, dependencies: impl IntoIterator<Item = PluginId>) -> Self {
        self.dependencies = dependencies.into_iter().collect();
        self
    }

    /// Sets the implementing unit and entry point.
    #[must_use]
    pub fn with_entry_point(mut self, unit: impl Into<String>, entry_point: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self.entry_point = Some(entry_point.into());
        self
    }

    /// Sets the presentation fields.
    #[must_use]
    pub fn with_presentation(mut self, presentation: CatalogPresentation) -> Self {
        self.presentation = presentation;
        self
    }

    /// Sets licensing and download permission.
    #[must_use]
    pub const fn with_licence(mut self, licensed: bool, can_download: bool) -> Self {
        self.licensed = licensed;
        self.can_download = can_download;
        self
    }
}

/// Locally cached subset of a catalog entry for an installed plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogCacheEntry {
    /// Plugin identifier.
    pub plugin_id: PluginId,
    /// Cached presentation fields.
    pub presentation: CatalogPresentation,
    /// When the entry was refreshed.
    pub cached_at: DateTime<Utc>,
}

/// Catalog category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogCategory {
    /// Category slug.
    pub slug: String,
    /// Display name.
    pub name: String,
}

/// Licence held by the calling installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenceRecord {
    /// Licensed plugin.
    pub plugin_id: PluginId,
    /// Expiry, `None` for perpetual licences.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Profile of the calling installation as known to the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogProfile {
    /// Account name.
    pub account: String,
    /// Whether the account receives the privileged listing.
    #[serde(default)]
    pub privileged: bool,
}

/// Archive bytes returned by a catalog download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginArchive {
    /// Raw gzip-compressed tar bytes.
    pub bytes: Vec<u8>,
    /// Hex SHA-256 digest advertised by the catalog, when provided.
    pub sha256: Option<String>,
}

impl PluginArchive {
    /// Wraps archive bytes without an advertised digest.
    #[must_use]
    pub const fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            sha256: None,
        }
    }

    /// Attaches an advertised digest.
    #[must_use]
    pub fn with_sha256(mut self, digest: impl Into<String>) -> Self {
        self.sha256 = Some(digest.into());
        self
    }
}

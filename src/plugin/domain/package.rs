//! Locally installed plugin packages and the metadata merged from them.

use super::{CatalogEntry, CatalogPresentation, PluginId};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Metadata read from a package's entry-marker file.
///
/// The marker doubles as a TOML manifest:
///
/// ```toml
/// id = "blog"
/// version = "1.4.0"
/// name = "Blog"
/// dependencies = ["media"]
/// unit = "blog"
/// entry_point = "descriptor"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageManifest {
    /// Plugin identifier.
    pub id: PluginId,
    /// Installed version.
    pub version: String,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Short description.
    #[serde(default)]
    pub description: String,
    /// Declared dependencies.
    #[serde(default)]
    pub dependencies: Vec<PluginId>,
    /// Implementing unit.
    #[serde(default)]
    pub unit: Option<String>,
    /// Entry point inside the unit.
    #[serde(default)]
    pub entry_point: Option<String>,
}

impl PackageManifest {
    /// Parses a manifest from TOML.
    ///
    /// # Errors
    ///
    /// Returns the TOML deserialisation error when the document is invalid.
    pub fn from_toml(source: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(source)
    }
}

/// A plugin package present on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledPackage {
    /// Plugin identifier, equal to the directory name.
    pub id: PluginId,
    /// Package directory.
    pub root: PathBuf,
    /// Whether the package ships with the host rather than being downloaded.
    pub bundled: bool,
    /// Parsed entry-marker manifest, when the marker is a valid manifest.
    pub manifest: Option<PackageManifest>,
}

/// Merged view of a plugin used for dependency resolution and loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginMetadata {
    /// Plugin identifier.
    pub id: PluginId,
    /// Display name.
    pub name: String,
    /// Version.
    pub version: String,
    /// Short description.
    pub description: String,
    /// Declared dependencies.
    pub dependencies: Vec<PluginId>,
    /// Implementing unit.
    pub unit: Option<String>,
    /// Entry point inside the unit.
    pub entry_point: Option<String>,
    /// Catalog presentation fields, live or cached.
    pub presentation: CatalogPresentation,
}

impl PluginMetadata {
    /// Builds metadata from a live catalog entry.
    #[must_use]
    pub fn from_catalog(entry: &CatalogEntry) -> Self {
        Self {
            id: entry.id.clone(),
            name: entry.name.clone(),
            version: entry.version.clone(),
            description: entry.description.clone(),
            dependencies: entry.dependencies.clone(),
            unit: entry.unit.clone(),
            entry_point: entry.entry_point.clone(),
            presentation: entry.presentation.clone(),
        }
    }

    /// Builds metadata from an installed package.
    ///
    /// Packages whose marker is not a valid manifest yield identity-only
    /// metadata with version `unknown`.
    #[must_use]
    pub fn from_package(package: &InstalledPackage, presentation: CatalogPresentation) -> Self {
        package.manifest.as_ref().map_or_else(
            || Self {
                id: package.id.clone(),
                name: package.id.as_str().to_owned(),
                version: String::from("unknown"),
                description: String::new(),
                dependencies: Vec::new(),
                unit: None,
                entry_point: None,
                presentation: presentation.clone(),
            },
            |manifest| Self {
                id: package.id.clone(),
                name: manifest
                    .name
                    .clone()
                    .unwrap_or_else(|| package.id.as_str().to_owned()),
                version: manifest.version.clone(),
                description: manifest.description.clone(),
                dependencies: manifest.dependencies.clone(),
                unit: manifest.unit.clone(),
                entry_point: manifest.entry_point.clone(),
                presentation: presentation.clone(),
            },
        )
    }
}

/// Installed and licensing state of one plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PackageStatus {
    /// Whether the package is present under the install root.
    pub installed: bool,
    /// Whether the catalog was reachable while computing the status.
    pub catalog_reachable: bool,
    /// Whether the catalog lists the plugin.
    pub in_catalog: bool,
    /// Whether the installation holds a licence.
    pub licensed: bool,
    /// Whether the archive may be downloaded.
    pub can_download: bool,
}

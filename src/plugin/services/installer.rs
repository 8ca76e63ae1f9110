//! Archive-based installation of plugin packages.
//!
//! A package is a directory named after the plugin id under the install root
//! holding the entry-marker manifest. Archives are gzip-compressed tarballs
//! whose members live under `<id>/`; they are fully decoded and validated in
//! memory before anything touches the install root.

use crate::config::PluginHostConfig;
use crate::plugin::{
    domain::{InstalledPackage, PackageManifest, PackageStatus, PluginArchive, PluginId},
    ports::{CatalogClient, CatalogError},
};
use cap_std::ambient_authority;
use cap_std::fs::Dir;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fmt;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by [`ArchiveInstaller`].
#[derive(Debug, Clone, Error)]
pub enum InstallerError {
    /// The package is present and the install was not forced.
    #[error("plugin {0} is already installed")]
    AlreadyInstalled(PluginId),

    /// The downloaded archive failed validation. Nothing was written.
    #[error("invalid archive for plugin {plugin}: {reason}")]
    InvalidArchive {
        /// Plugin being installed.
        plugin: PluginId,
        /// Validation failure.
        reason: String,
    },

    /// Fetching the archive or catalog status failed.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Unexpected filesystem failure.
    #[error("plugin installer filesystem failure at {target}: {source}")]
    Filesystem {
        /// Path or plugin being handled.
        target: String,
        /// Underlying failure.
        source: Arc<dyn std::error::Error + Send + Sync>,
    },
}

impl InstallerError {
    /// Wraps an unexpected filesystem or worker failure.
    pub fn filesystem(
        target: impl fmt::Display,
        err: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Filesystem {
            target: target.to_string(),
            source: Arc::new(err),
        }
    }

    fn invalid_archive(plugin: &PluginId, reason: impl Into<String>) -> Self {
        Self::InvalidArchive {
            plugin: plugin.clone(),
            reason: reason.into(),
        }
    }
}

/// Result type for installer operations.
pub type InstallerResult<T> = Result<T, InstallerError>;

/// Installs, lists, and removes plugin packages.
#[derive(Clone)]
pub struct ArchiveInstaller<C>
where
    C: CatalogClient,
{
    catalog: Arc<C>,
    install_root: PathBuf,
    bundled_roots: Vec<PathBuf>,
    entry_marker: String,
}

impl<C> ArchiveInstaller<C>
where
    C: CatalogClient,
{
    /// Creates an installer writing under `install_root` with the default
    /// entry marker and no bundled packages.
    #[must_use]
    pub fn new(catalog: Arc<C>, install_root: impl Into<PathBuf>) -> Self {
        Self {
            catalog,
            install_root: install_root.into(),
            bundled_roots: Vec::new(),
            entry_marker: String::from(crate::config::DEFAULT_ENTRY_MARKER),
        }
    }

    /// Creates an installer from host configuration.
    #[must_use]
    pub fn from_config(catalog: Arc<C>, config: &PluginHostConfig) -> Self {
        Self {
            catalog,
            install_root: config.install_root.clone(),
            bundled_roots: config.bundled_roots.clone(),
            entry_marker: config.entry_marker.clone(),
        }
    }

    /// Adds a read-only directory of packages shipped with the host.
    #[must_use]
    pub fn with_bundled_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.bundled_roots.push(root.into());
        self
    }

    /// Overrides the entry-marker file name.
    #[must_use]
    pub fn with_entry_marker(mut self, marker: impl Into<String>) -> Self {
        self.entry_marker = marker.into();
        self
    }

    /// Returns the install root.
    #[must_use]
    pub fn install_root(&self) -> &Path {
        &self.install_root
    }

    /// Returns the entry-marker file name.
    #[must_use]
    pub fn entry_marker(&self) -> &str {
        &self.entry_marker
    }

    /// Returns where the package for `plugin_id` lives under the install
    /// root.
    #[must_use]
    pub fn package_path(&self, plugin_id: &PluginId) -> PathBuf {
        self.install_root.join(plugin_id.as_str())
    }

    /// Returns whether the install root holds a package for `plugin_id`.
    #[must_use]
    pub fn is_installed(&self, plugin_id: &PluginId) -> bool {
        has_marker(&self.install_root, plugin_id, &self.entry_marker)
    }

    /// Lists packages under the install root, sorted by id.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::Filesystem`] when the install root exists
    /// but cannot be scanned.
    pub fn list_installed(&self) -> InstallerResult<Vec<PluginId>> {
        scan_root(&self.install_root, &self.entry_marker)
    }

    /// Finds a package in the install root, then in the bundled roots.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::Filesystem`] when the manifest exists but
    /// cannot be read.
    pub fn find_package(&self, plugin_id: &PluginId) -> InstallerResult<Option<InstalledPackage>> {
        self.package_roots().find(plugin_id)
    }

    /// Returns every package from the install root and the bundled roots,
    /// sorted by id. The install root shadows bundled copies.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::Filesystem`] when a root cannot be scanned
    /// or a manifest cannot be read.
    pub fn installed_packages(&self) -> InstallerResult<Vec<InstalledPackage>> {
        self.package_roots().scan()
    }

    /// [`Self::find_package`] run on the blocking thread pool.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::Filesystem`] when the manifest cannot be
    /// read or the blocking task fails.
    pub async fn locate_package(
        &self,
        plugin_id: &PluginId,
    ) -> InstallerResult<Option<InstalledPackage>> {
        let roots = self.package_roots();
        let owned_id = plugin_id.clone();
        tokio::task::spawn_blocking(move || roots.find(&owned_id))
            .await
            .map_err(|err| InstallerError::filesystem(plugin_id, err))?
    }

    /// [`Self::installed_packages`] run on the blocking thread pool.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::Filesystem`] when a root cannot be scanned,
    /// a manifest cannot be read, or the blocking task fails.
    pub async fn scan_packages(&self) -> InstallerResult<Vec<InstalledPackage>> {
        let roots = self.package_roots();
        tokio::task::spawn_blocking(move || roots.scan())
            .await
            .map_err(|err| InstallerError::filesystem(self.install_root.display(), err))?
    }

    /// Downloads and extracts the plugin's archive.
    ///
    /// Any directory already at the target (a forced reinstall, or residue of
    /// an interrupted extraction) is removed before extraction. Extraction is
    /// not atomic.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::AlreadyInstalled`] when the package exists
    /// and `force` is false, [`InstallerError::Catalog`] when the download
    /// fails, [`InstallerError::InvalidArchive`] when validation fails (before
    /// any write), or [`InstallerError::Filesystem`] on write failures.
    pub async fn install(&self, plugin_id: &PluginId, force: bool) -> InstallerResult<PathBuf> {
        if !force && self.is_installed(plugin_id) {
            return Err(InstallerError::AlreadyInstalled(plugin_id.clone()));
        }
        let archive = self.catalog.download_archive(plugin_id).await?;

        let install_root = self.install_root.clone();
        let marker = self.entry_marker.clone();
        let owned_id = plugin_id.clone();
        let target = tokio::task::spawn_blocking(move || {
            let members = decode_archive(&owned_id, &archive, &marker)?;
            write_package(&install_root, &owned_id, &members)
        })
        .await
        .map_err(|err| InstallerError::filesystem(plugin_id, err))??;

        tracing::info!(%plugin_id, force, path = %target.display(), "installed plugin package");
        Ok(target)
    }

    /// Removes the package directory. Returns `false` when nothing was
    /// installed.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::Filesystem`] when removal fails.
    pub async fn uninstall(&self, plugin_id: &PluginId) -> InstallerResult<bool> {
        let install_root = self.install_root.clone();
        let owned_id = plugin_id.clone();
        let removed = tokio::task::spawn_blocking(move || remove_package(&install_root, &owned_id))
            .await
            .map_err(|err| InstallerError::filesystem(plugin_id, err))??;
        if removed {
            tracing::info!(%plugin_id, "uninstalled plugin package");
        }
        Ok(removed)
    }

    /// Combines the local installed flag with catalog licensing.
    ///
    /// # Errors
    ///
    /// Returns [`InstallerError::Catalog`] for catalog failures other than
    /// being unreachable, or [`InstallerError::Filesystem`] when the local
    /// manifest cannot be read.
    pub async fn status(&self, plugin_id: &PluginId) -> InstallerResult<PackageStatus> {
        let installed = self.locate_package(plugin_id).await?.is_some();
        match self.catalog.get_plugin(plugin_id).await {
            Ok(entry) => Ok(PackageStatus {
                installed,
                catalog_reachable: true,
                in_catalog: entry.is_some(),
                licensed: entry.as_ref().is_some_and(|listed| listed.licensed),
                can_download: entry.as_ref().is_some_and(|listed| listed.can_download),
            }),
            Err(err) if err.is_unreachable() => Ok(PackageStatus {
                installed,
                ..PackageStatus::default()
            }),
            Err(err) => Err(err.into()),
        }
    }

    fn package_roots(&self) -> PackageRoots {
        PackageRoots {
            install_root: self.install_root.clone(),
            bundled_roots: self.bundled_roots.clone(),
            entry_marker: self.entry_marker.clone(),
        }
    }
}

/// Owned package search roots, movable onto a blocking task.
#[derive(Debug, Clone)]
struct PackageRoots {
    install_root: PathBuf,
    bundled_roots: Vec<PathBuf>,
    entry_marker: String,
}

impl PackageRoots {
    fn ordered(&self) -> impl Iterator<Item = (&PathBuf, bool)> {
        std::iter::once((&self.install_root, false))
            .chain(self.bundled_roots.iter().map(|root| (root, true)))
    }

    fn find(&self, plugin_id: &PluginId) -> InstallerResult<Option<InstalledPackage>> {
        for (root, bundled) in self.ordered() {
            if has_marker(root, plugin_id, &self.entry_marker) {
                return self.load(root, plugin_id, bundled).map(Some);
            }
        }
        Ok(None)
    }

    fn scan(&self) -> InstallerResult<Vec<InstalledPackage>> {
        let mut packages = BTreeMap::new();
        for (root, bundled) in self.ordered() {
            for plugin_id in scan_root(root, &self.entry_marker)? {
                if packages.contains_key(&plugin_id) {
                    continue;
                }
                let package = self.load(root, &plugin_id, bundled)?;
                packages.insert(plugin_id, package);
            }
        }
        Ok(packages.into_values().collect())
    }

    fn load(
        &self,
        root: &Path,
        plugin_id: &PluginId,
        bundled: bool,
    ) -> InstallerResult<InstalledPackage> {
        let package_root = root.join(plugin_id.as_str());
        let source = open_dir(&package_root)
            .and_then(|dir| dir.read_to_string(&self.entry_marker))
            .map_err(|err| InstallerError::filesystem(package_root.display(), err))?;
        let manifest = match PackageManifest::from_toml(&source) {
            Ok(parsed) if &parsed.id == plugin_id => Some(parsed),
            Ok(parsed) => {
                tracing::warn!(
                    %plugin_id,
                    manifest_id = %parsed.id,
                    "package manifest names a different plugin; ignoring it"
                );
                None
            }
            Err(err) => {
                tracing::warn!(%plugin_id, error = %err, "unreadable package manifest; ignoring it");
                None
            }
        };
        Ok(InstalledPackage {
            id: plugin_id.clone(),
            root: package_root,
            bundled,
            manifest,
        })
    }
}

/// Archive member retained for extraction, relative to the package root.
#[derive(Debug)]
enum Member {
    Directory(PathBuf),
    File(PathBuf, Vec<u8>),
}

fn open_dir(path: &Path) -> io::Result<Dir> {
    Dir::open_ambient_dir(path, ambient_authority())
}

fn has_marker(root: &Path, plugin_id: &PluginId, marker: &str) -> bool {
    open_dir(root)
        .and_then(|dir| dir.metadata(Path::new(plugin_id.as_str()).join(marker)))
        .is_ok_and(|metadata| metadata.is_file())
}

fn scan_root(root: &Path, marker: &str) -> InstallerResult<Vec<PluginId>> {
    let dir = match open_dir(root) {
        Ok(dir) => dir,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(InstallerError::filesystem(root.display(), err)),
    };
    let entries = dir
        .entries()
        .map_err(|err| InstallerError::filesystem(root.display(), err))?;
    let mut found = Vec::new();
    for dir_entry in entries {
        let file_name = dir_entry
            .map_err(|err| InstallerError::filesystem(root.display(), err))?
            .file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        let Ok(plugin_id) = PluginId::new(name) else {
            continue;
        };
        if plugin_id.as_str() == name && has_marker(root, &plugin_id, marker) {
            found.push(plugin_id);
        }
    }
    found.sort();
    Ok(found)
}

fn verify_digest(plugin_id: &PluginId, archive: &PluginArchive) -> InstallerResult<()> {
    let Some(expected) = archive.sha256.as_deref() else {
        return Ok(());
    };
    let actual = Sha256::digest(&archive.bytes)
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect::<String>();
    if actual.eq_ignore_ascii_case(expected.trim()) {
        Ok(())
    } else {
        Err(InstallerError::invalid_archive(
            plugin_id,
            format!("sha256 mismatch (expected {expected}, got {actual})"),
        ))
    }
}

/// Decodes and validates the archive without touching the filesystem.
fn decode_archive(
    plugin_id: &PluginId,
    archive: &PluginArchive,
    marker: &str,
) -> InstallerResult<Vec<Member>> {
    if archive.bytes.is_empty() {
        return Err(InstallerError::invalid_archive(plugin_id, "archive is empty"));
    }
    verify_digest(plugin_id, archive)?;

    let corrupt = |err: io::Error| InstallerError::invalid_archive(plugin_id, err.to_string());
    let mut reader = tar::Archive::new(flate2::read::GzDecoder::new(archive.bytes.as_slice()));
    let mut members = Vec::new();
    let mut has_entry_marker = false;

    for raw_entry in reader.entries().map_err(corrupt)? {
        let mut entry = raw_entry.map_err(corrupt)?;
        let entry_type = entry.header().entry_type();
        if entry_type.is_symlink() || entry_type.is_hard_link() {
            tracing::warn!(%plugin_id, "skipping symlink/hardlink archive entry");
            continue;
        }
        let path = entry.path().map_err(corrupt)?.into_owned();
        let Some(relative) = strip_package_prefix(plugin_id, &path)? else {
            continue;
        };
        if entry_type.is_dir() {
            members.push(Member::Directory(relative));
        } else if entry_type.is_file() {
            let mut contents = Vec::new();
            entry.read_to_end(&mut contents).map_err(corrupt)?;
            has_entry_marker |= relative.as_path() == Path::new(marker);
            members.push(Member::File(relative, contents));
        }
    }

    if has_entry_marker {
        Ok(members)
    } else {
        Err(InstallerError::invalid_archive(
            plugin_id,
            format!("archive has no '{plugin_id}/{marker}' entry"),
        ))
    }
}

/// Returns the member path below `<id>/`, `None` for members outside that
/// prefix or naming the prefix itself.
fn strip_package_prefix(plugin_id: &PluginId, path: &Path) -> InstallerResult<Option<PathBuf>> {
    let unsafe_component = path.components().any(|component| {
        matches!(
            component,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    });
    if unsafe_component {
        return Err(InstallerError::invalid_archive(
            plugin_id,
            format!("archive contains unsafe path: {}", path.display()),
        ));
    }

    let mut components = path
        .components()
        .filter(|component| !matches!(component, Component::CurDir));
    let in_package = components
        .next()
        .is_some_and(|first| first.as_os_str() == OsStr::new(plugin_id.as_str()));
    if !in_package {
        tracing::debug!(%plugin_id, path = %path.display(), "ignoring archive member outside package");
        return Ok(None);
    }
    let relative: PathBuf = components.collect();
    Ok((!relative.as_os_str().is_empty()).then_some(relative))
}

fn write_package(
    install_root: &Path,
    plugin_id: &PluginId,
    members: &[Member],
) -> InstallerResult<PathBuf> {
    let target = install_root.join(plugin_id.as_str());
    let fs_error = |err: io::Error| InstallerError::filesystem(target.display(), err);

    std::fs::create_dir_all(install_root).map_err(fs_error)?;
    let root = open_dir(install_root).map_err(fs_error)?;
    match root.remove_dir_all(plugin_id.as_str()) {
        Ok(()) => tracing::debug!(%plugin_id, "removed existing package directory"),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(fs_error(err)),
    }
    root.create_dir(plugin_id.as_str()).map_err(fs_error)?;
    let package = root.open_dir(plugin_id.as_str()).map_err(fs_error)?;

    for member in members {
        match member {
            Member::Directory(relative) => package.create_dir_all(relative).map_err(fs_error)?,
            Member::File(relative, contents) => {
                if let Some(parent) = relative.parent().filter(|parent| !parent.as_os_str().is_empty()) {
                    package.create_dir_all(parent).map_err(fs_error)?;
                }
                package.write(relative, contents).map_err(fs_error)?;
            }
        }
    }
    Ok(target)
}

fn remove_package(install_root: &Path, plugin_id: &PluginId) -> InstallerResult<bool> {
    let fs_error =
        |err: io::Error| InstallerError::filesystem(install_root.join(plugin_id.as_str()).display(), err);
    let root = match open_dir(install_root) {
        Ok(root) => root,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(fs_error(err)),
    };
    match root.remove_dir_all(plugin_id.as_str()) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(fs_error(err)),
    }
}

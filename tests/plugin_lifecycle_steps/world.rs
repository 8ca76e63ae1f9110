//! Shared world state for plugin lifecycle BDD scenarios.

use std::fs;
use std::sync::Arc;

use flate2::Compression;
use flate2::write::GzEncoder;
use mockable::DefaultClock;
use pilotis::plugin::{
    adapters::memory::{InMemoryCatalog, InMemoryPluginStore},
    domain::{PluginArchive, PluginId},
    services::{ArchiveInstaller, Discovery, LifecycleError, LifecycleManager},
    units::PluginUnits,
};
use rstest::fixture;
use tempfile::TempDir;

/// Lifecycle manager type used by the BDD world.
pub type TestManager = LifecycleManager<InMemoryPluginStore, InMemoryCatalog, DefaultClock>;

/// Scenario world for plugin lifecycle behaviour tests.
pub struct LifecycleWorld {
    pub root: TempDir,
    pub catalog: Arc<InMemoryCatalog>,
    pub manager: TestManager,
    pub last_activation: Option<Result<Vec<PluginId>, LifecycleError>>,
    pub last_discovery: Option<Discovery>,
}

impl LifecycleWorld {
    /// Creates a world with an empty catalog and install root.
    ///
    /// # Panics
    ///
    /// Panics when the temporary install root cannot be created.
    #[must_use]
    pub fn new() -> Self {
        let root = TempDir::new().expect("create temporary install root");
        let catalog = Arc::new(InMemoryCatalog::new());
        let manager = LifecycleManager::new(
            Arc::new(InMemoryPluginStore::new()),
            Arc::clone(&catalog),
            Arc::new(DefaultClock),
            ArchiveInstaller::new(Arc::clone(&catalog), root.path()),
            PluginUnits::new(),
        );
        Self {
            root,
            catalog,
            manager,
            last_activation: None,
            last_discovery: None,
        }
    }
}

impl Default for LifecycleWorld {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> LifecycleWorld {
    LifecycleWorld::default()
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}

/// Parses a plugin id from scenario text.
///
/// # Errors
///
/// Returns an error when the text is not a valid plugin id.
pub fn plugin_id(value: &str) -> Result<PluginId, eyre::Report> {
    PluginId::new(value).map_err(|err| eyre::eyre!("invalid plugin id '{value}': {err}"))
}

/// Parses a comma-separated list of plugin ids.
///
/// # Errors
///
/// Returns an error when any entry is not a valid plugin id.
pub fn plugin_ids(list: &str) -> Result<Vec<PluginId>, eyre::Report> {
    list.split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(plugin_id)
        .collect()
}

/// Renders the manifest for a scenario package.
pub fn manifest(plugin: &PluginId, dependencies: &[PluginId]) -> String {
    let deps = dependencies
        .iter()
        .map(|dep| format!("\"{dep}\""))
        .collect::<Vec<_>>()
        .join(", ");
    format!("id = \"{plugin}\"\nversion = \"1.0.0\"\ndependencies = [{deps}]\n")
}

/// Writes an unpacked package into the world's install root.
///
/// # Errors
///
/// Returns an error when the package cannot be written.
pub fn write_package(
    world: &LifecycleWorld,
    plugin: &PluginId,
    dependencies: &[PluginId],
) -> Result<(), eyre::Report> {
    let dir = world.root.path().join(plugin.as_str());
    fs::create_dir_all(&dir)?;
    fs::write(dir.join("plugin.toml"), manifest(plugin, dependencies))?;
    Ok(())
}

/// Builds a gzip tarball holding a single-manifest package.
///
/// # Errors
///
/// Returns an error when the archive cannot be assembled.
pub fn package_archive(
    plugin: &PluginId,
    dependencies: &[PluginId],
) -> Result<PluginArchive, eyre::Report> {
    let contents = manifest(plugin, dependencies);
    let mut header = tar::Header::new_gnu();
    header.set_size(u64::try_from(contents.len())?);
    header.set_mode(0o644);
    header.set_cksum();
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    builder.append_data(
        &mut header,
        format!("{plugin}/plugin.toml"),
        contents.as_bytes(),
    )?;
    let bytes = builder.into_inner()?.finish()?;
    Ok(PluginArchive::new(bytes))
}

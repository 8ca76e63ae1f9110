//! Shared fixtures for in-memory plugin lifecycle integration tests.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use flate2::Compression;
use flate2::write::GzEncoder;
use mockable::DefaultClock;
use pilotis::plugin::{
    adapters::memory::{InMemoryCatalog, InMemoryPluginStore},
    descriptor::{CapabilityDescriptor, PluginHookError},
    domain::{CatalogEntry, PluginArchive, PluginId},
    services::{ArchiveInstaller, LifecycleManager},
    units::PluginUnits,
};
use rstest::fixture;
use tempfile::TempDir;

/// Lifecycle manager over in-memory adapters.
pub type TestManager = LifecycleManager<InMemoryPluginStore, InMemoryCatalog, DefaultClock>;

/// Unit name every test plugin is registered under.
pub const DEMO_UNIT: &str = "demo";

/// Parses a plugin id, panicking on invalid test input.
pub fn id(value: &str) -> PluginId {
    PluginId::new(value).expect("valid plugin id")
}

/// Parses a list of plugin ids.
pub fn ids(values: &[&str]) -> Vec<PluginId> {
    values.iter().map(|value| id(value)).collect()
}

/// Builds a licensed, downloadable catalog entry.
pub fn entry(plugin: &str, dependencies: &[&str]) -> CatalogEntry {
    CatalogEntry::new(id(plugin), "1.0.0")
        .with_dependencies(ids(dependencies))
        .with_entry_point(DEMO_UNIT, plugin)
        .with_licence(true, true)
}

/// Renders a package manifest.
pub fn manifest(plugin: &str, dependencies: &[&str]) -> String {
    let deps = dependencies
        .iter()
        .map(|dep| format!("\"{dep}\""))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "id = \"{plugin}\"\nversion = \"1.0.0\"\ndependencies = [{deps}]\n\
         unit = \"{DEMO_UNIT}\"\nentry_point = \"{plugin}\"\n"
    )
}

/// Writes an unpacked package under `root`.
pub fn write_package(root: &Path, plugin: &str, dependencies: &[&str]) {
    let dir = root.join(plugin);
    fs::create_dir_all(&dir).expect("create package dir");
    fs::write(dir.join("plugin.toml"), manifest(plugin, dependencies)).expect("write manifest");
}

/// Builds a gzip tarball holding the given members.
pub fn tarball(members: &[(&str, &str)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (path, contents) in members {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, path, contents.as_bytes())
            .expect("append member");
    }
    builder
        .into_inner()
        .expect("finish tar")
        .finish()
        .expect("finish gzip")
}

/// Builds a well-formed package archive for `plugin`.
pub fn package_archive(plugin: &str, dependencies: &[&str]) -> PluginArchive {
    let marker = format!("{plugin}/plugin.toml");
    let template = format!("{plugin}/templates/{plugin}/index.html");
    PluginArchive::new(tarball(&[
        (marker.as_str(), manifest(plugin, dependencies).as_str()),
        (template.as_str(), "<h1>hello</h1>"),
    ]))
}

/// Registers a factory per plugin that builds a bare descriptor with the
/// given dependencies.
pub fn units(plugins: &[(&str, &[&str])]) -> PluginUnits {
    plugins.iter().fold(PluginUnits::new(), |registered, (plugin, dependencies)| {
        let plugin_id = id(plugin);
        let deps = ids(dependencies);
        registered.with_factory(DEMO_UNIT, *plugin, move || {
            deps.iter()
                .cloned()
                .fold(
                    CapabilityDescriptor::builder(plugin_id.clone(), "1.0.0"),
                    |builder, dep| builder.dependency(dep),
                )
                .build()
                .map_err(|err| PluginHookError::new(err.to_string()))
        })
    })
}

/// Plugins used across lifecycle tests: `media`, `blog` needing `media`,
/// and `shop` needing both.
pub const CHAIN: [(&str, &[&str]); 3] = [
    ("media", &[]),
    ("blog", &["media"]),
    ("shop", &["media", "blog"]),
];

/// In-memory lifecycle stack over a temporary install root.
pub struct Harness {
    /// Install root, removed on drop.
    pub root: TempDir,
    /// Bundled package root, empty unless a test writes to it.
    pub bundled: TempDir,
    /// Plugin store.
    pub store: Arc<InMemoryPluginStore>,
    /// Catalog.
    pub catalog: Arc<InMemoryCatalog>,
    /// Lifecycle manager under test.
    pub manager: TestManager,
}

impl Harness {
    /// Creates a harness over `catalog` with the given plugin units.
    pub fn new(catalog: InMemoryCatalog, units: PluginUnits) -> Self {
        let root = TempDir::new().expect("temp dir");
        let bundled = TempDir::new().expect("bundled dir");
        let shared = Arc::new(catalog);
        let store = Arc::new(InMemoryPluginStore::new());
        let installer = ArchiveInstaller::new(Arc::clone(&shared), root.path())
            .with_bundled_root(bundled.path());
        let manager = LifecycleManager::new(
            Arc::clone(&store),
            Arc::clone(&shared),
            Arc::new(DefaultClock),
            installer,
            units,
        );
        Self {
            root,
            bundled,
            store,
            catalog: shared,
            manager,
        }
    }

    /// Creates a harness whose catalog lists `plugins` with archives.
    pub fn listing(plugins: &[(&str, &[&str])]) -> Self {
        let catalog = plugins.iter().fold(InMemoryCatalog::new(), |listed, (plugin, deps)| {
            listed
                .with_entry(entry(plugin, deps))
                .with_archive(id(plugin), package_archive(plugin, deps))
        });
        Self::new(catalog, units(plugins))
    }

    /// Writes packages for `plugins` straight into the install root.
    pub fn with_installed(self, plugins: &[(&str, &[&str])]) -> Self {
        for (plugin, deps) in plugins {
            write_package(self.root.path(), plugin, deps);
        }
        self
    }
}

/// Harness listing and installing the [`CHAIN`] plugins.
#[fixture]
pub fn chain() -> Harness {
    Harness::listing(&CHAIN).with_installed(&CHAIN)
}

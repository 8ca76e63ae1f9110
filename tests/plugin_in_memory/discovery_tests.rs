//! Merging installed packages with the catalog, online and offline.

use std::sync::Arc;

use super::helpers::{Harness, entry, id, units, write_package};
use mockable::DefaultClock;
use pilotis::plugin::{
    adapters::memory::{InMemoryCatalog, InMemoryPluginStore},
    domain::{CatalogPresentation, ReleasePhase},
    ports::CatalogCacheRepository,
    services::{ArchiveInstaller, LifecycleManager},
};
use rstest::rstest;
use tempfile::TempDir;

fn presentation(icon: &str) -> CatalogPresentation {
    CatalogPresentation {
        icon: Some(icon.to_owned()),
        categories: vec![String::from("content")],
        price_cents: 1900,
        phase: ReleasePhase::default(),
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn offline_discovery_matches_last_online_view() -> Result<(), eyre::Report> {
    let catalog = InMemoryCatalog::new()
        .with_entry(entry("media", &[]).with_presentation(presentation("camera")))
        .with_entry(entry("gallery", &["media"]));
    let harness = Harness::new(catalog, units(&[("media", &[])])).with_installed(&[("media", &[])]);

    let online = harness.manager.discover().await?;
    harness.catalog.set_reachable(false);
    let offline = harness.manager.discover().await?;

    eyre::ensure!(online.catalog_reachable && !offline.catalog_reachable, "reachability");
    eyre::ensure!(
        online.plugin(&id("gallery")).is_some(),
        "catalog-only plugin should be listed online"
    );
    eyre::ensure!(
        offline.plugin(&id("gallery")).is_none(),
        "catalog-only plugin should be hidden offline"
    );
    eyre::ensure!(
        online.plugin(&id("media")) == offline.plugin(&id("media")),
        "installed plugin changed offline: {:?} vs {:?}",
        online.plugin(&id("media")),
        offline.plugin(&id("media"))
    );
    let media = offline
        .plugin(&id("media"))
        .ok_or_else(|| eyre::eyre!("media missing offline"))?;
    eyre::ensure!(
        media.metadata.presentation.icon.as_deref() == Some("camera"),
        "cached icon not used"
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn refresh_only_caches_installed_plugins() -> Result<(), eyre::Report> {
    let catalog = InMemoryCatalog::new()
        .with_entry(entry("media", &[]))
        .with_entry(entry("gallery", &[]));
    let harness = Harness::new(catalog, units(&[])).with_installed(&[("media", &[])]);

    harness.manager.discover().await?;

    eyre::ensure!(
        harness.store.find_cache_entry(&id("media")).await?.is_some(),
        "installed plugin should be cached"
    );
    eyre::ensure!(
        harness.store.find_cache_entry(&id("gallery")).await?.is_none(),
        "catalog-only plugin should not be cached"
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn installable_requires_licence_and_download_rights() -> Result<(), eyre::Report> {
    let catalog = InMemoryCatalog::new()
        .with_entry(entry("free", &[]))
        .with_entry(entry("unlicensed", &[]).with_licence(false, true))
        .with_entry(entry("locked", &[]).with_licence(true, false));
    let harness = Harness::new(catalog, units(&[]));

    let discovery = harness.manager.discover().await?;

    let installable: Vec<&str> = discovery
        .plugins
        .iter()
        .filter(|plugin| plugin.installable)
        .map(|plugin| plugin.metadata.id.as_str())
        .collect();
    eyre::ensure!(installable == vec!["free"], "installable {installable:?}");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn bundled_packages_are_discovered_and_shadowed() -> Result<(), eyre::Report> {
    let installed = TempDir::new()?;
    let bundled = TempDir::new()?;
    write_package(bundled.path(), "core-pages", &[]);
    write_package(bundled.path(), "media", &[]);
    write_package(installed.path(), "media", &[]);
    let catalog = Arc::new(InMemoryCatalog::new());
    let installer = ArchiveInstaller::new(Arc::clone(&catalog), installed.path())
        .with_bundled_root(bundled.path());
    let manager = LifecycleManager::new(
        Arc::new(InMemoryPluginStore::new()),
        catalog,
        Arc::new(DefaultClock),
        installer,
        units(&[]),
    );

    let discovery = manager.discover().await?;

    let core = discovery
        .plugin(&id("core-pages"))
        .ok_or_else(|| eyre::eyre!("bundled plugin missing"))?;
    eyre::ensure!(core.installed && core.bundled, "bundled flags {core:?}");
    let media = discovery
        .plugin(&id("media"))
        .ok_or_else(|| eyre::eyre!("installed plugin missing"))?;
    eyre::ensure!(!media.bundled, "install root should shadow bundled copy");
    eyre::ensure!(
        !manager.installer().is_installed(&id("core-pages")),
        "bundled packages are not in the install root"
    );
    Ok(())
}

//! Archive install, uninstall, and status through the lifecycle manager.

use super::helpers::{CHAIN, Harness, chain, id, tarball, write_package};
use pilotis::plugin::{
    adapters::memory::InMemoryCatalog,
    domain::{CatalogEntry, PluginArchive},
    ports::{ActivationRepository, CatalogCacheRepository},
    services::{InstallerError, LifecycleError},
    units::PluginUnits,
};
use rstest::rstest;
use std::fs;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn install_extracts_package_and_caches_presentation() -> Result<(), eyre::Report> {
    let harness = Harness::listing(&CHAIN);

    let target = harness.manager.install(&id("media"), false).await?;

    eyre::ensure!(target.join("plugin.toml").is_file(), "marker missing");
    eyre::ensure!(
        target.join("templates/media/index.html").is_file(),
        "template missing"
    );
    eyre::ensure!(
        harness.store.find_cache_entry(&id("media")).await?.is_some(),
        "presentation should be cached"
    );
    eyre::ensure!(
        harness.catalog.download_count(&id("media")) == 1,
        "archive should be downloaded once"
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn second_install_needs_force(chain: Harness) -> Result<(), eyre::Report> {
    let package = chain.root.path().join("media");
    let edited_manifest = "id = \"media\"\nversion = \"0.9.0-local\"\n";
    fs::write(package.join("plugin.toml"), edited_manifest)?;
    fs::write(package.join("local-notes.txt"), "keep me")?;

    let refused = chain.manager.install(&id("media"), false).await;

    eyre::ensure!(
        matches!(
            refused,
            Err(LifecycleError::Installer(InstallerError::AlreadyInstalled(_)))
        ),
        "unexpected result {refused:?}"
    );
    eyre::ensure!(
        fs::read_to_string(package.join("plugin.toml"))? == edited_manifest,
        "refused install must not touch the manifest"
    );
    eyre::ensure!(
        fs::read_to_string(package.join("local-notes.txt"))? == "keep me",
        "refused install must not touch other files"
    );
    eyre::ensure!(
        chain.catalog.download_count(&id("media")) == 0,
        "refused install should not download"
    );

    chain.manager.install(&id("media"), true).await?;

    eyre::ensure!(
        chain.catalog.download_count(&id("media")) == 1,
        "forced install should download"
    );
    eyre::ensure!(
        !package.join("local-notes.txt").exists(),
        "forced install replaces the package"
    );
    Ok(())
}

#[rstest]
#[case::no_entry_marker(&[("broken/readme.txt", "x")])]
#[case::bare_top_level_file(&[("README.md", "# broken")])]
#[tokio::test(flavor = "multi_thread")]
async fn malformed_archive_leaves_no_residue(
    #[case] members: &[(&str, &str)],
) -> Result<(), eyre::Report> {
    let catalog = InMemoryCatalog::new()
        .with_entry(CatalogEntry::new(id("broken"), "1.0.0").with_licence(true, true))
        .with_archive(id("broken"), PluginArchive::new(tarball(members)));
    let harness = Harness::new(catalog, PluginUnits::new());

    let result = harness.manager.install(&id("broken"), false).await;

    eyre::ensure!(
        matches!(
            result,
            Err(LifecycleError::Installer(InstallerError::InvalidArchive { .. }))
        ),
        "unexpected result {result:?}"
    );
    eyre::ensure!(
        !harness.root.path().join("broken").exists(),
        "no package directory should be created"
    );
    eyre::ensure!(
        fs::read_dir(harness.root.path())?.next().is_none(),
        "install root should stay empty"
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn uninstall_deactivates_and_forgets(chain: Harness) -> Result<(), eyre::Report> {
    let manager = &chain.manager;
    manager.activate(&id("media"), None).await?;
    manager.mark_restart_complete().await?;

    let removed = manager.uninstall(&id("media")).await?;

    eyre::ensure!(removed, "package should be removed");
    eyre::ensure!(
        !chain.root.path().join("media").exists(),
        "package directory should be gone"
    );
    eyre::ensure!(manager.is_restart_required().await?, "restart flag should be set");
    eyre::ensure!(
        chain.store.find_cache_entry(&id("media")).await?.is_none(),
        "cache row should be dropped"
    );
    eyre::ensure!(!manager.uninstall(&id("media")).await?, "second uninstall is a no-op");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn uninstall_keeps_activation_while_a_bundled_copy_remains(
    chain: Harness,
) -> Result<(), eyre::Report> {
    write_package(chain.bundled.path(), "media", &[]);
    let manager = &chain.manager;
    manager.activate(&id("media"), None).await?;
    manager.mark_restart_complete().await?;
    manager.discover().await?;

    let removed = manager.uninstall(&id("media")).await?;

    eyre::ensure!(removed, "install root copy should be removed");
    eyre::ensure!(
        chain.store.find_activation(&id("media")).await?.is_some_and(|record| record.is_active()),
        "bundled plugin should stay active"
    );
    eyre::ensure!(
        !manager.is_restart_required().await?,
        "nothing changed for the running set"
    );
    eyre::ensure!(
        chain.store.find_cache_entry(&id("media")).await?.is_some(),
        "cache row should be kept"
    );
    let status = manager.status(&id("media")).await?;
    eyre::ensure!(status.installed, "bundled copy still counts as installed");

    eyre::ensure!(
        !manager.uninstall(&id("media")).await?,
        "bundled packages cannot be uninstalled"
    );
    eyre::ensure!(
        chain.store.find_activation(&id("media")).await?.is_some_and(|record| record.is_active()),
        "repeated uninstall must not deactivate"
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn status_reports_licence_and_reachability(chain: Harness) -> Result<(), eyre::Report> {
    let online = chain.manager.status(&id("media")).await?;
    eyre::ensure!(online.installed && online.in_catalog, "online status {online:?}");
    eyre::ensure!(online.licensed && online.can_download, "licence {online:?}");

    chain.catalog.set_reachable(false);
    let offline = chain.manager.status(&id("media")).await?;

    eyre::ensure!(offline.installed, "offline status should keep installed");
    eyre::ensure!(!offline.catalog_reachable, "catalog should be unreachable");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn offline_install_reports_unreachable() -> Result<(), eyre::Report> {
    let harness = Harness::listing(&CHAIN);
    harness.catalog.set_reachable(false);

    let result = harness.manager.install(&id("media"), false).await;

    eyre::ensure!(result.is_err(), "install should fail offline");
    eyre::ensure!(
        !harness.root.path().join("media").exists(),
        "nothing should be written"
    );
    Ok(())
}

//! Then steps for plugin lifecycle BDD scenarios.

use super::world::{LifecycleWorld, plugin_id, plugin_ids, run_async};
use pilotis::plugin::services::{InstallerError, LifecycleError};
use rstest_bdd_macros::then;

#[then(r#"the newly activated plugins are "{plugins}""#)]
fn newly_activated_are(world: &LifecycleWorld, plugins: String) -> Result<(), eyre::Report> {
    let expected = plugin_ids(&plugins)?;
    let result = world
        .last_activation
        .as_ref()
        .ok_or_else(|| eyre::eyre!("missing activation result"))?;
    match result {
        Ok(activated) if activated == &expected => Ok(()),
        other => Err(eyre::eyre!("expected {expected:?}, got {other:?}")),
    }
}

#[then("no plugins are newly activated")]
fn nothing_newly_activated(world: &LifecycleWorld) -> Result<(), eyre::Report> {
    let result = world
        .last_activation
        .as_ref()
        .ok_or_else(|| eyre::eyre!("missing activation result"))?;
    match result {
        Ok(activated) if activated.is_empty() => Ok(()),
        other => Err(eyre::eyre!("expected no activations, got {other:?}")),
    }
}

#[then(r#"activation fails because "{dependency}" is not activated"#)]
fn activation_fails_on_dependency(
    world: &LifecycleWorld,
    dependency: String,
) -> Result<(), eyre::Report> {
    let expected = plugin_id(&dependency)?;
    let result = world
        .last_activation
        .as_ref()
        .ok_or_else(|| eyre::eyre!("missing activation result"))?;
    match result {
        Err(LifecycleError::DependencyNotActivated { dependency: found, .. })
            if found == &expected =>
        {
            Ok(())
        }
        other => Err(eyre::eyre!(
            "expected DependencyNotActivated for {expected}, got {other:?}"
        )),
    }
}

#[then("a restart is required")]
fn restart_required(world: &LifecycleWorld) -> Result<(), eyre::Report> {
    eyre::ensure!(
        run_async(world.manager.is_restart_required())?,
        "restart flag should be set"
    );
    Ok(())
}

#[then("no restart is required")]
fn no_restart_required(world: &LifecycleWorld) -> Result<(), eyre::Report> {
    eyre::ensure!(
        !run_async(world.manager.is_restart_required())?,
        "restart flag should be clear"
    );
    Ok(())
}

#[then(r#"the pending migrations are "{plugins}""#)]
fn pending_migrations_are(world: &LifecycleWorld, plugins: String) -> Result<(), eyre::Report> {
    let expected = plugin_ids(&plugins)?;
    let pending = run_async(world.manager.get_pending_migrations())?;
    eyre::ensure!(pending == expected, "expected {expected:?}, got {pending:?}");
    Ok(())
}

#[then("the catalog is reported unreachable")]
fn catalog_reported_unreachable(world: &LifecycleWorld) -> Result<(), eyre::Report> {
    let discovery = world
        .last_discovery
        .as_ref()
        .ok_or_else(|| eyre::eyre!("missing discovery result"))?;
    eyre::ensure!(!discovery.catalog_reachable, "catalog reported reachable");
    Ok(())
}

#[then(r#"discovery lists "{plugins}""#)]
fn discovery_lists(world: &LifecycleWorld, plugins: String) -> Result<(), eyre::Report> {
    let expected = plugin_ids(&plugins)?;
    let discovery = world
        .last_discovery
        .as_ref()
        .ok_or_else(|| eyre::eyre!("missing discovery result"))?;
    let listed: Vec<_> = discovery
        .plugins
        .iter()
        .map(|plugin| plugin.metadata.id.clone())
        .collect();
    eyre::ensure!(listed == expected, "expected {expected:?}, got {listed:?}");
    Ok(())
}

#[then(r#"the package for "{plugin}" is present"#)]
fn package_is_present(world: &LifecycleWorld, plugin: String) -> Result<(), eyre::Report> {
    let id = plugin_id(&plugin)?;
    eyre::ensure!(
        world.manager.installer().is_installed(&id),
        "package for {id} should be installed"
    );
    Ok(())
}

#[then(r#"installing plugin "{plugin}" again is refused"#)]
fn reinstall_is_refused(world: &LifecycleWorld, plugin: String) -> Result<(), eyre::Report> {
    let id = plugin_id(&plugin)?;
    let package = world.manager.installer().package_path(&id);
    let marker = package.join(world.manager.installer().entry_marker());
    let sentinel = package.join("local-notes.txt");
    std::fs::write(&sentinel, "keep me")?;
    let manifest_before = std::fs::read(&marker)?;

    let result = run_async(world.manager.install(&id, false));

    eyre::ensure!(
        matches!(
            result,
            Err(LifecycleError::Installer(InstallerError::AlreadyInstalled(_)))
        ),
        "expected AlreadyInstalled, got {result:?}"
    );
    eyre::ensure!(
        std::fs::read(&marker)? == manifest_before,
        "manifest changed by a refused install"
    );
    eyre::ensure!(
        std::fs::read_to_string(&sentinel)? == "keep me",
        "package files changed by a refused install"
    );
    Ok(())
}

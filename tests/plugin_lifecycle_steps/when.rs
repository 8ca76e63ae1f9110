//! When steps for plugin lifecycle BDD scenarios.

use super::world::{LifecycleWorld, plugin_id, run_async};
use eyre::WrapErr;
use rstest_bdd_macros::when;

#[when(r#"plugin "{plugin}" is activated with its dependencies"#)]
fn activate_with_dependencies(
    world: &mut LifecycleWorld,
    plugin: String,
) -> Result<(), eyre::Report> {
    let id = plugin_id(&plugin)?;
    world.last_activation = Some(run_async(
        world.manager.activate_with_dependencies(&id, None),
    ));
    Ok(())
}

#[when(r#"plugin "{plugin}" is activated on its own"#)]
fn activate_alone(world: &mut LifecycleWorld, plugin: String) -> Result<(), eyre::Report> {
    let id = plugin_id(&plugin)?;
    let result = run_async(world.manager.activate(&id, None));
    world.last_activation = Some(result.map(|()| vec![id]));
    Ok(())
}

#[when("plugins are discovered")]
fn discover_plugins(world: &mut LifecycleWorld) -> Result<(), eyre::Report> {
    let discovery = run_async(world.manager.discover()).wrap_err("discover plugins")?;
    world.last_discovery = Some(discovery);
    Ok(())
}

#[when(r#"plugin "{plugin}" is installed from the catalog"#)]
fn install_from_catalog(world: &mut LifecycleWorld, plugin: String) -> Result<(), eyre::Report> {
    let id = plugin_id(&plugin)?;
    run_async(world.manager.install(&id, false)).wrap_err("install plugin from catalog")?;
    Ok(())
}

//! Given steps for plugin lifecycle BDD scenarios.

use super::world::{
    LifecycleWorld, package_archive, plugin_id, plugin_ids, run_async, write_package,
};
use eyre::WrapErr;
use pilotis::plugin::{domain::CatalogEntry, ports::CatalogClient};
use rstest_bdd_macros::given;

fn list_plugin(
    world: &LifecycleWorld,
    plugin: &str,
    dependencies: &str,
) -> Result<(), eyre::Report> {
    let id = plugin_id(plugin)?;
    let deps = plugin_ids(dependencies)?;
    let archive = package_archive(&id, &deps)?;
    world.catalog.upsert_entry(
        CatalogEntry::new(id.clone(), "1.0.0")
            .with_dependencies(deps)
            .with_licence(true, true),
    )?;
    world.catalog.upsert_archive(id, archive)?;
    Ok(())
}

#[given(r#"the catalog lists plugin "{plugin}" without dependencies"#)]
fn catalog_lists_plugin(world: &mut LifecycleWorld, plugin: String) -> Result<(), eyre::Report> {
    list_plugin(world, &plugin, "")
}

#[given(r#"the catalog lists plugin "{plugin}" depending on "{dependencies}""#)]
fn catalog_lists_plugin_with_dependencies(
    world: &mut LifecycleWorld,
    plugin: String,
    dependencies: String,
) -> Result<(), eyre::Report> {
    list_plugin(world, &plugin, &dependencies)
}

#[given(r#"plugin "{plugin}" is installed locally"#)]
fn plugin_is_installed(world: &mut LifecycleWorld, plugin: String) -> Result<(), eyre::Report> {
    let id = plugin_id(&plugin)?;
    let listed = run_async(world.catalog.get_plugin(&id))?;
    let deps = listed.map(|entry| entry.dependencies).unwrap_or_default();
    write_package(world, &id, &deps)
}

#[given(r#"plugin "{plugin}" has been activated with its dependencies"#)]
fn plugin_has_been_activated(
    world: &mut LifecycleWorld,
    plugin: String,
) -> Result<(), eyre::Report> {
    let id = plugin_id(&plugin)?;
    run_async(world.manager.activate_with_dependencies(&id, None))
        .wrap_err("activate plugin in scenario setup")?;
    Ok(())
}

#[given("the catalog is unreachable")]
fn catalog_is_unreachable(world: &mut LifecycleWorld) {
    world.catalog.set_reachable(false);
}

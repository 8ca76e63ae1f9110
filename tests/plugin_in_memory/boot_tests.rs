//! Boot loading into the registry, host wiring, and UI slot composition.

use super::helpers::{DEMO_UNIT, Harness, entry, id, ids};
use pilotis::plugin::{
    adapters::memory::{InMemoryCatalog, InMemoryHostApp},
    descriptor::{CapabilityDescriptor, PluginHookError},
    domain::{
        Actor, ActorId, AdminCategory, CommandDeclaration, HelpEntry, RouteGroup, SlotItem,
        SlotName,
    },
    ports::RouteResolver,
    services::{DependencyRegistry, PLUGIN_MANAGEMENT_ENDPOINT, UiSlotComposer},
    units::PluginUnits,
};
use rstest::rstest;

fn hook_error(err: impl std::fmt::Display) -> PluginHookError {
    PluginHookError::new(err.to_string())
}

fn media() -> Result<CapabilityDescriptor, PluginHookError> {
    let group = RouteGroup::new("media", "/admin/media")
        .map_err(hook_error)?
        .route("index", "/");
    let item = SlotItem::new("Media", "media.index")
        .map_err(hook_error)?
        .with_order(20);
    CapabilityDescriptor::builder(id("media"), "1.0.0")
        .name("Media library")
        .admin_category("content")
        .route_group(group)
        .slot_item(SlotName::AdminSidebar, item)
        .help_entry(HelpEntry::new("media.upload", "Uploading", "Drag files here."))
        .build()
        .map_err(hook_error)
}

fn blog() -> Result<CapabilityDescriptor, PluginHookError> {
    let group = RouteGroup::new("blog", "/admin/blog")
        .map_err(hook_error)?
        .route("posts", "/posts");
    let item = SlotItem::new("Posts", "blog.posts")
        .map_err(hook_error)?
        .with_order(10);
    let hidden = SlotItem::new("Drafts", "blog.drafts").map_err(hook_error)?;
    CapabilityDescriptor::builder(id("blog"), "1.0.0")
        .dependency(id("media"))
        .admin_category("content")
        .route_group(group)
        .command(CommandDeclaration::new("blog-reindex", "Rebuild the post index"))
        .slot_item(SlotName::AdminSidebar, item)
        .slot_item(SlotName::AdminSidebar, hidden)
        .on_init(|host| {
            host.resolve_route("media.index")
                .map(|_| ())
                .ok_or_else(|| PluginHookError::new("media routes are not mounted"))
        })
        .build()
        .map_err(hook_error)
}

fn boot_harness() -> Harness {
    let catalog = InMemoryCatalog::new()
        .with_entry(entry("media", &[]))
        .with_entry(entry("blog", &["media"]));
    let units = PluginUnits::new()
        .with_factory(DEMO_UNIT, "media", media)
        .with_factory(DEMO_UNIT, "blog", blog);
    Harness::new(catalog, units).with_installed(&[("media", &[]), ("blog", &["media"])])
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn boot_wires_active_plugins_in_dependency_order() -> Result<(), eyre::Report> {
    let harness = boot_harness();
    harness
        .manager
        .activate_with_dependencies(&id("blog"), None)
        .await?;

    let mut registry = DependencyRegistry::new();
    let report = harness.manager.load_activated_plugins(&mut registry).await?;
    let mut host = InMemoryHostApp::new().with_route(PLUGIN_MANAGEMENT_ENDPOINT, "/admin/plugins");
    let mut slots = UiSlotComposer::new();
    let order = registry.finalize(&mut host, &mut slots)?;

    eyre::ensure!(report.skipped.is_empty(), "skipped {:?}", report.skipped);
    eyre::ensure!(order == ids(&["media", "blog"]), "load order {order:?}");
    eyre::ensure!(
        host.route_owner("media.index") == Some(&id("media")),
        "media route owner"
    );
    eyre::ensure!(
        host.command_names() == vec!["blog-reindex"],
        "commands {:?}",
        host.command_names()
    );
    eyre::ensure!(host.help_entry("media.upload").is_some(), "help not seeded");
    eyre::ensure!(slots.plugin_count() == 2, "slot plugins");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn admin_menu_groups_visible_items() -> Result<(), eyre::Report> {
    let harness = boot_harness();
    harness
        .manager
        .activate_with_dependencies(&id("blog"), None)
        .await?;
    let mut registry = DependencyRegistry::new();
    harness.manager.load_activated_plugins(&mut registry).await?;
    let mut host = InMemoryHostApp::new().with_route(PLUGIN_MANAGEMENT_ENDPOINT, "/admin/plugins");
    let mut slots = UiSlotComposer::new();
    registry.finalize(&mut host, &mut slots)?;

    let admin = Actor::administrator(ActorId::new());
    let items = slots.get_items(SlotName::AdminSidebar.as_str(), &admin, &host);
    let labels: Vec<&str> = items.iter().map(|item| item.label.as_str()).collect();
    eyre::ensure!(labels == vec!["Posts", "Media"], "sidebar labels {labels:?}");

    let menu = slots.get_admin_menu(&admin, &host);
    let categories: Vec<AdminCategory> = menu.iter().map(|group| group.category).collect();
    eyre::ensure!(
        categories == vec![AdminCategory::Content, AdminCategory::Plugins],
        "menu categories {categories:?}"
    );

    let visitor = Actor::anonymous();
    let public = slots.get_admin_menu(&visitor, &host);
    eyre::ensure!(
        public
            .iter()
            .all(|group| group.items.iter().all(|item| item.plugin_id.is_some())),
        "management entry leaked to anonymous actor"
    );
    eyre::ensure!(
        slots
            .get_items("not_a_slot", &admin, &host)
            .is_empty(),
        "unknown slot should be empty"
    );
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn boot_skips_plugins_whose_package_is_gone() -> Result<(), eyre::Report> {
    let harness = boot_harness();
    harness
        .manager
        .activate_with_dependencies(&id("blog"), None)
        .await?;
    std::fs::remove_dir_all(harness.root.path().join("blog"))?;

    let mut registry = DependencyRegistry::new();
    let report = harness.manager.load_activated_plugins(&mut registry).await?;
    let mut host = InMemoryHostApp::new().with_route(PLUGIN_MANAGEMENT_ENDPOINT, "/admin/plugins");
    let mut slots = UiSlotComposer::new();
    let order = registry.finalize(&mut host, &mut slots)?;

    eyre::ensure!(report.loaded == ids(&["media"]), "loaded {:?}", report.loaded);
    eyre::ensure!(report.is_skipped(&id("blog")), "blog should be skipped");
    eyre::ensure!(order == ids(&["media"]), "load order {order:?}");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn boot_skips_dependents_of_a_missing_package() -> Result<(), eyre::Report> {
    let harness = boot_harness();
    harness
        .manager
        .activate_with_dependencies(&id("blog"), None)
        .await?;
    std::fs::remove_dir_all(harness.root.path().join("media"))?;

    let mut registry = DependencyRegistry::new();
    let report = harness.manager.load_activated_plugins(&mut registry).await?;
    let mut host = InMemoryHostApp::new().with_route(PLUGIN_MANAGEMENT_ENDPOINT, "/admin/plugins");
    let mut slots = UiSlotComposer::new();
    let order = registry.finalize(&mut host, &mut slots)?;

    eyre::ensure!(report.loaded.is_empty(), "loaded {:?}", report.loaded);
    let blog = report
        .skipped
        .iter()
        .find(|skipped| skipped.plugin_id == id("blog"))
        .ok_or_else(|| eyre::eyre!("blog should be skipped"))?;
    eyre::ensure!(
        blog.reason == "dependency media was skipped",
        "reason {:?}",
        blog.reason
    );
    eyre::ensure!(report.is_skipped(&id("media")), "media should be skipped");
    eyre::ensure!(order.is_empty(), "load order {order:?}");
    eyre::ensure!(host.command_names().is_empty(), "blog must not be wired");
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn boot_uses_manifests_when_catalog_is_down() -> Result<(), eyre::Report> {
    let harness = boot_harness();
    harness
        .manager
        .activate_with_dependencies(&id("blog"), None)
        .await?;
    harness.catalog.set_reachable(false);

    let mut registry = DependencyRegistry::new();
    let report = harness.manager.load_activated_plugins(&mut registry).await?;

    eyre::ensure!(
        report.loaded == ids(&["blog", "media"]),
        "loaded {:?}",
        report.loaded
    );
    Ok(())
}

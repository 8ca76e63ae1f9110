//! Request-time aggregation of plugin UI contributions into named slots.

use crate::plugin::descriptor::CapabilityDescriptor;
use crate::plugin::domain::{Actor, AdminCategory, PluginId, SlotItem, SlotName};
use crate::plugin::ports::RouteResolver;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Endpoint of the built-in plugin management screen.
pub const PLUGIN_MANAGEMENT_ENDPOINT: &str = "plugins.manage";

/// Permission required to see the plugin management entry.
pub const PLUGIN_MANAGEMENT_PERMISSION: &str = "plugins.manage";

/// Sort order of the built-in plugin management entry.
const PLUGIN_MANAGEMENT_ORDER: i32 = 1000;

/// A slot item ready for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedSlotItem {
    /// Contributing plugin, `None` for built-in entries.
    pub plugin_id: Option<PluginId>,
    /// Display label.
    pub label: String,
    /// Target endpoint name.
    pub endpoint: String,
    /// Resolved URL path.
    pub url: String,
    /// Icon name.
    pub icon: Option<String>,
    /// Sort order.
    pub order: i32,
    /// Non-zero badge count.
    pub badge: Option<u64>,
}

/// One category group of the administration menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminMenuGroup {
    /// Group category.
    pub category: AdminCategory,
    /// Items sorted by order.
    pub items: Vec<RenderedSlotItem>,
}

#[derive(Debug, Clone)]
struct Contribution {
    plugin_id: PluginId,
    category: AdminCategory,
    item: SlotItem,
}

type SlotMemo = HashMap<SlotName, Arc<Vec<Contribution>>>;

/// Collects UI slot contributions from registered plugins.
///
/// Contributions are memoised per slot in registration order, stably sorted
/// by their order field; actor and route filtering run on every call.
#[derive(Debug, Default)]
pub struct UiSlotComposer {
    plugins: Vec<Arc<CapabilityDescriptor>>,
    memo: RwLock<SlotMemo>,
}

impl UiSlotComposer {
    /// Creates an empty composer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a plugin's contributions and drops memoised output.
    pub fn register_plugin(&mut self, descriptor: Arc<CapabilityDescriptor>) {
        self.plugins.push(descriptor);
        match self.memo.get_mut() {
            Ok(memo) => memo.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }

    /// Returns the number of registered plugins.
    #[must_use]
    pub fn plugin_count(&self) -> usize {
        self.plugins.len()
    }

    /// Returns the visible items for `slot_name`.
    ///
    /// Unknown slot names yield an empty list. Items are dropped when the
    /// actor lacks their permission or when their target endpoint is not
    /// mounted in `routes`.
    #[must_use]
    pub fn get_items(
        &self,
        slot_name: &str,
        actor: &Actor,
        routes: &dyn RouteResolver,
    ) -> Vec<RenderedSlotItem> {
        let Ok(slot) = SlotName::try_from(slot_name) else {
            return Vec::new();
        };
        self.contributions(slot)
            .iter()
            .filter_map(|contribution| render(contribution, actor, routes))
            .collect()
    }

    /// Returns the administration menu grouped by plugin category.
    ///
    /// Groups follow [`AdminCategory::ALL`] order and empty groups are
    /// omitted. The plugin management entry is added to the default group
    /// when its endpoint is mounted and the actor may use it.
    #[must_use]
    pub fn get_admin_menu(&self, actor: &Actor, routes: &dyn RouteResolver) -> Vec<AdminMenuGroup> {
        let mut grouped: HashMap<AdminCategory, Vec<RenderedSlotItem>> = HashMap::new();
        for contribution in self.contributions(SlotName::AdminSidebar).iter() {
            if let Some(rendered) = render(contribution, actor, routes) {
                grouped
                    .entry(contribution.category)
                    .or_default()
                    .push(rendered);
            }
        }

        if actor.has_permission(PLUGIN_MANAGEMENT_PERMISSION)
            && let Some(url) = routes.resolve_route(PLUGIN_MANAGEMENT_ENDPOINT)
        {
            grouped
                .entry(AdminCategory::default())
                .or_default()
                .push(RenderedSlotItem {
                    plugin_id: None,
                    label: String::from("Plugins"),
                    endpoint: PLUGIN_MANAGEMENT_ENDPOINT.to_owned(),
                    url,
                    icon: Some(String::from("puzzle")),
                    order: PLUGIN_MANAGEMENT_ORDER,
                    badge: None,
                });
        }

        AdminCategory::ALL
            .into_iter()
            .filter_map(|category| {
                let mut items = grouped.remove(&category)?;
                items.sort_by_key(|item| item.order);
                Some(AdminMenuGroup { category, items })
            })
            .collect()
    }

    fn contributions(&self, slot: SlotName) -> Arc<Vec<Contribution>> {
        if let Ok(memo) = self.memo.read()
            && let Some(cached) = memo.get(&slot)
        {
            return Arc::clone(cached);
        }

        let collected = Arc::new(self.collect(slot));
        if let Ok(mut memo) = self.memo.write() {
            memo.insert(slot, Arc::clone(&collected));
        }
        collected
    }

    fn collect(&self, slot: SlotName) -> Vec<Contribution> {
        let mut contributions: Vec<Contribution> = self
            .plugins
            .iter()
            .flat_map(|descriptor| {
                descriptor
                    .slot_items(slot)
                    .iter()
                    .map(|item| Contribution {
                        plugin_id: descriptor.id().clone(),
                        category: descriptor.admin_category(),
                        item: item.clone(),
                    })
            })
            .collect();
        contributions.sort_by_key(|contribution| contribution.item.order());
        contributions
    }
}

fn render(
    contribution: &Contribution,
    actor: &Actor,
    routes: &dyn RouteResolver,
) -> Option<RenderedSlotItem> {
    let item = &contribution.item;
    if !item.is_visible_to(actor) {
        return None;
    }
    let url = routes.resolve_route(item.target())?;
    Some(RenderedSlotItem {
        plugin_id: Some(contribution.plugin_id.clone()),
        label: item.label().to_owned(),
        endpoint: item.target().to_owned(),
        url,
        icon: item.icon().map(str::to_owned),
        order: item.order(),
        badge: resolve_badge(contribution, actor),
    })
}

fn resolve_badge(contribution: &Contribution, actor: &Actor) -> Option<u64> {
    let badge = contribution.item.badge()?;
    match badge(actor) {
        Ok(0) => None,
        Ok(count) => Some(count),
        Err(err) => {
            tracing::warn!(
                plugin_id = %contribution.plugin_id,
                label = contribution.item.label(),
                error = %err,
                "slot badge failed; showing item without badge"
            );
            None
        }
    }
}

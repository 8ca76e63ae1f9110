//! UI slot contribution types.

use super::{Actor, ParseSlotNameError, PluginDomainError};
use std::fmt;
use std::sync::Arc;

/// Named UI extension point that plugins may contribute items to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SlotName {
    /// Administration sidebar menu.
    AdminSidebar,
    /// Widgets shown on the administration dashboard.
    AdminDashboard,
    /// Tabs on the administration settings screen.
    AdminSettingsTabs,
    /// Public site header navigation.
    PublicHeaderNav,
    /// Public site footer links.
    PublicFooterLinks,
    /// Logged-in user account menu.
    UserAccountMenu,
}

impl SlotName {
    /// Every recognised slot.
    pub const ALL: [Self; 6] = [
        Self::AdminSidebar,
        Self::AdminDashboard,
        Self::AdminSettingsTabs,
        Self::PublicHeaderNav,
        Self::PublicFooterLinks,
        Self::UserAccountMenu,
    ];

    /// Returns the canonical slot name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AdminSidebar => "admin_sidebar",
            Self::AdminDashboard => "admin_dashboard",
            Self::AdminSettingsTabs => "admin_settings_tabs",
            Self::PublicHeaderNav => "public_header_nav",
            Self::PublicFooterLinks => "public_footer_links",
            Self::UserAccountMenu => "user_account_menu",
        }
    }
}

impl fmt::Display for SlotName {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl TryFrom<&str> for SlotName {
    type Error = ParseSlotNameError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|slot| slot.as_str() == normalized)
            .ok_or_else(|| ParseSlotNameError(value.to_owned()))
    }
}

/// Administration menu group a plugin is listed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum AdminCategory {
    /// Pages, posts, and other editorial content.
    Content,
    /// Shops, payments, and orders.
    Commerce,
    /// Members, directories, and forums.
    Community,
    /// Campaigns, newsletters, and forms.
    Marketing,
    /// Reports and statistics.
    Analytics,
    /// Catch-all group for plugins without a recognised category.
    #[default]
    Plugins,
    /// Site-wide configuration.
    System,
}

impl AdminCategory {
    /// Every category, in menu display order.
    pub const ALL: [Self; 7] = [
        Self::Content,
        Self::Commerce,
        Self::Community,
        Self::Marketing,
        Self::Analytics,
        Self::Plugins,
        Self::System,
    ];

    /// Returns the canonical category name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Content => "content",
            Self::Commerce => "commerce",
            Self::Community => "community",
            Self::Marketing => "marketing",
            Self::Analytics => "analytics",
            Self::Plugins => "plugins",
            Self::System => "system",
        }
    }

    /// Parses a category name, falling back to [`AdminCategory::Plugins`] for
    /// anything unrecognised.
    #[must_use]
    pub fn parse_or_default(value: &str) -> Self {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == normalized)
            .unwrap_or_default()
    }
}

impl fmt::Display for AdminCategory {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Error raised by a badge function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BadgeError(pub String);

impl fmt::Display for BadgeError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl std::error::Error for BadgeError {}

/// Function computing the numeric badge shown next to a slot item.
pub type BadgeSource = Arc<dyn Fn(&Actor) -> Result<u64, BadgeError> + Send + Sync>;

/// One labelled item a plugin contributes to a UI slot.
#[derive(Clone)]
pub struct SlotItem {
    label: String,
    target: String,
    icon: Option<String>,
    order: i32,
    permission: Option<String>,
    badge: Option<BadgeSource>,
}

impl SlotItem {
    /// Creates a slot item pointing at a host endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`PluginDomainError`] when the label or target is empty.
    pub fn new(
        label: impl Into<String>,
        target: impl Into<String>,
    ) -> Result<Self, PluginDomainError> {
        let item_label = label.into().trim().to_owned();
        if item_label.is_empty() {
            return Err(PluginDomainError::EmptySlotLabel);
        }
        let item_target = target.into().trim().to_owned();
        if item_target.is_empty() {
            return Err(PluginDomainError::EmptySlotTarget);
        }
        Ok(Self {
            label: item_label,
            target: item_target,
            icon: None,
            order: 0,
            permission: None,
            badge: None,
        })
    }

    /// Sets the icon name.
    #[must_use]
    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    /// Sets the sort order; lower values come first.
    #[must_use]
    pub const fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    /// Requires the viewing actor to hold `permission`.
    #[must_use]
    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permission = Some(permission.into());
        self
    }

    /// Attaches a badge function.
    #[must_use]
    pub fn with_badge(
        mut self,
        badge: impl Fn(&Actor) -> Result<u64, BadgeError> + Send + Sync + 'static,
    ) -> Self {
        self.badge = Some(Arc::new(badge));
        self
    }

    /// Returns the display label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns the target endpoint name.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Returns the icon name.
    #[must_use]
    pub fn icon(&self) -> Option<&str> {
        self.icon.as_deref()
    }

    /// Returns the sort order.
    #[must_use]
    pub const fn order(&self) -> i32 {
        self.order
    }

    /// Returns the required permission.
    #[must_use]
    pub fn permission(&self) -> Option<&str> {
        self.permission.as_deref()
    }

    /// Returns the badge function.
    #[must_use]
    pub const fn badge(&self) -> Option<&BadgeSource> {
        self.badge.as_ref()
    }

    /// Returns whether `actor` may see this item.
    #[must_use]
    pub fn is_visible_to(&self, actor: &Actor) -> bool {
        self.permission
            .as_deref()
            .is_none_or(|permission| actor.has_permission(permission))
    }
}

impl fmt::Debug for SlotItem {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SlotItem")
            .field("label", &self.label)
            .field("target", &self.target)
            .field("icon", &self.icon)
            .field("order", &self.order)
            .field("permission", &self.permission)
            .field("badge", &self.badge.is_some())
            .finish()
    }
}

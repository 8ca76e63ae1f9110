//! Domain model for the plugin lifecycle.
//!
//! Plugin identity, activation records, status flags, catalog records,
//! installed packages, host declarations, and UI slot contributions.
//! Infrastructure concerns remain outside this boundary.

mod activation;
mod catalog;
mod error;
mod host_types;
mod ids;
mod package;
mod slot;
mod status_flag;

pub use activation::{ActivationRecord, PersistedActivationData};
pub use catalog::{
    CatalogCacheEntry, CatalogCategory, CatalogEntry, CatalogPresentation, CatalogProfile,
    LicenceRecord, PluginArchive, ReleasePhase,
};
pub use error::{ParseSlotNameError, ParseStatusFlagError, PluginDomainError};
pub use host_types::{
    ADMIN_WILDCARD_PERMISSION, Actor, CommandDeclaration, EntityDeclaration, Guard, GuardDenial,
    GuardPredicate, HelpEntry, RouteDeclaration, RouteGroup,
};
pub use ids::{ActorId, PluginId};
pub use package::{InstalledPackage, PackageManifest, PackageStatus, PluginMetadata};
pub use slot::{AdminCategory, BadgeError, BadgeSource, SlotItem, SlotName};
pub use status_flag::{
    PENDING_MIGRATIONS_KEY, PendingMigrations, RESTART_REQUIRED_KEY, StatusFlag, encode_bool,
};

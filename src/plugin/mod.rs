//! Plugin lifecycle management.
//!
//! Plugins are discovered from a remote catalog and local package
//! directories, installed from archives, activated with their dependencies,
//! and loaded at boot in dependency order. The module follows hexagonal
//! architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]
//!
//! [`descriptor`] defines what a plugin contributes to the host,
//! [`units`] maps catalog entry points to compiled factories, and
//! [`templates`] chains plugin template and static directories onto the
//! host's search paths.

pub mod adapters;
pub mod descriptor;
pub mod domain;
pub mod ports;
pub mod services;
pub mod templates;
pub mod units;

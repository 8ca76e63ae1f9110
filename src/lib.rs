//! Pilotis: plugin lifecycle management for a modular host application.
//!
//! This crate discovers plugins from a remote catalog and from local package
//! directories, installs them from archives, tracks which are active, and
//! loads the active set into the host in dependency order at boot.
//!
//! # Architecture
//!
//! Pilotis follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for external interactions
//! - **Adapters**: Concrete implementations of ports (database, HTTP, memory)
//!
//! # Modules
//!
//! - [`config`]: Host configuration loaded from TOML and the environment
//! - [`plugin`]: Catalog access, installation, activation, and boot loading

pub mod config;
pub mod plugin;

//! Adapter implementations for plugin lifecycle ports.

pub mod http;
pub mod memory;
pub mod postgres;

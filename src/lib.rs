//! GB Electricity Market Proxy
//!
//! Caching reverse proxy in front of the Elexon BMRS API. Exposes the
//! modules for use by the binary and the integration tests.

pub mod api;
pub mod cache;
pub mod config;
pub mod elexon;
pub mod error;
pub mod fuel_mix;
pub mod middleware;
pub mod settlement;
pub mod summary;

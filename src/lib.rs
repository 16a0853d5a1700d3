//! colorcell: a diagnostic color service for exercising load balancers,
//! service meshes, and chaos/latency tooling.
//!
//! - [`color`] - palette and process-wide random source
//! - [`policy`] - per-request delay and failure decisions
//! - [`burn`] - synthetic CPU load workers
//! - [`server`] - HTTP surface and signal-driven shutdown
//! - [`config`] - flags and environment overrides

pub mod burn;
pub mod color;
pub mod config;
pub mod policy;
pub mod server;

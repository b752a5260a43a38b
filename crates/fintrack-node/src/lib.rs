//! # FinTrack Node Library
//!
//! Exposes the node's wiring for integration tests. The entry point is the
//! `main.rs` binary.
//!
//! - `config` - `NodeConfig` defaults and `FT_*` environment overrides
//! - `container` - Builds every component once and owns shutdown order
//! - `runtime` - Consumer task, HTTP serving and graceful shutdown

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod container;
pub mod runtime;

pub use config::{load_config, ConfigError, NodeConfig, StoreBackend};
pub use container::{ContainerError, ServiceContainer};
pub use runtime::NodeRuntime;

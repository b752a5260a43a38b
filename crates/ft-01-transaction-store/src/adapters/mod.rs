//! # Adapters Layer
//!
//! - `memory`: in-process backend, also the test double
//! - `rocksdb`: durable backend (feature `rocksdb`)

pub mod memory;

#[cfg(feature = "rocksdb")]
pub mod rocksdb;

pub use memory::InMemoryTransactionStore;

#[cfg(feature = "rocksdb")]
pub use self::rocksdb::{RocksDbStoreConfig, RocksDbTransactionStore};

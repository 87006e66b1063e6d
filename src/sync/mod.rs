//! Reconciliation between the registry and an external key-value store.

pub mod consul;
pub mod memory;
pub mod service;
pub mod store;

pub use consul::ConsulKvStore;
pub use memory::MemoryKvStore;
pub use service::{ConfigSync, RefreshReport, SeedReport, SyncHandle};
pub use store::KvStore;

//! Collaborator interfaces for the relational store and key-value cache.
//!
//! The pipeline talks to storage through the `ContentStore` and `Cache`
//! traits; `MemoryStore`/`MemoryCache` back tests and degraded
//! environments, `RedisCache` backs production.

pub mod cache;
pub mod error;
pub mod memory;
pub mod store;

pub use cache::{Cache, RedisCache};
pub use error::{StoreError, StoreResult};
pub use memory::{MemoryCache, MemoryStore};
pub use store::{ContentStore, SnapshotDelta};

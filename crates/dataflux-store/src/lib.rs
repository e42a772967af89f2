//! Storage layer for the DataFlux scheduler.
//!
//! Provides the shared key-value store interface and everything built
//! directly on top of it:
//! - Namespaced key construction for job definitions, statuses, locks and
//!   results
//! - Distributed lock acquire/release via atomic set-if-absent with TTL
//! - Result history with retention expiry and a per-job "latest" pointer
//! - Best-effort persistence of job definitions and transient statuses
//!
//! Two backends ship with the crate: `RedisKv` (feature `redis-backend`,
//! on by default) for shared cross-process state, and `MemoryKv` for tests
//! and the explicitly configured single-instance degraded mode.

pub mod error;
pub mod keys;
pub mod kv;
pub mod lock;
pub mod memory;
#[cfg(feature = "redis-backend")]
pub mod redis;
pub mod results;
pub mod state;

pub use error::StoreError;
pub use keys::KeySpace;
pub use kv::KvStore;
pub use lock::{LockManager, LockToken};
pub use memory::MemoryKv;
#[cfg(feature = "redis-backend")]
pub use redis::RedisKv;
pub use results::ResultStore;
pub use state::{JobStateStore, PersistedJob, StatusRecord};

//! Backend-agnostic key-value store interface.
//!
//! Everything the scheduler shares across processes goes through this
//! trait; `set_nx_with_ttl` is the atomic primitive distributed locking is
//! built on. Values are JSON-encoded strings.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;

/// Minimal contract the scheduler needs from a shared store.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Check reachability. Called once at startup before distributed
    /// locking is trusted.
    async fn ping(&self) -> Result<(), StoreError>;

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    async fn set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), StoreError>;

    /// Atomic set-if-absent with TTL. Returns `true` when this call created
    /// the key, `false` when it already existed.
    async fn set_nx_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError>;

    /// Delete a key. Returns `true` when the key existed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Compare-and-delete: remove the key only when its current value
    /// equals `expected`. Returns `true` when the key was removed.
    async fn delete_if_eq(&self, key: &str, expected: &str) -> Result<bool, StoreError>;

    /// All live keys starting with `prefix`. Order is unspecified.
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}

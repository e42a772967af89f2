//! Distributed per-job locks.
//!
//! A lock is an ephemeral key holding a random token, created with the
//! store's atomic set-if-absent and bounded by a fixed TTL much larger than
//! any job timeout. The TTL exists purely so a crashed process's lock
//! self-heals; release is compare-and-delete by token so a stale holder can
//! never free a lock re-acquired by another process after expiry.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;
use uuid::Uuid;

use crate::error::StoreError;
use crate::keys::KeySpace;
use crate::kv::KvStore;

/// Proof of lock ownership, consumed by [`LockManager::release`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockToken {
    job_id: String,
    token: String,
}

impl LockToken {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }
}

/// Acquire/release interface over the shared store.
pub struct LockManager {
    kv: Arc<dyn KvStore>,
    keys: KeySpace,
    ttl: Duration,
}

impl LockManager {
    pub fn new(kv: Arc<dyn KvStore>, keys: KeySpace, ttl: Duration) -> Self {
        Self { kv, keys, ttl }
    }

    /// Try to take the lock for `job_id`.
    ///
    /// `Ok(None)` means another holder (possibly another process) has it:
    /// a benign skip, not an error.
    pub async fn acquire(&self, job_id: &str) -> Result<Option<LockToken>, StoreError> {
        let token = Uuid::new_v4().to_string();
        let created = self
            .kv
            .set_nx_with_ttl(&self.keys.job_lock(job_id), &token, self.ttl)
            .await?;
        if created {
            debug!(job = %job_id, "Lock acquired");
            Ok(Some(LockToken {
                job_id: job_id.to_string(),
                token,
            }))
        } else {
            Ok(None)
        }
    }

    /// Release a previously acquired lock.
    ///
    /// Returns `false` when the key no longer held our token (TTL expiry
    /// plus re-acquisition elsewhere); the foreign lock is left alone.
    pub async fn release(&self, token: &LockToken) -> Result<bool, StoreError> {
        let released = self
            .kv
            .delete_if_eq(&self.keys.job_lock(&token.job_id), &token.token)
            .await?;
        if !released {
            debug!(job = %token.job_id, "Lock already expired or held elsewhere");
        }
        Ok(released)
    }
}

//! Namespaced key construction for the shared store.
//!
//! Layout, all under a configurable namespace prefix:
//! - `{ns}:job_def:{id}`            static + runtime job fields
//! - `{ns}:job_status:{id}`         transient status + timestamp
//! - `{ns}:job_lock:{id}`           lock token, TTL-bounded
//! - `{ns}:job_result:{id}:{epoch}` one history record, retention TTL
//! - `{ns}:job_result:latest:{id}`  most recent record, no TTL

use crate::error::StoreError;

/// Key builder bound to one namespace.
#[derive(Debug, Clone)]
pub struct KeySpace {
    namespace: String,
}

impl KeySpace {
    pub fn new(namespace: impl Into<String>) -> Result<Self, StoreError> {
        let namespace = namespace.into();
        if namespace.is_empty() || namespace.contains(':') {
            return Err(StoreError::Key(format!(
                "invalid namespace: {:?}",
                namespace
            )));
        }
        Ok(Self { namespace })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn job_def(&self, job_id: &str) -> String {
        format!("{}:job_def:{}", self.namespace, job_id)
    }

    pub fn job_def_prefix(&self) -> String {
        format!("{}:job_def:", self.namespace)
    }

    pub fn job_status(&self, job_id: &str) -> String {
        format!("{}:job_status:{}", self.namespace, job_id)
    }

    pub fn job_lock(&self, job_id: &str) -> String {
        format!("{}:job_lock:{}", self.namespace, job_id)
    }

    pub fn job_result(&self, job_id: &str, epoch_seconds: i64) -> String {
        format!("{}:job_result:{}:{}", self.namespace, job_id, epoch_seconds)
    }

    pub fn latest_result(&self, job_id: &str) -> String {
        format!("{}:job_result:latest:{}", self.namespace, job_id)
    }

    /// Prefix matching every history record of one job.
    pub fn result_prefix(&self, job_id: &str) -> String {
        format!("{}:job_result:{}:", self.namespace, job_id)
    }

    /// Extract the epoch suffix from a history key produced by
    /// [`KeySpace::job_result`]. Returns `None` for foreign keys.
    pub fn parse_result_epoch(&self, key: &str, job_id: &str) -> Option<i64> {
        key.strip_prefix(&self.result_prefix(job_id))?
            .parse::<i64>()
            .ok()
    }

    /// Extract the job id from a `job_def` key.
    pub fn parse_job_def_id<'a>(&self, key: &'a str) -> Option<&'a str> {
        let rest = key.strip_prefix(&self.namespace)?;
        rest.strip_prefix(":job_def:")
    }
}

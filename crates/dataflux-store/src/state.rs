//! Best-effort persistence of job definitions and transient statuses.
//!
//! These records exist for observability across processes (the daemon's
//! read-only `jobs` queries read them); the in-memory registry remains the
//! source of truth inside the owning scheduler. Write failures are the
//! caller's to log and swallow.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use dataflux_types::{JobSpec, JobState, JobStatus};

use crate::error::StoreError;
use crate::keys::KeySpace;
use crate::kv::KvStore;

/// Persisted form of a registered job: static spec plus runtime fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedJob {
    #[serde(flatten)]
    pub spec: JobSpec,
    #[serde(flatten)]
    pub state: JobState,
}

/// Transient per-job status marker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusRecord {
    pub job_id: String,
    pub status: JobStatus,
    pub timestamp: DateTime<Utc>,
}

pub struct JobStateStore {
    kv: Arc<dyn KvStore>,
    keys: KeySpace,
}

impl JobStateStore {
    pub fn new(kv: Arc<dyn KvStore>, keys: KeySpace) -> Self {
        Self { kv, keys }
    }

    /// Write the full definition record for a job.
    pub async fn save_definition(
        &self,
        spec: &JobSpec,
        state: &JobState,
    ) -> Result<(), StoreError> {
        let record = PersistedJob {
            spec: spec.clone(),
            state: state.clone(),
        };
        let encoded = serde_json::to_string(&record)?;
        self.kv.set(&self.keys.job_def(&spec.job_id), &encoded).await
    }

    pub async fn load_definition(&self, job_id: &str) -> Result<Option<PersistedJob>, StoreError> {
        match self.kv.get(&self.keys.job_def(job_id)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn delete_definition(&self, job_id: &str) -> Result<bool, StoreError> {
        self.kv.delete(&self.keys.job_def(job_id)).await
    }

    /// Ids of every persisted job definition.
    pub async fn list_job_ids(&self) -> Result<Vec<String>, StoreError> {
        let keys = self.kv.keys_with_prefix(&self.keys.job_def_prefix()).await?;
        let mut ids: Vec<String> = keys
            .iter()
            .filter_map(|k| self.keys.parse_job_def_id(k))
            .map(str::to_string)
            .collect();
        ids.sort();
        Ok(ids)
    }

    /// Write the transient status marker for a job.
    pub async fn save_status(
        &self,
        job_id: &str,
        status: JobStatus,
        timestamp: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let record = StatusRecord {
            job_id: job_id.to_string(),
            status,
            timestamp,
        };
        let encoded = serde_json::to_string(&record)?;
        self.kv.set(&self.keys.job_status(job_id), &encoded).await
    }

    pub async fn load_status(&self, job_id: &str) -> Result<Option<StatusRecord>, StoreError> {
        match self.kv.get(&self.keys.job_status(job_id)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }
}

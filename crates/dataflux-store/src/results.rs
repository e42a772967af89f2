//! Execution result persistence.
//!
//! Every finalized attempt is written twice: a timestamped history record
//! that expires after the retention window, and the per-job "latest"
//! pointer that is overwritten on each run and never expires. The latest
//! pointer is what dependency resolution reads.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use dataflux_types::JobResult;

use crate::error::StoreError;
use crate::keys::KeySpace;
use crate::kv::KvStore;

pub struct ResultStore {
    kv: Arc<dyn KvStore>,
    keys: KeySpace,
    retention: Duration,
}

impl ResultStore {
    pub fn new(kv: Arc<dyn KvStore>, keys: KeySpace, retention: Duration) -> Self {
        Self { kv, keys, retention }
    }

    /// Persist a finalized result: history entry with retention TTL, then
    /// the latest pointer.
    pub async fn record(&self, result: &JobResult) -> Result<(), StoreError> {
        let encoded = serde_json::to_string(result)?;
        let history_key = self.keys.job_result(&result.job_id, result.epoch_seconds());
        self.kv
            .set_with_ttl(&history_key, &encoded, self.retention)
            .await?;
        self.kv
            .set(&self.keys.latest_result(&result.job_id), &encoded)
            .await?;
        Ok(())
    }

    /// Most recent result for a job, if it ever ran.
    pub async fn get_latest(&self, job_id: &str) -> Result<Option<JobResult>, StoreError> {
        let raw = self.kv.get(&self.keys.latest_result(job_id)).await?;
        match raw {
            Some(s) => Ok(Some(serde_json::from_str(&s)?)),
            None => Ok(None),
        }
    }

    /// Up to `limit` history records, newest first.
    pub async fn get_history(
        &self,
        job_id: &str,
        limit: usize,
    ) -> Result<Vec<JobResult>, StoreError> {
        let prefix = self.keys.result_prefix(job_id);
        let keys = self.kv.keys_with_prefix(&prefix).await?;

        let mut epochs: Vec<i64> = keys
            .iter()
            .filter_map(|k| self.keys.parse_result_epoch(k, job_id))
            .collect();
        epochs.sort_unstable_by(|a, b| b.cmp(a));
        epochs.truncate(limit);

        let mut results = Vec::with_capacity(epochs.len());
        for epoch in epochs {
            let key = self.keys.job_result(job_id, epoch);
            match self.kv.get(&key).await? {
                Some(raw) => match serde_json::from_str(&raw) {
                    Ok(result) => results.push(result),
                    Err(e) => warn!(job = %job_id, key = %key, "Skipping undecodable history record: {}", e),
                },
                // Expired between listing and fetch.
                None => continue,
            }
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryKv;
    use chrono::{DateTime, TimeZone, Utc};
    use dataflux_types::JobStatus;

    fn store(kv: Arc<dyn KvStore>) -> ResultStore {
        ResultStore::new(
            kv,
            KeySpace::new("dataflux").unwrap(),
            Duration::from_secs(30 * 24 * 3600),
        )
    }

    fn result_at(job_id: &str, start: DateTime<Utc>, ok: bool) -> JobResult {
        let running = JobResult::running(job_id, start);
        if ok {
            running.completed(Some(serde_json::json!({"count": 5})), start, 100)
        } else {
            running.failed("boom", start, 100)
        }
    }

    #[tokio::test]
    async fn test_latest_overwritten_per_run() {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKv::new());
        let s = store(kv);

        let t1 = Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2025, 6, 1, 10, 5, 0).unwrap();

        s.record(&result_at("crypto_quotes", t1, true)).await.unwrap();
        s.record(&result_at("crypto_quotes", t2, false)).await.unwrap();

        let latest = s.get_latest("crypto_quotes").await.unwrap().unwrap();
        assert_eq!(latest.status, JobStatus::Failed);
        assert_eq!(latest.start_time, t2);
    }

    #[tokio::test]
    async fn test_get_latest_absent() {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKv::new());
        let s = store(kv);
        assert!(s.get_latest("never_ran").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_history_newest_first_with_limit() {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKv::new());
        let s = store(kv);

        for minute in 0..5 {
            let t = Utc.with_ymd_and_hms(2025, 6, 1, 10, minute, 0).unwrap();
            s.record(&result_at("forex_quotes", t, true)).await.unwrap();
        }

        let history = s.get_history("forex_quotes", 3).await.unwrap();
        assert_eq!(history.len(), 3);
        assert!(history[0].start_time > history[1].start_time);
        assert!(history[1].start_time > history[2].start_time);
        assert_eq!(
            history[0].start_time,
            Utc.with_ymd_and_hms(2025, 6, 1, 10, 4, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn test_history_isolated_per_job() {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKv::new());
        let s = store(kv);

        let t = Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap();
        s.record(&result_at("a", t, true)).await.unwrap();
        s.record(&result_at("b", t, true)).await.unwrap();

        let history = s.get_history("a", 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].job_id, "a");
    }

    #[tokio::test(start_paused = true)]
    async fn test_history_expires_latest_survives() {
        let kv: Arc<dyn KvStore> = Arc::new(MemoryKv::new());
        let s = ResultStore::new(
            kv,
            KeySpace::new("dataflux").unwrap(),
            Duration::from_secs(60),
        );

        let t = Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap();
        s.record(&result_at("esg_collection", t, true)).await.unwrap();

        tokio::time::advance(Duration::from_secs(61)).await;

        assert!(s.get_history("esg_collection", 10).await.unwrap().is_empty());
        // The latest pointer carries no TTL.
        assert!(s.get_latest("esg_collection").await.unwrap().is_some());
    }
}

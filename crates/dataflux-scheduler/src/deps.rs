//! Dependency resolution.
//!
//! A job runs only when every dependency's latest persisted result is
//! completed. An unmet dependency is not an error: the job skips this fire
//! and stays on its regular schedule. The check reads only the "latest"
//! pointer, so a dependency that is mid-run can still pass on its previous
//! completed result.

use std::sync::Arc;

use tracing::{debug, warn};

use dataflux_store::ResultStore;
use dataflux_types::{JobSpec, JobStatus};

pub struct DependencyResolver {
    results: Arc<ResultStore>,
}

impl DependencyResolver {
    pub fn new(results: Arc<ResultStore>) -> Self {
        Self { results }
    }

    /// True when every dependency's latest result is completed. A store
    /// read failure counts as unmet: the job waits for its next fire
    /// rather than running on unknown state.
    pub async fn dependencies_met(&self, spec: &JobSpec) -> bool {
        for dep_id in &spec.dependencies {
            match self.results.get_latest(dep_id).await {
                Ok(Some(result)) if result.status == JobStatus::Completed => {}
                Ok(_) => {
                    debug!(job = %spec.job_id, dependency = %dep_id, "Dependency not completed");
                    return false;
                }
                Err(e) => {
                    warn!(job = %spec.job_id, dependency = %dep_id, "Dependency check failed: {}", e);
                    return false;
                }
            }
        }
        true
    }
}

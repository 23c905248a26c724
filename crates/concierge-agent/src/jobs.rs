//! Job queue orchestration.
//!
//! [`concierge_store::JobStore`] owns persistence and the transition rules;
//! this module layers the operational concerns on top: notifying the user
//! when a job terminates, matching jobs to registered processors, and the
//! poll cycle a tenant worker runs.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use concierge_store::{Job, JobStatus, JobStore, StoreManager, TenantId};

use crate::error::{AgentError, Result};
use crate::notify::{NotificationSink, Severity};

/// Tenant-scoped job operations with terminal-state notifications.
#[derive(Clone)]
pub struct JobQueue {
    stores: StoreManager,
    sink: Arc<dyn NotificationSink>,
}

impl JobQueue {
    /// Create a queue that notifies through `sink`.
    pub fn new(stores: StoreManager, sink: Arc<dyn NotificationSink>) -> Self {
        Self { stores, sink }
    }

    async fn store(&self, tenant: &TenantId) -> Result<JobStore> {
        Ok(JobStore::new(self.stores.database(tenant).await?))
    }

    /// Enqueue a new job in `Pending` state.
    pub async fn enqueue(
        &self,
        tenant: &TenantId,
        subject: &str,
        kind: &str,
        payload: &serde_json::Value,
    ) -> Result<Job> {
        Ok(self.store(tenant).await?.create(subject, kind, payload).await?)
    }

    /// Fetch a job by id.
    pub async fn get(&self, tenant: &TenantId, id: &str) -> Result<Option<Job>> {
        Ok(self.store(tenant).await?.get(id).await?)
    }

    /// Mark a job as picked up by the worker.
    pub async fn start(&self, tenant: &TenantId, id: &str) -> Result<Job> {
        Ok(self.store(tenant).await?.start(id).await?)
    }

    /// Report progress on a running job.
    pub async fn update_progress(
        &self,
        tenant: &TenantId,
        id: &str,
        progress: i64,
        total_steps: Option<i64>,
    ) -> Result<Job> {
        Ok(self
            .store(tenant)
            .await?
            .update_progress(id, progress, total_steps)
            .await?)
    }

    /// Complete a job and notify its subject.
    pub async fn complete(
        &self,
        tenant: &TenantId,
        id: &str,
        result: Option<&serde_json::Value>,
    ) -> Result<Job> {
        let job = self.store(tenant).await?.complete(id, result).await?;
        self.sink
            .notify(
                tenant,
                &job.subject,
                "Job finished",
                &format!("`{}` completed", job.kind),
                Severity::Info,
            )
            .await;
        Ok(job)
    }

    /// Fail a job and notify its subject.
    pub async fn fail(&self, tenant: &TenantId, id: &str, error: &str) -> Result<Job> {
        let job = self.store(tenant).await?.fail(id, error).await?;
        self.sink
            .notify(
                tenant,
                &job.subject,
                "Job failed",
                &format!("`{}` failed: {error}", job.kind),
                Severity::Error,
            )
            .await;
        Ok(job)
    }

    /// The jobs the worker should handle next, interrupted work first.
    pub async fn jobs_to_process(&self, tenant: &TenantId, limit: i64) -> Result<Vec<Job>> {
        Ok(self.store(tenant).await?.jobs_to_process(limit).await?)
    }

    /// Drop terminal jobs past the retention window.
    pub async fn cleanup(&self, tenant: &TenantId) -> Result<usize> {
        Ok(self.store(tenant).await?.cleanup().await?)
    }
}

/// Executes jobs of one kind.
#[async_trait]
pub trait JobProcessor: Send + Sync {
    /// The job kind this processor handles.
    fn kind(&self) -> &str;

    /// Do the work. The returned value becomes the job result; an error
    /// fails the job with the error's message.
    async fn process(&self, tenant: &TenantId, job: &Job) -> Result<serde_json::Value>;
}

/// One worker poll cycle for one tenant: expire old terminal jobs, fetch the
/// next batch, and run each job to a terminal state. Returns the number of
/// jobs handled.
///
/// A job whose kind has no registered processor is failed rather than left
/// to clog the queue.
#[instrument(skip(queue, processors), fields(tenant = %tenant))]
pub async fn run_poll_cycle(
    queue: &JobQueue,
    processors: &[Arc<dyn JobProcessor>],
    tenant: &TenantId,
    batch_limit: i64,
) -> Result<usize> {
    let by_kind: HashMap<&str, &Arc<dyn JobProcessor>> =
        processors.iter().map(|p| (p.kind(), p)).collect();

    let removed = queue.cleanup(tenant).await?;
    if removed > 0 {
        debug!(removed, "expired jobs cleaned up");
    }

    let batch = queue.jobs_to_process(tenant, batch_limit).await?;
    let mut handled = 0;

    for job in batch {
        if job.status == JobStatus::Pending {
            queue.start(tenant, &job.id).await?;
        }

        match by_kind.get(job.kind.as_str()) {
            Some(processor) => match processor.process(tenant, &job).await {
                Ok(result) => {
                    queue.complete(tenant, &job.id, Some(&result)).await?;
                    info!(job_id = %job.id, kind = %job.kind, "job completed");
                }
                Err(e) => {
                    queue.fail(tenant, &job.id, &e.to_string()).await?;
                    warn!(job_id = %job.id, kind = %job.kind, error = %e, "job failed");
                }
            },
            None => {
                let e = AgentError::UnknownJobKind {
                    kind: job.kind.clone(),
                };
                queue.fail(tenant, &job.id, &e.to_string()).await?;
                warn!(job_id = %job.id, kind = %job.kind, "job failed: no processor");
            }
        }
        handled += 1;
    }

    Ok(handled)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

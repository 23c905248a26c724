//! Asynchronous job persistence and state machine.
//!
//! Jobs track tool work that exceeds one conversation round trip. The
//! lifecycle is strictly monotonic:
//!
//! ```text
//! Pending --> Processing --> Completed
//!                       \--> Failed
//! ```
//!
//! Terminal states are immutable. Transitions are guarded in the SQL
//! `WHERE` clause, so a stale caller can never overwrite a terminal row even
//! if its in-memory view of the job is outdated.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::db::Database;
use crate::error::{StoreError, StoreResult};

/// How long a terminal job is retained before [`JobStore::cleanup`] deletes it.
pub const JOB_RETENTION_SECS: i64 = 24 * 60 * 60;

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Created, waiting for a worker.
    Pending,
    /// Picked up by the tenant's worker.
    Processing,
    /// Finished successfully (terminal).
    Completed,
    /// Finished with an error (terminal).
    Failed,
}

impl JobStatus {
    /// Database column value for this status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    fn parse(value: &str) -> StoreResult<Self> {
        match value {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(StoreError::InvalidArgument(format!(
                "unknown job status `{other}`"
            ))),
        }
    }

    /// Whether this status can never change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// A persisted unit of asynchronous work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique identifier (UUID v7, creation-ordered).
    pub id: String,
    /// Owning entity, e.g. the conversation that requested the work.
    pub subject: String,
    /// Job kind, matched against registered processors (e.g.
    /// `diffusion_generate`).
    pub kind: String,
    /// Current lifecycle status.
    pub status: JobStatus,
    /// Input payload handed to the processor.
    pub payload: serde_json::Value,
    /// Result payload, set on completion.
    pub result: Option<serde_json::Value>,
    /// Steps finished so far.
    pub progress: i64,
    /// Total steps expected (0 if unknown).
    pub total_steps: i64,
    /// Error message, set on failure.
    pub error: Option<String>,
    /// Unix timestamp when the job was created.
    pub created_at: i64,
    /// Unix timestamp when processing started.
    pub started_at: Option<i64>,
    /// Unix timestamp when the job reached a terminal state.
    pub completed_at: Option<i64>,
}

/// Persistence and transitions for the `jobs` table of one tenant database.
#[derive(Clone)]
pub struct JobStore {
    db: Database,
}

impl JobStore {
    /// Create a job store backed by `db`.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert a new job in `Pending` state with zero progress and no
    /// timestamps besides `created_at`.
    #[instrument(skip(self, payload))]
    pub async fn create(
        &self,
        subject: &str,
        kind: &str,
        payload: &serde_json::Value,
    ) -> StoreResult<Job> {
        let id = Uuid::now_v7().to_string();
        let subject = subject.to_string();
        let kind = kind.to_string();
        let payload_json = serde_json::to_string(payload)?;
        let now = Utc::now().timestamp();

        let job = Job {
            id: id.clone(),
            subject: subject.clone(),
            kind: kind.clone(),
            status: JobStatus::Pending,
            payload: payload.clone(),
            result: None,
            progress: 0,
            total_steps: 0,
            error: None,
            created_at: now,
            started_at: None,
            completed_at: None,
        };

        self.db
            .execute(move |conn| {
                conn.execute(
                    "INSERT INTO jobs (id, subject, kind, status, payload, progress, total_steps, created_at) \
                     VALUES (?1, ?2, ?3, 'pending', ?4, 0, 0, ?5)",
                    rusqlite::params![id, subject, kind, payload_json, now],
                )?;
                Ok(())
            })
            .await?;

        debug!(job_id = %job.id, kind = %job.kind, "job created");
        Ok(job)
    }

    /// Fetch a job by id, returning `None` if unknown.
    #[instrument(skip(self))]
    pub async fn get(&self, id: &str) -> StoreResult<Option<Job>> {
        let id = id.to_string();
        self.db
            .execute(move |conn| {
                let result = conn.query_row(
                    &format!("{SELECT_JOB} WHERE id = ?1"),
                    rusqlite::params![id],
                    row_to_raw,
                );
                match result {
                    Ok(raw) => Ok(Some(decode(raw)?)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(StoreError::Sqlite(e)),
                }
            })
            .await
    }

    /// Transition `Pending -> Processing` and set `started_at`.
    ///
    /// Rejected with [`StoreError::IllegalTransition`] from any other state.
    #[instrument(skip(self))]
    pub async fn start(&self, id: &str) -> StoreResult<Job> {
        let id_owned = id.to_string();
        let now = Utc::now().timestamp();
        let changed = self
            .db
            .execute(move |conn| {
                let n = conn.execute(
                    "UPDATE jobs SET status = 'processing', started_at = ?2 \
                     WHERE id = ?1 AND status = 'pending'",
                    rusqlite::params![id_owned, now],
                )?;
                Ok(n)
            })
            .await?;

        self.finish_transition(id, JobStatus::Processing, changed).await
    }

    /// Update progress counters. Only legal while `Processing`.
    #[instrument(skip(self))]
    pub async fn update_progress(
        &self,
        id: &str,
        progress: i64,
        total_steps: Option<i64>,
    ) -> StoreResult<Job> {
        let id_owned = id.to_string();
        let changed = self
            .db
            .execute(move |conn| {
                let n = match total_steps {
                    Some(total) => conn.execute(
                        "UPDATE jobs SET progress = ?2, total_steps = ?3 \
                         WHERE id = ?1 AND status = 'processing'",
                        rusqlite::params![id_owned, progress, total],
                    )?,
                    None => conn.execute(
                        "UPDATE jobs SET progress = ?2 \
                         WHERE id = ?1 AND status = 'processing'",
                        rusqlite::params![id_owned, progress],
                    )?,
                };
                Ok(n)
            })
            .await?;

        if changed == 0 {
            return Err(self.explain_rejection(id, JobStatus::Processing).await);
        }

        self.require(id).await
    }

    /// Transition `Processing -> Completed`, persist the result, and set
    /// `completed_at`.
    #[instrument(skip(self, result))]
    pub async fn complete(
        &self,
        id: &str,
        result: Option<&serde_json::Value>,
    ) -> StoreResult<Job> {
        let id_owned = id.to_string();
        let now = Utc::now().timestamp();
        let result_json = result.map(serde_json::to_string).transpose()?;
        let changed = self
            .db
            .execute(move |conn| {
                let n = conn.execute(
                    "UPDATE jobs SET status = 'completed', result = ?2, completed_at = ?3 \
                     WHERE id = ?1 AND status = 'processing'",
                    rusqlite::params![id_owned, result_json, now],
                )?;
                Ok(n)
            })
            .await?;

        self.finish_transition(id, JobStatus::Completed, changed).await
    }

    /// Transition `Processing -> Failed`, persist the error message, and set
    /// `completed_at`.
    #[instrument(skip(self))]
    pub async fn fail(&self, id: &str, error: &str) -> StoreResult<Job> {
        let id_owned = id.to_string();
        let error = error.to_string();
        let now = Utc::now().timestamp();
        let changed = self
            .db
            .execute(move |conn| {
                let n = conn.execute(
                    "UPDATE jobs SET status = 'failed', error = ?2, completed_at = ?3 \
                     WHERE id = ?1 AND status = 'processing'",
                    rusqlite::params![id_owned, error, now],
                )?;
                Ok(n)
            })
            .await?;

        self.finish_transition(id, JobStatus::Failed, changed).await
    }

    /// Jobs the tenant worker should handle next: every `Processing` job
    /// strictly before any `Pending` job, each group ascending by creation
    /// time. A job interrupted mid-processing is therefore resumed before
    /// new work starts.
    ///
    /// `created_at` has one-second granularity, so the id (UUID v7,
    /// creation-ordered) breaks ties between jobs enqueued within the same
    /// second.
    #[instrument(skip(self))]
    pub async fn jobs_to_process(&self, limit: i64) -> StoreResult<Vec<Job>> {
        self.db
            .execute(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "{SELECT_JOB} WHERE status IN ('processing', 'pending') \
                     ORDER BY CASE status WHEN 'processing' THEN 0 ELSE 1 END, \
                     created_at ASC, id ASC \
                     LIMIT ?1"
                ))?;
                let rows = stmt
                    .query_map(rusqlite::params![limit], row_to_raw)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows.into_iter().map(decode).collect()
            })
            .await
    }

    /// Delete terminal jobs whose completion timestamp is older than the
    /// retention window. Returns the number of rows removed.
    #[instrument(skip(self))]
    pub async fn cleanup(&self) -> StoreResult<usize> {
        let cutoff = Utc::now().timestamp() - JOB_RETENTION_SECS;
        let removed = self
            .db
            .execute(move |conn| {
                let n = conn.execute(
                    "DELETE FROM jobs \
                     WHERE status IN ('completed', 'failed') AND completed_at < ?1",
                    rusqlite::params![cutoff],
                )?;
                Ok(n)
            })
            .await?;

        if removed > 0 {
            debug!(removed, "expired terminal jobs removed");
        }
        Ok(removed)
    }

    // ── internals ────────────────────────────────────────────────────

    /// Resolve the outcome of a guarded transition UPDATE: if no row
    /// changed, work out whether the job is missing or the transition was
    /// illegal; otherwise return the fresh row.
    async fn finish_transition(
        &self,
        id: &str,
        to: JobStatus,
        changed: usize,
    ) -> StoreResult<Job> {
        if changed == 0 {
            return Err(self.explain_rejection(id, to).await);
        }

        let job = self.require(id).await?;
        debug!(job_id = %job.id, status = job.status.as_str(), "job transitioned");
        Ok(job)
    }

    /// Build the precise error for a rejected transition.
    async fn explain_rejection(&self, id: &str, to: JobStatus) -> StoreError {
        match self.get(id).await {
            Ok(Some(job)) => StoreError::IllegalTransition {
                id: id.to_string(),
                from: job.status.as_str(),
                to: to.as_str(),
            },
            Ok(None) => StoreError::NotFound {
                entity: "job",
                id: id.to_string(),
            },
            Err(e) => e,
        }
    }

    async fn require(&self, id: &str) -> StoreResult<Job> {
        self.get(id).await?.ok_or(StoreError::NotFound {
            entity: "job",
            id: id.to_string(),
        })
    }
}

const SELECT_JOB: &str = "SELECT id, subject, kind, status, payload, result, progress, \
                          total_steps, error, created_at, started_at, completed_at FROM jobs";

/// Intermediate row with JSON columns still serialized.
struct RawJob {
    id: String,
    subject: String,
    kind: String,
    status: String,
    payload: String,
    result: Option<String>,
    progress: i64,
    total_steps: i64,
    error: Option<String>,
    created_at: i64,
    started_at: Option<i64>,
    completed_at: Option<i64>,
}

fn row_to_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawJob> {
    Ok(RawJob {
        id: row.get(0)?,
        subject: row.get(1)?,
        kind: row.get(2)?,
        status: row.get(3)?,
        payload: row.get(4)?,
        result: row.get(5)?,
        progress: row.get(6)?,
        total_steps: row.get(7)?,
        error: row.get(8)?,
        created_at: row.get(9)?,
        started_at: row.get(10)?,
        completed_at: row.get(11)?,
    })
}

fn decode(raw: RawJob) -> StoreResult<Job> {
    Ok(Job {
        status: JobStatus::parse(&raw.status)?,
        payload: serde_json::from_str(&raw.payload)?,
        result: raw.result.as_deref().map(serde_json::from_str).transpose()?,
        id: raw.id,
        subject: raw.subject,
        kind: raw.kind,
        progress: raw.progress,
        total_steps: raw.total_steps,
        error: raw.error,
        created_at: raw.created_at,
        started_at: raw.started_at,
        completed_at: raw.completed_at,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn store() -> JobStore {
        JobStore::new(Database::open_in_memory().unwrap())
    }

    #[tokio::test]
    async fn create_yields_pending_with_no_timestamps() {
        let store = store().await;
        let job = store
            .create("conv-1", "diffusion_generate", &json!({"prompt": "a cat"}))
            .await
            .unwrap();

        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.progress, 0);
        assert_eq!(job.total_steps, 0);
        assert!(job.started_at.is_none());
        assert!(job.completed_at.is_none());
        assert!(job.result.is_none());
        assert!(job.error.is_none());
    }

    #[tokio::test]
    async fn start_sets_started_at_and_rejects_non_pending() {
        let store = store().await;
        let job = store.create("s", "k", &json!({})).await.unwrap();

        let started = store.start(&job.id).await.unwrap();
        assert_eq!(started.status, JobStatus::Processing);
        assert!(started.started_at.is_some());

        // Starting twice is illegal.
        let err = store.start(&job.id).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::IllegalTransition { from: "processing", to: "processing", .. }
        ));
    }

    #[tokio::test]
    async fn start_unknown_job_is_not_found() {
        let store = store().await;
        let err = store.start("no-such-job").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn progress_only_while_processing() {
        let store = store().await;
        let job = store.create("s", "k", &json!({})).await.unwrap();

        // Pending: rejected.
        assert!(store.update_progress(&job.id, 1, None).await.is_err());

        store.start(&job.id).await.unwrap();
        let updated = store.update_progress(&job.id, 3, Some(10)).await.unwrap();
        assert_eq!(updated.progress, 3);
        assert_eq!(updated.total_steps, 10);

        store.complete(&job.id, None).await.unwrap();
        assert!(store.update_progress(&job.id, 9, None).await.is_err());
    }

    #[tokio::test]
    async fn terminal_states_are_immutable() {
        let store = store().await;
        let job = store.create("s", "k", &json!({})).await.unwrap();
        store.start(&job.id).await.unwrap();
        let done = store.complete(&job.id, Some(&json!({"url": "x"}))).await.unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        assert!(done.completed_at.is_some());
        assert_eq!(done.result, Some(json!({"url": "x"})));

        let err = store.fail(&job.id, "boom").await.unwrap_err();
        assert!(matches!(err, StoreError::IllegalTransition { from: "completed", .. }));

        let err = store.complete(&job.id, None).await.unwrap_err();
        assert!(matches!(err, StoreError::IllegalTransition { .. }));
    }

    #[tokio::test]
    async fn fail_persists_error() {
        let store = store().await;
        let job = store.create("s", "k", &json!({})).await.unwrap();
        store.start(&job.id).await.unwrap();

        let failed = store.fail(&job.id, "endpoint unreachable").await.unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("endpoint unreachable"));
        assert!(failed.completed_at.is_some());
    }

    #[tokio::test]
    async fn jobs_to_process_orders_processing_before_pending() {
        let store = store().await;

        let first_pending = store.create("s", "k", &json!({"n": 1})).await.unwrap();
        let processing = store.create("s", "k", &json!({"n": 2})).await.unwrap();
        let second_pending = store.create("s", "k", &json!({"n": 3})).await.unwrap();
        store.start(&processing.id).await.unwrap();

        // A terminal job must never appear.
        let done = store.create("s", "k", &json!({"n": 4})).await.unwrap();
        store.start(&done.id).await.unwrap();
        store.complete(&done.id, None).await.unwrap();

        let queue = store.jobs_to_process(10).await.unwrap();
        let ids: Vec<_> = queue.iter().map(|j| j.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                processing.id.as_str(),
                first_pending.id.as_str(),
                second_pending.id.as_str()
            ]
        );
    }

    #[tokio::test]
    async fn same_second_jobs_keep_creation_order() {
        let store = store().await;

        let mut ids = Vec::new();
        for n in 0..3 {
            ids.push(store.create("s", "k", &json!({"n": n})).await.unwrap().id);
        }

        // created_at has one-second granularity; force an exact collision so
        // the id tie-break is what decides the order.
        store
            .db
            .execute(|conn| {
                conn.execute("UPDATE jobs SET created_at = 1000", [])?;
                Ok(())
            })
            .await
            .unwrap();

        let queue = store.jobs_to_process(10).await.unwrap();
        let queued: Vec<_> = queue.iter().map(|j| j.id.clone()).collect();
        assert_eq!(queued, ids);
    }

    #[tokio::test]
    async fn cleanup_removes_only_expired_terminal_jobs() {
        let store = store().await;

        let fresh = store.create("s", "k", &json!({})).await.unwrap();
        store.start(&fresh.id).await.unwrap();
        store.complete(&fresh.id, None).await.unwrap();

        let old = store.create("s", "k", &json!({})).await.unwrap();
        store.start(&old.id).await.unwrap();
        store.fail(&old.id, "old failure").await.unwrap();

        // Backdate the old job past the retention window.
        let old_id = old.id.clone();
        let backdated = Utc::now().timestamp() - JOB_RETENTION_SECS - 60;
        store
            .db
            .execute(move |conn| {
                conn.execute(
                    "UPDATE jobs SET completed_at = ?2 WHERE id = ?1",
                    rusqlite::params![old_id, backdated],
                )?;
                Ok(())
            })
            .await
            .unwrap();

        let removed = store.cleanup().await.unwrap();
        assert_eq!(removed, 1);
        assert!(store.get(&old.id).await.unwrap().is_none());
        assert!(store.get(&fresh.id).await.unwrap().is_some());
    }
}

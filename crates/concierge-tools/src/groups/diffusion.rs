//! Diffusion image-generation group.
//!
//! Generation runs for minutes, so `diffusion_generate` only enqueues a job
//! and reports its id; the tenant worker picks the job up and talks to the
//! diffusion endpoint. `diffusion_status` lets the model poll for the
//! result in a later round trip.

use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use concierge_store::{JobStore, StoreManager, TenantId};

use crate::args;
use crate::definition::ToolDefinition;
use crate::error::{Result, ToolError};
use crate::groups::ToolGroup;
use crate::outcome::{ToolArguments, ToolOutcome};

/// Job kind enqueued by `diffusion_generate`, matched by the worker.
pub const DIFFUSION_JOB_KIND: &str = "diffusion_generate";

/// Asynchronous image generation via the tenant job queue.
pub struct DiffusionGroup {
    stores: StoreManager,
}

impl DiffusionGroup {
    /// Create the group over the given store manager.
    pub fn new(stores: StoreManager) -> Self {
        Self { stores }
    }

    async fn jobs(&self, tenant: &TenantId) -> Result<JobStore> {
        Ok(JobStore::new(self.stores.database(tenant).await?))
    }

    async fn diffusion_generate(
        &self,
        tenant: &TenantId,
        arguments: &ToolArguments,
    ) -> Result<ToolOutcome> {
        let prompt = args::require_str(arguments, "prompt", "diffusion_generate")?.trim();
        if prompt.is_empty() {
            return Ok(ToolOutcome::failure(
                "invalid arguments for `diffusion_generate`: `prompt` must not be empty",
            ));
        }
        let negative_prompt = args::opt_str(arguments, "negative_prompt").unwrap_or("");
        // The subject scopes notifications back to whoever asked.
        let subject = args::opt_str(arguments, "conversation_id").unwrap_or(tenant.as_str());

        let payload = json!({
            "prompt": prompt,
            "negative_prompt": negative_prompt,
        });
        let job = self
            .jobs(tenant)
            .await?
            .create(subject, DIFFUSION_JOB_KIND, &payload)
            .await?;
        info!(tenant = %tenant, job_id = %job.id, "diffusion job enqueued");

        Ok(ToolOutcome::success_json(json!({
            "job_id": job.id,
            "status": job.status,
        })))
    }

    async fn diffusion_status(
        &self,
        tenant: &TenantId,
        arguments: &ToolArguments,
    ) -> Result<ToolOutcome> {
        let job_id = args::require_str(arguments, "job_id", "diffusion_status")?;
        match self.jobs(tenant).await?.get(job_id).await? {
            Some(job) => Ok(ToolOutcome::success_json(json!({
                "job_id": job.id,
                "status": job.status,
                "progress": job.progress,
                "total_steps": job.total_steps,
                "result": job.result,
                "error": job.error,
            }))),
            None => Ok(ToolOutcome::failure(format!("no job with id `{job_id}`"))),
        }
    }
}

#[async_trait]
impl ToolGroup for DiffusionGroup {
    fn group_name(&self) -> &str {
        "diffusion"
    }

    fn tool_definitions(&self) -> Vec<ToolDefinition> {
        vec![
            ToolDefinition::new(
                "diffusion_generate",
                "Generate an image from a text prompt. Returns a job id immediately; \
                 the image is delivered when the job completes.",
                json!({
                    "type": "object",
                    "properties": {
                        "prompt": { "type": "string", "description": "What to draw" },
                        "negative_prompt": { "type": "string", "description": "What to avoid" }
                    },
                    "required": ["prompt"]
                }),
            ),
            ToolDefinition::new(
                "diffusion_status",
                "Check the progress and result of a running image generation job.",
                json!({
                    "type": "object",
                    "properties": {
                        "job_id": { "type": "string", "description": "Id returned by diffusion_generate" }
                    },
                    "required": ["job_id"]
                }),
            ),
        ]
    }

    async fn execute(
        &self,
        tenant: &TenantId,
        name: &str,
        arguments: &ToolArguments,
    ) -> Result<ToolOutcome> {
        match name {
            "diffusion_generate" => self.diffusion_generate(tenant, arguments).await,
            "diffusion_status" => self.diffusion_status(tenant, arguments).await,
            other => Err(ToolError::ExecutionFailed {
                tool_name: other.to_string(),
                reason: "not a member of the diffusion group".into(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

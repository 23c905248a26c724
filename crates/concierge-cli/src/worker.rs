//! The tenant worker: polls the job queue and runs registered processors.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{error, info};

use concierge_agent::jobs::{run_poll_cycle, JobProcessor, JobQueue};
use concierge_agent::{AgentError, Result};
use concierge_store::{Job, TenantId};

use crate::config::{DiffusionConfig, WorkerConfig};

/// Processor for `diffusion_generate` jobs: hands the prompt to an HTTP
/// image generation endpoint and stores the returned image URL.
pub struct DiffusionProcessor {
    endpoint: String,
    http: reqwest::Client,
}

impl DiffusionProcessor {
    /// Create a processor for the configured endpoint.
    pub fn new(config: &DiffusionConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(AgentError::Http)?;
        Ok(Self {
            endpoint: config.endpoint.clone(),
            http,
        })
    }
}

#[async_trait]
impl JobProcessor for DiffusionProcessor {
    fn kind(&self) -> &str {
        "diffusion_generate"
    }

    async fn process(&self, _tenant: &TenantId, job: &Job) -> Result<Value> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(&json!({
                "prompt": job.payload["prompt"],
                "negative_prompt": job.payload["negative_prompt"],
            }))
            .send()
            .await?
            .error_for_status()?;

        let body: Value = response.json().await?;
        let url = body
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| AgentError::InvalidResponse {
                reason: "diffusion endpoint returned no image url".into(),
            })?;

        Ok(json!({
            "url": url,
            "prompt": job.payload["prompt"],
        }))
    }
}

/// Run the poll loop for one tenant until the process is stopped.
///
/// A failed cycle is logged and retried on the next tick; the worker only
/// exits with the process.
pub async fn run_worker(
    queue: JobQueue,
    processors: Vec<Arc<dyn JobProcessor>>,
    tenant: TenantId,
    config: &WorkerConfig,
) {
    let mut ticker = tokio::time::interval(Duration::from_secs(config.poll_interval_secs));
    info!(tenant = %tenant, interval_secs = config.poll_interval_secs, "worker started");

    loop {
        ticker.tick().await;
        match run_poll_cycle(&queue, &processors, &tenant, config.batch_limit).await {
            Ok(0) => {}
            Ok(handled) => info!(tenant = %tenant, handled, "poll cycle finished"),
            Err(e) => error!(tenant = %tenant, error = %e, "poll cycle failed"),
        }
    }
}

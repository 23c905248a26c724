//! Integration tests for the storage crate against on-disk databases.

use serde_json::json;
use tempfile::TempDir;

use concierge_store::{JobStatus, JobStore, StoreManager, TenantId, ToolStore};

#[tokio::test]
async fn on_disk_databases_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let tenant = TenantId::new("alice").unwrap();

    {
        let manager = StoreManager::new(dir.path());
        let db = manager.database(&tenant).await.unwrap();
        let tools = ToolStore::new(db);
        tools
            .register("web_fetch", "Fetch a URL", &json!({"type": "object"}))
            .await
            .unwrap();
    }

    // A fresh manager over the same root sees the same data.
    let manager = StoreManager::new(dir.path());
    let db = manager.database(&tenant).await.unwrap();
    let tools = ToolStore::new(db);
    let listed = tools.list(true).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "web_fetch");
}

#[tokio::test]
async fn job_lifecycle_end_to_end_on_disk() {
    let dir = TempDir::new().unwrap();
    let manager = StoreManager::new(dir.path());
    let tenant = TenantId::new("bob").unwrap();

    let jobs = JobStore::new(manager.database(&tenant).await.unwrap());

    let job = jobs
        .create("conversation-9", "diffusion_generate", &json!({"prompt": "sunset"}))
        .await
        .unwrap();
    assert_eq!(job.status, JobStatus::Pending);

    jobs.start(&job.id).await.unwrap();
    jobs.update_progress(&job.id, 5, Some(20)).await.unwrap();
    let done = jobs
        .complete(&job.id, Some(&json!({"image": "out.png"})))
        .await
        .unwrap();

    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.progress, 5);
    assert_eq!(done.result, Some(json!({"image": "out.png"})));
}

#[tokio::test]
async fn tenants_do_not_share_job_queues() {
    let dir = TempDir::new().unwrap();
    let manager = StoreManager::new(dir.path());
    let alice = TenantId::new("alice").unwrap();
    let bob = TenantId::new("bob").unwrap();

    let alice_jobs = JobStore::new(manager.database(&alice).await.unwrap());
    let bob_jobs = JobStore::new(manager.database(&bob).await.unwrap());

    alice_jobs.create("s", "k", &json!({})).await.unwrap();

    assert_eq!(alice_jobs.jobs_to_process(10).await.unwrap().len(), 1);
    assert!(bob_jobs.jobs_to_process(10).await.unwrap().is_empty());
}

//! Tenant-scoped storage for Concierge.
//!
//! One SQLite database per tenant holds the tool-descriptor catalog, the
//! asynchronous job queue, and the key-value rows used by the memory tool
//! group. [`StoreManager`] hands out per-tenant [`Database`] handles; the
//! typed stores ([`ToolStore`], [`JobStore`], [`KvStore`]) wrap one handle
//! each and are acquired per call.

pub mod db;
pub mod error;
pub mod job_store;
pub mod kv;
pub mod migration;
pub mod tenant;
pub mod tool_store;

pub use db::Database;
pub use error::{StoreError, StoreResult};
pub use job_store::{Job, JobStatus, JobStore, JOB_RETENTION_SECS};
pub use kv::{KvEntry, KvStore};
pub use tenant::{StoreManager, TenantId};
pub use tool_store::{ToolDescriptor, ToolStore};

//! User-facing notifications.
//!
//! The job queue emits a notification when a job reaches a terminal state.
//! Delivery is behind a trait so the CLI can log, a UI can push, and tests
//! can record.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use concierge_store::TenantId;

/// How urgent a notification is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Delivery channel for notifications. `subject` scopes the notification to
/// whoever initiated the work (e.g. a conversation id).
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver one notification.
    async fn notify(
        &self,
        tenant: &TenantId,
        subject: &str,
        title: &str,
        message: &str,
        severity: Severity,
    );
}

/// Sink that writes notifications to the log. The default for headless
/// deployments.
pub struct TracingSink;

#[async_trait]
impl NotificationSink for TracingSink {
    async fn notify(
        &self,
        tenant: &TenantId,
        subject: &str,
        title: &str,
        message: &str,
        severity: Severity,
    ) {
        match severity {
            Severity::Info => {
                info!(tenant = %tenant, subject, title, message, "notification")
            }
            Severity::Warning => {
                warn!(tenant = %tenant, subject, title, message, "notification")
            }
            Severity::Error => {
                error!(tenant = %tenant, subject, title, message, "notification")
            }
        }
    }
}

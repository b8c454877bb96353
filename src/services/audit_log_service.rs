use std::sync::Arc;

use crate::database::AuditStore;
use crate::types::{AuditStatus, ResetAuditRecord, ResetStep};

/// Fire-and-forget writer over the audit store. Store failures are reported
/// to the operational log and never reach the caller.
#[derive(Clone)]
pub struct AuditLogService {
    store: Arc<dyn AuditStore>,
}

impl AuditLogService {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    pub async fn append(&self, record: ResetAuditRecord) {
        if let Err(e) = self.store.append(&record).await {
            tracing::error!(
                username = %record.username,
                server = %record.server_ip,
                status = record.status.as_str(),
                "Failed to write audit record: {}",
                e
            );
        }
    }

    /// Writer bound to one request's username and server
    pub fn for_request<'a>(&'a self, username: &'a str, server_ip: &'a str) -> RequestAudit<'a> {
        RequestAudit { service: self, username, server_ip }
    }
}

pub struct RequestAudit<'a> {
    service: &'a AuditLogService,
    username: &'a str,
    server_ip: &'a str,
}

impl RequestAudit<'_> {
    pub async fn pending(&self, message: &str) {
        self.record(AuditStatus::Pending, message).await;
    }

    pub async fn succeeded(&self, message: &str) {
        self.record(AuditStatus::Succeeded, message).await;
    }

    /// `reason` is the operator-facing detail, `message` the public summary
    pub async fn failed(&self, step: ResetStep, reason: impl Into<String>, message: &str) {
        self.record(AuditStatus::FailedAt(step, reason.into()), message).await;
    }

    async fn record(&self, status: AuditStatus, message: &str) {
        self.service
            .append(ResetAuditRecord::new(self.username, self.server_ip, status, message))
            .await;
    }
}

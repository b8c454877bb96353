//! Application state shared by all handlers

use std::sync::Arc;

use crate::config::TargetConfig;
use crate::database::{AuditStore, CredentialGateway};
use crate::email::EmailSender;
use crate::services::{AuditLogService, PasswordResetService, ResetSettings};

pub struct AppState {
    pub reset_service: PasswordResetService,
    pub audit_store: Arc<dyn AuditStore>,
}

impl AppState {
    pub fn new(
        gateway: Arc<dyn CredentialGateway>,
        audit_store: Arc<dyn AuditStore>,
        email_sender: Arc<dyn EmailSender>,
        target: &TargetConfig,
    ) -> Self {
        Self::with_settings(gateway, audit_store, email_sender, ResetSettings::from_config(target))
    }

    pub fn with_settings(
        gateway: Arc<dyn CredentialGateway>,
        audit_store: Arc<dyn AuditStore>,
        email_sender: Arc<dyn EmailSender>,
        settings: ResetSettings,
    ) -> Self {
        let audit = AuditLogService::new(Arc::clone(&audit_store));
        Self {
            reset_service: PasswordResetService::new(gateway, audit, email_sender, settings),
            audit_store,
        }
    }
}

//! Password reset pipeline: validate the caller, then apply the new password
//! to the primary server and each related replica in discovery order.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use crate::config::TargetConfig;
use crate::database::{CredentialGateway, GatewayError};
use crate::email::EmailSender;
use crate::services::audit_log_service::{AuditLogService, RequestAudit};
use crate::types::{
    CredentialPolicy, PasswordResetRequest, ResetCommand, ResetStep, TargetCredentials,
};

pub const SUCCESS_MESSAGE: &str = "Password updated successfully";

/// Outcome classes returned to the caller. Messages are safe to expose;
/// the underlying detail only goes to the audit log.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResetError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InternalError(String),
}

/// Policy knobs for applying the reset on target servers
#[derive(Clone)]
pub struct ResetSettings {
    pub credential_policy: CredentialPolicy,
    pub admin_credentials: TargetCredentials,
    pub disable_policy: bool,
    pub disable_expiration: bool,
    pub verify_old_password: bool,
    pub call_timeout: Duration,
}

impl ResetSettings {
    pub fn from_config(target: &TargetConfig) -> Self {
        Self {
            credential_policy: target.credential_policy,
            admin_credentials: TargetCredentials {
                username: target.admin_user.clone(),
                password: target.admin_password.clone(),
                database: None,
            },
            disable_policy: target.disable_policy,
            disable_expiration: target.disable_expiration,
            verify_old_password: target.verify_old_password,
            call_timeout: target.call_timeout(),
        }
    }

    /// Connecting with the caller's login is only sound once the old password is proven
    fn requires_old_password_check(&self) -> bool {
        self.verify_old_password || self.credential_policy == CredentialPolicy::UseCallerCredentials
    }
}

pub struct PasswordResetService {
    gateway: Arc<dyn CredentialGateway>,
    audit: AuditLogService,
    email_sender: Arc<dyn EmailSender>,
    settings: ResetSettings,
}

impl PasswordResetService {
    pub fn new(
        gateway: Arc<dyn CredentialGateway>,
        audit: AuditLogService,
        email_sender: Arc<dyn EmailSender>,
        settings: ResetSettings,
    ) -> Self {
        Self { gateway, audit, email_sender, settings }
    }

    pub fn audit(&self) -> &AuditLogService {
        &self.audit
    }

    /// Run the full pipeline for one request
    pub async fn reset_password(&self, request: &PasswordResetRequest) -> Result<String, ResetError> {
        let span = tracing::info_span!(
            "password_reset",
            request_id = %Uuid::new_v4(),
            username = %request.username,
            server = %request.server_ip,
        );
        self.run(request).instrument(span).await
    }

    async fn run(&self, request: &PasswordResetRequest) -> Result<String, ResetError> {
        let audit = self.audit.for_request(&request.username, &request.server_ip);

        audit.pending("Password update request received").await;
        info!("Password update request received");

        if let Err(reason) = request.validate() {
            return Err(fail(&audit, ResetStep::InputValidated, &reason, ResetError::BadRequest(reason.clone())).await);
        }

        match self
            .bounded(
                "validate_credentials",
                self.gateway
                    .validate_credentials(&request.username, &request.server_ip, &request.email),
            )
            .await
        {
            Ok(true) => audit.pending("User credentials validated").await,
            Ok(false) => {
                return Err(fail(
                    &audit,
                    ResetStep::CredentialsValidated,
                    "username, server and email do not match",
                    ResetError::Unauthorized("Invalid user credentials".into()),
                )
                .await)
            }
            Err(e) => {
                return Err(fail(
                    &audit,
                    ResetStep::CredentialsValidated,
                    &e.to_string(),
                    ResetError::InternalError("Failed to validate user credentials".into()),
                )
                .await)
            }
        }

        if !request.passwords_distinct() {
            return Err(fail(
                &audit,
                ResetStep::PasswordsDistinct,
                "New password is the same as old password",
                ResetError::BadRequest("New password cannot be the same as the old password".into()),
            )
            .await);
        }

        match self
            .bounded(
                "check_login_expiration",
                self.gateway
                    .check_login_expiration(&request.username, &request.server_ip),
            )
            .await
        {
            Ok(status) if status.is_usable() => audit.pending("Login is valid").await,
            Ok(status) => {
                return Err(fail(
                    &audit,
                    ResetStep::LoginUsable,
                    &format!("is_valid={}, is_expired={}", status.is_valid, status.is_expired),
                    ResetError::Unauthorized("Login is invalid or expired".into()),
                )
                .await)
            }
            // Unknown logins look the same as expired ones to the caller
            Err(e @ GatewayError::LoginNotFound { .. }) => {
                return Err(fail(
                    &audit,
                    ResetStep::LoginUsable,
                    &e.to_string(),
                    ResetError::Unauthorized("Login is invalid or expired".into()),
                )
                .await)
            }
            Err(e) => {
                return Err(fail(
                    &audit,
                    ResetStep::LoginUsable,
                    &e.to_string(),
                    ResetError::InternalError("Failed to check login expiration".into()),
                )
                .await)
            }
        }

        if self.settings.requires_old_password_check() {
            match self
                .bounded(
                    "verify_old_password",
                    self.gateway.verify_old_password(
                        &request.username,
                        &request.server_ip,
                        &request.old_password,
                        &request.database,
                    ),
                )
                .await
            {
                Ok(true) => audit.pending("Old password confirmed").await,
                Ok(false) => {
                    return Err(fail(
                        &audit,
                        ResetStep::OldPasswordConfirmed,
                        "authentication with old password rejected",
                        ResetError::Unauthorized("Old password is invalid".into()),
                    )
                    .await)
                }
                Err(e) => {
                    return Err(fail(
                        &audit,
                        ResetStep::OldPasswordConfirmed,
                        &e.to_string(),
                        ResetError::InternalError("Failed to check old password".into()),
                    )
                    .await)
                }
            }
        }

        let replicas = match self
            .bounded(
                "find_related_servers",
                self.gateway.find_related_servers(&request.server_ip),
            )
            .await
        {
            Ok(replicas) => {
                info!("Found {} related server(s)", replicas.len());
                audit
                    .pending(&format!("Found {} related server(s)", replicas.len()))
                    .await;
                replicas
            }
            Err(e) => {
                return Err(fail(
                    &audit,
                    ResetStep::ReplicasDiscovered,
                    &e.to_string(),
                    ResetError::InternalError("Failed to find related servers".into()),
                )
                .await)
            }
        };

        let credentials = self.target_credentials(request);
        let command = ResetCommand {
            login: &request.username,
            new_password: &request.new_password,
            disable_policy: self.settings.disable_policy,
            disable_expiration: self.settings.disable_expiration,
        };

        if let Err(e) = self
            .bounded(
                "reset_password",
                self.gateway
                    .reset_password(&request.server_ip, command, &credentials),
            )
            .await
        {
            return Err(fail(
                &audit,
                ResetStep::PrimaryUpdated,
                &e.to_string(),
                ResetError::InternalError("Failed to update password on the server".into()),
            )
            .await);
        }
        info!("Password updated on primary server");
        audit.pending("Password updated on primary server").await;

        let total = replicas.len();
        for (index, replica) in replicas.iter().enumerate() {
            if let Err(e) = self
                .bounded(
                    "reset_password",
                    self.gateway.reset_password(replica, command, &credentials),
                )
                .await
            {
                let skipped = total - index - 1;
                if skipped > 0 {
                    warn!("Skipping {} remaining related server(s) after failure on {}", skipped, replica);
                }
                return Err(fail(
                    &audit,
                    ResetStep::ReplicasUpdated,
                    &format!("related server {} ({} of {}): {}", replica, index + 1, total, e),
                    ResetError::InternalError("Failed to update password on a related server".into()),
                )
                .await);
            }
            info!("Password updated on related server {}", replica);
            audit
                .pending(&format!("Password updated on related server {}", replica))
                .await;
        }

        audit.succeeded(SUCCESS_MESSAGE).await;
        info!("Password updated successfully on {} server(s)", total + 1);

        self.send_confirmation(&request.email, &request.username);

        Ok(SUCCESS_MESSAGE.to_string())
    }

    fn target_credentials(&self, request: &PasswordResetRequest) -> TargetCredentials {
        match self.settings.credential_policy {
            CredentialPolicy::UseAdminCredentials => self.settings.admin_credentials.clone(),
            CredentialPolicy::UseCallerCredentials => TargetCredentials {
                username: request.username.clone(),
                password: request.old_password.clone(),
                database: Some(request.database.clone()),
            },
        }
    }

    /// Apply the per-call deadline to one gateway round trip
    async fn bounded<T, F>(&self, operation: &'static str, call: F) -> Result<T, GatewayError>
    where
        F: Future<Output = Result<T, GatewayError>>,
    {
        let timeout = self.settings.call_timeout;
        match tokio::time::timeout(timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout { operation, timeout }),
        }
    }

    /// Detached and best effort: the response never waits on the relay, and
    /// failures are only logged.
    fn send_confirmation(&self, email: &str, username: &str) {
        let sender = Arc::clone(&self.email_sender);
        let (to, user) = (email.to_string(), username.to_string());
        let span = tracing::Span::current();

        tokio::task::spawn_blocking(move || {
            let _entered = span.enter();
            match sender.send_reset_confirmation(&to, &user) {
                Ok(()) => info!("Confirmation email sent"),
                Err(e) => warn!("Failed to send confirmation email: {}", e),
            }
        });
    }
}

async fn fail(audit: &RequestAudit<'_>, step: ResetStep, reason: &str, error: ResetError) -> ResetError {
    warn!(step = %step, "Password reset failed: {}", reason);
    audit.failed(step, reason, &error.to_string()).await;
    error
}

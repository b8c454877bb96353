pub mod audit_log_service;
pub mod password_reset_service;

pub use audit_log_service::{AuditLogService, RequestAudit};
pub use password_reset_service::{PasswordResetService, ResetError, ResetSettings, SUCCESS_MESSAGE};

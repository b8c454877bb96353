//! Console-based email sender for development

use super::{confirmation_body, EmailSender, CONFIRMATION_SUBJECT};

/// Email sender that logs instead of delivering
pub struct ConsoleEmailSender;

impl ConsoleEmailSender {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ConsoleEmailSender {
    fn default() -> Self {
        Self::new()
    }
}

impl EmailSender for ConsoleEmailSender {
    fn send_reset_confirmation(&self, email: &str, username: &str) -> Result<(), String> {
        tracing::info!(
            email = %email,
            subject = CONFIRMATION_SUBJECT,
            body = %confirmation_body(username),
            "Confirmation email (console only, SMTP not configured)"
        );
        Ok(())
    }
}

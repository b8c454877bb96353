//! Confirmation email delivery

pub mod console;
pub mod smtp;

pub use console::ConsoleEmailSender;
pub use smtp::SmtpEmailSender;

/// Sends the "password reset succeeded" notice. Blocking; callers run it off the async executor.
pub trait EmailSender: Send + Sync {
    fn send_reset_confirmation(&self, email: &str, username: &str) -> Result<(), String>;
}

pub(crate) const CONFIRMATION_SUBJECT: &str = "DBA Login Password Reset Successful";

pub(crate) fn confirmation_body(username: &str) -> String {
    format!(
        "Hello {},\n\n\
         Your database login password has been successfully reset.\n\n\
         If you did not request this change, contact the DBA team immediately.\n\n\
         Best regards,\nDBA Team",
        username
    )
}

//! SMTP-based email sender

use std::time::Duration;

use lettre::{
    message::header::ContentType,
    transport::smtp::authentication::Credentials,
    Message, SmtpTransport, Transport,
};

use super::{confirmation_body, EmailSender, CONFIRMATION_SUBJECT};
use crate::config::SmtpConfig;

/// Port that speaks TLS from the first byte; anything else negotiates STARTTLS
const IMPLICIT_TLS_PORT: u16 = 465;

pub struct SmtpEmailSender {
    transport: SmtpTransport,
    from_address: String,
}

impl SmtpEmailSender {
    pub fn new(config: &SmtpConfig) -> Result<Self, String> {
        let builder = if config.port == IMPLICIT_TLS_PORT {
            SmtpTransport::relay(&config.host)
        } else {
            SmtpTransport::starttls_relay(&config.host)
        }
        .map_err(|e| format!("Failed to create SMTP transport: {}", e))?;

        let mut builder = builder
            .port(config.port)
            .timeout(Some(Duration::from_secs(config.timeout_secs.max(1))));
        if !config.password.is_empty() {
            builder = builder.credentials(Credentials::new(config.username.clone(), config.password.clone()));
        }

        tracing::info!(host = %config.host, port = config.port, "SMTP transport configured");

        Ok(Self {
            transport: builder.build(),
            from_address: config.from_address.clone(),
        })
    }

    fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<(), String> {
        let from = self
            .from_address
            .parse()
            .map_err(|e| format!("Invalid from address: {}", e))?;

        let to_addr = to
            .parse()
            .map_err(|e| format!("Invalid to address: {}", e))?;

        let email = Message::builder()
            .from(from)
            .to(to_addr)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| format!("Failed to build email: {}", e))?;

        self.transport
            .send(&email)
            .map_err(|e| format!("Failed to send email: {}", e))?;

        Ok(())
    }
}

impl EmailSender for SmtpEmailSender {
    fn send_reset_confirmation(&self, email: &str, username: &str) -> Result<(), String> {
        self.send_email(email, CONFIRMATION_SUBJECT, &confirmation_body(username))?;
        tracing::info!(email = %email, "Confirmation email sent");
        Ok(())
    }
}

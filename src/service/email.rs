//! Outgoing mail service
//!
//! Sends the address-confirmation message after registration. Delivery is
//! fire-and-forget: failures are logged and never fail the caller.

use lettre::{
    message::Mailbox, transport::smtp::authentication::Credentials, AsyncSmtpTransport,
    AsyncTransport, Message, Tokio1Executor,
};

use crate::{config::EmailConfig, Error, Result};

/// Mask an email address for safe logging: `use***@example.com`
fn mask_email(email: &str) -> String {
    match email.find('@') {
        Some(at_pos) => {
            let local = &email[..at_pos];
            let visible: String = local.chars().take(3).collect();
            format!("{}***{}", visible, &email[at_pos..])
        }
        None => "***".to_string(),
    }
}

/// Outgoing mail service
#[derive(Clone)]
pub struct EmailService {
    config: Option<EmailConfig>,
}

impl std::fmt::Debug for EmailService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailService")
            .field("configured", &self.config.is_some())
            .finish()
    }
}

impl EmailService {
    #[must_use]
    pub const fn new(config: Option<EmailConfig>) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    /// Spawn the confirmation mail in the background. Never fails the
    /// registration it accompanies.
    pub fn send_confirmation_in_background(&self, to: String, firstname: String) {
        let service = self.clone();
        tokio::spawn(async move {
            if let Err(e) = service.send_confirmation(&to, &firstname).await {
                tracing::warn!(to = %mask_email(&to), error = %e, "confirmation email failed");
            }
        });
    }

    /// Send the address-confirmation message.
    pub async fn send_confirmation(&self, to: &str, firstname: &str) -> Result<()> {
        let Some(config) = &self.config else {
            tracing::debug!(to = %mask_email(to), "email service not configured, skipping");
            return Ok(());
        };

        let body = format!(
            "Hi {firstname},\n\nWelcome aboard! Please confirm this address by \
             following the link in your profile settings.\n\nIf you didn't sign up, \
             you can ignore this message.",
        );
        let message = self.build_message(config, to, "Confirm your email address", &body)?;

        self.send_message(config, message).await?;
        tracing::info!(to = %mask_email(to), "confirmation email sent");
        Ok(())
    }

    fn build_message(
        &self,
        config: &EmailConfig,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<Message> {
        let from_mailbox: Mailbox = format!("{} <{}>", config.from_name, config.from_email)
            .parse()
            .map_err(|e| Error::Internal(format!("Invalid from address: {e}")))?;
        let to_mailbox: Mailbox = to
            .parse()
            .map_err(|e| Error::ValidationFailed(format!("Invalid email address: {e}")))?;

        Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(subject)
            .body(body.to_string())
            .map_err(|e| Error::Internal(format!("Failed to build email: {e}")))
    }

    async fn send_message(&self, config: &EmailConfig, message: Message) -> Result<()> {
        let creds = Credentials::new(config.smtp_username.clone(), config.smtp_password.clone());

        let transport = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
                .map_err(|e| Error::Internal(format!("Failed to create SMTP transport: {e}")))?
                .credentials(creds)
                .port(config.smtp_port)
                .build()
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
                .credentials(creds)
                .port(config.smtp_port)
                .build()
        };

        transport
            .send(message)
            .await
            .map_err(|e| Error::Internal(format!("Failed to send email: {e}")))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_email() {
        assert_eq!(mask_email("alice@example.com"), "ali***@example.com");
        assert_eq!(mask_email("ab@example.com"), "ab***@example.com");
        assert_eq!(mask_email("garbage"), "***");
    }

    #[test]
    fn test_mask_email_multibyte_local_part() {
        assert_eq!(mask_email("üü@example.com"), "üü***@example.com");
        assert_eq!(mask_email("привет@example.com"), "при***@example.com");
    }

    #[tokio::test]
    async fn test_unconfigured_send_is_a_noop() {
        let service = EmailService::new(None);
        assert!(!service.is_configured());
        assert!(service.send_confirmation("a@b.com", "Alice").await.is_ok());
    }
}

//! Outbound mail. SMTP through lettre when configured, otherwise a mailer that only logs.

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Message},
    transport::smtp::authentication::Credentials,
    SmtpTransport, Transport,
};
use tracing::{info, instrument};

use crate::config::MailConfig;
use crate::errors::ServiceError;

/// A plain-text message ready for delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> Result<(), ServiceError>;
}

/// Delivers mail through an SMTP relay
pub struct SmtpMailer {
    config: MailConfig,
}

impl SmtpMailer {
    pub fn new(config: MailConfig) -> Self {
        Self { config }
    }

    fn build_message(&self, mail: &OutgoingMail) -> Result<Message, ServiceError> {
        Message::builder()
            .from(
                self.config
                    .from_address
                    .parse()
                    .map_err(|e| ServiceError::MailError(format!("Invalid from address: {}", e)))?,
            )
            .to(mail
                .to
                .parse()
                .map_err(|e| ServiceError::MailError(format!("Invalid to address: {}", e)))?)
            .subject(mail.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(mail.body.clone())
            .map_err(|e| ServiceError::MailError(format!("Failed to build email: {}", e)))
    }

    fn transport(&self) -> Result<SmtpTransport, ServiceError> {
        let host = self
            .config
            .smtp_host
            .as_deref()
            .ok_or_else(|| ServiceError::MailError("SMTP host not configured".to_string()))?;

        let transport = match (&self.config.smtp_username, &self.config.smtp_password) {
            (Some(user), Some(pass)) => SmtpTransport::relay(host)
                .map_err(|e| ServiceError::MailError(format!("SMTP relay error: {}", e)))?
                .credentials(Credentials::new(user.clone(), pass.clone()))
                .build(),
            _ => SmtpTransport::builder_dangerous(host).build(),
        };
        Ok(transport)
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    #[instrument(skip(self, mail), fields(to = %mail.to))]
    async fn send(&self, mail: OutgoingMail) -> Result<(), ServiceError> {
        let message = self.build_message(&mail)?;
        let transport = self.transport()?;

        tokio::task::spawn_blocking(move || transport.send(&message))
            .await
            .map_err(|e| ServiceError::InternalError(format!("mail task failed: {}", e)))?
            .map_err(|e| ServiceError::MailError(format!("Failed to send email: {}", e)))?;

        info!(subject = %mail.subject, "email sent");
        Ok(())
    }
}

/// Used when no SMTP host is configured; the message only reaches the logs
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), ServiceError> {
        info!(
            to = %mail.to,
            subject = %mail.subject,
            body = %mail.body,
            "SMTP not configured, email logged instead of sent"
        );
        Ok(())
    }
}

/// Picks the mailer matching the configuration
pub fn mailer_from_config(config: &MailConfig) -> std::sync::Arc<dyn Mailer> {
    if config.smtp_enabled() {
        std::sync::Arc::new(SmtpMailer::new(config.clone()))
    } else {
        std::sync::Arc::new(LogMailer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mail_config(from: &str) -> MailConfig {
        MailConfig {
            smtp_host: Some("smtp.example.com".into()),
            smtp_username: None,
            smtp_password: None,
            from_address: from.into(),
        }
    }

    #[test]
    fn builds_plain_text_message() {
        let mailer = SmtpMailer::new(mail_config("no-reply@environovalab.com"));
        let message = mailer.build_message(&OutgoingMail {
            to: "alice@example.com".into(),
            subject: "Hola".into(),
            body: "cuerpo".into(),
        });
        assert!(message.is_ok());
    }

    #[test]
    fn rejects_invalid_recipient() {
        let mailer = SmtpMailer::new(mail_config("no-reply@environovalab.com"));
        let err = mailer
            .build_message(&OutgoingMail {
                to: "not an address".into(),
                subject: "Hola".into(),
                body: "cuerpo".into(),
            })
            .unwrap_err();
        assert!(matches!(err, ServiceError::MailError(_)));
    }

    #[tokio::test]
    async fn log_mailer_always_succeeds() {
        let mail = OutgoingMail {
            to: "a@x.com".into(),
            subject: "s".into(),
            body: "b".into(),
        };
        assert!(LogMailer.send(mail).await.is_ok());
    }
}

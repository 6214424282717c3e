//! services/api/src/adapters/email.rs
//!
//! This module contains the mail adapter for payment confirmations and overdue
//! notices. It implements the `NotificationService` port from the `core` crate.

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncFileTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use oficina_core::ports::{NotificationService, PortError, PortResult};
use tracing::{info, warn};

use crate::config::{EmailConfig, EmailTransportConfig};

enum MailTransport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    File(AsyncFileTransport<Tokio1Executor>),
    /// No transport configured: messages are only written to the log.
    Log,
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `NotificationService` port using `lettre`.
pub struct EmailNotifier {
    transport: MailTransport,
    from: Mailbox,
}

impl EmailNotifier {
    /// Creates a new `EmailNotifier` from the email section of the configuration.
    pub fn new(config: &EmailConfig) -> PortResult<Self> {
        let from = config
            .from
            .parse::<Mailbox>()
            .map_err(|e| PortError::Unexpected(format!("Invalid MAIL_FROM address: {}", e)))?;

        let transport = match &config.transport {
            EmailTransportConfig::Smtp {
                host,
                port,
                username,
                password,
                use_tls,
            } => {
                if !use_tls {
                    warn!("SMTP TLS is disabled - this is not recommended for production");
                }
                let builder = if *use_tls {
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                        .map_err(|e| PortError::Unexpected(format!("SMTP relay: {}", e)))?
                } else {
                    AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
                };
                let mut builder = builder.port(*port);
                if let (Some(username), Some(password)) = (username, password) {
                    builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
                }
                MailTransport::Smtp(builder.build())
            }
            EmailTransportConfig::File { path } => {
                std::fs::create_dir_all(path).map_err(|e| {
                    PortError::Unexpected(format!("Failed to create {}: {}", path.display(), e))
                })?;
                MailTransport::File(AsyncFileTransport::<Tokio1Executor>::new(path))
            }
            EmailTransportConfig::Log => MailTransport::Log,
        };

        Ok(Self { transport, from })
    }
}

//=========================================================================================
// `NotificationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl NotificationService for EmailNotifier {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> PortResult<()> {
        let to = to
            .trim()
            .parse::<Mailbox>()
            .map_err(|e| PortError::Unexpected(format!("Invalid recipient '{}': {}", to, e)))?;

        if let MailTransport::Log = self.transport {
            info!(%to, subject, "Email transport not configured; logging message only");
            return Ok(());
        }

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| PortError::Unexpected(format!("Failed to build email: {}", e)))?;

        match &self.transport {
            MailTransport::Smtp(smtp) => {
                smtp.send(message)
                    .await
                    .map_err(|e| PortError::Unexpected(format!("SMTP send failed: {}", e)))?;
            }
            MailTransport::File(file) => {
                file.send(message)
                    .await
                    .map_err(|e| PortError::Unexpected(format!("File send failed: {}", e)))?;
            }
            MailTransport::Log => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log_config(from: &str) -> EmailConfig {
        EmailConfig {
            from: from.to_string(),
            transport: EmailTransportConfig::Log,
        }
    }

    #[tokio::test]
    async fn log_transport_accepts_valid_recipients() {
        let notifier = EmailNotifier::new(&log_config("Colegio LB <pagos@colegio.edu.ve>")).unwrap();
        notifier
            .send_email("rep@example.com", "Confirmación de Pago", "Hola")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn invalid_recipient_is_an_error() {
        let notifier = EmailNotifier::new(&log_config("pagos@colegio.edu.ve")).unwrap();
        let result = notifier.send_email("not an address", "s", "b").await;
        assert!(matches!(result, Err(PortError::Unexpected(_))));
    }

    #[test]
    fn invalid_sender_is_rejected() {
        assert!(EmailNotifier::new(&log_config("@@")).is_err());
    }

    #[tokio::test]
    async fn file_transport_writes_messages() {
        let dir = std::env::temp_dir().join(format!("oficina-mail-{}", uuid::Uuid::new_v4()));
        let config = EmailConfig {
            from: "pagos@colegio.edu.ve".to_string(),
            transport: EmailTransportConfig::File { path: dir.clone() },
        };
        let notifier = EmailNotifier::new(&config).unwrap();
        notifier
            .send_email("rep@example.com", "Pago Vencido - Octubre", "El pago de Octubre está vencido.")
            .await
            .unwrap();
        let written = std::fs::read_dir(&dir).unwrap().count();
        assert!(written >= 1);
        let _ = std::fs::remove_dir_all(&dir);
    }
}

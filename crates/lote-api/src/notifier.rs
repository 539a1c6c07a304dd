//! Outbound e-mail notification.
//!
//! Mail settings are captured raw at startup and validated on every
//! dispatch, so a missing value fails that request only.

use std::fmt;

use async_trait::async_trait;
use chrono::Local;
use lettre::{
    Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use lote_types::models::Lote;
use mockall::automock;
use thiserror::Error;
use tracing::debug;

/// Display name used in the From header.
pub const SENDER_NAME: &str = "Gerador de Lotes App";

/// Port that gets implicit TLS; every other port negotiates STARTTLS.
const IMPLICIT_TLS_PORT: u16 = 465;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("RECIPIENTS is not configured")]
    MissingRecipients,

    #[error("RECIPIENTS does not contain any address")]
    NoRecipients,

    #[error("invalid recipient address '{0}'")]
    InvalidRecipient(String),

    #[error("incomplete mail transport settings, missing: {0}")]
    IncompleteTransport(String),

    #[error("invalid EMAIL_SERVER_PORT '{0}'")]
    InvalidPort(String),

    #[error("invalid EMAIL_FROM_ADDRESS '{0}'")]
    InvalidSender(String),
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("failed to build message: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("smtp transport error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// Raw mail settings, as read from the environment.
#[derive(Clone, Default)]
pub struct MailSettings {
    pub recipients: Option<String>,
    pub host: Option<String>,
    pub port: Option<String>,
    pub from_address: Option<String>,
    pub app_password: Option<String>,
}

impl fmt::Debug for MailSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailSettings")
            .field("recipients", &self.recipients)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("from_address", &self.from_address)
            .field("app_password", &self.app_password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Validated SMTP transport settings.
#[derive(Clone, PartialEq, Eq)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub from_address: Address,
    pub app_password: String,
}

impl fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("from_address", &self.from_address)
            .finish_non_exhaustive()
    }
}

impl MailSettings {
    /// Recipients first, then the transport; all four transport values are
    /// required together.
    pub fn validate(&self) -> Result<(Vec<Address>, SmtpConfig), ConfigError> {
        let recipients = parse_recipients(present(&self.recipients).ok_or(ConfigError::MissingRecipients)?)?;

        let missing: Vec<&str> = [
            ("EMAIL_SERVER_HOST", &self.host),
            ("EMAIL_SERVER_PORT", &self.port),
            ("EMAIL_FROM_ADDRESS", &self.from_address),
            ("EMAIL_APP_PASSWORD", &self.app_password),
        ]
        .into_iter()
        .filter(|(_, value)| present(value).is_none())
        .map(|(name, _)| name)
        .collect();

        if !missing.is_empty() {
            return Err(ConfigError::IncompleteTransport(missing.join(", ")));
        }

        let host = present(&self.host).unwrap_or_default().to_string();
        let port_raw = present(&self.port).unwrap_or_default();
        let port = port_raw
            .parse::<u16>()
            .ok()
            .filter(|p| *p != 0)
            .ok_or_else(|| ConfigError::InvalidPort(port_raw.to_string()))?;
        let sender = present(&self.from_address).unwrap_or_default();
        let from_address = sender
            .parse::<Address>()
            .map_err(|_| ConfigError::InvalidSender(sender.to_string()))?;

        Ok((
            recipients,
            SmtpConfig {
                host,
                port,
                from_address,
                app_password: present(&self.app_password).unwrap_or_default().to_string(),
            },
        ))
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn parse_recipients(raw: &str) -> Result<Vec<Address>, ConfigError> {
    let recipients = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<Address>()
                .map_err(|_| ConfigError::InvalidRecipient(s.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if recipients.is_empty() {
        return Err(ConfigError::NoRecipients);
    }

    Ok(recipients)
}

/// A rendered notification, ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub recipients: Vec<Address>,
    pub subject: String,
    pub body: String,
}

impl Notification {
    pub fn for_lote(lote: &Lote, recipients: Vec<Address>) -> Self {
        let or_dash = |value: &Option<String>| value.clone().unwrap_or_else(|| "-".to_string());

        let body = format!(
            "Lote gerado:\n\nNúmero: {}\nRef: {}\nFatura: {}\nProduto: {}\nEmpresa: {}\nData: {}",
            lote.numero_lote,
            or_dash(&lote.referencia),
            or_dash(&lote.numero_fatura),
            or_dash(&lote.nome_produto),
            or_dash(&lote.nome_empresa),
            lote.created_at
                .with_timezone(&Local)
                .format("%d/%m/%Y, %H:%M:%S"),
        );

        Self {
            recipients,
            subject: format!("Notificação de Lote: {}", lote.numero_lote),
            body,
        }
    }
}

/// Single-attempt delivery of one notification. No retries, no queueing.
#[automock]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, transport: &SmtpConfig, message: &Notification) -> Result<(), NotifyError>;
}

/// SMTP delivery through `lettre`; a transport is built per send.
#[derive(Debug, Default, Clone)]
pub struct SmtpNotifier;

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, transport: &SmtpConfig, message: &Notification) -> Result<(), NotifyError> {
        let mut builder = Message::builder()
            .from(Mailbox::new(
                Some(SENDER_NAME.to_string()),
                transport.from_address.clone(),
            ))
            .subject(message.subject.as_str())
            .header(ContentType::TEXT_PLAIN);

        for recipient in &message.recipients {
            builder = builder.to(Mailbox::new(None, recipient.clone()));
        }

        let email = builder.body(message.body.clone())?;

        let relay = if transport.port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&transport.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&transport.host)?
        };

        let mailer = relay
            .port(transport.port)
            .credentials(Credentials::new(
                transport.from_address.to_string(),
                transport.app_password.clone(),
            ))
            .build();

        debug!(
            "Sending '{}' via {}:{} to {} recipient(s)",
            message.subject,
            transport.host,
            transport.port,
            message.recipients.len()
        );
        mailer.send(email).await?;

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use chrono::{TimeZone, Utc};
    use testresult::TestResult;
    use uuid::Uuid;

    use super::*;

    pub(crate) fn configured_mail() -> MailSettings {
        MailSettings {
            recipients: Some("ops@example.com, audit@example.com".into()),
            host: Some("smtp.example.com".into()),
            port: Some("587".into()),
            from_address: Some("lotes@example.com".into()),
            app_password: Some("app-password".into()),
        }
    }

    #[test]
    fn validate_accepts_complete_settings() -> TestResult {
        let (recipients, smtp) = configured_mail().validate()?;

        assert_eq!(recipients.len(), 2);
        assert_eq!(recipients[1].to_string(), "audit@example.com");
        assert_eq!(smtp.port, 587);
        assert_eq!(smtp.from_address.to_string(), "lotes@example.com");

        Ok(())
    }

    #[test]
    fn validate_requires_recipients() {
        let mut settings = configured_mail();
        settings.recipients = None;
        assert_eq!(settings.validate().err(), Some(ConfigError::MissingRecipients));

        settings.recipients = Some(" , ,".into());
        assert_eq!(settings.validate().err(), Some(ConfigError::NoRecipients));

        settings.recipients = Some("not-an-address".into());
        assert_eq!(
            settings.validate().err(),
            Some(ConfigError::InvalidRecipient("not-an-address".into()))
        );
    }

    #[test]
    fn validate_lists_missing_transport_settings() {
        let settings = MailSettings {
            port: None,
            app_password: Some("  ".into()),
            ..configured_mail()
        };

        assert_eq!(
            settings.validate().err(),
            Some(ConfigError::IncompleteTransport(
                "EMAIL_SERVER_PORT, EMAIL_APP_PASSWORD".into()
            ))
        );
    }

    #[test]
    fn validate_rejects_bad_port() {
        let settings = MailSettings {
            port: Some("smtp".into()),
            ..configured_mail()
        };

        assert_eq!(
            settings.validate().err(),
            Some(ConfigError::InvalidPort("smtp".into()))
        );
    }

    #[test]
    fn debug_output_redacts_password() {
        let rendered = format!("{:?}", configured_mail());

        assert!(!rendered.contains("app-password"), "{rendered}");
        assert!(rendered.contains("<redacted>"), "{rendered}");
    }

    #[test]
    fn notification_renders_lote_fields() -> TestResult {
        let created_at = Utc
            .with_ymd_and_hms(2025, 5, 6, 12, 0, 0)
            .single()
            .ok_or("bad timestamp")?;
        let lote = Lote {
            id: Uuid::new_v4(),
            numero_fatura: Some("NF-1".into()),
            nome_produto: Some("Widget".into()),
            nome_empresa: None,
            referencia: None,
            numero_lote: "MP-01234/2025".into(),
            created_at,
            updated_at: created_at,
            email_enviado: false,
            user_id: Uuid::new_v4(),
        };
        let (recipients, _) = configured_mail().validate()?;

        let message = Notification::for_lote(&lote, recipients);

        assert_eq!(message.subject, "Notificação de Lote: MP-01234/2025");
        assert!(message.body.starts_with("Lote gerado:\n\nNúmero: MP-01234/2025\n"));
        assert!(message.body.contains("Ref: -\n"));
        assert!(message.body.contains("Fatura: NF-1\n"));
        assert!(message.body.contains("Produto: Widget\n"));
        assert!(message.body.contains("Empresa: -\n"));
        assert!(message.body.contains("/2025, "), "{}", message.body);
        assert_eq!(message.recipients.len(), 2);

        Ok(())
    }
}

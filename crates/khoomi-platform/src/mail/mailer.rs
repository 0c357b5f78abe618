//! Mail delivery

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::info;

use crate::shared::error::{PlatformError, Result};

/// A fully rendered message addressed to one recipient.
#[derive(Debug, Clone, Copy)]
pub struct Envelope<'a> {
    pub to: &'a str,
    pub subject: &'a str,
    pub text_body: &'a str,
    pub html_body: &'a str,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, envelope: Envelope<'_>) -> Result<()>;
}

/// SMTP delivery over STARTTLS.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &khoomi_config::SmtpConfig) -> Result<Self> {
        let from: Mailbox = config
            .from_address
            .parse()
            .map_err(|_| PlatformError::mail(format!("invalid from address: {}", config.from_address)))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| PlatformError::mail(e.to_string()))?
            .port(config.port);
        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(config.username.clone(), config.password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, envelope: Envelope<'_>) -> Result<()> {
        let to: Mailbox = envelope
            .to
            .parse()
            .map_err(|_| PlatformError::mail(format!("invalid recipient: {}", envelope.to)))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(envelope.subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(envelope.text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(envelope.html_body.to_string()),
                    ),
            )
            .map_err(|e| PlatformError::mail(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| PlatformError::mail(e.to_string()))?;

        info!(to = %envelope.to, subject = %envelope.subject, "Email sent");
        Ok(())
    }
}

/// Logs instead of delivering; used when SMTP is disabled.
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, envelope: Envelope<'_>) -> Result<()> {
        info!(
            to = %envelope.to,
            subject = %envelope.subject,
            body = %envelope.text_body,
            "SMTP disabled, email logged instead of sent"
        );
        Ok(())
    }
}

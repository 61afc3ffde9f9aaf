use anyhow::Context;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment as MailAttachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::email::{Envelope, Transport};

pub const STARTTLS_PORT: u16 = 587;
pub const IMPLICIT_TLS_PORT: u16 = 465;

#[derive(Debug, Clone, PartialEq)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    /// Connect over TLS from the start rather than upgrading with STARTTLS
    pub secure: bool,
    pub user: String,
    pub pass: String,
}

impl SmtpSettings {
    pub fn implicit_tls(&self) -> bool {
        self.secure || self.port == IMPLICIT_TLS_PORT
    }

    /// The settings to try when these fail to verify: STARTTLS on 587 for
    /// an implicit TLS relay, and nothing otherwise.
    pub fn fallback(&self) -> Option<SmtpSettings> {
        self.implicit_tls().then(|| SmtpSettings {
            port: STARTTLS_PORT,
            secure: false,
            ..self.clone()
        })
    }

    fn build(&self) -> anyhow::Result<AsyncSmtpTransport<Tokio1Executor>> {
        let builder = if self.implicit_tls() {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&self.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.host)
        }
        .with_context(|| format!("Invalid SMTP host {}", self.host))?;

        Ok(builder
            .port(self.port)
            .credentials(Credentials::new(self.user.clone(), self.pass.clone()))
            .build())
    }
}

/// Sends mail through an authenticated SMTP relay.
pub struct SmtpTransport {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    settings: SmtpSettings,
}

async fn verify(mailer: &AsyncSmtpTransport<Tokio1Executor>) -> Result<(), String> {
    match mailer.test_connection().await {
        Ok(true) => Ok(()),
        Ok(false) => Err("server did not accept the connection".to_owned()),
        Err(error) => Err(error.to_string()),
    }
}

impl SmtpTransport {
    /// Build the relay and verify it once.
    ///
    /// Hosting providers often block implicit TLS on 465, so if that fails
    /// we retry as STARTTLS on 587 and keep whichever verifies. When neither
    /// does, the configured relay is kept and sends will report the failure.
    pub async fn connect(settings: &SmtpSettings) -> anyhow::Result<Self> {
        let mailer = settings.build()?;

        let verified = verify(&mailer).await;
        let error = match verified {
            Ok(()) => {
                tracing::info!(host = %settings.host, port = settings.port, "SMTP relay verified");
                return Ok(Self { mailer, settings: settings.clone() });
            }
            Err(error) => error,
        };
        tracing::warn!(host = %settings.host, port = settings.port, %error, "SMTP verification failed");

        if let Some(fallback) = settings.fallback() {
            let fallback_mailer = fallback.build()?;

            let verified = verify(&fallback_mailer).await;
            match verified {
                Ok(()) => {
                    tracing::info!(host = %fallback.host, port = STARTTLS_PORT, "SMTP relay verified with STARTTLS");
                    return Ok(Self {
                        mailer: fallback_mailer,
                        settings: fallback,
                    });
                }
                Err(error) => {
                    tracing::warn!(host = %fallback.host, port = STARTTLS_PORT, %error, "STARTTLS fallback failed");
                }
            }
        }

        Ok(Self {
            mailer,
            settings: settings.clone(),
        })
    }

}

pub fn build_message(envelope: &Envelope) -> anyhow::Result<Message> {
    let mut builder = Message::builder()
        .from(envelope.from.parse::<Mailbox>().context("Invalid sender address")?)
        .to(envelope.to.parse::<Mailbox>().context("Invalid recipient address")?)
        .subject(envelope.subject.clone());

    if let Some(reply_to) = &envelope.reply_to {
        builder = builder.reply_to(reply_to.parse::<Mailbox>().context("Invalid reply-to address")?);
    }

    let text = SinglePart::plain(envelope.body.clone());
    let message = match &envelope.attachment {
        Some(attachment) => {
            let content_type = ContentType::parse(&attachment.content_type)
                .map_err(|error| anyhow::anyhow!("Invalid attachment type: {error}"))?;
            builder.multipart(
                MultiPart::mixed().singlepart(text).singlepart(
                    MailAttachment::new(attachment.filename.clone())
                        .body(attachment.content.clone(), content_type),
                ),
            )
        }
        None => builder.singlepart(text),
    };

    message.context("Failed to build email")
}

#[async_trait]
impl Transport for SmtpTransport {
    fn name(&self) -> &'static str {
        "smtp"
    }

    async fn send(&self, envelope: &Envelope) -> anyhow::Result<()> {
        let message = build_message(envelope)?;
        self.mailer
            .send(message)
            .await
            .with_context(|| format!("SMTP relay {} rejected the message", self.settings.host))?;

        Ok(())
    }
}

//! Outgoing email.
//!
//! Messages are askama templates implementing [Email]. The [Mailer] hands
//! each one to its transports in order (the SendGrid API first, then the SMTP
//! relay) and stops at the first that delivers it.

use askama::Template;
use async_trait::async_trait;
use thiserror::Error;

use crate::config::EmailConfig;

pub mod application;
pub mod contact;
pub mod reference;
pub mod sendgrid;
pub mod smtp;

pub use sendgrid::SendGridTransport;
pub use smtp::SmtpTransport;

pub const ORGANIZATION_NAME: &str = "DayTime Hub";

#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

impl Attachment {
    pub fn pdf(filename: String, content: Vec<u8>) -> Self {
        Self {
            filename,
            content_type: "application/pdf".to_owned(),
            content,
        }
    }
}

/// A fully addressed message, ready for a transport.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub to: String,
    pub from: String,
    pub reply_to: Option<String>,
    pub subject: String,
    pub body: String,
    pub attachment: Option<Attachment>,
}

/// One way of delivering an [Envelope].
#[async_trait]
pub trait Transport: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send(&self, envelope: &Envelope) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransportFailure {
    pub transport: &'static str,
    pub error: String,
}

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("{0}")]
    NotConfigured(String),
    #[error("Failed to render email: {0}")]
    Render(#[from] askama::Error),
    #[error("Failed to send email ({})", describe(.0))]
    Failed(Vec<TransportFailure>),
}

fn describe(failures: &[TransportFailure]) -> String {
    failures
        .iter()
        .map(|failure| format!("{}: {}", failure.transport, failure.error))
        .collect::<Vec<_>>()
        .join("; ")
}

/// A message the site sends.
pub trait Email: Template {
    fn subject(&self) -> String;

    /// The recipient, or `None` for the organization's inbox.
    fn to(&self) -> Option<String> {
        None
    }

    fn reply_to(&self) -> Option<String> {
        None
    }

    fn attachment(&self) -> Option<Attachment> {
        None
    }
}

pub struct Mailer {
    transports: Vec<Box<dyn Transport>>,
    from: Option<String>,
    inbox: Option<String>,
    base_url: String,
}

impl Mailer {
    pub fn new(
        transports: Vec<Box<dyn Transport>>,
        from: Option<String>,
        inbox: Option<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            transports,
            from,
            inbox,
            base_url: base_url.into(),
        }
    }

    /// Build the transports the environment configures, API first.
    ///
    /// The SMTP relay is verified here, once, before any mail is sent.
    pub async fn from_config(config: &EmailConfig) -> Self {
        let mut transports: Vec<Box<dyn Transport>> = Vec::new();

        if let Some(api_key) = &config.sendgrid_api_key {
            transports.push(Box::new(SendGridTransport::new(api_key.clone())));
        }

        if let Some(settings) = &config.smtp {
            match SmtpTransport::connect(settings).await {
                Ok(transport) => transports.push(Box::new(transport)),
                Err(error) => tracing::error!(%error, "failed to set up the SMTP relay"),
            }
        }

        if transports.is_empty() {
            tracing::warn!("no email transport configured, notifications will fail");
        }

        Self::new(
            transports,
            config.from.clone(),
            config.to.clone(),
            config.base_url.clone(),
        )
    }

    pub fn transport_names(&self) -> Vec<&'static str> {
        self.transports.iter().map(|transport| transport.name()).collect()
    }

    /// The admin dashboard URL for a path like `/admin/applications/<id>`.
    pub fn link(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    pub async fn send_email(&self, email: &impl Email) -> Result<(), EmailError> {
        let from = self.from.clone().ok_or_else(|| {
            EmailError::NotConfigured("Email is not configured. Set EMAIL_FROM.".to_owned())
        })?;
        let to = match email.to() {
            Some(to) => to,
            None => self.inbox.clone().ok_or_else(|| {
                EmailError::NotConfigured("Email is not configured. Set EMAIL_TO.".to_owned())
            })?,
        };

        let envelope = Envelope {
            to,
            from,
            reply_to: email.reply_to().or_else(|| self.inbox.clone()),
            subject: email.subject(),
            body: email.render()?,
            attachment: email.attachment(),
        };

        self.send(&envelope).await
    }

    /// Try each transport in turn until one delivers the message.
    pub async fn send(&self, envelope: &Envelope) -> Result<(), EmailError> {
        if self.transports.is_empty() {
            return Err(EmailError::NotConfigured(
                "Email is not configured. Set SENDGRID_API_KEY or SMTP settings \
                 (EMAIL_USER/EMAIL_PASS, SMTP_HOST, SMTP_PORT)."
                    .to_owned(),
            ));
        }

        let mut failures = Vec::new();
        for transport in &self.transports {
            match transport.send(envelope).await {
                Ok(()) => {
                    tracing::info!(
                        transport = transport.name(),
                        to = %envelope.to,
                        subject = %envelope.subject,
                        "email sent"
                    );
                    return Ok(());
                }
                Err(error) => {
                    tracing::warn!(
                        transport = transport.name(),
                        error = format!("{error:#}"),
                        "email transport failed"
                    );
                    failures.push(TransportFailure {
                        transport: transport.name(),
                        error: format!("{error:#}"),
                    });
                }
            }
        }

        Err(EmailError::Failed(failures))
    }
}

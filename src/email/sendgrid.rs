use anyhow::Context;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};

use crate::email::{Envelope, Transport};

pub const SENDGRID_ENDPOINT: &str = "https://api.sendgrid.com/v3/mail/send";

/// Sends mail through the SendGrid v3 API.
pub struct SendGridTransport {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl SendGridTransport {
    pub fn new(api_key: String) -> Self {
        Self::with_endpoint(api_key, SENDGRID_ENDPOINT)
    }

    pub fn with_endpoint(api_key: String, endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            endpoint: endpoint.into(),
        }
    }
}

fn payload(envelope: &Envelope) -> Value {
    let mut body = json!({
        "personalizations": [{ "to": [{ "email": envelope.to }] }],
        "from": { "email": envelope.from },
        "subject": envelope.subject,
        "content": [{ "type": "text/plain", "value": envelope.body }],
    });

    if let Some(reply_to) = &envelope.reply_to {
        body["reply_to"] = json!({ "email": reply_to });
    }
    if let Some(attachment) = &envelope.attachment {
        body["attachments"] = json!([{
            "content": STANDARD.encode(&attachment.content),
            "filename": attachment.filename,
            "type": attachment.content_type,
            "disposition": "attachment",
        }]);
    }

    body
}

#[async_trait]
impl Transport for SendGridTransport {
    fn name(&self) -> &'static str {
        "sendgrid"
    }

    async fn send(&self, envelope: &Envelope) -> anyhow::Result<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload(envelope))
            .send()
            .await
            .context("Failed to reach SendGrid")?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let detail = response.text().await.unwrap_or_default();
        anyhow::bail!("SendGrid responded with {status}: {detail}")
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::email::Attachment;

    #[test]
    fn payload_carries_reply_to_and_attachment() {
        let envelope = Envelope {
            to: "inbox@example.org".to_owned(),
            from: "site@example.org".to_owned(),
            reply_to: Some("ada@example.com".to_owned()),
            subject: "New Volunteer Application – Ada".to_owned(),
            body: "Hello".to_owned(),
            attachment: Some(Attachment::pdf("Application_Ada.pdf".to_owned(), b"%PDF".to_vec())),
        };

        let body = payload(&envelope);

        assert_eq!(body["personalizations"][0]["to"][0]["email"], "inbox@example.org");
        assert_eq!(body["reply_to"]["email"], "ada@example.com");
        assert_eq!(body["attachments"][0]["content"], "JVBERg==");
        assert_eq!(body["attachments"][0]["type"], "application/pdf");
    }

    #[test]
    fn payload_omits_missing_parts() {
        let envelope = Envelope {
            to: "referee@example.com".to_owned(),
            from: "site@example.org".to_owned(),
            reply_to: None,
            subject: "Reference request".to_owned(),
            body: "Dear referee".to_owned(),
            attachment: None,
        };

        let body = payload(&envelope);

        assert!(body.get("reply_to").is_none());
        assert!(body.get("attachments").is_none());
    }
}

use askama::Template;

use crate::document::Document;
use crate::email::{Attachment, Email};
use crate::models::contact::ContactMessage;

#[derive(Template)]
#[template(path = "email/contact.txt")]
pub struct ContactEmail<'a> {
    pub contact: &'a ContactMessage,
    pub document: &'a Document,
}

impl<'a> ContactEmail<'a> {
    fn phone(&self) -> &str {
        self.contact.phone.as_deref().unwrap_or_default()
    }

    fn topic(&self) -> &str {
        self.contact.subject.as_deref().unwrap_or_default()
    }
}

impl<'a> Email for ContactEmail<'a> {
    fn subject(&self) -> String {
        let name = self.contact.name.trim();
        format!(
            "Contact message – {}",
            if name.is_empty() { "Website" } else { name }
        )
    }

    fn reply_to(&self) -> Option<String> {
        Some(self.contact.email.clone())
    }

    fn attachment(&self) -> Option<Attachment> {
        Some(Attachment::pdf(
            format!("Contact_{}.pdf", self.contact.file_stem()),
            self.document.to_pdf(),
        ))
    }
}

use askama::Template;

use crate::document::Document;
use crate::email::{Attachment, Email};
use crate::models::application::Application;

#[derive(Template)]
#[template(path = "email/application.txt")]
pub struct ApplicationEmail<'a> {
    pub application: &'a Application,
    pub dashboard_link: String,
    pub document: &'a Document,
}

impl<'a> Email for ApplicationEmail<'a> {
    fn subject(&self) -> String {
        format!("New Volunteer Application – {}", self.application.full_name)
    }

    fn reply_to(&self) -> Option<String> {
        Some(self.application.email.clone())
    }

    fn attachment(&self) -> Option<Attachment> {
        Some(Attachment::pdf(
            format!("Application_{}.pdf", self.application.file_stem()),
            self.document.to_pdf(),
        ))
    }
}

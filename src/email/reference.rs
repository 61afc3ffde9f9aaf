use askama::Template;

use crate::email::{Email, ORGANIZATION_NAME};
use crate::models::application::{Application, Referee};

/// Asks an applicant's referee to reply with a reference.
#[derive(Template)]
#[template(path = "email/reference.txt")]
pub struct ReferenceRequestEmail<'a> {
    pub application: &'a Application,
    pub referee: Referee<'a>,
    pub organization: &'static str,
}

impl<'a> ReferenceRequestEmail<'a> {
    pub fn new(application: &'a Application, referee: Referee<'a>) -> Self {
        Self {
            application,
            referee,
            organization: ORGANIZATION_NAME,
        }
    }
}

impl<'a> Email for ReferenceRequestEmail<'a> {
    fn subject(&self) -> String {
        format!("Reference request for {}", self.application.full_name)
    }

    fn to(&self) -> Option<String> {
        Some(self.referee.email.to_owned())
    }
}

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

/// A message sent through the site's contact form.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct ContactMessage {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub subject: Option<String>,
    pub message: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl ContactMessage {
    pub fn file_stem(&self) -> String {
        self.name.split_whitespace().collect::<Vec<_>>().join("_")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewContactMessage {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub subject: Option<String>,
    pub message: String,
}

impl NewContactMessage {
    pub fn into_message(self, id: Uuid, created_at: OffsetDateTime) -> ContactMessage {
        ContactMessage {
            id,
            name: self.name,
            email: self.email,
            phone: self.phone,
            subject: self.subject,
            message: self.message,
            created_at,
        }
    }
}

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::db::Store;
use crate::error::{HubError, HubResult};

/// A volunteer application as stored in `volunteer_applications`.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct Application {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub address: String,
    pub postcode: String,
    pub phone: String,
    pub emergency_name: String,
    pub emergency_phone: String,
    /// The role applied for, e.g. "Kitchen Assistant"
    pub role: String,
    /// Free text describing when the applicant can volunteer
    pub availability: String,
    pub experience: Option<String>,
    pub support_needs: Option<String>,
    pub why_work_here: Option<String>,
    pub how_did_you_find_out: Option<String>,
    pub nationality_visa: Option<String>,
    /// Whether they hold a Level 2 Food Hygiene Certificate ("Yes"/"No")
    pub food_hygiene_certificate: Option<String>,
    /// Whether they'll bring the certificate with them
    pub food_hygiene_certificate_bring: Option<String>,
    pub referee1_name: Option<String>,
    pub referee1_address: Option<String>,
    pub referee1_postcode: Option<String>,
    pub referee1_email: Option<String>,
    pub referee1_phone: Option<String>,
    pub referee1_relationship: Option<String>,
    pub referee2_name: Option<String>,
    pub referee2_address: Option<String>,
    pub referee2_postcode: Option<String>,
    pub referee2_email: Option<String>,
    pub referee2_phone: Option<String>,
    pub referee2_relationship: Option<String>,
    /// The referee contacted for a reference, normally mirroring referee 1
    pub referee_name: Option<String>,
    pub referee_email: Option<String>,
    pub referee_relationship: Option<String>,
    pub signature: Option<String>,
    pub signature_date: Option<String>,
    pub consent: bool,
    /// When an admin sent the reference request, if they have
    #[serde(with = "time::serde::rfc3339::option")]
    pub reference_requested_at: Option<OffsetDateTime>,
    /// When the application email went out; `None` means it never did
    #[serde(with = "time::serde::rfc3339::option")]
    pub notified_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// The referee to contact about an application.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Referee<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub relationship: Option<&'a str>,
}

impl Application {
    pub async fn with_id(id: Uuid, db: &dyn Store) -> HubResult<Self> {
        Self::with_id_opt(id, db)
            .await?
            .ok_or_else(|| HubError::NotFound("Application not found".to_owned()))
    }

    pub async fn with_id_opt(id: Uuid, db: &dyn Store) -> HubResult<Option<Self>> {
        db.application(id).await
    }

    /// The consolidated referee, if both a name and an email were given.
    pub fn referee(&self) -> Option<Referee<'_>> {
        Some(Referee {
            name: self.referee_name.as_deref()?,
            email: self.referee_email.as_deref()?,
            relationship: self.referee_relationship.as_deref(),
        })
    }

    pub fn reference_requested(&self) -> bool {
        self.reference_requested_at.is_some()
    }

    /// The name used for attachment file names, e.g. `Ada_Lovelace`.
    pub fn file_stem(&self) -> String {
        self.full_name.split_whitespace().collect::<Vec<_>>().join("_")
    }
}

/// A validated application that hasn't been saved yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewApplication {
    pub full_name: String,
    pub email: String,
    pub address: String,
    pub postcode: String,
    pub phone: String,
    pub emergency_name: String,
    pub emergency_phone: String,
    pub role: String,
    pub availability: String,
    pub experience: Option<String>,
    pub support_needs: Option<String>,
    pub why_work_here: Option<String>,
    pub how_did_you_find_out: Option<String>,
    pub nationality_visa: Option<String>,
    pub food_hygiene_certificate: Option<String>,
    pub food_hygiene_certificate_bring: Option<String>,
    pub referee1_name: Option<String>,
    pub referee1_address: Option<String>,
    pub referee1_postcode: Option<String>,
    pub referee1_email: Option<String>,
    pub referee1_phone: Option<String>,
    pub referee1_relationship: Option<String>,
    pub referee2_name: Option<String>,
    pub referee2_address: Option<String>,
    pub referee2_postcode: Option<String>,
    pub referee2_email: Option<String>,
    pub referee2_phone: Option<String>,
    pub referee2_relationship: Option<String>,
    pub referee_name: Option<String>,
    pub referee_email: Option<String>,
    pub referee_relationship: Option<String>,
    pub signature: Option<String>,
    pub signature_date: Option<String>,
    pub consent: bool,
}

impl NewApplication {
    pub fn needs_kitchen_certificate(&self) -> bool {
        self.role.contains("Kitchen")
    }

    /// Fill in any missing consolidated referee fields from referee 1.
    pub fn mirror_primary_referee(&mut self) {
        if self.referee_name.is_none() {
            self.referee_name = self.referee1_name.clone();
        }
        if self.referee_email.is_none() {
            self.referee_email = self.referee1_email.clone();
        }
        if self.referee_relationship.is_none() {
            self.referee_relationship = self.referee1_relationship.clone();
        }
    }

    /// The stored form of this application.
    pub fn into_application(self, id: Uuid, created_at: OffsetDateTime) -> Application {
        Application {
            id,
            full_name: self.full_name,
            email: self.email,
            address: self.address,
            postcode: self.postcode,
            phone: self.phone,
            emergency_name: self.emergency_name,
            emergency_phone: self.emergency_phone,
            role: self.role,
            availability: self.availability,
            experience: self.experience,
            support_needs: self.support_needs,
            why_work_here: self.why_work_here,
            how_did_you_find_out: self.how_did_you_find_out,
            nationality_visa: self.nationality_visa,
            food_hygiene_certificate: self.food_hygiene_certificate,
            food_hygiene_certificate_bring: self.food_hygiene_certificate_bring,
            referee1_name: self.referee1_name,
            referee1_address: self.referee1_address,
            referee1_postcode: self.referee1_postcode,
            referee1_email: self.referee1_email,
            referee1_phone: self.referee1_phone,
            referee1_relationship: self.referee1_relationship,
            referee2_name: self.referee2_name,
            referee2_address: self.referee2_address,
            referee2_postcode: self.referee2_postcode,
            referee2_email: self.referee2_email,
            referee2_phone: self.referee2_phone,
            referee2_relationship: self.referee2_relationship,
            referee_name: self.referee_name,
            referee_email: self.referee_email,
            referee_relationship: self.referee_relationship,
            signature: self.signature,
            signature_date: self.signature_date,
            consent: self.consent,
            reference_requested_at: None,
            notified_at: None,
            created_at,
        }
    }
}

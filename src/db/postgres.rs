use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::db::Store;
use crate::error::{HubError, HubResult};
use crate::models::application::{Application, NewApplication};
use crate::models::contact::{ContactMessage, NewContactMessage};

pub struct PgStore {
    pool: PgPool,
    contact_table: OnceCell<()>,
}

/// Columns added after the table first went live, so older databases
/// are brought up to date on startup.
const LATER_APPLICATION_COLUMNS: &[(&str, &str)] = &[
    ("why_work_here", "TEXT"),
    ("how_did_you_find_out", "TEXT"),
    ("nationality_visa", "TEXT"),
    ("food_hygiene_certificate", "TEXT"),
    ("food_hygiene_certificate_bring", "TEXT"),
    ("referee1_name", "TEXT"),
    ("referee1_address", "TEXT"),
    ("referee1_postcode", "TEXT"),
    ("referee1_email", "TEXT"),
    ("referee1_phone", "TEXT"),
    ("referee1_relationship", "TEXT"),
    ("referee2_name", "TEXT"),
    ("referee2_address", "TEXT"),
    ("referee2_postcode", "TEXT"),
    ("referee2_email", "TEXT"),
    ("referee2_phone", "TEXT"),
    ("referee2_relationship", "TEXT"),
    ("referee_name", "TEXT"),
    ("referee_email", "TEXT"),
    ("referee_relationship", "TEXT"),
    ("signature", "TEXT"),
    ("signature_date", "TEXT"),
    ("consent", "BOOLEAN NOT NULL DEFAULT false"),
    ("reference_requested_at", "TIMESTAMPTZ"),
    ("notified_at", "TIMESTAMPTZ"),
];

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            contact_table: OnceCell::new(),
        }
    }

    /// Create the applications table and add any columns it's missing.
    pub async fn ensure_schema(&self) -> HubResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS volunteer_applications (
                 id UUID PRIMARY KEY,
                 full_name TEXT NOT NULL,
                 email TEXT NOT NULL,
                 address TEXT NOT NULL,
                 postcode TEXT NOT NULL,
                 phone TEXT NOT NULL,
                 emergency_name TEXT NOT NULL,
                 emergency_phone TEXT NOT NULL,
                 role TEXT NOT NULL,
                 availability TEXT NOT NULL,
                 experience TEXT,
                 support_needs TEXT,
                 created_at TIMESTAMPTZ NOT NULL DEFAULT now()
             )",
        )
        .execute(&self.pool)
        .await?;

        for (column, definition) in LATER_APPLICATION_COLUMNS {
            sqlx::query(&format!(
                "ALTER TABLE volunteer_applications ADD COLUMN IF NOT EXISTS {column} {definition}"
            ))
            .execute(&self.pool)
            .await?;
        }

        Ok(())
    }

    async fn ensure_contact_table(&self) -> HubResult<()> {
        self.contact_table
            .get_or_try_init(|| async {
                sqlx::query(
                    "CREATE TABLE IF NOT EXISTS contact_messages (
                         id UUID PRIMARY KEY,
                         name TEXT,
                         email TEXT,
                         phone TEXT,
                         subject TEXT,
                         message TEXT,
                         created_at TIMESTAMPTZ NOT NULL DEFAULT now()
                     )",
                )
                .execute(&self.pool)
                .await
                .map(|_| ())
                .map_err(HubError::from)
            })
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn insert_application(&self, new: NewApplication) -> HubResult<Application> {
        sqlx::query_as::<_, Application>(
            "INSERT INTO volunteer_applications
             (id, full_name, email, address, postcode, phone, emergency_name, emergency_phone,
              role, availability, experience, support_needs, why_work_here, how_did_you_find_out,
              nationality_visa, food_hygiene_certificate, food_hygiene_certificate_bring,
              referee1_name, referee1_address, referee1_postcode, referee1_email, referee1_phone,
              referee1_relationship, referee2_name, referee2_address, referee2_postcode,
              referee2_email, referee2_phone, referee2_relationship, referee_name, referee_email,
              referee_relationship, signature, signature_date, consent)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                     $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, $29, $30, $31, $32,
                     $33, $34, $35)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(new.full_name)
        .bind(new.email)
        .bind(new.address)
        .bind(new.postcode)
        .bind(new.phone)
        .bind(new.emergency_name)
        .bind(new.emergency_phone)
        .bind(new.role)
        .bind(new.availability)
        .bind(new.experience)
        .bind(new.support_needs)
        .bind(new.why_work_here)
        .bind(new.how_did_you_find_out)
        .bind(new.nationality_visa)
        .bind(new.food_hygiene_certificate)
        .bind(new.food_hygiene_certificate_bring)
        .bind(new.referee1_name)
        .bind(new.referee1_address)
        .bind(new.referee1_postcode)
        .bind(new.referee1_email)
        .bind(new.referee1_phone)
        .bind(new.referee1_relationship)
        .bind(new.referee2_name)
        .bind(new.referee2_address)
        .bind(new.referee2_postcode)
        .bind(new.referee2_email)
        .bind(new.referee2_phone)
        .bind(new.referee2_relationship)
        .bind(new.referee_name)
        .bind(new.referee_email)
        .bind(new.referee_relationship)
        .bind(new.signature)
        .bind(new.signature_date)
        .bind(new.consent)
        .fetch_one(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn applications(&self) -> HubResult<Vec<Application>> {
        sqlx::query_as::<_, Application>(
            "SELECT * FROM volunteer_applications ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn application(&self, id: Uuid) -> HubResult<Option<Application>> {
        sqlx::query_as::<_, Application>("SELECT * FROM volunteer_applications WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Into::into)
    }

    async fn claim_reference_request(&self, id: Uuid) -> HubResult<Option<Application>> {
        sqlx::query_as::<_, Application>(
            "UPDATE volunteer_applications SET reference_requested_at = now()
             WHERE id = $1 AND reference_requested_at IS NULL
             RETURNING *",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Into::into)
    }

    async fn release_reference_request(&self, id: Uuid) -> HubResult<()> {
        sqlx::query("UPDATE volunteer_applications SET reference_requested_at = NULL WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn mark_notified(&self, id: Uuid) -> HubResult<Application> {
        sqlx::query_as::<_, Application>(
            "UPDATE volunteer_applications SET notified_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| HubError::NotFound("Application not found".to_owned()))
    }

    async fn insert_contact_message(&self, new: NewContactMessage) -> HubResult<ContactMessage> {
        self.ensure_contact_table().await?;

        sqlx::query_as::<_, ContactMessage>(
            "INSERT INTO contact_messages (id, name, email, phone, subject, message)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(new.name)
        .bind(new.email)
        .bind(new.phone)
        .bind(new.subject)
        .bind(new.message)
        .fetch_one(&self.pool)
        .await
        .map_err(Into::into)
    }
}

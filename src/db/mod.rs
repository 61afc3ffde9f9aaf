//! Persistence for submissions.
//!
//! Handlers only see the [Store] trait; production runs on [PgStore] and the
//! tests run on [MemoryStore].

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::HubResult;
use crate::models::application::{Application, NewApplication};
use crate::models::contact::{ContactMessage, NewContactMessage};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait Store: Send + Sync {
    /// Save a new application, assigning its id and creation time.
    async fn insert_application(&self, application: NewApplication) -> HubResult<Application>;

    /// All applications, most recent first.
    async fn applications(&self) -> HubResult<Vec<Application>>;

    async fn application(&self, id: Uuid) -> HubResult<Option<Application>>;

    /// Stamp `reference_requested_at` if it hasn't been stamped yet.
    ///
    /// Returns the updated application only when this call did the stamping,
    /// so at most one caller ever sends the reference email.
    async fn claim_reference_request(&self, id: Uuid) -> HubResult<Option<Application>>;

    /// Undo a claim whose email never went out.
    async fn release_reference_request(&self, id: Uuid) -> HubResult<()>;

    /// Record that the application email was delivered.
    async fn mark_notified(&self, id: Uuid) -> HubResult<Application>;

    async fn insert_contact_message(&self, message: NewContactMessage)
        -> HubResult<ContactMessage>;
}

/// Connect to Postgres, retrying a few times before giving up.
///
/// The returned pool is lazy, so when every attempt fails the server still
/// starts and each request retries the connection on its own. The flag says
/// whether a connection was actually made.
pub async fn connect_with_retry(
    url: &str,
    attempts: u32,
    delay: Duration,
) -> anyhow::Result<(PgPool, bool)> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(10))
        .connect_lazy(url)?;

    for attempt in 1..=attempts.max(1) {
        match sqlx::query_as::<_, (String,)>("SELECT current_database()")
            .fetch_one(&pool)
            .await
        {
            Ok((database,)) => {
                tracing::info!(%database, attempt, "connected to database");
                return Ok((pool, true));
            }
            Err(error) => {
                tracing::warn!(attempt, attempts, %error, "failed to connect to database");
                if attempt < attempts {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    tracing::error!("giving up on the database for now, continuing in degraded mode");
    Ok((pool, false))
}

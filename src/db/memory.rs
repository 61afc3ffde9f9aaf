use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use uuid::Uuid;

use crate::db::Store;
use crate::error::{HubError, HubResult};
use crate::models::application::{Application, NewApplication};
use crate::models::contact::{ContactMessage, NewContactMessage};
use crate::util::current_time;

/// An in-process store, for tests and local runs without Postgres.
#[derive(Default)]
pub struct MemoryStore {
    applications: Mutex<Vec<Application>>,
    contact_messages: Mutex<Vec<ContactMessage>>,
    reject_writes: AtomicBool,
    reject_stamps: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every insert fail, as if the database had gone away.
    pub fn reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    /// Make only `mark_notified` fail, leaving inserts working.
    pub fn reject_stamps(&self, reject: bool) {
        self.reject_stamps.store(reject, Ordering::SeqCst);
    }

    pub fn contact_messages(&self) -> Vec<ContactMessage> {
        self.contact_messages.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn check_writable(&self) -> HubResult<()> {
        if self.reject_writes.load(Ordering::SeqCst) {
            Err(HubError::Database(sqlx::Error::PoolTimedOut))
        } else {
            Ok(())
        }
    }

    fn update<F>(&self, id: Uuid, change: F) -> Option<Application>
    where
        F: FnOnce(&mut Application) -> bool,
    {
        let mut applications = self.applications.lock().unwrap_or_else(PoisonError::into_inner);
        let application = applications.iter_mut().find(|app| app.id == id)?;

        change(application).then(|| application.clone())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_application(&self, new: NewApplication) -> HubResult<Application> {
        self.check_writable()?;

        let application = new.into_application(Uuid::new_v4(), current_time());
        self.applications.lock().unwrap_or_else(PoisonError::into_inner).push(application.clone());

        Ok(application)
    }

    async fn applications(&self) -> HubResult<Vec<Application>> {
        let mut applications: Vec<Application> =
            self.applications.lock().unwrap_or_else(PoisonError::into_inner).iter().rev().cloned().collect();
        applications.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(applications)
    }

    async fn application(&self, id: Uuid) -> HubResult<Option<Application>> {
        Ok(self
            .applications
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|app| app.id == id)
            .cloned())
    }

    async fn claim_reference_request(&self, id: Uuid) -> HubResult<Option<Application>> {
        self.check_writable()?;

        Ok(self.update(id, |app| {
            if app.reference_requested_at.is_some() {
                return false;
            }
            app.reference_requested_at = Some(current_time());
            true
        }))
    }

    async fn release_reference_request(&self, id: Uuid) -> HubResult<()> {
        self.update(id, |app| {
            app.reference_requested_at = None;
            true
        });

        Ok(())
    }

    async fn mark_notified(&self, id: Uuid) -> HubResult<Application> {
        self.check_writable()?;
        if self.reject_stamps.load(Ordering::SeqCst) {
            return Err(HubError::Database(sqlx::Error::PoolTimedOut));
        }

        self.update(id, |app| {
            app.notified_at = Some(current_time());
            true
        })
        .ok_or_else(|| HubError::NotFound("Application not found".to_owned()))
    }

    async fn insert_contact_message(&self, new: NewContactMessage) -> HubResult<ContactMessage> {
        self.check_writable()?;

        let message = new.into_message(Uuid::new_v4(), current_time());
        self.contact_messages.lock().unwrap_or_else(PoisonError::into_inner).push(message.clone());

        Ok(message)
    }
}

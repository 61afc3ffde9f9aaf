//! Work that runs after the response has been sent.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinSet;

/// Detached side effects, such as notifying staff about a contact message.
///
/// A task's outcome never reaches the client: failures are logged and
/// counted here instead.
#[derive(Clone, Default)]
pub struct Background {
    tasks: Arc<Mutex<JoinSet<()>>>,
    failures: Arc<AtomicUsize>,
}

impl Background {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn spawn<F, E>(&self, name: &'static str, task: F)
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: std::fmt::Display + Send + 'static,
    {
        let failures = self.failures.clone();
        let mut tasks = self.tasks.lock().await;

        while let Some(finished) = tasks.try_join_next() {
            if let Err(error) = finished {
                tracing::error!(%error, "background task panicked");
            }
        }

        tasks.spawn(async move {
            if let Err(error) = task.await {
                failures.fetch_add(1, Ordering::SeqCst);
                tracing::error!(task = name, %error, "background task failed");
            }
        });
    }

    /// How many tasks have failed since startup.
    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }

    /// Wait for every outstanding task to finish.
    pub async fn drain(&self) {
        let mut tasks = self.tasks.lock().await;
        let pending = tasks.len();
        if pending > 0 {
            tracing::info!(pending, "waiting for background tasks");
        }

        while let Some(finished) = tasks.join_next().await {
            if let Err(error) = finished {
                tracing::error!(%error, "background task panicked");
            }
        }
    }
}

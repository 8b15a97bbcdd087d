//! Import completion and shutdown signals
//!
//! The graph builder must not scan before the bulk import has finished. It
//! polls a [`CompletionSignal`] at a fixed interval and gives up silently
//! when shutdown is requested while it waits.

use async_trait::async_trait;
use authorforge_common::db::models::JobStatus;
use authorforge_common::db::ImportJobStore;
use authorforge_common::errors::{AppError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Something that eventually reports the import as complete
#[async_trait]
pub trait CompletionSignal: Send + Sync {
    async fn is_complete(&self) -> Result<bool>;
}

#[async_trait]
impl CompletionSignal for watch::Receiver<bool> {
    async fn is_complete(&self) -> Result<bool> {
        let done = *self.borrow();
        Ok(done)
    }
}

#[async_trait]
impl<T: Send + 'static> CompletionSignal for JoinHandle<T> {
    async fn is_complete(&self) -> Result<bool> {
        Ok(self.is_finished())
    }
}

#[async_trait]
impl<S: CompletionSignal + ?Sized> CompletionSignal for Box<S> {
    async fn is_complete(&self) -> Result<bool> {
        (**self).is_complete().await
    }
}

/// Sending half of an in-process import completion flag
#[derive(Debug)]
pub struct ImportCompletion {
    tx: watch::Sender<bool>,
}

impl ImportCompletion {
    /// A fresh, incomplete flag and the receiver the builder waits on
    pub fn channel() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, rx)
    }

    pub fn complete(&self) {
        self.tx.send_replace(true);
    }
}

/// Import job row in the store, complete once terminal
pub struct ImportJobSignal {
    store: Arc<dyn ImportJobStore>,
    job_id: i64,
}

impl ImportJobSignal {
    pub fn new(store: Arc<dyn ImportJobStore>, job_id: i64) -> Self {
        Self { store, job_id }
    }
}

#[async_trait]
impl CompletionSignal for ImportJobSignal {
    async fn is_complete(&self) -> Result<bool> {
        let job = self
            .store
            .find_import_job(self.job_id)
            .await?
            .ok_or(AppError::ImportJobNotFound { id: self.job_id })?;

        let status = job.job_status()?;
        if status == JobStatus::Failed {
            warn!(
                job_id = job.id,
                error = job.error_message.as_deref().unwrap_or("unknown"),
                "Import job failed; proceeding with the authors it imported"
            );
        }

        Ok(matches!(status, JobStatus::Completed | JobStatus::Failed))
    }
}

/// Fires [`Shutdown`] for every clone of the receiving side
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

/// Cooperative cancellation flag
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

pub fn shutdown_channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

impl Shutdown {
    pub fn is_requested(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown is requested; never, if the trigger is
    /// dropped without firing.
    pub async fn requested(&mut self) {
        while !*self.rx.borrow_and_update() {
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// How a wait for the import ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Complete,
    Cancelled,
}

/// Poll `signal` every `interval` until it reports completion.
///
/// Shutdown interrupts a pending sleep immediately and yields
/// [`WaitOutcome::Cancelled`]; it is not an error.
pub async fn wait_for_completion<S>(
    signal: &S,
    interval: Duration,
    shutdown: &mut Shutdown,
) -> Result<WaitOutcome>
where
    S: CompletionSignal + ?Sized,
{
    let mut polls: u64 = 0;

    loop {
        if shutdown.is_requested() {
            info!(polls, "Import wait interrupted");
            return Ok(WaitOutcome::Cancelled);
        }

        if signal.is_complete().await? {
            debug!(polls, "Import complete");
            return Ok(WaitOutcome::Complete);
        }

        polls += 1;
        if polls % 60 == 0 {
            info!(polls, "Still waiting for import to complete");
        }

        tokio::select! {
            _ = shutdown.requested() => {}
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

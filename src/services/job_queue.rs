//! In-process job queue driving preview processing.
//!
//! `JobQueue` is the cloneable producer side and implements `Scheduler`.
//! `JobWorker` drains the channel, waits out any requested delay, then runs
//! the handler under two limits:
//! - a semaphore bounding how many jobs execute at once
//! - a per-preview lock so a given id is never processed twice concurrently
//!
//! ```text
//! enqueue_now / enqueue_after
//!     │
//!     ▼
//! mpsc ──► JobWorker::run ──► spawn ─► sleep(delay) ─► lock(id) ─► permit ─► handler
//! ```

use async_trait::async_trait;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};
use thiserror::Error;
use tokio::sync::{OwnedMutexGuard, Semaphore, mpsc};
use tracing::{debug, error, info};
use uuid::Uuid;

#[derive(Debug, Error)]
#[error("job queue is closed")]
pub struct QueueClosed;

/// Accepts "process this preview" work, now or after a delay.
#[async_trait]
pub trait Scheduler: Send + Sync {
    async fn enqueue_now(&self, preview_id: Uuid) -> Result<(), QueueClosed>;

    async fn enqueue_after(&self, delay: Duration, preview_id: Uuid) -> Result<(), QueueClosed>;
}

/// Executes one unit of work. Errors are logged by the worker and never retried.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, preview_id: Uuid) -> anyhow::Result<()>;
}

#[derive(Debug)]
struct QueuedJob {
    preview_id: Uuid,
    delay: Duration,
}

#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::UnboundedSender<QueuedJob>,
}

/// Consumer half handed to `JobWorker::new`.
pub struct JobReceiver {
    rx: mpsc::UnboundedReceiver<QueuedJob>,
}

impl JobQueue {
    pub fn new() -> (Self, JobReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, JobReceiver { rx })
    }

    fn push(&self, preview_id: Uuid, delay: Duration) -> Result<(), QueueClosed> {
        debug!(preview_id = %preview_id, delay = ?delay, "enqueueing preview job");
        self.tx
            .send(QueuedJob { preview_id, delay })
            .map_err(|_| QueueClosed)
    }
}

#[async_trait]
impl Scheduler for JobQueue {
    async fn enqueue_now(&self, preview_id: Uuid) -> Result<(), QueueClosed> {
        self.push(preview_id, Duration::ZERO)
    }

    async fn enqueue_after(&self, delay: Duration, preview_id: Uuid) -> Result<(), QueueClosed> {
        self.push(preview_id, delay)
    }
}

pub struct JobWorker {
    receiver: JobReceiver,
    handler: Arc<dyn JobHandler>,
    permits: Arc<Semaphore>,
    locks: KeyedLocks,
}

impl JobWorker {
    pub fn new(receiver: JobReceiver, handler: Arc<dyn JobHandler>, concurrency: usize) -> Self {
        Self {
            receiver,
            handler,
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
            locks: KeyedLocks::default(),
        }
    }

    /// Dispatch jobs until every `JobQueue` handle has been dropped.
    pub async fn run(mut self) {
        info!(
            concurrency = self.permits.available_permits(),
            "job worker started"
        );

        while let Some(job) = self.receiver.rx.recv().await {
            let handler = self.handler.clone();
            let permits = self.permits.clone();
            let locks = self.locks.clone();

            tokio::spawn(async move {
                if !job.delay.is_zero() {
                    tokio::time::sleep(job.delay).await;
                }

                let _guard = locks.lock(job.preview_id).await;
                let Ok(_permit) = permits.acquire_owned().await else {
                    return;
                };

                if let Err(err) = handler.handle(job.preview_id).await {
                    error!(preview_id = %job.preview_id, error = %err, "preview job failed");
                }
            });
        }

        info!("job queue closed, worker stopping");
    }
}

/// One async mutex per preview id, dropped from the map once nobody holds or awaits it.
#[derive(Clone, Default)]
struct KeyedLocks {
    inner: Arc<Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>>,
}

impl KeyedLocks {
    async fn lock(&self, id: Uuid) -> KeyedGuard {
        let mutex = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            map.entry(id).or_default().clone()
        };
        let guard = mutex.lock_owned().await;
        KeyedGuard {
            id,
            guard: Some(guard),
            locks: self.clone(),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

struct KeyedGuard {
    id: Uuid,
    guard: Option<OwnedMutexGuard<()>>,
    locks: KeyedLocks,
}

impl Drop for KeyedGuard {
    fn drop(&mut self) {
        self.guard.take();
        let mut map = self
            .locks
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if map
            .get(&self.id)
            .is_some_and(|mutex| Arc::strong_count(mutex) == 1)
        {
            map.remove(&self.id);
        }
    }
}

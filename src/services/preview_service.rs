//! src/services/preview_service.rs
//!
//! PreviewService: the operations behind the HTTP API. Submission validates
//! and stores a `pending` preview, broadcasts it and queues it for
//! processing; the rest is listing, lookup and deletion. Fetching itself
//! lives in `PreviewProcessor`.

use crate::{
    models::preview::{Preview, PreviewStatus, TransitionError, validate_url},
    services::{
        job_queue::{QueueClosed, Scheduler},
        notifier::Notifier,
        preview_repository::PreviewRepository,
    },
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("validation failed: {}", .0.join(", "))]
    Validation(Vec<String>),
    #[error("preview `{0}` not found")]
    NotFound(Uuid),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Scheduler(#[from] QueueClosed),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type PreviewResult<T> = Result<T, PreviewError>;

/// Shared router state. Cheap to clone; every field is a handle.
#[derive(Clone)]
pub struct PreviewService {
    pub repo: PreviewRepository,
    pub notifier: Notifier,
    scheduler: Arc<dyn Scheduler>,
}

impl PreviewService {
    pub fn new(repo: PreviewRepository, notifier: Notifier, scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            repo,
            notifier,
            scheduler,
        }
    }

    /// Validate `url`, store it as `pending` and queue it for fetching.
    ///
    /// Nothing is written when validation fails.
    pub async fn submit(&self, url: &str) -> PreviewResult<Preview> {
        validate_url(url).map_err(PreviewError::Validation)?;

        let preview = self.repo.insert(&Preview::new(url)).await?;
        info!(preview_id = %preview.id, url = %preview.url, "preview submitted");

        self.notifier.preview_updated(&preview);
        self.scheduler.enqueue_now(preview.id).await?;
        Ok(preview)
    }

    pub async fn list(&self) -> PreviewResult<Vec<Preview>> {
        self.repo.list_ordered().await
    }

    pub async fn get(&self, id: Uuid) -> PreviewResult<Preview> {
        self.repo.find(id).await?.ok_or(PreviewError::NotFound(id))
    }

    pub async fn delete(&self, id: Uuid) -> PreviewResult<()> {
        if !self.repo.delete(id).await? {
            return Err(PreviewError::NotFound(id));
        }
        info!(preview_id = %id, "preview deleted");
        self.notifier.preview_deleted(id);
        Ok(())
    }

    /// Requeue work lost by a restart.
    ///
    /// Previews stuck in `processing` are released back to `pending`
    /// first, then every `pending` preview is enqueued. Returns how many
    /// previews were queued.
    pub async fn recover_incomplete(&self) -> PreviewResult<usize> {
        for mut preview in self.repo.list_by_status(PreviewStatus::Processing).await? {
            preview.release()?;
            let preview = self.repo.save(&preview).await?;
            debug!(preview_id = %preview.id, "released interrupted preview");
            self.notifier.preview_updated(&preview);
        }

        let pending = self.repo.list_by_status(PreviewStatus::Pending).await?;
        for preview in &pending {
            self.scheduler.enqueue_now(preview.id).await?;
        }

        if !pending.is_empty() {
            info!(count = pending.len(), "requeued incomplete previews");
        }
        Ok(pending.len())
    }
}

//! Fetch-and-retry lifecycle for a single preview.
//!
//! One `process` call takes a `pending` preview through `processing` and
//! lands it in `completed`, back in `pending` with a delayed retry, or in
//! `failed` once the retries are spent. Every committed change is broadcast
//! after it has been written.
//!
//! Callers must not run two `process` calls for the same id at once; the
//! `JobWorker` per-id lock provides that guarantee.

use crate::{
    models::preview::{MAX_RETRIES, Preview, PreviewStatus},
    services::{
        fetcher::{FetchError, Fetcher},
        job_queue::{JobHandler, Scheduler},
        notifier::{NotificationKind, Notifier},
        og_extractor,
        preview_repository::PreviewRepository,
        preview_service::{PreviewError, PreviewResult},
    },
};
use async_trait::async_trait;
use std::{sync::Arc, time::Duration};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Wait before retry attempt N, at index N - 1.
pub const RETRY_DELAYS: [Duration; MAX_RETRIES as usize] = [
    Duration::from_secs(5),
    Duration::from_secs(15),
    Duration::from_secs(30),
];

#[derive(Debug)]
pub enum ProcessOutcome {
    Completed(Preview),
    Retrying {
        preview: Preview,
        attempt: u32,
        delay: Duration,
    },
    Failed(Preview),
    /// The preview was not `pending` (duplicate delivery) and was left untouched.
    Skipped(Preview),
}

impl ProcessOutcome {
    pub fn preview(&self) -> &Preview {
        match self {
            ProcessOutcome::Completed(preview)
            | ProcessOutcome::Retrying { preview, .. }
            | ProcessOutcome::Failed(preview)
            | ProcessOutcome::Skipped(preview) => preview,
        }
    }
}

#[derive(Clone)]
pub struct PreviewProcessor {
    repo: PreviewRepository,
    fetcher: Arc<dyn Fetcher>,
    notifier: Notifier,
    scheduler: Arc<dyn Scheduler>,
    retry_delays: [Duration; MAX_RETRIES as usize],
}

impl PreviewProcessor {
    pub fn new(
        repo: PreviewRepository,
        fetcher: Arc<dyn Fetcher>,
        notifier: Notifier,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        Self {
            repo,
            fetcher,
            notifier,
            scheduler,
            retry_delays: RETRY_DELAYS,
        }
    }

    /// Replace the 5/15/30 s retry schedule.
    #[cfg(test)]
    pub fn with_retry_delays(mut self, delays: [Duration; MAX_RETRIES as usize]) -> Self {
        self.retry_delays = delays;
        self
    }

    pub async fn process(&self, id: Uuid) -> PreviewResult<ProcessOutcome> {
        let mut preview = self.repo.find(id).await?.ok_or(PreviewError::NotFound(id))?;

        if preview.status != PreviewStatus::Pending {
            debug!(preview_id = %id, status = %preview.status, "preview not pending, skipping");
            return Ok(ProcessOutcome::Skipped(preview));
        }

        info!(
            preview_id = %id,
            url = %preview.url,
            attempt = preview.retry_count + 1,
            retrying = preview.is_retrying(),
            "processing preview"
        );

        preview.start_processing()?;
        let mut preview = self.commit(&preview).await?;

        match self.fetcher.fetch(&preview.url).await {
            Ok(html) => {
                preview.complete(og_extractor::extract(&html))?;
                let preview = self.commit(&preview).await?;
                info!(
                    preview_id = %id,
                    tags = preview.og_data().map_or(0, |data| data.len()),
                    "preview completed"
                );
                Ok(ProcessOutcome::Completed(preview))
            }
            Err(err) => self.handle_failure(preview, err).await,
        }
    }

    /// Terminal once `MAX_RETRIES` is reached, otherwise back to `pending`
    /// with a delayed job. The retry is committed and announced before it is
    /// queued; if the queue has already closed, the row stays `pending` until
    /// `PreviewService::recover_incomplete` picks it up on the next start.
    async fn handle_failure(
        &self,
        mut preview: Preview,
        err: FetchError,
    ) -> PreviewResult<ProcessOutcome> {
        let message = err.to_string();
        warn!(preview_id = %preview.id, error = %message, "fetch failed");

        if preview.retry_count >= MAX_RETRIES {
            preview.fail(message)?;
            let preview = self.commit(&preview).await?;
            warn!(
                preview_id = %preview.id,
                retries = preview.retry_count,
                "preview failed, retries exhausted"
            );
            return Ok(ProcessOutcome::Failed(preview));
        }

        let attempt = preview.schedule_retry(message)?;
        let delay = self.retry_delays[(attempt - 1) as usize];
        let preview = self.commit(&preview).await?;

        self.notifier.notify(
            format!("Retrying... attempt {attempt}/{MAX_RETRIES}"),
            NotificationKind::Warning,
        );
        if let Err(err) = self.scheduler.enqueue_after(delay, preview.id).await {
            warn!(
                preview_id = %preview.id,
                attempt,
                "retry not queued, left pending for startup recovery"
            );
            return Err(err.into());
        }
        info!(preview_id = %preview.id, attempt, delay = ?delay, "retry scheduled");

        Ok(ProcessOutcome::Retrying {
            preview,
            attempt,
            delay,
        })
    }

    /// Write the preview, then broadcast the committed row.
    async fn commit(&self, preview: &Preview) -> PreviewResult<Preview> {
        let saved = self.repo.save(preview).await?;
        self.notifier.preview_updated(&saved);
        Ok(saved)
    }
}

#[async_trait]
impl JobHandler for PreviewProcessor {
    async fn handle(&self, preview_id: Uuid) -> anyhow::Result<()> {
        let outcome = self.process(preview_id).await?;
        debug!(preview_id = %preview_id, status = %outcome.preview().status, "job finished");
        Ok(())
    }
}

//! Test doubles for the fetcher and scheduler seams.

use crate::services::{
    fetcher::{FetchError, Fetcher},
    job_queue::{QueueClosed, Scheduler},
};
use async_trait::async_trait;
use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration,
};
use uuid::Uuid;

/// Replays queued responses in order; falls back to `default` when empty.
pub struct StubFetcher {
    responses: Mutex<VecDeque<Result<String, FetchError>>>,
    default: Result<String, FetchError>,
    calls: Mutex<Vec<String>>,
}

impl StubFetcher {
    pub fn returning(html: &str) -> Arc<Self> {
        Arc::new(Self::with_default(Ok(html.to_string())))
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self::with_default(Err(FetchError::new(message))))
    }

    fn with_default(default: Result<String, FetchError>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            default,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn then(self: Arc<Self>, response: Result<&str, &str>) -> Arc<Self> {
        let response = response
            .map(str::to_string)
            .map_err(FetchError::new);
        self.responses.lock().unwrap().push_back(response);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default.clone())
    }
}

/// Records every scheduling request instead of running it.
#[derive(Default)]
pub struct RecordingScheduler {
    jobs: Mutex<Vec<(Duration, Uuid)>>,
}

impl RecordingScheduler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn jobs(&self) -> Vec<(Duration, Uuid)> {
        self.jobs.lock().unwrap().clone()
    }
}

#[async_trait]
impl Scheduler for RecordingScheduler {
    async fn enqueue_now(&self, preview_id: Uuid) -> Result<(), QueueClosed> {
        self.jobs.lock().unwrap().push((Duration::ZERO, preview_id));
        Ok(())
    }

    async fn enqueue_after(&self, delay: Duration, preview_id: Uuid) -> Result<(), QueueClosed> {
        self.jobs.lock().unwrap().push((delay, preview_id));
        Ok(())
    }
}

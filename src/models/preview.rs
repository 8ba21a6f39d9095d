//! Represents a submitted URL and the state of its Open Graph fetch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use std::{collections::BTreeMap, fmt};
use thiserror::Error;
use url::Url;
use uuid::Uuid;

/// Property → content pairs scraped from `og:*` meta tags.
pub type OgData = BTreeMap<String, String>;

/// Number of retries a failing fetch gets before the preview is marked failed.
pub const MAX_RETRIES: u32 = 3;

/// Where a preview is in its fetch lifecycle.
///
/// Allowed moves are `pending → processing`, `processing → completed`,
/// `processing → pending` (retry) and `processing → failed`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum PreviewStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl PreviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PreviewStatus::Pending => "pending",
            PreviewStatus::Processing => "processing",
            PreviewStatus::Completed => "completed",
            PreviewStatus::Failed => "failed",
        }
    }

    /// Whether the lifecycle permits moving from `self` to `next`.
    pub fn can_transition_to(self, next: PreviewStatus) -> bool {
        use PreviewStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Processing, Completed)
                | (Processing, Pending)
                | (Processing, Failed)
        )
    }
}

impl fmt::Display for PreviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("cannot move preview from `{from}` to `{to}`")]
pub struct TransitionError {
    pub from: PreviewStatus,
    pub to: PreviewStatus,
}

/// A single URL preview record.
///
/// Serializes to the outward shape shared by the HTTP API and the live
/// event stream; `updated_at` is bookkeeping only and stays internal.
#[derive(Serialize, Clone, FromRow, Debug)]
pub struct Preview {
    pub id: Uuid,

    /// The URL exactly as submitted.
    pub url: String,

    pub status: PreviewStatus,

    /// Copied from `og_data["og:image"]` on completion.
    pub og_image_url: Option<String>,

    /// Only populated once the preview has completed.
    pub og_data: Option<Json<OgData>>,

    /// Last fetch failure; survives retries and terminal failure.
    pub error_message: Option<String>,

    pub retry_count: u32,

    pub created_at: DateTime<Utc>,

    #[serde(skip)]
    pub updated_at: DateTime<Utc>,
}

impl Preview {
    /// Build a fresh `pending` preview for an already validated URL.
    pub fn new(url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            url: url.into(),
            status: PreviewStatus::Pending,
            og_image_url: None,
            og_data: None,
            error_message: None,
            retry_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Waiting for another attempt after at least one failed fetch.
    pub fn is_retrying(&self) -> bool {
        self.status == PreviewStatus::Pending && self.retry_count > 0
    }

    pub fn og_data(&self) -> Option<&OgData> {
        self.og_data.as_ref().map(|data| &data.0)
    }

    fn transition(&mut self, to: PreviewStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(to) {
            return Err(TransitionError {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn start_processing(&mut self) -> Result<(), TransitionError> {
        self.transition(PreviewStatus::Processing)
    }

    /// Store the scraped tags. The image lookup is an exact-case match on `og:image`.
    pub fn complete(&mut self, og_data: OgData) -> Result<(), TransitionError> {
        self.transition(PreviewStatus::Completed)?;
        self.og_image_url = og_data.get("og:image").cloned();
        self.og_data = Some(Json(og_data));
        Ok(())
    }

    /// Put the preview back in the queue and return the new attempt number.
    pub fn schedule_retry(&mut self, error: impl Into<String>) -> Result<u32, TransitionError> {
        self.transition(PreviewStatus::Pending)?;
        self.retry_count += 1;
        self.error_message = Some(error.into());
        Ok(self.retry_count)
    }

    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), TransitionError> {
        self.transition(PreviewStatus::Failed)?;
        self.error_message = Some(error.into());
        self.og_data = None;
        Ok(())
    }

    /// Release a preview abandoned mid-fetch so it can be picked up again.
    /// The retry count is left alone since no attempt finished.
    pub fn release(&mut self) -> Result<(), TransitionError> {
        self.transition(PreviewStatus::Pending)
    }
}

/// Check a submitted URL, returning user-facing messages on rejection.
pub fn validate_url(raw: &str) -> Result<(), Vec<String>> {
    if raw.trim().is_empty() {
        return Err(vec!["Url can't be blank".into()]);
    }

    let valid = raw.trim() == raw
        && Url::parse(raw)
            .map(|url| matches!(url.scheme(), "http" | "https") && url.has_host())
            .unwrap_or(false);

    if valid {
        Ok(())
    } else {
        Err(vec!["Url must be a valid HTTP or HTTPS URL".into()])
    }
}

//! SQLite persistence for previews.

use crate::{
    models::preview::{Preview, PreviewStatus},
    services::preview_service::{PreviewError, PreviewResult},
};
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

const PREVIEW_COLUMNS: &str = "id, url, status, og_image_url, og_data, error_message, \
                               retry_count, created_at, updated_at";

#[derive(Clone)]
pub struct PreviewRepository {
    pub db: Arc<SqlitePool>,
}

impl PreviewRepository {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    pub async fn insert(&self, preview: &Preview) -> PreviewResult<Preview> {
        let sql = format!(
            "INSERT INTO previews ({PREVIEW_COLUMNS})
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING {PREVIEW_COLUMNS}"
        );
        let row = sqlx::query_as::<_, Preview>(&sql)
            .bind(preview.id)
            .bind(&preview.url)
            .bind(preview.status)
            .bind(&preview.og_image_url)
            .bind(&preview.og_data)
            .bind(&preview.error_message)
            .bind(preview.retry_count)
            .bind(preview.created_at)
            .bind(preview.updated_at)
            .fetch_one(&*self.db)
            .await?;
        Ok(row)
    }

    pub async fn find(&self, id: Uuid) -> PreviewResult<Option<Preview>> {
        let sql = format!("SELECT {PREVIEW_COLUMNS} FROM previews WHERE id = ?");
        let row = sqlx::query_as::<_, Preview>(&sql)
            .bind(id)
            .fetch_optional(&*self.db)
            .await?;
        Ok(row)
    }

    /// Newest first.
    pub async fn list_ordered(&self) -> PreviewResult<Vec<Preview>> {
        let sql = format!("SELECT {PREVIEW_COLUMNS} FROM previews ORDER BY created_at DESC");
        let rows = sqlx::query_as::<_, Preview>(&sql)
            .fetch_all(&*self.db)
            .await?;
        Ok(rows)
    }

    /// Oldest first, so recovered work keeps submission order.
    pub async fn list_by_status(&self, status: PreviewStatus) -> PreviewResult<Vec<Preview>> {
        let sql = format!(
            "SELECT {PREVIEW_COLUMNS} FROM previews WHERE status = ? ORDER BY created_at ASC"
        );
        let rows = sqlx::query_as::<_, Preview>(&sql)
            .bind(status)
            .fetch_all(&*self.db)
            .await?;
        Ok(rows)
    }

    /// Persist every mutable column in one statement and hand back the
    /// committed row. Callers broadcast only what this returns.
    pub async fn save(&self, preview: &Preview) -> PreviewResult<Preview> {
        let sql = format!(
            "UPDATE previews
             SET status = ?, og_image_url = ?, og_data = ?, error_message = ?,
                 retry_count = ?, updated_at = ?
             WHERE id = ?
             RETURNING {PREVIEW_COLUMNS}"
        );
        sqlx::query_as::<_, Preview>(&sql)
            .bind(preview.status)
            .bind(&preview.og_image_url)
            .bind(&preview.og_data)
            .bind(&preview.error_message)
            .bind(preview.retry_count)
            .bind(Utc::now())
            .bind(preview.id)
            .fetch_optional(&*self.db)
            .await?
            .ok_or(PreviewError::NotFound(preview.id))
    }

    /// Returns whether a row was removed.
    pub async fn delete(&self, id: Uuid) -> PreviewResult<bool> {
        let result = sqlx::query("DELETE FROM previews WHERE id = ?")
            .bind(id)
            .execute(&*self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db::test_pool, models::preview::OgData};
    use chrono::Duration;

    async fn repo() -> PreviewRepository {
        PreviewRepository::new(Arc::new(test_pool().await))
    }

    #[tokio::test]
    async fn insert_and_find_round_trip() {
        let repo = repo().await;
        let preview = Preview::new("https://example.com");
        let stored = repo.insert(&preview).await.unwrap();

        assert_eq!(stored.id, preview.id);
        assert_eq!(stored.status, PreviewStatus::Pending);

        let found = repo.find(preview.id).await.unwrap().unwrap();
        assert_eq!(found.url, "https://example.com");
        assert_eq!(found.retry_count, 0);
        assert!(found.og_data.is_none());
    }

    #[tokio::test]
    async fn find_missing_returns_none() {
        let repo = repo().await;
        assert!(repo.find(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_persists_og_data_as_json() {
        let repo = repo().await;
        let mut preview = repo.insert(&Preview::new("https://example.com")).await.unwrap();

        preview.start_processing().unwrap();
        let mut data = OgData::new();
        data.insert("og:image".into(), "https://example.com/img.png".into());
        preview.complete(data).unwrap();

        let saved = repo.save(&preview).await.unwrap();
        assert_eq!(saved.status, PreviewStatus::Completed);
        assert_eq!(
            saved.og_data().unwrap()["og:image"],
            "https://example.com/img.png"
        );
        assert_eq!(
            saved.og_image_url.as_deref(),
            Some("https://example.com/img.png")
        );
    }

    #[tokio::test]
    async fn save_of_deleted_row_is_not_found() {
        let repo = repo().await;
        let preview = repo.insert(&Preview::new("https://example.com")).await.unwrap();
        assert!(repo.delete(preview.id).await.unwrap());

        let err = repo.save(&preview).await.unwrap_err();
        assert!(matches!(err, PreviewError::NotFound(id) if id == preview.id));
    }

    #[tokio::test]
    async fn list_ordered_is_newest_first() {
        let repo = repo().await;
        let mut older = Preview::new("https://old.example.com");
        older.created_at = older.created_at - Duration::minutes(5);
        let newer = Preview::new("https://new.example.com");

        repo.insert(&older).await.unwrap();
        repo.insert(&newer).await.unwrap();

        let urls: Vec<_> = repo
            .list_ordered()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.url)
            .collect();
        assert_eq!(urls, ["https://new.example.com", "https://old.example.com"]);
    }

    #[tokio::test]
    async fn list_by_status_filters() {
        let repo = repo().await;
        let pending = repo.insert(&Preview::new("https://a.example.com")).await.unwrap();
        let mut processing = repo.insert(&Preview::new("https://b.example.com")).await.unwrap();
        processing.start_processing().unwrap();
        repo.save(&processing).await.unwrap();

        let rows = repo.list_by_status(PreviewStatus::Pending).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, pending.id);
    }

    #[tokio::test]
    async fn delete_reports_missing_rows() {
        let repo = repo().await;
        assert!(!repo.delete(Uuid::new_v4()).await.unwrap());
    }
}

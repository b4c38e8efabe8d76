use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Photo {
    pub id: Uuid,
    pub url: String,
    pub approved: bool,
    pub uploaded_by: Option<Uuid>,
    pub category: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewPhoto<'a> {
    pub url: &'a str,
    pub approved: bool,
    pub uploaded_by: Option<Uuid>,
    pub category: Option<&'a str>,
}

#[async_trait]
pub trait PhotoRepo: Send + Sync {
    async fn insert_photo(&self, new: NewPhoto<'_>) -> anyhow::Result<Photo>;
}

#[derive(Clone)]
pub struct PgPhotoRepo {
    db: PgPool,
}

impl PgPhotoRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl PhotoRepo for PgPhotoRepo {
    async fn insert_photo(&self, new: NewPhoto<'_>) -> anyhow::Result<Photo> {
        let photo = sqlx::query_as::<_, Photo>(
            r#"
            INSERT INTO photos (id, url, approved, uploaded_by, category)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, url, approved, uploaded_by, category, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.url)
        .bind(new.approved)
        .bind(new.uploaded_by) // Option<Uuid> → NULL allowed
        .bind(new.category)
        .fetch_one(&self.db)
        .await
        .context("insert photo")?;
        Ok(photo)
    }
}

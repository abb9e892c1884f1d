//! Admin content repository for `PostgreSQL`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;

use garden_core::{ContentId, ContentKind, UserId};

use super::{ContentRepository, RepositoryError};
use crate::models::ContentItem;

#[derive(Debug, sqlx::FromRow)]
struct ContentRow {
    id: ContentId,
    kind: ContentKind,
    body: Json<serde_json::Value>,
    created_by: UserId,
    created_at: DateTime<Utc>,
}

impl From<ContentRow> for ContentItem {
    fn from(r: ContentRow) -> Self {
        Self {
            id: r.id,
            kind: r.kind,
            body: r.body.0,
            created_by: r.created_by,
            created_at: r.created_at,
        }
    }
}

/// `PostgreSQL` implementation of [`ContentRepository`].
#[derive(Clone)]
pub struct PgContentRepository {
    pool: PgPool,
}

impl PgContentRepository {
    /// Create a new content repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContentRepository for PgContentRepository {
    async fn insert(
        &self,
        kind: ContentKind,
        body: serde_json::Value,
        created_by: UserId,
    ) -> Result<ContentItem, RepositoryError> {
        let row = sqlx::query_as::<_, ContentRow>(
            r"
            INSERT INTO garden.content_item (id, kind, body, created_by)
            VALUES ($1, $2, $3, $4)
            RETURNING id, kind, body, created_by, created_at
            ",
        )
        .bind(ContentId::generate())
        .bind(kind)
        .bind(Json(body))
        .bind(created_by)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn list(&self, kind: ContentKind) -> Result<Vec<ContentItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, ContentRow>(
            r"
            SELECT id, kind, body, created_by, created_at
            FROM garden.content_item
            WHERE kind = $1
            ORDER BY created_at DESC
            ",
        )
        .bind(kind)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ContentItem::from).collect())
    }

    async fn count(&self, kind: ContentKind) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM garden.content_item WHERE kind = $1",
        )
        .bind(kind)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}

//! Database repository for tags.

use crate::db::{
    errors::Result,
    handlers::repository::Repository,
    models::tags::{TagCreateDBRequest, TagDBResponse, TagUpdateDBRequest, TagWithCountDBResponse},
};
use crate::types::{TagId, abbrev_uuid};
use sqlx::PgConnection;
use std::collections::HashMap;
use tracing::instrument;
use uuid::Uuid;

/// Tags are few; listing returns all of them by name
#[derive(Debug, Clone, Default)]
pub struct TagFilter;

pub struct Tags<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Tags<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// All tags with the number of published projects carrying each
    #[instrument(skip(self), err)]
    pub async fn list_with_counts(&mut self) -> Result<Vec<TagWithCountDBResponse>> {
        let tags = sqlx::query_as::<_, TagWithCountDBResponse>(
            r#"
            SELECT t.id, t.name, t.slug, t.created_at,
                   COUNT(p.id) AS project_count
            FROM tags t
            LEFT JOIN project_tags pt ON pt.tag_id = t.id
            LEFT JOIN projects p ON p.id = pt.project_id AND p.published
            GROUP BY t.id
            ORDER BY t.name
            "#,
        )
        .fetch_all(&mut *self.db)
        .await?;
        Ok(tags)
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Tags<'c> {
    type CreateRequest = TagCreateDBRequest;
    type UpdateRequest = TagUpdateDBRequest;
    type Response = TagDBResponse;
    type Id = TagId;
    type Filter = TagFilter;

    #[instrument(skip(self, request), fields(slug = %request.slug), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let tag = sqlx::query_as::<_, TagDBResponse>("INSERT INTO tags (id, name, slug) VALUES ($1, $2, $3) RETURNING *")
            .bind(Uuid::new_v4())
            .bind(&request.name)
            .bind(&request.slug)
            .fetch_one(&mut *self.db)
            .await?;
        Ok(tag)
    }

    #[instrument(skip(self), fields(tag_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let tag = sqlx::query_as::<_, TagDBResponse>("SELECT * FROM tags WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(tag)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<TagId>) -> Result<HashMap<Self::Id, TagDBResponse>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let tags = sqlx::query_as::<_, TagDBResponse>("SELECT * FROM tags WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(tags.into_iter().map(|t| (t.id, t)).collect())
    }

    #[instrument(skip(self, _filter), err)]
    async fn list(&mut self, _filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let tags = sqlx::query_as::<_, TagDBResponse>("SELECT * FROM tags ORDER BY name")
            .fetch_all(&mut *self.db)
            .await?;
        Ok(tags)
    }

    #[instrument(skip(self), fields(tag_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM tags WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(tag_id = %abbrev_uuid(&id), slug = %request.slug), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let tag = sqlx::query_as::<_, TagDBResponse>("UPDATE tags SET name = $2, slug = $3 WHERE id = $1 RETURNING *")
            .bind(id)
            .bind(&request.name)
            .bind(&request.slug)
            .fetch_one(&mut *self.db)
            .await?;
        Ok(tag)
    }
}

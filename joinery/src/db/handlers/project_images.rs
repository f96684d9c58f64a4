//! Database repository for project images.
//!
//! Writes that touch a project's image order or cover hold that project's row lock, so
//! concurrent uploads to one project append one at a time.

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::project_images::{ImageRelocation, ProjectImageCreateDBRequest, ProjectImageDBResponse, ProjectImageUpdateDBRequest},
};
use crate::types::{ImageId, ProjectId, abbrev_uuid};
use sqlx::{Connection, PgConnection};
use std::collections::HashMap;
use tracing::instrument;
use uuid::Uuid;

/// Filter for listing images; always scoped to one project
#[derive(Debug, Clone)]
pub struct ProjectImageFilter {
    pub project_id: ProjectId,
}

pub struct ProjectImages<'c> {
    db: &'c mut PgConnection,
}

impl<'c> ProjectImages<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Serialize order and cover changes of one project until the transaction ends. A missing
    /// project is left for the foreign key to report.
    async fn lock_project_on(conn: &mut PgConnection, project_id: ProjectId) -> Result<()> {
        sqlx::query("SELECT id FROM projects WHERE id = $1 FOR UPDATE")
            .bind(project_id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(())
    }

    /// Lock the project's images for the rest of the caller's transaction
    #[instrument(skip(self), fields(project_id = %abbrev_uuid(&project_id)), err)]
    pub async fn lock_project(&mut self, project_id: ProjectId) -> Result<()> {
        Self::lock_project_on(&mut *self.db, project_id).await
    }

    async fn compact_on(conn: &mut PgConnection, project_id: ProjectId) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE project_images i
            SET display_order = o.rn - 1
            FROM (
                SELECT id, ROW_NUMBER() OVER (ORDER BY display_order, created_at, id) AS rn
                FROM project_images
                WHERE project_id = $1
            ) o
            WHERE i.id = o.id AND i.display_order <> o.rn - 1
            "#,
        )
        .bind(project_id)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Images of many projects at once, each list in display order
    #[instrument(skip(self, project_ids), fields(count = project_ids.len()), err)]
    pub async fn list_for_projects(&mut self, project_ids: &[ProjectId]) -> Result<HashMap<ProjectId, Vec<ProjectImageDBResponse>>> {
        if project_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let images = sqlx::query_as::<_, ProjectImageDBResponse>(
            "SELECT * FROM project_images WHERE project_id = ANY($1) ORDER BY project_id, display_order, created_at",
        )
        .bind(project_ids)
        .fetch_all(&mut *self.db)
        .await?;

        let mut result: HashMap<ProjectId, Vec<ProjectImageDBResponse>> = HashMap::new();
        for image in images {
            result.entry(image.project_id).or_default().push(image);
        }
        Ok(result)
    }

    /// Set the image order to the order of `ids`. Callers check `ids` is exactly the project's set.
    #[instrument(skip(self, ids), fields(project_id = %abbrev_uuid(&project_id), count = ids.len()), err)]
    pub async fn reorder(&mut self, project_id: ProjectId, ids: &[ImageId]) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE project_images i
            SET display_order = o.ord - 1
            FROM UNNEST($1::uuid[]) WITH ORDINALITY AS o(id, ord)
            WHERE i.id = o.id AND i.project_id = $2
            "#,
        )
        .bind(ids)
        .bind(project_id)
        .execute(&mut *self.db)
        .await?;
        Ok(())
    }

    /// Point image rows at their renamed assets
    #[instrument(skip(self, relocations), fields(count = relocations.len()), err)]
    pub async fn relocate(&mut self, relocations: &[ImageRelocation]) -> Result<()> {
        if relocations.is_empty() {
            return Ok(());
        }

        let ids: Vec<Uuid> = relocations.iter().map(|r| r.id).collect();
        let public_ids: Vec<&str> = relocations.iter().map(|r| r.public_id.as_str()).collect();
        let urls: Vec<&str> = relocations.iter().map(|r| r.url.as_str()).collect();

        sqlx::query(
            r#"
            UPDATE project_images i
            SET public_id = r.public_id, url = r.url
            FROM UNNEST($1::uuid[], $2::text[], $3::text[]) AS r(id, public_id, url)
            WHERE i.id = r.id
            "#,
        )
        .bind(&ids)
        .bind(&public_ids)
        .bind(&urls)
        .execute(&mut *self.db)
        .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl<'c> Repository for ProjectImages<'c> {
    type CreateRequest = ProjectImageCreateDBRequest;
    type UpdateRequest = ProjectImageUpdateDBRequest;
    type Response = ProjectImageDBResponse;
    type Id = ImageId;
    type Filter = ProjectImageFilter;

    /// Appends to the project's image order; the first image of a project becomes its cover
    #[instrument(skip(self, request), fields(project_id = %abbrev_uuid(&request.project_id), public_id = %request.public_id), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let mut tx = self.db.begin().await?;
        Self::lock_project_on(&mut tx, request.project_id).await?;

        let image = sqlx::query_as::<_, ProjectImageDBResponse>(
            r#"
            INSERT INTO project_images (id, project_id, public_id, url, width, height, alt_text, display_order, is_cover)
            VALUES (
                $1, $2, $3, $4, $5, $6, $7,
                (SELECT COALESCE(MAX(display_order) + 1, 0) FROM project_images WHERE project_id = $2),
                NOT EXISTS (SELECT 1 FROM project_images WHERE project_id = $2)
            )
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.project_id)
        .bind(&request.public_id)
        .bind(&request.url)
        .bind(request.width)
        .bind(request.height)
        .bind(&request.alt_text)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(image)
    }

    #[instrument(skip(self), fields(image_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let image = sqlx::query_as::<_, ProjectImageDBResponse>("SELECT * FROM project_images WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(image)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<ImageId>) -> Result<HashMap<Self::Id, ProjectImageDBResponse>> {
        let images = sqlx::query_as::<_, ProjectImageDBResponse>("SELECT * FROM project_images WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(images.into_iter().map(|i| (i.id, i)).collect())
    }

    #[instrument(skip(self, filter), fields(project_id = %abbrev_uuid(&filter.project_id)), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let images = sqlx::query_as::<_, ProjectImageDBResponse>(
            "SELECT * FROM project_images WHERE project_id = $1 ORDER BY display_order, created_at",
        )
        .bind(filter.project_id)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(images)
    }

    /// Removes the row, compacts the order, and promotes the first remaining image when the
    /// cover was deleted
    #[instrument(skip(self), fields(image_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let mut tx = self.db.begin().await?;

        let Some(project_id) = sqlx::query_scalar::<_, Uuid>("SELECT project_id FROM project_images WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(false);
        };
        Self::lock_project_on(&mut tx, project_id).await?;

        let Some(was_cover) = sqlx::query_scalar::<_, bool>("DELETE FROM project_images WHERE id = $1 RETURNING is_cover")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(false);
        };

        Self::compact_on(&mut tx, project_id).await?;

        if was_cover {
            sqlx::query(
                r#"
                UPDATE project_images SET is_cover = TRUE
                WHERE id = (
                    SELECT id FROM project_images WHERE project_id = $1
                    ORDER BY display_order, created_at LIMIT 1
                )
                "#,
            )
            .bind(project_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    #[instrument(skip(self, request), fields(image_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let mut tx = self.db.begin().await?;

        let project_id = sqlx::query_scalar::<_, Uuid>("SELECT project_id FROM project_images WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(DbError::NotFound)?;
        Self::lock_project_on(&mut tx, project_id).await?;

        // The partial unique index allows one cover, so the old one goes first
        if request.is_cover == Some(true) {
            sqlx::query("UPDATE project_images SET is_cover = FALSE WHERE project_id = $1 AND is_cover AND id <> $2")
                .bind(project_id)
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        let image = sqlx::query_as::<_, ProjectImageDBResponse>(
            r#"
            UPDATE project_images SET
                alt_text = CASE WHEN $2 THEN $3 ELSE alt_text END,
                is_cover = COALESCE($4, is_cover)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(request.alt_text.is_some())
        .bind(request.alt_text.clone().flatten())
        .bind(request.is_cover)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(image)
    }
}

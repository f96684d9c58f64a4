//! Database repository for projects.
//!
//! Projects on the same `project_date` form a sequence ordered by `display_order`. Every
//! operation that adds a project to a day, removes one, or moves one between days leaves that
//! day's orders as exactly `0..n`. Writers of a day's sequence hold a transaction-scoped advisory
//! lock on that day, taken before any project row lock.

use crate::db::{
    errors::Result,
    handlers::repository::Repository,
    models::{
        projects::{ProjectCreateDBRequest, ProjectDBResponse, ProjectTagRow, ProjectUpdateDBRequest},
        tags::TagDBResponse,
    },
};
use crate::types::{ProjectId, TagId, abbrev_uuid};
use chrono::{Datelike, NaiveDate};
use sqlx::{Connection, PgConnection};
use std::collections::HashMap;
use tracing::instrument;
use uuid::Uuid;

/// First key of the advisory locks guarding per-day sequences; the second is the day number
const DAY_SEQUENCE_LOCK: i32 = 0x4a4e_5259;

/// Filter for listing projects
#[derive(Debug, Clone, Default)]
pub struct ProjectFilter {
    /// Hide drafts (public listing)
    pub published_only: bool,
    /// Only projects carrying the tag with this slug
    pub tag_slug: Option<String>,
    pub featured: Option<bool>,
    pub skip: i64,
    pub limit: i64,
}

impl ProjectFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            ..Default::default()
        }
    }

    pub fn published(mut self) -> Self {
        self.published_only = true;
        self
    }

    pub fn with_tag(mut self, slug: Option<String>) -> Self {
        self.tag_slug = slug;
        self
    }

    pub fn with_featured(mut self, featured: Option<bool>) -> Self {
        self.featured = featured;
        self
    }
}

pub struct Projects<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Projects<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Renumber a day's sequence to `0..n`, keeping relative order
    async fn compact_day_on(conn: &mut PgConnection, date: NaiveDate) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE projects p
            SET display_order = o.rn - 1
            FROM (
                SELECT id, ROW_NUMBER() OVER (ORDER BY display_order, created_at, id) AS rn
                FROM projects
                WHERE project_date = $1
            ) o
            WHERE p.id = o.id AND p.display_order <> o.rn - 1
            "#,
        )
        .bind(date)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Block other writers of these days' sequences until the transaction ends. Days are locked
    /// in ascending order.
    async fn lock_days_on(conn: &mut PgConnection, days: &[NaiveDate]) -> Result<()> {
        let mut keys: Vec<i32> = days.iter().map(|day| day.num_days_from_ce()).collect();
        keys.sort_unstable();
        keys.dedup();
        for key in keys {
            sqlx::query("SELECT pg_advisory_xact_lock($1, $2)")
                .bind(DAY_SEQUENCE_LOCK)
                .bind(key)
                .execute(&mut *conn)
                .await?;
        }
        Ok(())
    }

    /// Lock a day's sequence for the rest of the caller's transaction
    #[instrument(skip(self), err)]
    pub async fn lock_day(&mut self, date: NaiveDate) -> Result<()> {
        Self::lock_days_on(&mut *self.db, &[date]).await
    }

    /// Folders already taken by projects on `date`
    #[instrument(skip(self), err)]
    pub async fn folders_on_date(&mut self, date: NaiveDate) -> Result<Vec<String>> {
        let folders = sqlx::query_scalar::<_, String>("SELECT folder FROM projects WHERE project_date = $1")
            .bind(date)
            .fetch_all(&mut *self.db)
            .await?;
        Ok(folders)
    }

    /// Project ids on `date` in display order
    #[instrument(skip(self), err)]
    pub async fn ids_on_date(&mut self, date: NaiveDate) -> Result<Vec<ProjectId>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM projects WHERE project_date = $1 ORDER BY display_order, created_at, id",
        )
        .bind(date)
        .fetch_all(&mut *self.db)
        .await?;
        Ok(ids)
    }

    /// Set a day's order to the order of `ids`. Callers check `ids` is exactly the day's set.
    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    pub async fn reorder_day(&mut self, date: NaiveDate, ids: &[ProjectId]) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE projects p
            SET display_order = o.ord - 1, updated_at = NOW()
            FROM UNNEST($1::uuid[]) WITH ORDINALITY AS o(id, ord)
            WHERE p.id = o.id AND p.project_date = $2
            "#,
        )
        .bind(ids)
        .bind(date)
        .execute(&mut *self.db)
        .await?;
        Ok(())
    }

    /// Move a project to another day and folder. It is appended to the new day's sequence and
    /// the old day is compacted.
    #[instrument(skip(self), fields(project_id = %abbrev_uuid(&id)), err)]
    pub async fn move_to_date(&mut self, id: ProjectId, date: NaiveDate, folder: &str) -> Result<ProjectDBResponse> {
        let mut tx = self.db.begin().await?;

        let seen_date = sqlx::query_scalar::<_, NaiveDate>("SELECT project_date FROM projects WHERE id = $1")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        Self::lock_days_on(&mut tx, &[seen_date, date]).await?;

        let old_date = sqlx::query_scalar::<_, NaiveDate>("SELECT project_date FROM projects WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        if old_date != seen_date {
            // Moved by someone else in between
            Self::lock_days_on(&mut tx, &[old_date]).await?;
        }

        let project = sqlx::query_as::<_, ProjectDBResponse>(
            r#"
            UPDATE projects
            SET project_date = $2,
                folder = $3,
                display_order = (
                    SELECT COALESCE(MAX(display_order) + 1, 0)
                    FROM projects
                    WHERE project_date = $2 AND id <> $1
                ),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(date)
        .bind(folder)
        .fetch_one(&mut *tx)
        .await?;

        if old_date != date {
            Self::compact_day_on(&mut tx, old_date).await?;
        }

        tx.commit().await?;
        Ok(project)
    }

    /// Replace the project's tag set
    #[instrument(skip(self, tag_ids), fields(project_id = %abbrev_uuid(&project_id), count = tag_ids.len()), err)]
    pub async fn set_tags(&mut self, project_id: ProjectId, tag_ids: &[TagId]) -> Result<()> {
        let mut tx = self.db.begin().await?;

        sqlx::query("DELETE FROM project_tags WHERE project_id = $1")
            .bind(project_id)
            .execute(&mut *tx)
            .await?;

        if !tag_ids.is_empty() {
            sqlx::query(
                r#"
                INSERT INTO project_tags (project_id, tag_id)
                SELECT $1, tag_id FROM UNNEST($2::uuid[]) AS t(tag_id)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(project_id)
            .bind(tag_ids)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Tags of many projects at once, sorted by name
    #[instrument(skip(self, project_ids), fields(count = project_ids.len()), err)]
    pub async fn tags_for(&mut self, project_ids: &[ProjectId]) -> Result<HashMap<ProjectId, Vec<TagDBResponse>>> {
        if project_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query_as::<_, ProjectTagRow>(
            r#"
            SELECT pt.project_id, t.id AS tag_id, t.name, t.slug, t.created_at
            FROM project_tags pt
            JOIN tags t ON t.id = pt.tag_id
            WHERE pt.project_id = ANY($1)
            ORDER BY t.name
            "#,
        )
        .bind(project_ids)
        .fetch_all(&mut *self.db)
        .await?;

        let mut result: HashMap<ProjectId, Vec<TagDBResponse>> = HashMap::new();
        for row in rows {
            result.entry(row.project_id).or_default().push(TagDBResponse {
                id: row.tag_id,
                name: row.name,
                slug: row.slug,
                created_at: row.created_at,
            });
        }
        Ok(result)
    }

    /// Number of projects matching a filter, ignoring skip/limit
    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &ProjectFilter) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM projects p
            WHERE ($1::boolean = FALSE OR p.published)
              AND ($2::text IS NULL OR EXISTS (
                    SELECT 1 FROM project_tags pt JOIN tags t ON t.id = pt.tag_id
                    WHERE pt.project_id = p.id AND t.slug = $2))
              AND ($3::boolean IS NULL OR p.featured = $3)
            "#,
        )
        .bind(filter.published_only)
        .bind(filter.tag_slug.as_deref())
        .bind(filter.featured)
        .fetch_one(&mut *self.db)
        .await?;
        Ok(count)
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Projects<'c> {
    type CreateRequest = ProjectCreateDBRequest;
    type UpdateRequest = ProjectUpdateDBRequest;
    type Response = ProjectDBResponse;
    type Id = ProjectId;
    type Filter = ProjectFilter;

    #[instrument(skip(self, request), fields(folder = %request.folder), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let mut tx = self.db.begin().await?;
        Self::lock_days_on(&mut tx, &[request.project_date]).await?;

        let project = sqlx::query_as::<_, ProjectDBResponse>(
            r#"
            INSERT INTO projects (id, title, description, location, project_date, folder, display_order, featured, published)
            VALUES (
                $1, $2, $3, $4, $5, $6,
                (SELECT COALESCE(MAX(display_order) + 1, 0) FROM projects WHERE project_date = $5),
                $7, $8
            )
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&request.title)
        .bind(&request.description)
        .bind(&request.location)
        .bind(request.project_date)
        .bind(&request.folder)
        .bind(request.featured)
        .bind(request.published)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(project)
    }

    #[instrument(skip(self), fields(project_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let project = sqlx::query_as::<_, ProjectDBResponse>("SELECT * FROM projects WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;
        Ok(project)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<ProjectId>) -> Result<HashMap<Self::Id, ProjectDBResponse>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let projects = sqlx::query_as::<_, ProjectDBResponse>("SELECT * FROM projects WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(projects.into_iter().map(|p| (p.id, p)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let projects = sqlx::query_as::<_, ProjectDBResponse>(
            r#"
            SELECT p.*
            FROM projects p
            WHERE ($1::boolean = FALSE OR p.published)
              AND ($2::text IS NULL OR EXISTS (
                    SELECT 1 FROM project_tags pt JOIN tags t ON t.id = pt.tag_id
                    WHERE pt.project_id = p.id AND t.slug = $2))
              AND ($3::boolean IS NULL OR p.featured = $3)
            ORDER BY p.project_date DESC, p.display_order ASC, p.created_at ASC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(filter.published_only)
        .bind(filter.tag_slug.as_deref())
        .bind(filter.featured)
        .bind(filter.limit)
        .bind(filter.skip)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(projects)
    }

    #[instrument(skip(self), fields(project_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let mut tx = self.db.begin().await?;

        let Some(seen_date) = sqlx::query_scalar::<_, NaiveDate>("SELECT project_date FROM projects WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(false);
        };
        Self::lock_days_on(&mut tx, &[seen_date]).await?;

        let date = sqlx::query_scalar::<_, NaiveDate>("DELETE FROM projects WHERE id = $1 RETURNING project_date")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(date) = date else {
            return Ok(false);
        };
        if date != seen_date {
            Self::lock_days_on(&mut tx, &[date]).await?;
        }

        Self::compact_day_on(&mut tx, date).await?;
        tx.commit().await?;
        Ok(true)
    }

    #[instrument(skip(self, request), fields(project_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let project = sqlx::query_as::<_, ProjectDBResponse>(
            r#"
            UPDATE projects SET
                title = COALESCE($2, title),
                description = CASE WHEN $3 THEN $4 ELSE description END,
                location = CASE WHEN $5 THEN $6 ELSE location END,
                featured = COALESCE($7, featured),
                published = COALESCE($8, published),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(request.title.as_deref())
        .bind(request.description.is_some())
        .bind(request.description.clone().flatten())
        .bind(request.location.is_some())
        .bind(request.location.clone().flatten())
        .bind(request.featured)
        .bind(request.published)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(project)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::errors::DbError;
    use crate::test_utils::{create_test_project, create_test_tag, date};
    use sqlx::PgPool;

    async fn orders_on(pool: &PgPool, day: NaiveDate) -> Vec<(ProjectId, i32)> {
        sqlx::query_as::<_, (Uuid, i32)>("SELECT id, display_order FROM projects WHERE project_date = $1 ORDER BY display_order")
            .bind(day)
            .fetch_all(pool)
            .await
            .unwrap()
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_appends_to_day(pool: PgPool) {
        let day = date(2024, 3, 9);
        let first = create_test_project(&pool, "Oak table", day, "root/projects/20240309-000000").await;
        let second = create_test_project(&pool, "Walnut desk", day, "root/projects/20240309-000001").await;
        let other = create_test_project(&pool, "Pine shelf", date(2024, 3, 10), "root/projects/20240310-000000").await;

        assert_eq!(first.display_order, 0);
        assert_eq!(second.display_order, 1);
        assert_eq!(other.display_order, 0);
        assert!(!first.published);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_duplicate_folder_is_unique_violation(pool: PgPool) {
        let day = date(2024, 3, 9);
        create_test_project(&pool, "Oak table", day, "root/projects/20240309-000000").await;

        let mut conn = pool.acquire().await.unwrap();
        let err = Projects::new(&mut conn)
            .create(&ProjectCreateDBRequest {
                title: "Clash".to_string(),
                description: None,
                location: None,
                project_date: day,
                folder: "root/projects/20240309-000000".to_string(),
                featured: false,
                published: false,
            })
            .await
            .unwrap_err();

        assert!(err.is_unique_violation_of("projects_folder_unique"), "unexpected error: {err:?}");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_compacts_day(pool: PgPool) {
        let day = date(2024, 3, 9);
        let a = create_test_project(&pool, "A", day, "root/projects/20240309-000000").await;
        let b = create_test_project(&pool, "B", day, "root/projects/20240309-000001").await;
        let c = create_test_project(&pool, "C", day, "root/projects/20240309-000002").await;

        let mut conn = pool.acquire().await.unwrap();
        assert!(Projects::new(&mut conn).delete(b.id).await.unwrap());
        assert!(!Projects::new(&mut conn).delete(b.id).await.unwrap());

        assert_eq!(orders_on(&pool, day).await, vec![(a.id, 0), (c.id, 1)]);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_move_to_date(pool: PgPool) {
        let old_day = date(2024, 3, 9);
        let new_day = date(2024, 4, 12);
        let a = create_test_project(&pool, "A", old_day, "root/projects/20240309-000000").await;
        let b = create_test_project(&pool, "B", old_day, "root/projects/20240309-000001").await;
        let c = create_test_project(&pool, "C", new_day, "root/projects/20240412-000000").await;

        let mut conn = pool.acquire().await.unwrap();
        let moved = Projects::new(&mut conn)
            .move_to_date(a.id, new_day, "root/projects/20240412-000001")
            .await
            .unwrap();

        assert_eq!(moved.project_date, new_day);
        assert_eq!(moved.folder, "root/projects/20240412-000001");
        assert_eq!(moved.display_order, 1);
        assert_eq!(orders_on(&pool, old_day).await, vec![(b.id, 0)]);
        assert_eq!(orders_on(&pool, new_day).await, vec![(c.id, 0), (a.id, 1)]);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_reorder_day(pool: PgPool) {
        let day = date(2024, 3, 9);
        let a = create_test_project(&pool, "A", day, "root/projects/20240309-000000").await;
        let b = create_test_project(&pool, "B", day, "root/projects/20240309-000001").await;
        let c = create_test_project(&pool, "C", day, "root/projects/20240309-000002").await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Projects::new(&mut conn);
        repo.reorder_day(day, &[c.id, a.id, b.id]).await.unwrap();

        assert_eq!(repo.ids_on_date(day).await.unwrap(), vec![c.id, a.id, b.id]);
        let mut folders = repo.folders_on_date(day).await.unwrap();
        folders.sort();
        assert_eq!(folders.len(), 3);
        assert_eq!(folders[0], "root/projects/20240309-000000");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_filters_and_ordering(pool: PgPool) {
        let older = create_test_project(&pool, "Older", date(2023, 1, 5), "root/projects/20230105-000000").await;
        let newer_a = create_test_project(&pool, "Newer A", date(2024, 6, 1), "root/projects/20240601-000000").await;
        let newer_b = create_test_project(&pool, "Newer B", date(2024, 6, 1), "root/projects/20240601-000001").await;
        let draft = create_test_project(&pool, "Draft", date(2024, 7, 1), "root/projects/20240701-000000").await;
        let oak = create_test_tag(&pool, "Oak", "oak").await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Projects::new(&mut conn);
        for p in [&older, &newer_a, &newer_b] {
            repo.update(
                p.id,
                &ProjectUpdateDBRequest {
                    published: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        }
        repo.update(
            newer_b.id,
            &ProjectUpdateDBRequest {
                featured: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        repo.set_tags(older.id, &[oak.id]).await.unwrap();

        let all = repo.list(&ProjectFilter::new(0, 10)).await.unwrap();
        let ids: Vec<_> = all.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![draft.id, newer_a.id, newer_b.id, older.id]);

        let published = repo.list(&ProjectFilter::new(0, 10).published()).await.unwrap();
        assert_eq!(published.len(), 3);
        assert_eq!(repo.count(&ProjectFilter::new(0, 10).published()).await.unwrap(), 3);

        let featured = repo
            .list(&ProjectFilter::new(0, 10).published().with_featured(Some(true)))
            .await
            .unwrap();
        assert_eq!(featured.iter().map(|p| p.id).collect::<Vec<_>>(), vec![newer_b.id]);

        let tagged = repo
            .list(&ProjectFilter::new(0, 10).published().with_tag(Some("oak".to_string())))
            .await
            .unwrap();
        assert_eq!(tagged.iter().map(|p| p.id).collect::<Vec<_>>(), vec![older.id]);

        let page = repo.list(&ProjectFilter::new(1, 2)).await.unwrap();
        assert_eq!(page.iter().map(|p| p.id).collect::<Vec<_>>(), vec![newer_a.id, newer_b.id]);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_clears_optional_fields(pool: PgPool) {
        let project = create_test_project(&pool, "A", date(2024, 3, 9), "root/projects/20240309-000000").await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Projects::new(&mut conn);
        let updated = repo
            .update(
                project.id,
                &ProjectUpdateDBRequest {
                    description: Some(Some("Quarter-sawn oak".to_string())),
                    location: Some(Some("Leeds".to_string())),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.description.as_deref(), Some("Quarter-sawn oak"));

        let updated = repo
            .update(
                project.id,
                &ProjectUpdateDBRequest {
                    title: Some("Renamed".to_string()),
                    location: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.title, "Renamed");
        assert_eq!(updated.description.as_deref(), Some("Quarter-sawn oak"));
        assert_eq!(updated.location, None);

        let missing = repo.update(Uuid::new_v4(), &ProjectUpdateDBRequest::default()).await;
        assert!(matches!(missing, Err(DbError::NotFound)));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_set_tags_and_tags_for(pool: PgPool) {
        let project = create_test_project(&pool, "A", date(2024, 3, 9), "root/projects/20240309-000000").await;
        let walnut = create_test_tag(&pool, "Walnut", "walnut").await;
        let oak = create_test_tag(&pool, "Oak", "oak").await;

        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Projects::new(&mut conn);
        repo.set_tags(project.id, &[walnut.id, oak.id]).await.unwrap();

        let tags = repo.tags_for(&[project.id]).await.unwrap();
        let names: Vec<_> = tags[&project.id].iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Oak", "Walnut"]);

        repo.set_tags(project.id, &[walnut.id]).await.unwrap();
        let tags = repo.tags_for(&[project.id]).await.unwrap();
        assert_eq!(tags[&project.id].len(), 1);

        let err = repo.set_tags(project.id, &[Uuid::new_v4()]).await.unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));
    }
}

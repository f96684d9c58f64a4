//! Project handlers.
//!
//! Every project owns a folder on the media host derived from its date (see [`crate::folders`]).
//! Creating a project allocates the next unused folder for its date, retrying when a
//! concurrent creation takes the same one. Changing the date moves every image to a new folder
//! on the media host before the database is touched, and undoes the moves if anything after
//! them fails.

use crate::{
    AppState,
    api::models::{
        images::ImageResponse,
        pagination::PaginatedResponse,
        projects::{ListProjectsQuery, ProjectCreate, ProjectOrderUpdate, ProjectResponse, ProjectUpdate, normalize_text, validate_title},
        tags::TagResponse,
        users::AdminUser,
    },
    db::{
        handlers::{ProjectImages, Projects, Repository, Tags, project_images::ProjectImageFilter, projects::ProjectFilter},
        models::{
            project_images::ImageRelocation,
            projects::{ProjectCreateDBRequest, ProjectDBResponse, ProjectUpdateDBRequest},
        },
    },
    errors::{Error, Result},
    folders,
    media::{MediaStore, reparent_public_id},
    types::{ProjectId, TagId, abbrev_uuid},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::NaiveDate;
use sqlx::{PgConnection, PgPool};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Attempts at allocating a folder before giving up with 409
const MAX_FOLDER_ATTEMPTS: usize = 5;

const FOLDER_CONSTRAINT: &str = "projects_folder_unique";

fn project_not_found(id: ProjectId) -> Error {
    Error::NotFound {
        resource: "Project".to_string(),
        id: id.to_string(),
    }
}

fn parse_date(input: &str) -> Result<NaiveDate> {
    folders::parse_project_date(input).map_err(|e| Error::BadRequest { message: e.to_string() })
}

/// Attach tags and images to projects, keeping their order
pub async fn load_responses(conn: &mut PgConnection, projects: Vec<ProjectDBResponse>) -> Result<Vec<ProjectResponse>> {
    let ids: Vec<ProjectId> = projects.iter().map(|p| p.id).collect();
    let mut tags = Projects::new(&mut *conn).tags_for(&ids).await?;
    let mut images = ProjectImages::new(&mut *conn).list_for_projects(&ids).await?;

    Ok(projects
        .into_iter()
        .map(|project| {
            let project_tags = tags.remove(&project.id).unwrap_or_default().into_iter().map(TagResponse::from).collect();
            let project_images = images
                .remove(&project.id)
                .unwrap_or_default()
                .into_iter()
                .map(ImageResponse::from)
                .collect();
            ProjectResponse::new(project, project_tags, project_images)
        })
        .collect())
}

async fn load_response(conn: &mut PgConnection, project: ProjectDBResponse) -> Result<ProjectResponse> {
    let id = project.id;
    load_responses(conn, vec![project])
        .await?
        .pop()
        .ok_or_else(|| project_not_found(id))
}

/// Deduplicate tag ids and check they all exist
async fn resolve_tags(conn: &mut PgConnection, tag_ids: &[TagId]) -> Result<Vec<TagId>> {
    let mut seen = HashSet::new();
    let unique: Vec<TagId> = tag_ids.iter().copied().filter(|id| seen.insert(*id)).collect();
    if unique.is_empty() {
        return Ok(unique);
    }

    let found = Tags::new(conn).get_bulk(unique.clone()).await?;
    if let Some(missing) = unique.iter().find(|id| !found.contains_key(id)) {
        return Err(Error::BadRequest {
            message: format!("Unknown tag {missing}"),
        });
    }
    Ok(unique)
}

async fn list_with_filter(state: &AppState, filter: ProjectFilter) -> Result<PaginatedResponse<ProjectResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Projects::new(&mut conn);
    let projects = repo.list(&filter).await?;
    let total = repo.count(&filter).await?;

    let data = load_responses(&mut conn, projects).await?;
    Ok(PaginatedResponse::new(data, total, filter.skip, filter.limit))
}

#[utoipa::path(
    get,
    path = "/api/projects",
    tag = "projects",
    summary = "List published projects",
    description = "Published projects, newest date first and in display order within a day.",
    params(ListProjectsQuery),
    responses(
        (status = 200, description = "Page of published projects", body = PaginatedResponse<ProjectResponse>),
        (status = 500, description = "Internal server error")
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_published_projects(
    State(state): State<AppState>,
    Query(query): Query<ListProjectsQuery>,
) -> Result<Json<PaginatedResponse<ProjectResponse>>> {
    let (skip, limit) = query.pagination.params();
    let filter = ProjectFilter::new(skip, limit)
        .published()
        .with_tag(query.tag)
        .with_featured(query.featured);
    Ok(Json(list_with_filter(&state, filter).await?))
}

#[utoipa::path(
    get,
    path = "/api/projects/{id}",
    tag = "projects",
    summary = "Get a published project",
    params(("id" = uuid::Uuid, Path, description = "Project ID")),
    responses(
        (status = 200, description = "The project", body = ProjectResponse),
        (status = 404, description = "No published project with this ID")
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_published_project(State(state): State<AppState>, Path(id): Path<ProjectId>) -> Result<Json<ProjectResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let project = Projects::new(&mut conn)
        .get_by_id(id)
        .await?
        .filter(|p| p.published)
        .ok_or_else(|| project_not_found(id))?;

    Ok(Json(load_response(&mut conn, project).await?))
}

#[utoipa::path(
    get,
    path = "/api/admin/projects",
    tag = "admin-projects",
    summary = "List all projects",
    description = "All projects including drafts, in the same order as the public listing.",
    params(ListProjectsQuery),
    responses(
        (status = 200, description = "Page of projects", body = PaginatedResponse<ProjectResponse>),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Not an administrator")
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_projects(
    State(state): State<AppState>,
    Query(query): Query<ListProjectsQuery>,
    _: AdminUser,
) -> Result<Json<PaginatedResponse<ProjectResponse>>> {
    let (skip, limit) = query.pagination.params();
    let filter = ProjectFilter::new(skip, limit).with_tag(query.tag).with_featured(query.featured);
    Ok(Json(list_with_filter(&state, filter).await?))
}

#[utoipa::path(
    post,
    path = "/api/admin/projects",
    tag = "admin-projects",
    summary = "Create a project",
    description = "Allocates the next unused media folder for the project date and appends the \
                   project to that day's display order.",
    request_body = ProjectCreate,
    responses(
        (status = 201, description = "Project created", body = ProjectResponse),
        (status = 400, description = "Invalid title, date or tag"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Not an administrator"),
        (status = 409, description = "No folder could be allocated for the date")
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_project(
    State(state): State<AppState>,
    _: AdminUser,
    Json(create): Json<ProjectCreate>,
) -> Result<(StatusCode, Json<ProjectResponse>)> {
    let title = validate_title(&create.title).map_err(|message| Error::BadRequest { message })?;
    let date = parse_date(&create.date)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let tag_ids = resolve_tags(&mut conn, create.tag_ids.as_deref().unwrap_or_default()).await?;

    let description = normalize_text(create.description);
    let location = normalize_text(create.location);

    for attempt in 1..=MAX_FOLDER_ATTEMPTS {
        let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

        let used = Projects::new(&mut tx).folders_on_date(date).await?;
        let suffix = folders::next_unused_suffix(date, used.iter().map(|f| folders::suffix_of(f)))
            .map_err(|e| Error::Conflict { message: e.to_string() })?;

        let request = ProjectCreateDBRequest {
            title: title.clone(),
            description: description.clone(),
            location: location.clone(),
            project_date: date,
            folder: folders::project_folder(&state.config.media.root_folder, &suffix),
            featured: create.featured,
            published: create.published,
        };

        let project = match Projects::new(&mut tx).create(&request).await {
            Ok(project) => project,
            Err(e) if e.is_unique_violation_of(FOLDER_CONSTRAINT) => {
                debug!("Folder {} taken by a concurrent create (attempt {})", request.folder, attempt);
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        Projects::new(&mut tx).set_tags(project.id, &tag_ids).await?;
        tx.commit().await.map_err(|e| Error::Database(e.into()))?;

        info!(
            "Created project {} in {} (day {}, position {})",
            abbrev_uuid(&project.id),
            project.folder,
            folders::compact_date(date),
            project.display_order
        );
        let response = load_response(&mut conn, project).await?;
        return Ok((StatusCode::CREATED, Json(response)));
    }

    Err(Error::Conflict {
        message: "Another project was created for this date at the same time. Please try again.".to_string(),
    })
}

#[utoipa::path(
    get,
    path = "/api/admin/projects/{id}",
    tag = "admin-projects",
    summary = "Get a project",
    params(("id" = uuid::Uuid, Path, description = "Project ID")),
    responses(
        (status = 200, description = "The project", body = ProjectResponse),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Not an administrator"),
        (status = 404, description = "Project not found")
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_project(State(state): State<AppState>, Path(id): Path<ProjectId>, _: AdminUser) -> Result<Json<ProjectResponse>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let project = Projects::new(&mut conn).get_by_id(id).await?.ok_or_else(|| project_not_found(id))?;
    Ok(Json(load_response(&mut conn, project).await?))
}

/// A completed move of a project's images to a new folder
struct FolderMove {
    date: NaiveDate,
    old_folder: String,
    new_folder: String,
    relocations: Vec<ImageRelocation>,
    /// `(old, new)` public ids of every renamed asset, in rename order
    renamed: Vec<(String, String)>,
}

/// Rename assets back to where they were. Failures are logged and skipped.
async fn revert_renames(media: &dyn MediaStore, renamed: &[(String, String)]) {
    for (old, new) in renamed.iter().rev() {
        if let Err(e) = media.rename(new, old).await {
            warn!("Failed to move {} back to {}: {:#}", new, old, e);
        }
    }
}

/// Move every image of `project` into a freshly allocated folder for `date`.
///
/// Nothing in the database changes here. When a rename fails, the assets already moved are
/// renamed back and the request fails.
async fn move_images(state: &AppState, conn: &mut PgConnection, project: &ProjectDBResponse, date: NaiveDate) -> Result<FolderMove> {
    let used = Projects::new(&mut *conn).folders_on_date(date).await?;
    let suffix = folders::next_unused_suffix(date, used.iter().map(|f| folders::suffix_of(f)))
        .map_err(|e| Error::Conflict { message: e.to_string() })?;
    let new_folder = folders::project_folder(&state.config.media.root_folder, &suffix);

    let images = ProjectImages::new(&mut *conn)
        .list(&ProjectImageFilter { project_id: project.id })
        .await?;

    let mut relocations = Vec::with_capacity(images.len());
    let mut renamed = Vec::with_capacity(images.len());

    for image in images {
        let Some(target) = reparent_public_id(&image.public_id, &project.folder, &new_folder) else {
            warn!(
                "Image {} is outside its project folder {}, leaving it in place",
                image.public_id, project.folder
            );
            continue;
        };

        match state.media.rename(&image.public_id, &target).await {
            Ok(asset) => {
                renamed.push((image.public_id.clone(), asset.public_id.clone()));
                relocations.push(ImageRelocation {
                    id: image.id,
                    public_id: asset.public_id,
                    url: asset.url,
                });
            }
            Err(e) => {
                warn!("Failed to move {} to {}: {:#}", image.public_id, target, e);
                revert_renames(state.media.as_ref(), &renamed).await;
                return Err(Error::Internal {
                    operation: format!("move images of project {} to {new_folder}", project.id),
                });
            }
        }
    }

    Ok(FolderMove {
        date,
        old_folder: project.folder.clone(),
        new_folder,
        relocations,
        renamed,
    })
}

/// Write a project update in one transaction
async fn apply_update(
    db: &PgPool,
    id: ProjectId,
    request: &ProjectUpdateDBRequest,
    tag_ids: Option<&[TagId]>,
    folder_move: Option<&FolderMove>,
) -> Result<()> {
    let mut tx = db.begin().await.map_err(|e| Error::Database(e.into()))?;

    if let Some(folder_move) = folder_move {
        Projects::new(&mut tx).move_to_date(id, folder_move.date, &folder_move.new_folder).await?;
        ProjectImages::new(&mut tx).relocate(&folder_move.relocations).await?;
    }

    Projects::new(&mut tx).update(id, request).await?;

    if let Some(tag_ids) = tag_ids {
        Projects::new(&mut tx).set_tags(id, tag_ids).await?;
    }

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    Ok(())
}

#[utoipa::path(
    patch,
    path = "/api/admin/projects/{id}",
    tag = "admin-projects",
    summary = "Update a project",
    description = "Changing the date moves the project's images to a new folder on the media host \
                   and moves the project from the old day's display order to the end of the new \
                   day's. `tag_ids` replaces the tag set.",
    params(("id" = uuid::Uuid, Path, description = "Project ID")),
    request_body = ProjectUpdate,
    responses(
        (status = 200, description = "Updated project", body = ProjectResponse),
        (status = 400, description = "Invalid title, date or tag"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Not an administrator"),
        (status = 404, description = "Project not found"),
        (status = 500, description = "Images could not be moved; nothing was changed")
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_project(
    State(state): State<AppState>,
    Path(id): Path<ProjectId>,
    _: AdminUser,
    Json(update): Json<ProjectUpdate>,
) -> Result<Json<ProjectResponse>> {
    let title = update
        .title
        .as_deref()
        .map(validate_title)
        .transpose()
        .map_err(|message| Error::BadRequest { message })?;
    let new_date = update.date.as_deref().map(parse_date).transpose()?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let project = Projects::new(&mut conn).get_by_id(id).await?.ok_or_else(|| project_not_found(id))?;

    let tag_ids = match &update.tag_ids {
        Some(tag_ids) => Some(resolve_tags(&mut conn, tag_ids).await?),
        None => None,
    };

    let request = ProjectUpdateDBRequest {
        title,
        description: update.description.map(normalize_text),
        location: update.location.map(normalize_text),
        featured: update.featured,
        published: update.published,
    };

    let folder_move = match new_date.filter(|date| *date != project.project_date) {
        Some(date) => Some(move_images(&state, &mut conn, &project, date).await?),
        None => None,
    };

    if let Err(e) = apply_update(&state.db, id, &request, tag_ids.as_deref(), folder_move.as_ref()).await {
        if let Some(folder_move) = &folder_move {
            warn!("Project update failed after moving images, moving them back");
            revert_renames(state.media.as_ref(), &folder_move.renamed).await;
        }
        return Err(e);
    }

    if let Some(folder_move) = &folder_move {
        info!(
            "Moved project {} from {} to {} ({} images)",
            abbrev_uuid(&id),
            folder_move.old_folder,
            folder_move.new_folder,
            folder_move.relocations.len()
        );
        if let Err(e) = state.media.delete_folder(&folder_move.old_folder).await {
            warn!("Failed to delete old folder {}: {:#}", folder_move.old_folder, e);
        }
    }

    let project = Projects::new(&mut conn).get_by_id(id).await?.ok_or_else(|| project_not_found(id))?;
    Ok(Json(load_response(&mut conn, project).await?))
}

#[utoipa::path(
    delete,
    path = "/api/admin/projects/{id}",
    tag = "admin-projects",
    summary = "Delete a project",
    description = "Destroys the project's images and folder on the media host (failures are logged, \
                   not fatal), then deletes the project and closes the gap in its day's order.",
    params(("id" = uuid::Uuid, Path, description = "Project ID")),
    responses(
        (status = 204, description = "Project deleted"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Not an administrator"),
        (status = 404, description = "Project not found")
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_project(State(state): State<AppState>, Path(id): Path<ProjectId>, _: AdminUser) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let project = Projects::new(&mut conn).get_by_id(id).await?.ok_or_else(|| project_not_found(id))?;

    let images = ProjectImages::new(&mut conn).list(&ProjectImageFilter { project_id: id }).await?;
    for image in &images {
        if let Err(e) = state.media.destroy(&image.public_id).await {
            warn!("Failed to destroy {} while deleting project: {:#}", image.public_id, e);
        }
    }
    if let Err(e) = state.media.delete_folder(&project.folder).await {
        warn!("Failed to delete folder {}: {:#}", project.folder, e);
    }

    if !Projects::new(&mut conn).delete(id).await? {
        return Err(project_not_found(id));
    }

    info!("Deleted project {} ({} images)", abbrev_uuid(&id), images.len());
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    put,
    path = "/api/admin/projects/order",
    tag = "admin-projects",
    summary = "Reorder a day's projects",
    description = "`project_ids` must list exactly the projects on `date`; their display order \
                   becomes the list order.",
    request_body = ProjectOrderUpdate,
    responses(
        (status = 204, description = "Order saved"),
        (status = 400, description = "The ids are not exactly the projects on that date"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Not an administrator")
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn reorder_projects(State(state): State<AppState>, _: AdminUser, Json(order): Json<ProjectOrderUpdate>) -> Result<StatusCode> {
    let date = parse_date(&order.date)?;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Projects::new(&mut tx);
    repo.lock_day(date).await?;

    let current: HashSet<ProjectId> = repo.ids_on_date(date).await?.into_iter().collect();
    let requested: HashSet<ProjectId> = order.project_ids.iter().copied().collect();
    if requested.len() != order.project_ids.len() || requested != current {
        return Err(Error::BadRequest {
            message: format!("project_ids must list each project dated {date} exactly once"),
        });
    }

    repo.reorder_day(date, &order.project_ids).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::{
        api::models::{pagination::PaginatedResponse, projects::ProjectResponse},
        test_utils::*,
    };
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::PgPool;

    async fn create(server: &axum_test::TestServer, cookie: &str, body: serde_json::Value) -> ProjectResponse {
        let response = server.post("/api/admin/projects").add_header("cookie", cookie).json(&body).await;
        response.assert_status(StatusCode::CREATED);
        response.json()
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_admin_routes_require_admin(pool: PgPool) {
        let (server, _media) = create_test_app(pool.clone()).await;

        server.get("/api/admin/projects").await.assert_status(StatusCode::UNAUTHORIZED);

        let visitor = create_test_user(&pool, "visitor@example.com", false).await;
        let cookie = session_cookie_for(&create_test_config(), &visitor);
        server
            .post("/api/admin/projects")
            .add_header("cookie", &cookie)
            .json(&json!({"title": "Oak table", "date": "2024-03-09"}))
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_allocates_sequential_folders(pool: PgPool) {
        let (server, _media) = create_test_app(pool.clone()).await;
        let cookie = admin_cookie(&pool).await;

        let first = create(&server, &cookie, json!({"title": "Oak table", "date": "2024-03-09"})).await;
        let second = create(&server, &cookie, json!({"title": " Walnut desk ", "date": "2024-03-09"})).await;

        assert_eq!(first.folder, "joinery/projects/20240309-000000");
        assert_eq!(second.folder, "joinery/projects/20240309-000001");
        assert_eq!(first.display_order, 0);
        assert_eq!(second.display_order, 1);
        assert_eq!(second.title, "Walnut desk");
        assert!(!first.published);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_continues_after_latest_folder(pool: PgPool) {
        let (server, _media) = create_test_app(pool.clone()).await;
        let cookie = admin_cookie(&pool).await;
        create_test_project(&pool, "Old", date(2024, 3, 9), "joinery/projects/20240309-000005").await;

        let project = create(&server, &cookie, json!({"title": "New", "date": "2024-03-09"})).await;
        assert_eq!(project.folder, "joinery/projects/20240309-000006");
        assert_eq!(project.display_order, 1);
    }

    async fn try_create(server: &axum_test::TestServer, cookie: &str, title: &str) -> axum_test::TestResponse {
        server
            .post("/api/admin/projects")
            .add_header("cookie", cookie)
            .json(&json!({"title": title, "date": "2024-03-09"}))
            .await
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_concurrent_creates_get_distinct_folders(pool: PgPool) {
        let (server, _media) = create_test_app(pool.clone()).await;
        let cookie = admin_cookie(&pool).await;

        let (a, b, c, d) = tokio::join!(
            try_create(&server, &cookie, "A"),
            try_create(&server, &cookie, "B"),
            try_create(&server, &cookie, "C"),
            try_create(&server, &cookie, "D"),
        );

        let mut projects: Vec<ProjectResponse> = [a, b, c, d]
            .into_iter()
            .map(|response| {
                response.assert_status(StatusCode::CREATED);
                response.json()
            })
            .collect();
        projects.sort_by_key(|p| p.display_order);

        assert_eq!(projects.iter().map(|p| p.display_order).collect::<Vec<_>>(), vec![0, 1, 2, 3]);
        let mut folders: Vec<&str> = projects.iter().map(|p| p.folder.as_str()).collect();
        folders.sort();
        assert_eq!(
            folders,
            vec![
                "joinery/projects/20240309-000000",
                "joinery/projects/20240309-000001",
                "joinery/projects/20240309-000002",
                "joinery/projects/20240309-000003",
            ]
        );
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_gives_up_when_folder_stays_taken(pool: PgPool) {
        let (server, _media) = create_test_app(pool.clone()).await;
        let cookie = admin_cookie(&pool).await;
        // Dated the next day, so it never shows up among the 9th's folders and every attempt collides
        create_test_project(&pool, "Misfiled", date(2024, 3, 10), "joinery/projects/20240309-000000").await;

        try_create(&server, &cookie, "Oak table").await.assert_status(StatusCode::CONFLICT);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM projects WHERE project_date = '2024-03-09'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_failed_write_after_move_puts_images_back(pool: PgPool) {
        let (server, media) = create_test_app(pool.clone()).await;
        let cookie = admin_cookie(&pool).await;
        let project = create_test_project(&pool, "Stairs", date(2024, 3, 9), "joinery/projects/20240309-000000").await;
        create_test_image(&pool, &project, "a").await;
        create_test_image(&pool, &project, "b").await;

        sqlx::raw_sql(
            r#"
            CREATE FUNCTION refuse_image_update() RETURNS trigger AS $$
            BEGIN
                RAISE EXCEPTION 'image rows are read-only';
            END
            $$ LANGUAGE plpgsql;
            CREATE TRIGGER project_images_read_only BEFORE UPDATE ON project_images
                FOR EACH ROW EXECUTE FUNCTION refuse_image_update();
            "#,
        )
        .execute(&pool)
        .await
        .unwrap();

        server
            .patch(&format!("/api/admin/projects/{}", project.id))
            .add_header("cookie", &cookie)
            .json(&json!({"date": "2024-05-01"}))
            .await
            .assert_status(StatusCode::INTERNAL_SERVER_ERROR);

        let calls = media.calls();
        for name in ["a", "b"] {
            let old = format!("joinery/projects/20240309-000000/{name}");
            let new = format!("joinery/projects/20240501-000000/{name}");
            assert!(calls.contains(&MediaCall::Rename {
                from: old.clone(),
                to: new.clone()
            }));
            assert!(calls.contains(&MediaCall::Rename {
                from: new,
                to: old.clone()
            }));
            assert!(media.has_asset(&old));
        }
        assert!(!calls.iter().any(|call| matches!(call, MediaCall::DeleteFolder(_))));

        let unchanged: ProjectResponse = server
            .get(&format!("/api/admin/projects/{}", project.id))
            .add_header("cookie", &cookie)
            .await
            .json();
        assert_eq!(unchanged.date, date(2024, 3, 9));
        assert_eq!(unchanged.folder, "joinery/projects/20240309-000000");
        assert_eq!(unchanged.images[0].public_id, "joinery/projects/20240309-000000/a");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_clamps_day_and_links_tags(pool: PgPool) {
        let (server, _media) = create_test_app(pool.clone()).await;
        let cookie = admin_cookie(&pool).await;
        let oak = create_test_tag(&pool, "Oak", "oak").await;

        let project = create(
            &server,
            &cookie,
            json!({"title": "Leap day stairs", "date": "2024-02-31", "tag_ids": [oak.id, oak.id], "published": true}),
        )
        .await;

        assert_eq!(project.date, date(2024, 2, 29));
        assert_eq!(project.folder, "joinery/projects/20240229-000000");
        assert_eq!(project.tags.len(), 1);
        assert_eq!(project.tags[0].slug, "oak");
        assert!(project.published);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_validation(pool: PgPool) {
        let (server, _media) = create_test_app(pool.clone()).await;
        let cookie = admin_cookie(&pool).await;

        for body in [
            json!({"title": "   ", "date": "2024-03-09"}),
            json!({"title": "Table", "date": "09/03/2024"}),
            json!({"title": "Table", "date": "2024-13-01"}),
            json!({"title": "Table", "date": "2024-03-09", "tag_ids": [uuid::Uuid::new_v4()]}),
        ] {
            server
                .post("/api/admin/projects")
                .add_header("cookie", &cookie)
                .json(&body)
                .await
                .assert_status(StatusCode::BAD_REQUEST);
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_public_listing_hides_drafts(pool: PgPool) {
        let (server, _media) = create_test_app(pool.clone()).await;
        let oak = create_test_tag(&pool, "Oak", "oak").await;
        let older = create_test_project(&pool, "Older", date(2024, 1, 5), "joinery/projects/20240105-000000").await;
        let newer = create_test_project(&pool, "Newer", date(2024, 2, 5), "joinery/projects/20240205-000000").await;
        let draft = create_test_project(&pool, "Draft", date(2024, 3, 5), "joinery/projects/20240305-000000").await;
        publish_project(&pool, &older).await;
        publish_project(&pool, &newer).await;
        create_test_image(&pool, &newer, "front").await;
        sqlx::query("INSERT INTO project_tags (project_id, tag_id) VALUES ($1, $2)")
            .bind(older.id)
            .bind(oak.id)
            .execute(&pool)
            .await
            .unwrap();

        let page: PaginatedResponse<ProjectResponse> = server.get("/api/projects").await.json();
        assert_eq!(page.total_count, 2);
        assert_eq!(page.data.iter().map(|p| p.id).collect::<Vec<_>>(), vec![newer.id, older.id]);
        assert_eq!(page.data[0].images.len(), 1);
        assert!(page.data[0].cover_url.is_some());

        let page: PaginatedResponse<ProjectResponse> = server.get("/api/projects?tag=oak").await.json();
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.data[0].id, older.id);

        server.get(&format!("/api/projects/{}", draft.id)).await.assert_status(StatusCode::NOT_FOUND);
        server.get(&format!("/api/projects/{}", newer.id)).await.assert_status_ok();

        let cookie = admin_cookie(&pool).await;
        let page: PaginatedResponse<ProjectResponse> =
            server.get("/api/admin/projects").add_header("cookie", &cookie).await.json();
        assert_eq!(page.total_count, 3);
        assert_eq!(page.data[0].id, draft.id);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_date_change_moves_images_and_sequences(pool: PgPool) {
        let (server, media) = create_test_app(pool.clone()).await;
        let cookie = admin_cookie(&pool).await;

        let moving = create_test_project(&pool, "Moving", date(2024, 3, 9), "joinery/projects/20240309-000000").await;
        let staying = create_test_project(&pool, "Staying", date(2024, 3, 9), "joinery/projects/20240309-000001").await;
        create_test_project(&pool, "Already there", date(2024, 4, 1), "joinery/projects/20240401-000000").await;
        create_test_image(&pool, &moving, "front").await;
        create_test_image(&pool, &moving, "detail").await;

        let response = server
            .patch(&format!("/api/admin/projects/{}", moving.id))
            .add_header("cookie", &cookie)
            .json(&json!({"date": "2024-04-01"}))
            .await;
        response.assert_status_ok();
        let moved: ProjectResponse = response.json();

        assert_eq!(moved.date, date(2024, 4, 1));
        assert_eq!(moved.folder, "joinery/projects/20240401-000001");
        assert_eq!(moved.display_order, 1);
        let public_ids: Vec<&str> = moved.images.iter().map(|i| i.public_id.as_str()).collect();
        assert_eq!(
            public_ids,
            vec!["joinery/projects/20240401-000001/front", "joinery/projects/20240401-000001/detail"]
        );
        assert!(moved.images.iter().all(|i| i.url.contains("20240401-000001")));

        let staying: ProjectResponse = server
            .get(&format!("/api/admin/projects/{}", staying.id))
            .add_header("cookie", &cookie)
            .await
            .json();
        assert_eq!(staying.display_order, 0);

        let calls = media.calls();
        assert!(calls.contains(&MediaCall::Rename {
            from: "joinery/projects/20240309-000000/front".to_string(),
            to: "joinery/projects/20240401-000001/front".to_string(),
        }));
        assert!(calls.contains(&MediaCall::DeleteFolder("joinery/projects/20240309-000000".to_string())));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_failed_rename_reverts_and_changes_nothing(pool: PgPool) {
        let (server, media) = create_test_app(pool.clone()).await;
        let cookie = admin_cookie(&pool).await;
        let project = create_test_project(&pool, "Stairs", date(2024, 3, 9), "joinery/projects/20240309-000000").await;
        create_test_image(&pool, &project, "a").await;
        create_test_image(&pool, &project, "b").await;
        media.fail_rename_from("joinery/projects/20240309-000000/b");

        server
            .patch(&format!("/api/admin/projects/{}", project.id))
            .add_header("cookie", &cookie)
            .json(&json!({"date": "2024-05-01", "title": "Renamed"}))
            .await
            .assert_status(StatusCode::INTERNAL_SERVER_ERROR);

        let unchanged: ProjectResponse = server
            .get(&format!("/api/admin/projects/{}", project.id))
            .add_header("cookie", &cookie)
            .await
            .json();
        assert_eq!(unchanged.title, "Stairs");
        assert_eq!(unchanged.folder, "joinery/projects/20240309-000000");
        assert_eq!(unchanged.images[0].public_id, "joinery/projects/20240309-000000/a");

        let calls = media.calls();
        assert_eq!(
            calls.last(),
            Some(&MediaCall::Rename {
                from: "joinery/projects/20240501-000000/a".to_string(),
                to: "joinery/projects/20240309-000000/a".to_string(),
            })
        );
        assert!(media.has_asset("joinery/projects/20240309-000000/a"));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_fields_without_date_change(pool: PgPool) {
        let (server, media) = create_test_app(pool.clone()).await;
        let cookie = admin_cookie(&pool).await;
        let oak = create_test_tag(&pool, "Oak", "oak").await;
        let ash = create_test_tag(&pool, "Ash", "ash").await;
        let project = create(
            &server,
            &cookie,
            json!({"title": "Table", "date": "2024-03-09", "description": "Solid oak", "tag_ids": [oak.id]}),
        )
        .await;

        let updated: ProjectResponse = server
            .patch(&format!("/api/admin/projects/{}", project.id))
            .add_header("cookie", &cookie)
            .json(&json!({"description": null, "featured": true, "date": "2024-03-09", "tag_ids": [ash.id]}))
            .await
            .json();

        assert_eq!(updated.description, None);
        assert!(updated.featured);
        assert_eq!(updated.folder, project.folder);
        assert_eq!(updated.tags.iter().map(|t| t.slug.as_str()).collect::<Vec<_>>(), vec!["ash"]);
        assert!(media.calls().is_empty());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_project_cleans_media_and_compacts(pool: PgPool) {
        let (server, media) = create_test_app(pool.clone()).await;
        let cookie = admin_cookie(&pool).await;
        let first = create_test_project(&pool, "First", date(2024, 3, 9), "joinery/projects/20240309-000000").await;
        let second = create_test_project(&pool, "Second", date(2024, 3, 9), "joinery/projects/20240309-000001").await;
        create_test_image(&pool, &first, "a").await;
        media.fail_destroys();

        server
            .delete(&format!("/api/admin/projects/{}", first.id))
            .add_header("cookie", &cookie)
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let calls = media.calls();
        assert!(calls.contains(&MediaCall::Destroy("joinery/projects/20240309-000000/a".to_string())));
        assert!(calls.contains(&MediaCall::DeleteFolder("joinery/projects/20240309-000000".to_string())));

        let remaining: ProjectResponse = server
            .get(&format!("/api/admin/projects/{}", second.id))
            .add_header("cookie", &cookie)
            .await
            .json();
        assert_eq!(remaining.display_order, 0);

        server
            .delete(&format!("/api/admin/projects/{}", first.id))
            .add_header("cookie", &cookie)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_reorder_requires_exact_set(pool: PgPool) {
        let (server, _media) = create_test_app(pool.clone()).await;
        let cookie = admin_cookie(&pool).await;
        let a = create_test_project(&pool, "A", date(2024, 3, 9), "joinery/projects/20240309-000000").await;
        let b = create_test_project(&pool, "B", date(2024, 3, 9), "joinery/projects/20240309-000001").await;
        let other = create_test_project(&pool, "C", date(2024, 3, 10), "joinery/projects/20240310-000000").await;

        for ids in [vec![a.id], vec![a.id, b.id, other.id], vec![a.id, a.id]] {
            server
                .put("/api/admin/projects/order")
                .add_header("cookie", &cookie)
                .json(&json!({"date": "2024-03-09", "project_ids": ids}))
                .await
                .assert_status(StatusCode::BAD_REQUEST);
        }

        server
            .put("/api/admin/projects/order")
            .add_header("cookie", &cookie)
            .json(&json!({"date": "2024-03-09", "project_ids": [b.id, a.id]}))
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let page: PaginatedResponse<ProjectResponse> =
            server.get("/api/admin/projects").add_header("cookie", &cookie).await.json();
        let day: Vec<_> = page.data.iter().filter(|p| p.date == date(2024, 3, 9)).map(|p| p.id).collect();
        assert_eq!(day, vec![b.id, a.id]);
    }
}

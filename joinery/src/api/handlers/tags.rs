use crate::{
    AppState,
    api::models::{
        tags::{TagCreate, TagResponse, TagUpdate, TagWithCountResponse, slugify},
        users::AdminUser,
    },
    db::{
        handlers::{Repository, Tags, tags::TagFilter},
        models::tags::{TagCreateDBRequest, TagUpdateDBRequest},
    },
    errors::{Error, Result},
    types::TagId,
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

/// Longest accepted tag name
const MAX_TAG_NAME_LEN: usize = 50;

/// Trimmed name and derived slug
fn name_and_slug(name: &str) -> Result<(String, String)> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::BadRequest {
            message: "Tag name must not be empty".to_string(),
        });
    }
    if name.chars().count() > MAX_TAG_NAME_LEN {
        return Err(Error::BadRequest {
            message: format!("Tag name must be at most {MAX_TAG_NAME_LEN} characters"),
        });
    }
    let slug = slugify(name);
    if slug.is_empty() {
        return Err(Error::BadRequest {
            message: "Tag name must contain at least one letter or digit".to_string(),
        });
    }
    Ok((name.to_string(), slug))
}

#[utoipa::path(
    get,
    path = "/api/tags",
    tag = "projects",
    summary = "List tags",
    description = "All tags with the number of published projects carrying each, by name.",
    responses((status = 200, description = "Tags with counts", body = Vec<TagWithCountResponse>))
)]
#[tracing::instrument(skip_all)]
pub async fn list_tags_with_counts(State(state): State<AppState>) -> Result<Json<Vec<TagWithCountResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let tags = Tags::new(&mut conn).list_with_counts().await?;
    Ok(Json(tags.into_iter().map(TagWithCountResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/api/admin/tags",
    tag = "admin-tags",
    summary = "List tags",
    responses(
        (status = 200, description = "All tags by name", body = Vec<TagResponse>),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Not an administrator")
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_tags(State(state): State<AppState>, _: AdminUser) -> Result<Json<Vec<TagResponse>>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let tags = Tags::new(&mut conn).list(&TagFilter).await?;
    Ok(Json(tags.into_iter().map(TagResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/api/admin/tags",
    tag = "admin-tags",
    summary = "Create a tag",
    description = "The slug is derived from the name.",
    request_body = TagCreate,
    responses(
        (status = 201, description = "Tag created", body = TagResponse),
        (status = 400, description = "Empty name, or a name without letters or digits"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Not an administrator"),
        (status = 409, description = "A tag with this name or slug exists")
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_tag(
    State(state): State<AppState>,
    _: AdminUser,
    Json(create): Json<TagCreate>,
) -> Result<(StatusCode, Json<TagResponse>)> {
    let (name, slug) = name_and_slug(&create.name)?;
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let tag = Tags::new(&mut conn).create(&TagCreateDBRequest { name, slug }).await?;
    Ok((StatusCode::CREATED, Json(TagResponse::from(tag))))
}

#[utoipa::path(
    patch,
    path = "/api/admin/tags/{id}",
    tag = "admin-tags",
    summary = "Rename a tag",
    params(("id" = uuid::Uuid, Path, description = "Tag ID")),
    request_body = TagUpdate,
    responses(
        (status = 200, description = "Tag renamed", body = TagResponse),
        (status = 400, description = "Empty name, or a name without letters or digits"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Not an administrator"),
        (status = 404, description = "Tag not found"),
        (status = 409, description = "A tag with this name or slug exists")
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_tag(
    State(state): State<AppState>,
    Path(id): Path<TagId>,
    _: AdminUser,
    Json(update): Json<TagUpdate>,
) -> Result<Json<TagResponse>> {
    let (name, slug) = name_and_slug(&update.name)?;
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let tag = Tags::new(&mut conn).update(id, &TagUpdateDBRequest { name, slug }).await?;
    Ok(Json(TagResponse::from(tag)))
}

#[utoipa::path(
    delete,
    path = "/api/admin/tags/{id}",
    tag = "admin-tags",
    summary = "Delete a tag",
    description = "Projects carrying the tag lose it.",
    params(("id" = uuid::Uuid, Path, description = "Tag ID")),
    responses(
        (status = 204, description = "Tag deleted"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Not an administrator"),
        (status = 404, description = "Tag not found")
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_tag(State(state): State<AppState>, Path(id): Path<TagId>, _: AdminUser) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    if !Tags::new(&mut conn).delete(id).await? {
        return Err(Error::NotFound {
            resource: "Tag".to_string(),
            id: id.to_string(),
        });
    }
    Ok(StatusCode::NO_CONTENT)
}

//! Server-rendered pages.
//!
//! Every page gets the merged site settings as `settings` and the current `year`, which the
//! base template uses for the header and footer. Drafts never reach a public page.

use crate::{
    AppState,
    api::{
        handlers::{projects::load_responses, settings::load_settings},
        models::{
            contact::ContactMessageResponse,
            projects::ProjectResponse,
            settings::SiteSettings,
            tags::{TagResponse, TagWithCountResponse},
        },
    },
    auth::current_user::optional_user,
    db::handlers::{ContactMessages, Projects, Repository, Tags, projects::ProjectFilter, tags::TagFilter},
    errors::{Error, Result},
    types::ProjectId,
};
use axum::{
    extract::{Path, Query, State},
    http::{StatusCode, header::LOCATION, request::Parts},
    response::{Html, IntoResponse, Response},
};
use chrono::{Datelike, Utc};
use minijinja::{Value, context};
use serde::Deserialize;
use sqlx::PgConnection;
use tracing::error;

/// Projects on the home page
const HOME_PROJECTS: i64 = 6;

/// Projects per gallery page
const GALLERY_PAGE_SIZE: i64 = 24;

/// Rows the admin dashboard lists
const ADMIN_PROJECTS: i64 = 200;
const ADMIN_MESSAGES: i64 = 20;

fn render(state: &AppState, name: &str, settings: &SiteSettings, page: Value) -> Result<Html<String>> {
    let ctx = context! {
        settings => settings,
        year => Utc::now().year(),
        ..page
    };
    state
        .templates
        .get_template(name)
        .and_then(|template| template.render(ctx))
        .map(Html)
        .map_err(|e| {
            error!("Failed to render {}: {:#}", name, e);
            Error::Internal {
                operation: format!("render {name}"),
            }
        })
}

/// Render the error page, falling back to plain text when even that fails
fn error_page(state: &AppState, settings: &SiteSettings, status: StatusCode, heading: &str, message: &str) -> Response {
    match render(state, "error.html", settings, context! { heading, message }) {
        Ok(html) => (status, html).into_response(),
        Err(_) => (status, heading.to_string()).into_response(),
    }
}

async fn published_projects(conn: &mut PgConnection, filter: ProjectFilter) -> Result<(Vec<ProjectResponse>, i64)> {
    let filter = filter.published();
    let mut repo = Projects::new(&mut *conn);
    let projects = repo.list(&filter).await?;
    let total = repo.count(&filter).await?;
    Ok((load_responses(conn, projects).await?, total))
}

#[tracing::instrument(skip_all)]
pub async fn home(State(state): State<AppState>) -> Result<Html<String>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let settings = load_settings(&mut conn).await?;

    let (mut projects, _) =
        published_projects(&mut conn, ProjectFilter::new(0, HOME_PROJECTS).with_featured(Some(true))).await?;
    let featured = !projects.is_empty();
    if !featured {
        projects = published_projects(&mut conn, ProjectFilter::new(0, HOME_PROJECTS)).await?.0;
    }

    render(&state, "home.html", &settings, context! { projects, featured })
}

#[derive(Debug, Deserialize)]
pub struct GalleryQuery {
    pub tag: Option<String>,
    /// 1-based
    pub page: Option<i64>,
}

#[tracing::instrument(skip_all)]
pub async fn projects(State(state): State<AppState>, Query(query): Query<GalleryQuery>) -> Result<Html<String>> {
    let page = query.page.unwrap_or(1).max(1);
    let selected_tag = query.tag.filter(|t| !t.is_empty());

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let settings = load_settings(&mut conn).await?;
    let tags: Vec<TagWithCountResponse> = Tags::new(&mut conn)
        .list_with_counts()
        .await?
        .into_iter()
        .map(TagWithCountResponse::from)
        .collect();

    let filter = ProjectFilter::new((page - 1) * GALLERY_PAGE_SIZE, GALLERY_PAGE_SIZE).with_tag(selected_tag.clone());
    let (projects, total) = published_projects(&mut conn, filter).await?;
    let prev_page = (page > 1).then(|| page - 1);
    let next_page = (page * GALLERY_PAGE_SIZE < total).then(|| page + 1);

    render(
        &state,
        "projects.html",
        &settings,
        context! { active => "projects", projects, tags, selected_tag, prev_page, next_page },
    )
}

#[tracing::instrument(skip_all)]
pub async fn project_detail(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let settings = load_settings(&mut conn).await?;

    let project = match id.parse::<ProjectId>() {
        Ok(id) => Projects::new(&mut conn).get_by_id(id).await?.filter(|p| p.published),
        Err(_) => None,
    };
    let Some(project) = project else {
        return Ok(error_page(
            &state,
            &settings,
            StatusCode::NOT_FOUND,
            "Project not found",
            "This project does not exist or is no longer shown.",
        ));
    };

    let project = load_responses(&mut conn, vec![project]).await?.pop();
    let html = render(&state, "project.html", &settings, context! { active => "projects", project })?;
    Ok(html.into_response())
}

#[tracing::instrument(skip_all)]
pub async fn about(State(state): State<AppState>) -> Result<Html<String>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let settings = load_settings(&mut conn).await?;
    render(&state, "about.html", &settings, context! { active => "about" })
}

#[tracing::instrument(skip_all)]
pub async fn contact(State(state): State<AppState>) -> Result<Html<String>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let settings = load_settings(&mut conn).await?;
    render(&state, "contact.html", &settings, context! { active => "contact" })
}

/// Admin dashboard. Visitors without a session are sent to sign in first.
#[tracing::instrument(skip_all)]
pub async fn admin(State(state): State<AppState>, parts: Parts) -> Result<Response> {
    let Some(user) = optional_user(&parts, &state).await? else {
        return Ok((StatusCode::FOUND, [(LOCATION, "/auth/signin?callback_url=/admin")]).into_response());
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let settings = load_settings(&mut conn).await?;
    if !user.is_admin {
        return Ok(error_page(
            &state,
            &settings,
            StatusCode::FORBIDDEN,
            "Not an administrator",
            "Your account does not have access to the dashboard.",
        ));
    }

    let filter = ProjectFilter::new(0, ADMIN_PROJECTS);
    let mut repo = Projects::new(&mut conn);
    let project_rows = repo.list(&filter).await?;
    let project_count = repo.count(&filter).await?;
    let projects = load_responses(&mut conn, project_rows).await?;

    let tags: Vec<TagResponse> = Tags::new(&mut conn)
        .list(&TagFilter)
        .await?
        .into_iter()
        .map(TagResponse::from)
        .collect();
    let messages: Vec<ContactMessageResponse> = ContactMessages::new(&mut conn)
        .list(0, ADMIN_MESSAGES)
        .await?
        .into_iter()
        .map(ContactMessageResponse::from)
        .collect();

    let html = render(
        &state,
        "admin.html",
        &settings,
        context! { user, projects, project_count, tags, messages },
    )?;
    Ok(html.into_response())
}

/// Fallback for unknown routes
#[tracing::instrument(skip_all)]
pub async fn not_found(State(state): State<AppState>) -> Response {
    let settings = match state.db.acquire().await {
        Ok(mut conn) => load_settings(&mut conn).await.unwrap_or_default(),
        Err(_) => SiteSettings::default(),
    };
    error_page(
        &state,
        &settings,
        StatusCode::NOT_FOUND,
        "Page not found",
        "We couldn't find the page you were looking for.",
    )
}

//! Database models for projects.

use crate::types::{ProjectId, TagId};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;

/// Database request for creating a project. The folder is chosen by the caller; the position
/// in the day's sequence is assigned on insert.
#[derive(Debug, Clone)]
pub struct ProjectCreateDBRequest {
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub project_date: NaiveDate,
    pub folder: String,
    pub featured: bool,
    pub published: bool,
}

/// Database request for updating a project's plain fields. Date and folder changes go through
/// `Projects::move_to_date`.
#[derive(Debug, Clone, Default)]
pub struct ProjectUpdateDBRequest {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub location: Option<Option<String>>,
    pub featured: Option<bool>,
    pub published: Option<bool>,
}

/// Database response for a project
#[derive(Debug, Clone, FromRow)]
pub struct ProjectDBResponse {
    pub id: ProjectId,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub project_date: NaiveDate,
    pub folder: String,
    pub display_order: i32,
    pub featured: bool,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One row of the project/tag join, used when loading tags for many projects at once
#[derive(Debug, Clone, FromRow)]
pub struct ProjectTagRow {
    pub project_id: ProjectId,
    pub tag_id: TagId,
    pub name: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
}

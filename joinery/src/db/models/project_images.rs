//! Database models for project images.

use crate::types::{ImageId, ProjectId};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database request for registering an uploaded image
#[derive(Debug, Clone)]
pub struct ProjectImageCreateDBRequest {
    pub project_id: ProjectId,
    pub public_id: String,
    pub url: String,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub alt_text: Option<String>,
}

/// Database request for updating an image
#[derive(Debug, Clone, Default)]
pub struct ProjectImageUpdateDBRequest {
    pub alt_text: Option<Option<String>>,
    pub is_cover: Option<bool>,
}

/// New location of an image after its project's folder moved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRelocation {
    pub id: ImageId,
    pub public_id: String,
    pub url: String,
}

/// Database response for an image
#[derive(Debug, Clone, FromRow)]
pub struct ProjectImageDBResponse {
    pub id: ImageId,
    pub project_id: ProjectId,
    pub public_id: String,
    pub url: String,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub alt_text: Option<String>,
    pub display_order: i32,
    pub is_cover: bool,
    pub created_at: DateTime<Utc>,
}

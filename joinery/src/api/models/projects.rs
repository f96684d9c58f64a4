//! API request/response models for projects.

use super::images::ImageResponse;
use super::pagination::Pagination;
use super::tags::TagResponse;
use crate::db::models::projects::ProjectDBResponse;
use crate::types::{ProjectId, TagId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_with::rust::double_option;
use serde_with::{DisplayFromStr, serde_as};
use utoipa::{IntoParams, ToSchema};

/// Maximum length of a project title
pub const MAX_TITLE_LEN: usize = 200;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProjectCreate {
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    /// Project date as `YYYY-MM-DD`; a day past the end of the month is clamped to its last day
    pub date: String,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub published: bool,
    #[schema(value_type = Option<Vec<String>>)]
    pub tag_ids: Option<Vec<TagId>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ProjectUpdate {
    pub title: Option<String>,
    /// Description (None = no change, Some(None) = clear, Some(text) = set)
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    pub description: Option<Option<String>>,
    /// Location (None = no change, Some(None) = clear, Some(text) = set)
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    pub location: Option<Option<String>>,
    /// New date; moves the project's folder and images when the day changes
    pub date: Option<String>,
    pub featured: Option<bool>,
    pub published: Option<bool>,
    /// Replaces the tag set when present
    #[schema(value_type = Option<Vec<String>>)]
    pub tag_ids: Option<Vec<TagId>>,
}

/// New order for the projects of one day; must list exactly that day's projects
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProjectOrderUpdate {
    pub date: String,
    #[schema(value_type = Vec<String>)]
    pub project_ids: Vec<ProjectId>,
}

/// Query parameters for listing projects
#[serde_as]
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ListProjectsQuery {
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// Only projects with this tag slug
    pub tag: Option<String>,

    /// Only featured (or only non-featured) projects
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub featured: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProjectResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: ProjectId,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    /// Media-host folder holding the project's images
    pub folder: String,
    /// Position among the projects sharing `date`
    pub display_order: i32,
    pub featured: bool,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub tags: Vec<TagResponse>,
    pub images: Vec<ImageResponse>,
    /// URL of the cover image, if the project has images
    pub cover_url: Option<String>,
}

impl ProjectResponse {
    pub fn new(project: ProjectDBResponse, tags: Vec<TagResponse>, images: Vec<ImageResponse>) -> Self {
        let cover_url = images
            .iter()
            .find(|image| image.is_cover)
            .or_else(|| images.first())
            .map(|image| image.url.clone());

        Self {
            id: project.id,
            title: project.title,
            description: project.description,
            location: project.location,
            date: project.project_date,
            folder: project.folder,
            display_order: project.display_order,
            featured: project.featured,
            published: project.published,
            created_at: project.created_at,
            updated_at: project.updated_at,
            tags,
            images,
            cover_url,
        }
    }
}

/// Trim a title and check its length
pub fn validate_title(title: &str) -> Result<String, String> {
    let title = title.trim();
    if title.is_empty() {
        return Err("Title must not be empty".to_string());
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(format!("Title must be at most {MAX_TITLE_LEN} characters"));
    }
    Ok(title.to_string())
}

/// Trim an optional text field; blank becomes `None`
pub fn normalize_text(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

//! API request/response models for tags.

use crate::db::models::tags::{TagDBResponse, TagWithCountDBResponse};
use crate::types::TagId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TagCreate {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TagUpdate {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct TagResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: TagId,
    pub name: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
}

impl From<TagDBResponse> for TagResponse {
    fn from(tag: TagDBResponse) -> Self {
        Self {
            id: tag.id,
            name: tag.name,
            slug: tag.slug,
            created_at: tag.created_at,
        }
    }
}

/// Tag with the number of published projects carrying it
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TagWithCountResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: TagId,
    pub name: String,
    pub slug: String,
    pub project_count: i64,
}

impl From<TagWithCountDBResponse> for TagWithCountResponse {
    fn from(tag: TagWithCountDBResponse) -> Self {
        Self {
            id: tag.id,
            name: tag.name,
            slug: tag.slug,
            project_count: tag.project_count,
        }
    }
}

/// URL slug for a tag name: lowercase ASCII alphanumerics, every other run collapsed to `-`,
/// no leading or trailing dashes. May be empty.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

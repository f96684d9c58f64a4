//! API request/response models for project images.

use crate::db::models::project_images::ProjectImageDBResponse;
use crate::types::{ImageId, ProjectId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::rust::double_option;
use utoipa::ToSchema;

/// Maximum length of alt text
pub const MAX_ALT_TEXT_LEN: usize = 300;

/// Register an image the browser uploaded directly to the media host
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ImageRegister {
    /// Must lie inside the project's folder
    pub public_id: String,
    pub url: String,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub alt_text: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ImageUpdate {
    /// Alt text (None = no change, Some(None) = clear, Some(text) = set)
    #[serde(default, skip_serializing_if = "Option::is_none", with = "double_option")]
    pub alt_text: Option<Option<String>>,
    /// `true` makes this the cover and clears the previous one
    pub is_cover: Option<bool>,
}

/// New image order; must list exactly the project's images
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ImageOrderUpdate {
    #[schema(value_type = Vec<String>)]
    pub image_ids: Vec<ImageId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct ImageResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: ImageId,
    #[schema(value_type = String, format = "uuid")]
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

impl From<ProjectImageDBResponse> for ImageResponse {
    fn from(image: ProjectImageDBResponse) -> Self {
        Self {
            id: image.id,
            project_id: image.project_id,
            public_id: image.public_id,
            url: image.url,
            width: image.width,
            height: image.height,
            alt_text: image.alt_text,
            display_order: image.display_order,
            is_cover: image.is_cover,
            created_at: image.created_at,
        }
    }
}

/// Trim alt text; blank becomes `None`
pub fn normalize_alt_text(alt_text: Option<String>) -> Result<Option<String>, String> {
    let Some(text) = alt_text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()) else {
        return Ok(None);
    };
    if text.chars().count() > MAX_ALT_TEXT_LEN {
        return Err(format!("Alt text must be at most {MAX_ALT_TEXT_LEN} characters"));
    }
    Ok(Some(text))
}

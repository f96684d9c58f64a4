//! Database models for tags.

use crate::types::TagId;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone)]
pub struct TagCreateDBRequest {
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone)]
pub struct TagUpdateDBRequest {
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct TagDBResponse {
    pub id: TagId,
    pub name: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
}

/// Tag with the number of published projects carrying it
#[derive(Debug, Clone, FromRow)]
pub struct TagWithCountDBResponse {
    pub id: TagId,
    pub name: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
    pub project_count: i64,
}

//! Database models for site settings.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct SiteSettingDBResponse {
    pub key: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

//! Database models for users and their linked identity-provider accounts.

use crate::types::UserId;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Profile reported by the identity provider at sign-in
#[derive(Debug, Clone)]
pub struct OAuthProfile {
    pub provider: String,
    pub provider_account_id: String,
    pub email: String,
    pub name: Option<String>,
    pub image: Option<String>,
}

/// Database response for a user
#[derive(Debug, Clone, FromRow)]
pub struct UserDBResponse {
    pub id: UserId,
    pub email: String,
    pub name: Option<String>,
    pub image: Option<String>,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

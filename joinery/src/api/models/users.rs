//! API models for signed-in users.

use crate::db::models::users::UserDBResponse;
use crate::types::UserId;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The signed-in user, reloaded from the database on every request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct CurrentUser {
    #[schema(value_type = String, format = "uuid")]
    pub id: UserId,
    pub email: String,
    pub name: Option<String>,
    pub image: Option<String>,
    pub is_admin: bool,
}

impl From<UserDBResponse> for CurrentUser {
    fn from(user: UserDBResponse) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            image: user.image,
            is_admin: user.is_admin,
        }
    }
}

/// Signed-in user wrapper; extracting it rejects non-admins with 403
#[derive(Debug, Clone)]
pub struct AdminUser(pub CurrentUser);

/// Response of `GET /api/auth/session`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionResponse {
    pub user: CurrentUser,
}

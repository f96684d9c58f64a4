//! API models for direct-upload signing.

use crate::types::ProjectId;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Request for signed upload parameters
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct SignUploadRequest {
    /// Sign for this project's folder; without it the shared site folder is used
    #[schema(value_type = Option<String>, format = "uuid")]
    pub project_id: Option<ProjectId>,
}

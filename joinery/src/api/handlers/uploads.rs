use crate::{
    AppState,
    api::models::{uploads::SignUploadRequest, users::AdminUser},
    db::handlers::{Projects, Repository},
    errors::{Error, Result},
    media::{SignedUpload, signed_upload},
};
use axum::{Json, extract::State};
use chrono::Utc;

#[utoipa::path(
    post,
    path = "/api/admin/uploads/sign",
    tag = "admin-images",
    summary = "Sign a direct upload",
    description = "Returns the parameters a browser needs to upload one file straight to the media \
                   host. Uploads for a project land in its folder; otherwise in the shared site folder. \
                   Register the result with `POST /api/admin/projects/{id}/images`.",
    request_body = SignUploadRequest,
    responses(
        (status = 200, description = "Signed upload parameters", body = SignedUpload),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Not an administrator"),
        (status = 404, description = "Project not found")
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn sign_upload(
    State(state): State<AppState>,
    _: AdminUser,
    Json(request): Json<SignUploadRequest>,
) -> Result<Json<SignedUpload>> {
    let folder = match request.project_id {
        Some(id) => {
            let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
            let project = Projects::new(&mut conn).get_by_id(id).await?.ok_or_else(|| Error::NotFound {
                resource: "Project".to_string(),
                id: id.to_string(),
            })?;
            project.folder
        }
        None => state.config.media.site_folder(),
    };

    Ok(Json(signed_upload(&state.config.media, &folder, Utc::now())))
}

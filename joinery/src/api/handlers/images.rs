//! Project image handlers.
//!
//! Images reach the media host either straight from the browser (signed upload, then
//! [`register_image`]) or through [`upload_image`]. Either way the asset exists on the media
//! host before its row does, so a failed insert destroys the asset again.

use crate::{
    AppState,
    api::models::{
        images::{ImageOrderUpdate, ImageRegister, ImageResponse, ImageUpdate, normalize_alt_text},
        users::AdminUser,
    },
    db::{
        handlers::{ProjectImages, Projects, Repository, project_images::ProjectImageFilter},
        models::{
            project_images::{ProjectImageCreateDBRequest, ProjectImageDBResponse, ProjectImageUpdateDBRequest},
            projects::ProjectDBResponse,
        },
    },
    errors::{Error, Result},
    media::{UploadFile, is_in_folder},
    types::{ImageId, ProjectId, abbrev_uuid},
};
use axum::{
    Json,
    extract::{Multipart, Path, State, multipart::MultipartError},
    http::StatusCode,
};
use bytes::BytesMut;
use sqlx::PgConnection;
use std::collections::HashSet;
use tracing::{info, warn};

const PUBLIC_ID_CONSTRAINT: &str = "project_images_public_id_unique";

async fn find_project(conn: &mut PgConnection, id: ProjectId) -> Result<ProjectDBResponse> {
    Projects::new(conn).get_by_id(id).await?.ok_or_else(|| Error::NotFound {
        resource: "Project".to_string(),
        id: id.to_string(),
    })
}

/// Load an image, treating an image of another project as missing
async fn find_image(conn: &mut PgConnection, project_id: ProjectId, image_id: ImageId) -> Result<ProjectImageDBResponse> {
    ProjectImages::new(conn)
        .get_by_id(image_id)
        .await?
        .filter(|image| image.project_id == project_id)
        .ok_or_else(|| Error::NotFound {
            resource: "Image".to_string(),
            id: image_id.to_string(),
        })
}

/// Insert the row for an asset already on the media host; destroy the asset when the insert
/// fails. A duplicate public id belongs to an existing row, so that asset is kept.
pub(crate) async fn insert_or_destroy(
    state: &AppState,
    conn: &mut PgConnection,
    request: &ProjectImageCreateDBRequest,
) -> Result<ProjectImageDBResponse> {
    match ProjectImages::new(conn).create(request).await {
        Ok(image) => Ok(image),
        Err(e) if e.is_unique_violation_of(PUBLIC_ID_CONSTRAINT) => Err(e.into()),
        Err(e) => {
            warn!("Failed to store image {}, destroying uploaded asset", request.public_id);
            if let Err(destroy_err) = state.media.destroy(&request.public_id).await {
                warn!("Failed to destroy orphaned asset {}: {:#}", request.public_id, destroy_err);
            }
            Err(e.into())
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/admin/projects/{id}/images",
    tag = "admin-images",
    summary = "Register an uploaded image",
    description = "Records an image the browser uploaded directly to the media host. The public id \
                   must lie inside the project's folder. The first image of a project becomes its cover.",
    params(("id" = uuid::Uuid, Path, description = "Project ID")),
    request_body = ImageRegister,
    responses(
        (status = 201, description = "Image registered", body = ImageResponse),
        (status = 400, description = "Public id outside the project folder, or invalid alt text"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Not an administrator"),
        (status = 404, description = "Project not found"),
        (status = 409, description = "Image already registered")
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn register_image(
    State(state): State<AppState>,
    Path(id): Path<ProjectId>,
    _: AdminUser,
    Json(register): Json<ImageRegister>,
) -> Result<(StatusCode, Json<ImageResponse>)> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let project = find_project(&mut conn, id).await?;

    if !is_in_folder(&register.public_id, &project.folder) {
        return Err(Error::BadRequest {
            message: format!("Image must be uploaded into the project folder {}", project.folder),
        });
    }
    if register.url.trim().is_empty() {
        return Err(Error::BadRequest {
            message: "Image URL must not be empty".to_string(),
        });
    }
    let alt_text = normalize_alt_text(register.alt_text).map_err(|message| Error::BadRequest { message })?;

    let request = ProjectImageCreateDBRequest {
        project_id: id,
        public_id: register.public_id,
        url: register.url,
        width: register.width,
        height: register.height,
        alt_text,
    };
    let image = insert_or_destroy(&state, &mut conn, &request).await?;

    info!("Registered image {} on project {}", image.public_id, abbrev_uuid(&id));
    Ok((StatusCode::CREATED, Json(ImageResponse::from(image))))
}

fn multipart_error(e: MultipartError, max_bytes: usize) -> Error {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        Error::PayloadTooLarge {
            message: format!("Image exceeds the maximum upload size of {max_bytes} bytes"),
        }
    } else {
        Error::BadRequest {
            message: format!("Failed to parse multipart data: {}", e.body_text()),
        }
    }
}

/// The `file` part of an upload form
struct UploadedFile {
    file_name: String,
    content_type: String,
    bytes: BytesMut,
}

#[utoipa::path(
    post,
    path = "/api/admin/projects/{id}/images/upload",
    tag = "admin-images",
    summary = "Upload an image",
    description = "Multipart form with an image in `file` and optional `alt_text`. The image is \
                   uploaded into the project's folder on the media host and registered.",
    params(("id" = uuid::Uuid, Path, description = "Project ID")),
    request_body(content_type = "multipart/form-data", description = "Fields `file` and optional `alt_text`"),
    responses(
        (status = 201, description = "Image uploaded", body = ImageResponse),
        (status = 400, description = "Missing file or not an image"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Not an administrator"),
        (status = 404, description = "Project not found"),
        (status = 413, description = "Image too large"),
        (status = 500, description = "Media host rejected the upload")
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn upload_image(
    State(state): State<AppState>,
    Path(id): Path<ProjectId>,
    _: AdminUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ImageResponse>)> {
    let max_bytes = state.config.media.max_upload_bytes;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let project = find_project(&mut conn, id).await?;

    let mut file: Option<UploadedFile> = None;
    let mut alt_text: Option<String> = None;

    while let Some(mut field) = multipart.next_field().await.map_err(|e| multipart_error(e, max_bytes))? {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let content_type = match field.content_type() {
                    Some(content_type) if content_type != "application/octet-stream" => content_type.to_string(),
                    _ => mime_guess::from_path(&file_name).first_or_octet_stream().to_string(),
                };
                if !content_type.starts_with("image/") {
                    return Err(Error::BadRequest {
                        message: format!("Only images can be uploaded, got {content_type}"),
                    });
                }

                let mut bytes = BytesMut::new();
                while let Some(chunk) = field.chunk().await.map_err(|e| multipart_error(e, max_bytes))? {
                    if bytes.len() + chunk.len() > max_bytes {
                        return Err(Error::PayloadTooLarge {
                            message: format!("Image exceeds the maximum upload size of {max_bytes} bytes"),
                        });
                    }
                    bytes.extend_from_slice(&chunk);
                }

                file = Some(UploadedFile {
                    file_name,
                    content_type,
                    bytes,
                });
            }
            "alt_text" => {
                alt_text = Some(field.text().await.map_err(|e| multipart_error(e, max_bytes))?);
            }
            _ => {}
        }
    }

    let Some(file) = file else {
        return Err(Error::BadRequest {
            message: "Missing 'file' field".to_string(),
        });
    };
    if file.bytes.is_empty() {
        return Err(Error::BadRequest {
            message: "Uploaded file is empty".to_string(),
        });
    }
    let alt_text = normalize_alt_text(alt_text).map_err(|message| Error::BadRequest { message })?;

    let asset = state
        .media
        .upload(UploadFile {
            folder: project.folder.clone(),
            file_name: file.file_name,
            content_type: file.content_type,
            bytes: file.bytes.freeze(),
        })
        .await
        .map_err(|e| {
            warn!("Upload to {} failed: {:#}", project.folder, e);
            Error::Internal {
                operation: format!("upload image to {}", project.folder),
            }
        })?;

    let request = ProjectImageCreateDBRequest {
        project_id: id,
        public_id: asset.public_id,
        url: asset.url,
        width: asset.width,
        height: asset.height,
        alt_text,
    };
    let image = insert_or_destroy(&state, &mut conn, &request).await?;

    info!("Uploaded image {} to project {}", image.public_id, abbrev_uuid(&id));
    Ok((StatusCode::CREATED, Json(ImageResponse::from(image))))
}

#[utoipa::path(
    patch,
    path = "/api/admin/projects/{id}/images/{image_id}",
    tag = "admin-images",
    summary = "Update an image",
    description = "Set or clear the alt text, or make the image the project's cover.",
    params(
        ("id" = uuid::Uuid, Path, description = "Project ID"),
        ("image_id" = uuid::Uuid, Path, description = "Image ID"),
    ),
    request_body = ImageUpdate,
    responses(
        (status = 200, description = "Updated image", body = ImageResponse),
        (status = 400, description = "Invalid alt text"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Not an administrator"),
        (status = 404, description = "Image not found in this project")
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_image(
    State(state): State<AppState>,
    Path((id, image_id)): Path<(ProjectId, ImageId)>,
    _: AdminUser,
    Json(update): Json<ImageUpdate>,
) -> Result<Json<ImageResponse>> {
    let alt_text = update
        .alt_text
        .map(normalize_alt_text)
        .transpose()
        .map_err(|message| Error::BadRequest { message })?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    find_image(&mut conn, id, image_id).await?;

    let request = ProjectImageUpdateDBRequest {
        alt_text,
        // A cover is replaced by choosing another one, never unset
        is_cover: update.is_cover.filter(|is_cover| *is_cover),
    };
    let image = ProjectImages::new(&mut conn).update(image_id, &request).await?;
    Ok(Json(ImageResponse::from(image)))
}

#[utoipa::path(
    put,
    path = "/api/admin/projects/{id}/images/order",
    tag = "admin-images",
    summary = "Reorder a project's images",
    params(("id" = uuid::Uuid, Path, description = "Project ID")),
    request_body = ImageOrderUpdate,
    responses(
        (status = 200, description = "Images in their new order", body = Vec<ImageResponse>),
        (status = 400, description = "The ids are not exactly the project's images"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Not an administrator"),
        (status = 404, description = "Project not found")
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn reorder_images(
    State(state): State<AppState>,
    Path(id): Path<ProjectId>,
    _: AdminUser,
    Json(order): Json<ImageOrderUpdate>,
) -> Result<Json<Vec<ImageResponse>>> {
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;
    find_project(&mut tx, id).await?;

    let mut repo = ProjectImages::new(&mut tx);
    repo.lock_project(id).await?;
    let filter = ProjectImageFilter { project_id: id };
    let current: HashSet<ImageId> = repo.list(&filter).await?.into_iter().map(|image| image.id).collect();
    let requested: HashSet<ImageId> = order.image_ids.iter().copied().collect();
    if requested.len() != order.image_ids.len() || requested != current {
        return Err(Error::BadRequest {
            message: "image_ids must list each image of the project exactly once".to_string(),
        });
    }

    repo.reorder(id, &order.image_ids).await?;
    let images = repo.list(&filter).await?;
    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Json(images.into_iter().map(ImageResponse::from).collect()))
}

#[utoipa::path(
    delete,
    path = "/api/admin/projects/{id}/images/{image_id}",
    tag = "admin-images",
    summary = "Delete an image",
    description = "Destroys the asset on the media host, then removes the image. When the cover is \
                   deleted, the first remaining image becomes the cover.",
    params(
        ("id" = uuid::Uuid, Path, description = "Project ID"),
        ("image_id" = uuid::Uuid, Path, description = "Image ID"),
    ),
    responses(
        (status = 204, description = "Image deleted"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Not an administrator"),
        (status = 404, description = "Image not found in this project"),
        (status = 500, description = "Media host refused to destroy the asset; nothing was deleted")
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn delete_image(
    State(state): State<AppState>,
    Path((id, image_id)): Path<(ProjectId, ImageId)>,
    _: AdminUser,
) -> Result<StatusCode> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let image = find_image(&mut conn, id, image_id).await?;

    state.media.destroy(&image.public_id).await.map_err(|e| {
        warn!("Failed to destroy {}: {:#}", image.public_id, e);
        Error::Internal {
            operation: format!("destroy image {}", image.public_id),
        }
    })?;

    ProjectImages::new(&mut conn).delete(image_id).await?;
    info!("Deleted image {} from project {}", image.public_id, abbrev_uuid(&id));
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use axum_test::multipart::{MultipartForm, Part};
    use serde_json::json;
    use sqlx::PgPool;

    const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0, 0, 0, 0];

    fn image_form(file_name: &str, mime_type: &str, bytes: Vec<u8>) -> MultipartForm {
        MultipartForm::new()
            .add_text("alt_text", " Oak newel post ")
            .add_part("file", Part::bytes(bytes).file_name(file_name).mime_type(mime_type))
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_register_image_checks_folder(pool: PgPool) {
        let (server, _media) = create_test_app(pool.clone()).await;
        let cookie = admin_cookie(&pool).await;
        let project = create_test_project(&pool, "Stairs", date(2024, 3, 9), "joinery/projects/20240309-000000").await;
        let url = format!("/api/admin/projects/{}/images", project.id);

        server
            .post(&url)
            .add_header("cookie", &cookie)
            .json(&json!({"public_id": "joinery/projects/20240310-000000/front", "url": "https://res.example/front.jpg"}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let response = server
            .post(&url)
            .add_header("cookie", &cookie)
            .json(&json!({
                "public_id": "joinery/projects/20240309-000000/front",
                "url": "https://res.example/front.jpg",
                "width": 1200,
                "height": 800,
                "alt_text": "  "
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let first: ImageResponse = response.json();
        assert!(first.is_cover);
        assert_eq!(first.alt_text, None);

        let second: ImageResponse = server
            .post(&url)
            .add_header("cookie", &cookie)
            .json(&json!({"public_id": "joinery/projects/20240309-000000/side", "url": "https://res.example/side.jpg"}))
            .await
            .json();
        assert!(!second.is_cover);
        assert_eq!(second.display_order, 1);

        // Registering the same asset twice must not destroy it
        server
            .post(&url)
            .add_header("cookie", &cookie)
            .json(&json!({"public_id": "joinery/projects/20240309-000000/side", "url": "https://res.example/side.jpg"}))
            .await
            .assert_status(StatusCode::CONFLICT);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_failed_insert_destroys_asset(pool: PgPool) {
        let (state, media) = create_test_state_with(pool.clone(), create_test_config());
        media.put_asset("joinery/projects/20240309-000000/orphan");

        let request = ProjectImageCreateDBRequest {
            project_id: uuid::Uuid::new_v4(),
            public_id: "joinery/projects/20240309-000000/orphan".to_string(),
            url: "https://res.example/orphan.jpg".to_string(),
            width: None,
            height: None,
            alt_text: None,
        };
        let mut conn = pool.acquire().await.unwrap();
        let result = insert_or_destroy(&state, &mut conn, &request).await;

        assert!(result.is_err());
        assert!(!media.has_asset("joinery/projects/20240309-000000/orphan"));
    }

    async fn store_uploaded(pool: &PgPool, state: &AppState, project: &ProjectDBResponse, name: &str) -> Result<ProjectImageDBResponse> {
        let public_id = format!("{}/{name}", project.folder);
        let mut conn = pool.acquire().await.unwrap();
        insert_or_destroy(
            state,
            &mut conn,
            &ProjectImageCreateDBRequest {
                project_id: project.id,
                url: format!("{TEST_MEDIA_URL}/{public_id}.jpg"),
                public_id,
                width: None,
                height: None,
                alt_text: None,
            },
        )
        .await
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_concurrent_uploads_keep_every_asset(pool: PgPool) {
        let (state, media) = create_test_state_with(pool.clone(), create_test_config());

        for round in 0..5 {
            let folder = format!("joinery/projects/20240309-00000{round}");
            let project = create_test_project(&pool, "Staircase", date(2024, 3, 9), &folder).await;
            if round > 0 {
                // Later rounds append after an existing image
                create_test_image(&pool, &project, "existing").await;
            }
            for name in ["a", "b", "c", "d"] {
                media.put_asset(&format!("{folder}/{name}"));
            }

            let (a, b, c, d) = tokio::join!(
                store_uploaded(&pool, &state, &project, "a"),
                store_uploaded(&pool, &state, &project, "b"),
                store_uploaded(&pool, &state, &project, "c"),
                store_uploaded(&pool, &state, &project, "d"),
            );
            for result in [a, b, c, d] {
                assert!(result.is_ok(), "insert failed: {result:?}");
            }

            let mut conn = pool.acquire().await.unwrap();
            let images = ProjectImages::new(&mut conn)
                .list(&ProjectImageFilter { project_id: project.id })
                .await
                .unwrap();
            let orders: Vec<i32> = images.iter().map(|i| i.display_order).collect();
            let expected: Vec<i32> = (0..images.len() as i32).collect();
            assert_eq!(orders, expected);
            assert_eq!(images.iter().filter(|i| i.is_cover).count(), 1);
            for name in ["a", "b", "c", "d"] {
                assert!(media.has_asset(&format!("{folder}/{name}")));
            }
        }
        assert!(!media.calls().iter().any(|call| matches!(call, MediaCall::Destroy(_))));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_upload_image(pool: PgPool) {
        let (server, media) = create_test_app(pool.clone()).await;
        let cookie = admin_cookie(&pool).await;
        let project = create_test_project(&pool, "Kitchen", date(2024, 3, 9), "joinery/projects/20240309-000000").await;

        let response = server
            .post(&format!("/api/admin/projects/{}/images/upload", project.id))
            .add_header("cookie", &cookie)
            .multipart(image_form("island.png", "image/png", PNG_BYTES.to_vec()))
            .await;
        response.assert_status(StatusCode::CREATED);
        let image: ImageResponse = response.json();

        assert!(image.public_id.starts_with("joinery/projects/20240309-000000/island"));
        assert_eq!(image.alt_text.as_deref(), Some("Oak newel post"));
        assert!(image.is_cover);
        assert_eq!(
            media.calls(),
            vec![MediaCall::Upload {
                folder: "joinery/projects/20240309-000000".to_string(),
                file_name: "island.png".to_string(),
            }]
        );
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_upload_rejects_non_images_and_large_files(pool: PgPool) {
        let mut config = create_test_config();
        config.media.max_upload_bytes = 1024;
        let (server, media) = create_test_app_with_config(pool.clone(), config).await;
        let cookie = admin_cookie(&pool).await;
        let project = create_test_project(&pool, "Kitchen", date(2024, 3, 9), "joinery/projects/20240309-000000").await;
        let url = format!("/api/admin/projects/{}/images/upload", project.id);

        server
            .post(&url)
            .add_header("cookie", &cookie)
            .multipart(image_form("notes.txt", "text/plain", b"not an image".to_vec()))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        server
            .post(&url)
            .add_header("cookie", &cookie)
            .multipart(image_form("huge.jpg", "image/jpeg", vec![0u8; 4096]))
            .await
            .assert_status(StatusCode::PAYLOAD_TOO_LARGE);

        server
            .post(&url)
            .add_header("cookie", &cookie)
            .multipart(MultipartForm::new().add_text("alt_text", "no file"))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        assert!(media.calls().is_empty());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_upload_failure_is_500(pool: PgPool) {
        let (server, media) = create_test_app(pool.clone()).await;
        let cookie = admin_cookie(&pool).await;
        let project = create_test_project(&pool, "Kitchen", date(2024, 3, 9), "joinery/projects/20240309-000000").await;
        media.fail_uploads();

        server
            .post(&format!("/api/admin/projects/{}/images/upload", project.id))
            .add_header("cookie", &cookie)
            .multipart(image_form("island.png", "image/png", PNG_BYTES.to_vec()))
            .await
            .assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_image_cover_and_alt_text(pool: PgPool) {
        let (server, _media) = create_test_app(pool.clone()).await;
        let cookie = admin_cookie(&pool).await;
        let project = create_test_project(&pool, "Stairs", date(2024, 3, 9), "joinery/projects/20240309-000000").await;
        let other = create_test_project(&pool, "Other", date(2024, 3, 9), "joinery/projects/20240309-000001").await;
        let first = create_test_image(&pool, &project, "first").await;
        let second = create_test_image(&pool, &project, "second").await;
        let foreign = create_test_image(&pool, &other, "foreign").await;

        let updated: ImageResponse = server
            .patch(&format!("/api/admin/projects/{}/images/{}", project.id, second.id))
            .add_header("cookie", &cookie)
            .json(&json!({"is_cover": true, "alt_text": "Stair string detail"}))
            .await
            .json();
        assert!(updated.is_cover);
        assert_eq!(updated.alt_text.as_deref(), Some("Stair string detail"));

        let mut conn = pool.acquire().await.unwrap();
        let first = ProjectImages::new(&mut conn).get_by_id(first.id).await.unwrap().unwrap();
        assert!(!first.is_cover);

        let cleared: ImageResponse = server
            .patch(&format!("/api/admin/projects/{}/images/{}", project.id, second.id))
            .add_header("cookie", &cookie)
            .json(&json!({"alt_text": null}))
            .await
            .json();
        assert_eq!(cleared.alt_text, None);
        assert!(cleared.is_cover);

        server
            .patch(&format!("/api/admin/projects/{}/images/{}", project.id, foreign.id))
            .add_header("cookie", &cookie)
            .json(&json!({"is_cover": true}))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_reorder_images(pool: PgPool) {
        let (server, _media) = create_test_app(pool.clone()).await;
        let cookie = admin_cookie(&pool).await;
        let project = create_test_project(&pool, "Stairs", date(2024, 3, 9), "joinery/projects/20240309-000000").await;
        let a = create_test_image(&pool, &project, "a").await;
        let b = create_test_image(&pool, &project, "b").await;
        let c = create_test_image(&pool, &project, "c").await;
        let url = format!("/api/admin/projects/{}/images/order", project.id);

        server
            .put(&url)
            .add_header("cookie", &cookie)
            .json(&json!({"image_ids": [a.id, b.id]}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let images: Vec<ImageResponse> = server
            .put(&url)
            .add_header("cookie", &cookie)
            .json(&json!({"image_ids": [c.id, a.id, b.id]}))
            .await
            .json();
        assert_eq!(images.iter().map(|i| i.id).collect::<Vec<_>>(), vec![c.id, a.id, b.id]);
        assert_eq!(images.iter().map(|i| i.display_order).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_image(pool: PgPool) {
        let (server, media) = create_test_app(pool.clone()).await;
        let cookie = admin_cookie(&pool).await;
        let project = create_test_project(&pool, "Stairs", date(2024, 3, 9), "joinery/projects/20240309-000000").await;
        let cover = create_test_image(&pool, &project, "cover").await;
        let next = create_test_image(&pool, &project, "next").await;
        let url = format!("/api/admin/projects/{}/images/{}", project.id, cover.id);

        media.fail_destroys();
        server
            .delete(&url)
            .add_header("cookie", &cookie)
            .await
            .assert_status(StatusCode::INTERNAL_SERVER_ERROR);

        let mut conn = pool.acquire().await.unwrap();
        assert!(ProjectImages::new(&mut conn).get_by_id(cover.id).await.unwrap().is_some());

        let (server, media) = create_test_app(pool.clone()).await;
        server.delete(&url).add_header("cookie", &cookie).await.assert_status(StatusCode::NO_CONTENT);
        assert_eq!(media.calls(), vec![MediaCall::Destroy(cover.public_id.clone())]);

        let promoted = ProjectImages::new(&mut conn).get_by_id(next.id).await.unwrap().unwrap();
        assert!(promoted.is_cover);
        assert_eq!(promoted.display_order, 0);
    }
}

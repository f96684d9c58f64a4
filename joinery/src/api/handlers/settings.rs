use crate::{
    AppState,
    api::models::{
        settings::{SiteSettings, validate_update},
        users::AdminUser,
    },
    db::handlers::SiteSettings as StoredSettings,
    errors::{Error, Result},
};
use axum::{Json, extract::State};
use sqlx::PgConnection;
use tracing::info;

/// Stored settings merged over the defaults
pub async fn load_settings(conn: &mut PgConnection) -> Result<SiteSettings> {
    let stored = StoredSettings::new(conn).get_all().await?;
    Ok(SiteSettings::with_defaults(stored))
}

#[utoipa::path(
    get,
    path = "/api/settings",
    tag = "settings",
    summary = "Get site settings",
    description = "Every known setting, stored values over the defaults.",
    responses((status = 200, description = "Site settings", body = SiteSettings))
)]
#[tracing::instrument(skip_all)]
pub async fn get_settings(State(state): State<AppState>) -> Result<Json<SiteSettings>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    Ok(Json(load_settings(&mut conn).await?))
}

#[utoipa::path(
    get,
    path = "/api/admin/settings",
    tag = "admin-settings",
    summary = "Get site settings for editing",
    responses(
        (status = 200, description = "Site settings", body = SiteSettings),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Not an administrator")
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn get_admin_settings(State(state): State<AppState>, _: AdminUser) -> Result<Json<SiteSettings>> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    Ok(Json(load_settings(&mut conn).await?))
}

#[utoipa::path(
    patch,
    path = "/api/admin/settings",
    tag = "admin-settings",
    summary = "Update site settings",
    description = "Sets the given keys, all or nothing. Keys not named keep their value.",
    request_body = SiteSettings,
    responses(
        (status = 200, description = "Settings after the update", body = SiteSettings),
        (status = 400, description = "Unknown key, over-long value or invalid contact email"),
        (status = 401, description = "Not signed in"),
        (status = 403, description = "Not an administrator")
    ),
    security(("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn update_settings(
    State(state): State<AppState>,
    AdminUser(user): AdminUser,
    Json(update): Json<SiteSettings>,
) -> Result<Json<SiteSettings>> {
    let values = validate_update(update).map_err(|message| Error::BadRequest { message })?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    StoredSettings::new(&mut conn).upsert_many(&values).await?;
    info!("{} updated settings: {:?}", user.email, values.keys().collect::<Vec<_>>());

    Ok(Json(load_settings(&mut conn).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::settings::KNOWN_SETTINGS;
    use crate::test_utils::*;
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_settings_round_trip(pool: PgPool) {
        let (server, _media) = create_test_app(pool.clone()).await;
        let cookie = admin_cookie(&pool).await;

        let defaults: SiteSettings = server.get("/api/settings").await.json();
        assert_eq!(defaults.0.len(), KNOWN_SETTINGS.len());
        assert_eq!(defaults.get("site_title"), Some("Joinery"));

        let updated: SiteSettings = server
            .patch("/api/admin/settings")
            .add_header("cookie", &cookie)
            .json(&json!({"site_title": " Oak & Iron ", "service_area": "West Yorkshire"}))
            .await
            .json();
        assert_eq!(updated.get("site_title"), Some("Oak & Iron"));
        assert_eq!(updated.get("hero_heading"), Some("Bespoke joinery, built to last"));

        let public: SiteSettings = server.get("/api/settings").await.json();
        assert_eq!(public, updated);

        let admin: SiteSettings = server.get("/api/admin/settings").add_header("cookie", &cookie).await.json();
        assert_eq!(admin.get("service_area"), Some("West Yorkshire"));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_invalid_update_changes_nothing(pool: PgPool) {
        let (server, _media) = create_test_app(pool.clone()).await;
        let cookie = admin_cookie(&pool).await;

        server
            .patch("/api/admin/settings")
            .add_header("cookie", &cookie)
            .json(&json!({"site_title": "New", "favourite_wood": "oak"}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
        server
            .patch("/api/admin/settings")
            .add_header("cookie", &cookie)
            .json(&json!({"contact_email": "nobody"}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
        server
            .patch("/api/admin/settings")
            .add_header("cookie", &cookie)
            .json(&json!({"contact_email": "owner..desk@example.com"}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let settings: SiteSettings = server.get("/api/settings").await.json();
        assert_eq!(settings.get("site_title"), Some("Joinery"));

        server
            .patch("/api/admin/settings")
            .json(&json!({"site_title": "New"}))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
        server.get("/api/admin/settings").await.assert_status(StatusCode::UNAUTHORIZED);
    }
}

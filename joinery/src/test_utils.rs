//! Test utilities for integration testing.

use crate::{
    AppState,
    auth::{oauth::OAuthClient, session::create_session_token},
    config::{AuthConfig, CloudinaryConfig, Config, EmailConfig, EmailTransportConfig, OAuthConfig, SessionConfig},
    db::{
        handlers::{ProjectImages, Projects, Repository, Tags, Users},
        models::{
            project_images::{ProjectImageCreateDBRequest, ProjectImageDBResponse},
            projects::{ProjectCreateDBRequest, ProjectDBResponse},
            tags::{TagCreateDBRequest, TagDBResponse},
            users::{OAuthProfile, UserDBResponse},
        },
    },
    media::{MediaStore, StoredAsset, UploadFile},
};
use anyhow::anyhow;
use async_trait::async_trait;
use axum_test::TestServer;
use chrono::NaiveDate;
use sqlx::PgPool;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Base URL the in-memory media store hands out
pub const TEST_MEDIA_URL: &str = "https://res.cloudinary.test";

/// Webhook secret configured by [`create_test_config`]
pub const TEST_WEBHOOK_SECRET: &str = "whsec_MfKQ9r8GKYqrTwjUPD8ILPZIo2LaLaSw";

pub fn create_test_config() -> Config {
    // Use temp directory for test emails
    let temp_dir = std::env::temp_dir().join(format!("joinery-test-emails-{}", std::process::id()));

    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        secret_key: Some("test-secret-key-that-is-at-least-32-bytes".to_string()),
        auth: AuthConfig {
            oauth: OAuthConfig {
                client_id: "test-client".to_string(),
                client_secret: "test-client-secret".to_string(),
                ..Default::default()
            },
            session: SessionConfig {
                cookie_secure: false,
                ..Default::default()
            },
            admin_emails: Vec::new(),
        },
        media: CloudinaryConfig {
            cloud_name: "demo".to_string(),
            api_key: "1234567890".to_string(),
            api_secret: "test-api-secret".to_string(),
            ..Default::default()
        },
        email: EmailConfig {
            transport: EmailTransportConfig::File {
                path: temp_dir.to_string_lossy().to_string(),
            },
            from_email: "site@joinery.test".to_string(),
            contact_recipient: Some("owner@joinery.test".to_string()),
            webhook_secret: Some(TEST_WEBHOOK_SECRET.to_string()),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// One call made against [`RecordingMediaStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaCall {
    Upload { folder: String, file_name: String },
    Destroy(String),
    Rename { from: String, to: String },
    DeleteFolder(String),
}

#[derive(Debug, Default)]
struct MediaState {
    assets: BTreeMap<String, StoredAsset>,
    calls: Vec<MediaCall>,
    fail_uploads: bool,
    fail_destroys: bool,
    /// Renames away from this public id fail
    fail_rename_from: Option<String>,
}

/// In-memory media host that records every call and can be told to fail
#[derive(Debug, Default)]
pub struct RecordingMediaStore {
    state: Mutex<MediaState>,
}

impl RecordingMediaStore {
    fn with_state<T>(&self, f: impl FnOnce(&mut MediaState) -> T) -> T {
        let mut state = self.state.lock().expect("media store lock poisoned");
        f(&mut state)
    }

    pub fn calls(&self) -> Vec<MediaCall> {
        self.with_state(|s| s.calls.clone())
    }

    pub fn has_asset(&self, public_id: &str) -> bool {
        self.with_state(|s| s.assets.contains_key(public_id))
    }

    pub fn put_asset(&self, public_id: &str) {
        self.with_state(|s| {
            s.assets.insert(public_id.to_string(), stored_asset(public_id));
        });
    }

    pub fn fail_uploads(&self) {
        self.with_state(|s| s.fail_uploads = true);
    }

    pub fn fail_destroys(&self) {
        self.with_state(|s| s.fail_destroys = true);
    }

    /// Fail every rename of `public_id`
    pub fn fail_rename_from(&self, public_id: &str) {
        self.with_state(|s| s.fail_rename_from = Some(public_id.to_string()));
    }
}

fn stored_asset(public_id: &str) -> StoredAsset {
    StoredAsset {
        public_id: public_id.to_string(),
        url: format!("{TEST_MEDIA_URL}/{public_id}.jpg"),
        width: Some(1600),
        height: Some(1200),
    }
}

#[async_trait]
impl MediaStore for RecordingMediaStore {
    async fn upload(&self, file: UploadFile) -> anyhow::Result<StoredAsset> {
        self.with_state(|s| {
            s.calls.push(MediaCall::Upload {
                folder: file.folder.clone(),
                file_name: file.file_name.clone(),
            });
            if s.fail_uploads {
                return Err(anyhow!("upload rejected"));
            }
            let stem = file.file_name.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(&file.file_name);
            let public_id = format!("{}/{}_{}", file.folder, stem, s.assets.len());
            let asset = stored_asset(&public_id);
            s.assets.insert(public_id, asset.clone());
            Ok(asset)
        })
    }

    async fn destroy(&self, public_id: &str) -> anyhow::Result<()> {
        self.with_state(|s| {
            s.calls.push(MediaCall::Destroy(public_id.to_string()));
            if s.fail_destroys {
                return Err(anyhow!("destroy rejected"));
            }
            s.assets.remove(public_id);
            Ok(())
        })
    }

    async fn rename(&self, from: &str, to: &str) -> anyhow::Result<StoredAsset> {
        self.with_state(|s| {
            s.calls.push(MediaCall::Rename {
                from: from.to_string(),
                to: to.to_string(),
            });
            if s.fail_rename_from.as_deref() == Some(from) {
                return Err(anyhow!("rename rejected"));
            }
            s.assets.remove(from);
            let asset = stored_asset(to);
            s.assets.insert(to.to_string(), asset.clone());
            Ok(asset)
        })
    }

    async fn delete_folder(&self, folder: &str) -> anyhow::Result<()> {
        self.with_state(|s| s.calls.push(MediaCall::DeleteFolder(folder.to_string())));
        Ok(())
    }
}

/// App state over `pool` with a recording media store
pub fn create_test_state_with(pool: PgPool, config: Config) -> (AppState, Arc<RecordingMediaStore>) {
    let media = Arc::new(RecordingMediaStore::default());
    let state = AppState::builder()
        .db(pool)
        .oauth(OAuthClient::new(config.auth.oauth.clone()).expect("Failed to create OAuth client"))
        .config(config)
        .media(media.clone())
        .templates(Arc::new(crate::templates::load().expect("Failed to load templates")))
        .build();
    (state, media)
}

pub fn create_test_state(pool: PgPool) -> AppState {
    create_test_state_with(pool, create_test_config()).0
}

pub async fn create_test_app(pool: PgPool) -> (TestServer, Arc<RecordingMediaStore>) {
    create_test_app_with_config(pool, create_test_config()).await
}

pub async fn create_test_app_with_config(pool: PgPool, config: Config) -> (TestServer, Arc<RecordingMediaStore>) {
    let (state, media) = create_test_state_with(pool, config);
    let router = crate::build_router(&state).expect("Failed to build router");
    let server = TestServer::new(router).expect("Failed to create test server");
    (server, media)
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid test date")
}

/// A user as created by a first sign-in
pub async fn create_test_user(pool: &PgPool, email: &str, is_admin: bool) -> UserDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let mut users = Users::new(&mut conn);
    let profile = OAuthProfile {
        provider: "google".to_string(),
        provider_account_id: Uuid::new_v4().simple().to_string(),
        email: email.to_string(),
        name: Some("Test User".to_string()),
        image: None,
    };
    let user = users.upsert_from_oauth(&profile).await.expect("Failed to create test user");
    if !is_admin {
        return user;
    }

    users.ensure_admins(&[user.email.clone()]).await.expect("Failed to promote test user");
    users
        .get_by_id(user.id)
        .await
        .expect("Failed to reload test user")
        .expect("test user exists")
}

/// `Cookie` header value carrying a session for `user`
pub fn session_cookie_for(config: &Config, user: &UserDBResponse) -> String {
    let token = create_session_token(user.id, &user.email, config).expect("Failed to create session token");
    format!("{}={}", config.auth.session.cookie_name, token)
}

/// Session cookie of a fresh admin user
pub async fn admin_cookie(pool: &PgPool) -> String {
    let admin = create_test_user(pool, &format!("admin-{}@joinery.test", Uuid::new_v4().simple()), true).await;
    session_cookie_for(&create_test_config(), &admin)
}

pub async fn create_test_project(pool: &PgPool, title: &str, project_date: NaiveDate, folder: &str) -> ProjectDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Projects::new(&mut conn)
        .create(&ProjectCreateDBRequest {
            title: title.to_string(),
            description: None,
            location: None,
            project_date,
            folder: folder.to_string(),
            featured: false,
            published: false,
        })
        .await
        .expect("Failed to create test project")
}

pub async fn publish_project(pool: &PgPool, project: &ProjectDBResponse) {
    sqlx::query("UPDATE projects SET published = TRUE WHERE id = $1")
        .bind(project.id)
        .execute(pool)
        .await
        .expect("Failed to publish test project");
}

pub async fn create_test_tag(pool: &PgPool, name: &str, slug: &str) -> TagDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Tags::new(&mut conn)
        .create(&TagCreateDBRequest {
            name: name.to_string(),
            slug: slug.to_string(),
        })
        .await
        .expect("Failed to create test tag")
}

/// Image registered at `{folder}/{name}`
pub async fn create_test_image(pool: &PgPool, project: &ProjectDBResponse, name: &str) -> ProjectImageDBResponse {
    let public_id = format!("{}/{}", project.folder, name);
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    ProjectImages::new(&mut conn)
        .create(&ProjectImageCreateDBRequest {
            project_id: project.id,
            url: format!("{TEST_MEDIA_URL}/{public_id}.jpg"),
            public_id,
            width: Some(1600),
            height: Some(1200),
            alt_text: None,
        })
        .await
        .expect("Failed to create test image")
}

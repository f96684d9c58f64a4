//! # joinery: portfolio website and admin CMS for a woodworking contractor
//!
//! `joinery` serves the public marketing site of a small joinery business (home page, project
//! gallery, about and contact pages) together with the JSON API and admin dashboard used to
//! maintain it. Project photos live on Cloudinary; the database only stores where they are.
//!
//! ## Architecture
//!
//! The application is built on [Axum](https://github.com/tokio-rs/axum) over PostgreSQL.
//!
//! - The **API layer** ([`api`]) exposes a public read API (`/api/projects`, `/api/tags`,
//!   `/api/settings`, `/api/contact`) and an admin API under `/api/admin/*`, plus the
//!   server-rendered pages.
//! - The **authentication layer** ([`auth`]) signs users in through an external OAuth 2.0
//!   identity provider and keeps them signed in with a JWT session cookie. Whether a user is an
//!   administrator is read from the database on every request.
//! - The **database layer** ([`db`]) uses one repository per table.
//! - **Media** ([`media`]) wraps the Cloudinary upload and admin APIs behind the
//!   [`media::MediaStore`] trait, and [`folders`] derives each project's folder from its date.
//! - **Email** delivers contact-form submissions over SMTP and accepts delivery events from the
//!   provider on `/webhooks/email` ([`webhooks`]).
//!
//! ### Project folders
//!
//! Every project owns a folder `{root}/projects/{YYYYMMDD-HHmmss}` whose date half is the
//! project date. Changing the date moves every image to a freshly derived folder on the media
//! host before the database is updated, and moves the project between the two days' display
//! sequences.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use joinery::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = joinery::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     let tracer_provider = joinery::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     let result = app
//!         .serve(async {
//!             tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!         })
//!         .await;
//!
//!     joinery::telemetry::shutdown_telemetry(tracer_provider);
//!     result
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.
pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod email;
pub mod errors;
pub mod folders;
pub mod media;
mod openapi;
mod static_assets;
pub mod telemetry;
mod templates;
pub mod types;
pub mod webhooks;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use crate::{
    auth::oauth::OAuthClient,
    config::CorsOrigin,
    db::handlers::Users,
    media::{CloudinaryClient, MediaStore},
    openapi::ApiDoc,
};
use anyhow::Context;
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::{
    Json, Router, http,
    routing::{get, patch, post, put},
};
use axum_prometheus::PrometheusMetricLayer;
use bon::Builder;
pub use config::Config;
use minijinja::Environment;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use types::{ImageId, MessageId, ProjectId, TagId, UserId};

/// Multipart framing allowance on top of `media.max_upload_bytes`
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Application state shared across all request handlers.
///
/// - `db`: PostgreSQL connection pool
/// - `config`: Application configuration loaded from environment/files
/// - `media`: the media host (Cloudinary in production, an in-memory store in tests)
/// - `templates`: page templates, compiled into the binary
/// - `oauth`: identity-provider client used by the sign-in callback
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder()
///     .db(pool)
///     .config(config)
///     .media(Arc::new(CloudinaryClient::new(media_config)?))
///     .templates(Arc::new(templates))
///     .oauth(OAuthClient::new(oauth_config)?)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    pub media: Arc<dyn MediaStore>,
    pub templates: Arc<Environment<'static>>,
    pub oauth: OAuthClient,
}

/// Get the joinery database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Install the aws-lc-rs rustls provider for HTTP clients. Safe to call repeatedly; the first
/// install wins.
pub(crate) fn install_crypto_provider() {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}

/// Mark the configured admin emails as administrators, creating placeholder users for anyone
/// who has not signed in yet.
#[instrument(skip_all, fields(count = emails.len()), err)]
pub async fn bootstrap_admins(pool: &PgPool, emails: &[String]) -> anyhow::Result<()> {
    if emails.is_empty() {
        return Ok(());
    }

    let mut conn = pool.acquire().await?;
    let changed = Users::new(&mut conn).ensure_admins(emails).await?;
    if changed > 0 {
        info!("Granted admin to {} configured user(s)", changed);
    }
    Ok(())
}

fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let mut origins = Vec::new();
    for origin in &config.cors.allowed_origins {
        let header_value = match origin {
            CorsOrigin::Wildcard => "*".parse::<HeaderValue>()?,
            CorsOrigin::Url(url) => url.as_str().trim_end_matches('/').parse::<HeaderValue>()?,
        };
        origins.push(header_value);
    }

    let mut cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            http::Method::GET,
            http::Method::POST,
            http::Method::PUT,
            http::Method::PATCH,
            http::Method::DELETE,
        ])
        .allow_headers([http::header::CONTENT_TYPE])
        .allow_credentials(config.cors.allow_credentials)
        .expose_headers(vec![http::header::LOCATION]);

    if let Some(max_age) = config.cors.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the application router with all endpoints and middleware.
///
/// - Public pages and embedded static assets
/// - Public JSON API at `/api/*`
/// - Admin JSON API at `/api/admin/*`
/// - Sign-in routes at `/auth/*`
/// - Delivery-event webhook at `/webhooks/email`
/// - API docs at `/docs`, optional Prometheus metrics, CORS and tracing
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    use api::handlers::{auth, contact, email_webhooks, images, pages, projects, settings, static_assets, tags, uploads};

    let upload_limit = state.config.media.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;

    let public_api = Router::new()
        .route("/projects", get(projects::list_published_projects))
        .route("/projects/{id}", get(projects::get_published_project))
        .route("/tags", get(tags::list_tags_with_counts))
        .route("/settings", get(settings::get_settings))
        .route("/contact", post(contact::submit_contact))
        .route("/auth/session", get(auth::get_session));

    let admin_api = Router::new()
        .route("/projects", get(projects::list_projects).post(projects::create_project))
        .route("/projects/order", put(projects::reorder_projects))
        .route(
            "/projects/{id}",
            get(projects::get_project)
                .patch(projects::update_project)
                .delete(projects::delete_project),
        )
        .route("/projects/{id}/images", post(images::register_image))
        .route(
            "/projects/{id}/images/upload",
            post(images::upload_image).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/projects/{id}/images/order", put(images::reorder_images))
        .route(
            "/projects/{id}/images/{image_id}",
            patch(images::update_image).delete(images::delete_image),
        )
        .route("/uploads/sign", post(uploads::sign_upload))
        .route("/tags", get(tags::list_tags).post(tags::create_tag))
        .route("/tags/{id}", patch(tags::update_tag).delete(tags::delete_tag))
        .route("/settings", get(settings::get_admin_settings).patch(settings::update_settings))
        .route("/messages", get(contact::list_messages));

    let auth_routes = Router::new()
        .route("/auth/signin", get(auth::signin))
        .route("/auth/callback", get(auth::callback))
        .route("/auth/signout", post(auth::signout));

    let page_routes = Router::new()
        .route("/", get(pages::home))
        .route("/projects", get(pages::projects))
        .route("/projects/{id}", get(pages::project_detail))
        .route("/about", get(pages::about))
        .route("/contact", get(pages::contact))
        .route("/admin", get(pages::admin));

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .route("/static/{*path}", get(static_assets::serve_static_asset))
        .route("/webhooks/email", post(email_webhooks::email_event))
        .merge(page_routes)
        .merge(auth_routes)
        .nest("/api/admin", admin_api)
        .nest("/api", public_api)
        .fallback(pages::not_found)
        .with_state(state.clone())
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    let cors_layer = create_cors_layer(&state.config)?;
    let mut router = router.layer(cors_layer);

    if state.config.enable_metrics {
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
        router = router
            .route("/internal/metrics", get(|| async move { metric_handle.render() }))
            .layer(prometheus_layer);
    }

    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// The assembled application: database pool, state and router.
pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        Self::new_with_pool(config, None).await
    }

    /// Create an application, reusing `pool` when given instead of connecting to
    /// `database_url`
    pub async fn new_with_pool(config: Config, pool: Option<PgPool>) -> anyhow::Result<Self> {
        debug!("Starting joinery with configuration: {:#?}", config);

        let pool = match pool {
            Some(pool) => pool,
            None => {
                let url = config
                    .database_url
                    .as_deref()
                    .context("database_url is not configured. Set DATABASE_URL or add database_url to the config file.")?;
                PgPool::connect(url).await?
            }
        };
        migrator().run(&pool).await?;
        bootstrap_admins(&pool, &config.auth.admin_emails).await?;

        let state = AppState::builder()
            .db(pool.clone())
            .config(config.clone())
            .media(Arc::new(CloudinaryClient::new(config.media.clone())?))
            .templates(Arc::new(templates::load()?))
            .oauth(OAuthClient::new(config.auth.oauth.clone())?)
            .build();

        let router = build_router(&state)?;

        Ok(Self { router, config, pool })
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("joinery listening on http://{}, public URL {}", bind_addr, self.config.public_url);

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Closing database connections...");
        self.pool.close().await;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_test_app, create_test_config, create_test_user};
    use axum::http::StatusCode;

    #[sqlx::test]
    #[test_log::test]
    async fn test_healthz_and_docs(pool: PgPool) {
        let (server, _media) = create_test_app(pool).await;

        let response = server.get("/healthz").await;
        response.assert_status_ok();
        assert_eq!(response.text(), "OK");

        let response = server.get("/api-docs/openapi.json").await;
        response.assert_status_ok();
        let doc: serde_json::Value = response.json();
        assert!(doc["paths"]["/api/admin/projects"].is_object());
        assert!(doc["paths"]["/api/contact"].is_object());

        server.get("/docs").await.assert_status_ok();
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_unknown_route_is_404(pool: PgPool) {
        let (server, _media) = create_test_app(pool).await;
        server.get("/no/such/page").await.assert_status(StatusCode::NOT_FOUND);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_bootstrap_admins(pool: PgPool) {
        let user = create_test_user(&pool, "owner@example.com", false).await;

        bootstrap_admins(&pool, &["owner@example.com".to_string(), "partner@example.com".to_string()])
            .await
            .unwrap();

        let mut conn = pool.acquire().await.unwrap();
        let mut users = Users::new(&mut conn);
        assert!(users.get_by_id(user.id).await.unwrap().unwrap().is_admin);
        assert!(users.get_by_email("partner@example.com").await.unwrap().unwrap().is_admin);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_application_reuses_pool(pool: PgPool) {
        let mut config = create_test_config();
        config.auth.admin_emails = vec!["boss@example.com".to_string()];

        let app = Application::new_with_pool(config, Some(pool.clone())).await.unwrap();
        let server = axum_test::TestServer::new(app.router).unwrap();
        server.get("/healthz").await.assert_status_ok();

        let mut conn = pool.acquire().await.unwrap();
        let boss = Users::new(&mut conn).get_by_email("boss@example.com").await.unwrap();
        assert!(boss.is_some_and(|u| u.is_admin));
    }

    #[test]
    fn test_cors_layer() {
        let mut config = create_test_config();
        config.cors.allowed_origins = vec![CorsOrigin::Url(url::Url::parse("https://joinery.example").unwrap())];
        assert!(create_cors_layer(&config).is_ok());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_metrics_endpoint(pool: PgPool) {
        let mut config = create_test_config();
        config.enable_metrics = true;
        let (server, _media) = crate::test_utils::create_test_app_with_config(pool, config).await;

        server.get("/healthz").await.assert_status_ok();
        let response = server.get("/internal/metrics").await;
        response.assert_status_ok();
    }
}
